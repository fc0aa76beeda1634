// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pictag::sanitize::{clean_and_fix, clean_filename};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    original: &'a str,
    suggested: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let once = clean_filename(input.suggested);
    assert_eq!(clean_filename(&once), once);
    assert!(once
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.')));

    let _ = clean_and_fix(input.original, input.suggested);
});
