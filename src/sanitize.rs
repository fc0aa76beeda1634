// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Filename sanitization for model-suggested names

use regex::Regex;
use std::sync::OnceLock;

struct Patterns {
    leading: Regex,
    separators: Regex,
    disallowed: Regex,
    dangling_dot: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        leading: Regex::new(r"^[^a-z_]+").expect("valid leading pattern"),
        separators: Regex::new(r"[\s_-]+").expect("valid separator pattern"),
        disallowed: Regex::new(r"[^a-z0-9_.]").expect("valid disallowed pattern"),
        dangling_dot: Regex::new(r"[\s_-]*\.+").expect("valid dot pattern"),
    })
}

fn clean_pass(raw: &str) -> String {
    let p = patterns();
    let name = raw.to_lowercase();
    let name = p.leading.replace(&name, "");
    let name = p.separators.replace_all(&name, "_");
    let name = p.disallowed.replace_all(&name, "");
    p.dangling_dot.replace_all(&name, ".").into_owned()
}

/// Normalize a suggested filename into lowercase `[a-z0-9_.]` with
/// underscore word separators.
///
/// Removing a character can expose a new leading digit or dot, so the
/// pass repeats until the name stops changing.
pub fn clean_filename(raw: &str) -> String {
    let mut current = clean_pass(raw);
    loop {
        let next = clean_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Split a filename into stem and extension, the extension keeping its dot.
///
/// Leading dots belong to the stem, so `.hidden` has no extension.
pub fn split_extension(filename: &str) -> (&str, &str) {
    let body_start = filename.len() - filename.trim_start_matches('.').len();
    match filename[body_start..].rfind('.') {
        Some(idx) => filename.split_at(body_start + idx),
        None => (filename, ""),
    }
}

/// Force `suggested` to carry the extension of `original`.
///
/// Extensions equal ignoring case are left alone; otherwise the suggested
/// stem gets the original extension exactly as written.
pub fn fix_extension(original: &str, suggested: &str) -> String {
    let (_, original_ext) = split_extension(original);
    let (suggested_stem, suggested_ext) = split_extension(suggested);
    if original_ext.eq_ignore_ascii_case(suggested_ext) {
        suggested.to_string()
    } else {
        format!("{}{}", suggested_stem, original_ext)
    }
}

/// Final on-disk name for a model suggestion, checked against `original`.
pub fn clean_and_fix(original: &str, suggested: &str) -> String {
    fix_extension(original, &clean_filename(suggested))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "Sunset Over The Bay!!.jpg",
        "  123 leading digits.png",
        "_.5x",
        "cat -- red _ blanket.JPG",
        "name_..jpg",
        "Ünïcödé Café.webp",
        "...",
        "",
        "résumé 2024 - final (copy).jpeg",
        "a\tb\nc.gif",
        "-_-",
        "İstanbul skyline.png",
    ];

    #[test]
    fn test_clean_example() {
        assert_eq!(clean_filename("Sunset Over The Bay!!.jpg"), "sunset_over_the_bay.jpg");
    }

    #[test]
    fn test_clean_strips_leading_junk() {
        assert_eq!(clean_filename("  123 leading digits.png"), "leading_digits.png");
        assert_eq!(clean_filename("_keep_underscore"), "_keep_underscore");
    }

    #[test]
    fn test_clean_collapses_separator_before_dot() {
        assert_eq!(clean_filename("name_..jpg"), "name.jpg");
        assert_eq!(clean_filename("name - .png"), "name.png");
        assert_eq!(clean_filename("cat -- red _ blanket.JPG"), "cat_red_blanket.jpg");
    }

    #[test]
    fn test_clean_is_idempotent() {
        for raw in SAMPLES {
            let once = clean_filename(raw);
            assert_eq!(clean_filename(&once), once, "input {:?}", raw);
        }
    }

    #[test]
    fn test_clean_output_alphabet() {
        for raw in SAMPLES {
            let cleaned = clean_filename(raw);
            assert!(
                cleaned
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.'),
                "input {:?} gave {:?}",
                raw,
                cleaned
            );
        }
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("photo1.JPG"), ("photo1", ".JPG"));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
        assert_eq!(split_extension("..odd.png"), ("..odd", ".png"));
    }

    #[test]
    fn test_fix_extension_keeps_case_insensitive_match() {
        assert_eq!(
            fix_extension("photo1.JPG", "sunset_over_the_bay.jpg"),
            "sunset_over_the_bay.jpg"
        );
    }

    #[test]
    fn test_fix_extension_forces_original() {
        assert_eq!(fix_extension("photo1.JPG", "sunset.png"), "sunset.JPG");
        assert_eq!(fix_extension("scan.tiff", "document"), "document.tiff");
        assert_eq!(fix_extension("noext", "cat.jpg"), "cat");
        assert_eq!(fix_extension("noext", "cat"), "cat");
    }

    #[test]
    fn test_fix_extension_always_matches_original() {
        let originals = ["a.JPG", "b.png", "c", "d.tar.gz", ".e"];
        let suggestions = ["x.jpg", "y.PNG", "z", "w.gz", "v.tar"];
        for original in originals {
            for suggested in suggestions {
                let fixed = fix_extension(original, suggested);
                let (_, want) = split_extension(original);
                let (_, got) = split_extension(&fixed);
                assert!(want.eq_ignore_ascii_case(got), "{} + {} -> {}", original, suggested, fixed);
            }
        }
    }

    #[test]
    fn test_clean_and_fix_pipeline() {
        assert_eq!(
            clean_and_fix("photo1.JPG", "Sunset Over The Bay!!.jpg"),
            "sunset_over_the_bay.jpg"
        );
        assert_eq!(clean_and_fix("IMG_0001.jpeg", "Dog Park"), "dog_park.jpeg");
    }
}
