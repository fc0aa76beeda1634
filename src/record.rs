// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Rows of the tagging log

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::PictagError;

/// Column order of the tagging log. Matches the field order of [`TaggingRecord`].
pub const COLUMNS: [&str; 15] = [
    "timestamp",
    "status",
    "total_tokens",
    "model",
    "original_filepath",
    "original_filename",
    "width",
    "height",
    "category",
    "genre",
    "filename",
    "clean_filename",
    "filename_already_makes_sense",
    "tags",
    "description",
];

/// Outcome of one tagging attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

/// Broad kind of image, as judged by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Photo,
    Art,
    Comic,
    Meme,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Photo => "photo",
            Category::Art => "art",
            Category::Comic => "comic",
            Category::Meme => "meme",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = PictagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "photo" => Ok(Category::Photo),
            "art" => Ok(Category::Art),
            "comic" => Ok(Category::Comic),
            "meme" => Ok(Category::Meme),
            other => Err(PictagError::ModelResponse(format!(
                "category {:?} is not one of photo, art, comic, meme",
                other
            ))),
        }
    }
}

/// One row of the tagging log.
///
/// `ok` rows carry every derived field; `error` rows carry only the input
/// identity and the failure report in `description`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggingRecord {
    pub timestamp: String,
    pub status: Status,
    #[serde(default, deserialize_with = "lenient_parse")]
    pub total_tokens: Option<u64>,
    pub model: Option<String>,
    pub original_filepath: String,
    pub original_filename: Option<String>,
    #[serde(default, deserialize_with = "lenient_parse")]
    pub width: Option<u32>,
    #[serde(default, deserialize_with = "lenient_parse")]
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "lenient_parse")]
    pub category: Option<Category>,
    pub genre: Option<String>,
    pub filename: Option<String>,
    pub clean_filename: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub filename_already_makes_sense: Option<bool>,
    pub tags: Option<String>,
    pub description: Option<String>,
}

impl TaggingRecord {
    /// Error row for `input`, stamped now.
    pub fn error(input: &str, original_filename: Option<String>, report: String) -> Self {
        Self {
            timestamp: now_timestamp(),
            status: Status::Error,
            total_tokens: None,
            model: None,
            original_filepath: input.to_string(),
            original_filename,
            width: None,
            height: None,
            category: None,
            genre: None,
            filename: None,
            clean_filename: None,
            filename_already_makes_sense: None,
            tags: None,
            description: Some(report),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Tags split back out of the joined column, empty entries dropped.
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .map(split_tags)
            .unwrap_or_default()
    }

    /// Timestamp parsed back into local time, if it is in a known format.
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.timestamp) {
            return Some(dt.with_timezone(&Local).naive_local());
        }
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f").ok()
    }
}

/// Local time in ISO-8601 with microseconds and no offset.
pub fn now_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Lowercase, trim and `;`-join tags in their given order.
pub fn join_tags<S: AsRef<str>>(tags: &[S]) -> String {
    tags.iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .collect::<Vec<_>>()
        .join(";")
}

pub fn split_tags(joined: &str) -> Vec<String> {
    joined
        .split(';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

// Hand-edited cells that do not parse are read as empty.
fn lenient_parse<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => match s.parse() {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Ignoring unreadable log cell {:?}: {}", s, e);
                Ok(None)
            }
        },
    }
}

// Logs written by other tools spell booleans `True`/`False`.
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("true") || s == "1" => Ok(Some(true)),
        Some(s) if s.eq_ignore_ascii_case("false") || s == "0" => Ok(Some(false)),
        Some(other) => {
            warn!("Ignoring unreadable log cell {:?}: not a boolean", other);
            Ok(None)
        }
    }
}
