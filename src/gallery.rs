// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Static HTML gallery rendered from the tagging log

use chrono::Local;
use minijinja::{context, Environment};
use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::record::{Category, Status, TaggingRecord};
use crate::tag_log::read_records_with_column;
use crate::Result;

const DEFAULT_TEMPLATE_NAME: &str = "gallery.html";

const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Image Gallery</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
               background: #1a1a2e; color: #e8e8e8; margin: 0; padding: 20px; }
        .grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(280px, 1fr)); gap: 20px; }
        .card { background: #0f3460; border-radius: 12px; padding: 12px; }
        .card img { width: 100%; border-radius: 8px; }
        .card.error { background: #4a1a2e; }
        .meta { color: #a0a0a0; font-size: 0.85em; }
        .tag { display: inline-block; background: #e94560; color: white; padding: 2px 8px;
               border-radius: 12px; font-size: 0.8em; margin: 2px; }
        pre { white-space: pre-wrap; font-size: 0.75em; }
    </style>
</head>
<body>
    <h1>Image Gallery</h1>
    <p class="meta">{{ items | length }} entries, generated {{ generated_at }}</p>
    <div class="grid">
    {% for item in items %}
        {% if item.status == "ok" %}
        <div class="card">
            <img src="{{ item.original_filepath }}" alt="{{ item.clean_filename }}" loading="lazy">
            <h3>{{ item.clean_filename }}</h3>
            <p class="meta">{{ item.category }}{% if item.genre %} / {{ item.genre }}{% endif %}
                &middot; {{ item.width }}&times;{{ item.height }} &middot; {{ item.formatted_timestamp }}</p>
            <p>{{ item.description }}</p>
            <div>{% for tag in item.tags %}<span class="tag">{{ tag }}</span>{% endfor %}</div>
            {% if item.notes %}<p>{{ item.notes }}</p>{% endif %}
        </div>
        {% else %}
        <div class="card error">
            <h3>{{ item.original_filepath }}</h3>
            <p class="meta">failed &middot; {{ item.formatted_timestamp }}</p>
            <pre>{{ item.description }}</pre>
        </div>
        {% endif %}
    {% endfor %}
    </div>
</body>
</html>
"#;

/// One log row as the template sees it
#[derive(Debug, Clone, Serialize)]
pub struct GalleryItem {
    pub timestamp: String,
    /// `%m/%d/%y %I:%M %p`, or the raw timestamp when it cannot be parsed
    pub formatted_timestamp: String,
    pub status: Status,
    pub total_tokens: Option<u64>,
    pub model: Option<String>,
    pub original_filepath: String,
    pub original_filename: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub category: Option<Category>,
    pub genre: Option<String>,
    pub filename: Option<String>,
    pub clean_filename: Option<String>,
    pub filename_already_makes_sense: Option<bool>,
    pub tags: Vec<String>,
    pub description: String,
    pub notes: String,
}

impl From<TaggingRecord> for GalleryItem {
    fn from(record: TaggingRecord) -> Self {
        Self::with_notes(record, None)
    }
}

impl GalleryItem {
    /// `notes` comes from an optional extra log column; absent means empty.
    pub fn with_notes(record: TaggingRecord, notes: Option<String>) -> Self {
        let formatted_timestamp = record
            .parsed_timestamp()
            .map(|ts| ts.format("%m/%d/%y %I:%M %p").to_string())
            .unwrap_or_else(|| record.timestamp.clone());
        let tags = record.tag_list();
        Self {
            timestamp: record.timestamp,
            formatted_timestamp,
            status: record.status,
            total_tokens: record.total_tokens,
            model: record.model,
            original_filepath: record.original_filepath,
            original_filename: record.original_filename,
            width: record.width,
            height: record.height,
            category: record.category,
            genre: record.genre,
            filename: record.filename,
            clean_filename: record.clean_filename,
            filename_already_makes_sense: record.filename_already_makes_sense,
            tags,
            description: record.description.unwrap_or_default(),
            notes: notes.unwrap_or_default(),
        }
    }
}

/// Render `items` with the template source `template`. Values are
/// HTML-escaped when `name` ends in `.html`, `.htm` or `.xml`.
pub fn render(name: &str, template: &str, items: &[GalleryItem]) -> Result<String> {
    let mut env = Environment::new();
    env.add_template(name, template)?;

    let rendered = env.get_template(name)?.render(context! {
        items => items,
        generated_at => Local::now().format("%Y-%m-%d %H:%M").to_string(),
    })?;
    Ok(rendered)
}

/// Read the log, render every row in log order and write `output_path`.
/// Uses the built-in template when `template_path` is `None`.
pub fn render_gallery(log_path: &Path, template_path: Option<&Path>, output_path: &Path) -> Result<usize> {
    let items: Vec<GalleryItem> = read_records_with_column(log_path, "notes")?
        .into_iter()
        .map(|(record, notes)| GalleryItem::with_notes(record, notes))
        .collect();

    let (name, source) = match template_path {
        Some(path) => (
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| DEFAULT_TEMPLATE_NAME.to_string()),
            std::fs::read_to_string(path)?,
        ),
        None => (DEFAULT_TEMPLATE_NAME.to_string(), DEFAULT_TEMPLATE.to_string()),
    };

    let html = render(&name, &source, &items)?;
    std::fs::write(output_path, html)?;
    info!("Wrote gallery of {} entries to {:?}", items.len(), output_path);
    Ok(items.len())
}
