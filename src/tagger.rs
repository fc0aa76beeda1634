// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Tagging one image with the vision model

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::image_prep::{self, ImageSource};
use crate::record::{join_tags, now_timestamp, Category, Status, TaggingRecord};
use crate::sanitize::clean_and_fix;
use crate::vision::{VisionModel, VisionRequest};
use crate::{PictagError, Result};

const PROMPT_TEMPLATE: &str = r#"Describe this image, come up with a good filename for it,
and determine category, genre, and tags for the image.

The description should be as detailed as possible. If the main subject is a person,
describe their appearance and pose.

The file extension MUST match the current filename extension.
If the current filename already adequately describes the image, use the current filename.
The filename must be less than 40 characters and should be less than 20 characters.
The filename should omit conjunctions, articles, prepositions, etc.
The filename should use only the essential nouns and adjectives.
The filename must be all lowercase with no spaces or special characters. Use "_" to separate words.

Determine if the current filename (given below) already loosely matches the above
format (don't be too strict) and has a filename that makes sense; report that as the
boolean flag "filename_already_makes_sense".

The category should be one of "photo", "art", "comic", or "meme".
Photographs of sculptures or paintings count as "art".
A "comic" is any cartoon regardless of humor.
A "meme" is an image which prominently features text (not merely text in the background.)
Only one category can be chosen.

The genre should be one of "sci-fi", "fantasy", "realism", etc.
Only one genre can be chosen.

The tags should be a list of relevant topics or themes that may help users
to find this image while searching.

Format your answer as a JSON object in this example format:

    {
        "description": "A cat sitting on a red blanket.",
        "category": "photo",
        "genre": "realism",
        "tags": ["cozy", "domestic", "hygge", "pet"],
        "filename_already_makes_sense": false,
        "filename": "cat_red_blanket.jpg"
    }

Current filename: "{filename}"
"#;

/// Prompt asking about an image currently named `filename`.
pub fn build_prompt(filename: &str) -> String {
    PROMPT_TEMPLATE.replace("{filename}", filename)
}

/// The model's answer, checked against the requested schema
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAnswer {
    pub description: String,
    pub category: Category,
    pub genre: Option<String>,
    pub tags: Vec<String>,
    pub filename_already_makes_sense: Option<bool>,
    pub filename: String,
}

#[derive(Deserialize)]
struct RawAnswer {
    description: String,
    category: String,
    #[serde(default)]
    genre: Option<String>,
    tags: Vec<String>,
    #[serde(default)]
    filename_already_makes_sense: Option<bool>,
    filename: String,
}

impl ModelAnswer {
    /// Parse the JSON body of a model reply.
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawAnswer = serde_json::from_str(content)
            .map_err(|e| PictagError::ModelResponse(format!("schema mismatch: {}", e)))?;
        Ok(Self {
            description: raw.description,
            category: raw.category.parse()?,
            genre: raw.genre.filter(|g| !g.trim().is_empty()),
            tags: raw.tags,
            filename_already_makes_sense: raw.filename_already_makes_sense,
            filename: raw.filename,
        })
    }
}

/// Request settings for [`Tagger`]
#[derive(Debug, Clone)]
pub struct TaggerOptions {
    pub max_dimension: u32,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl TaggerOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_dimension: config.image.max_dimension,
            temperature: config.engine.temperature,
            max_tokens: config.engine.max_tokens,
        }
    }
}

impl Default for TaggerOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Turns one image path or URL into an `ok` tagging record
pub struct Tagger<M> {
    model: M,
    http: Client,
    options: TaggerOptions,
}

impl<M: VisionModel> Tagger<M> {
    pub fn new(model: M, http: Client, options: TaggerOptions) -> Self {
        Self { model, http, options }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Tag one input. Any failure is returned for the caller to record.
    pub async fn tag_one(&self, input: &str) -> Result<TaggingRecord> {
        let source = ImageSource::parse(input);
        let display_name = source.display_name()?;
        info!("Tagging {}", input);

        let prepared = image_prep::prepare(&source, &self.http, self.options.max_dimension).await?;

        let request = VisionRequest {
            prompt: build_prompt(&display_name),
            image_url: prepared.data_url,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
            json_output: true,
        };
        let response = self.model.describe(&request).await?;
        debug!("Model {} used {} tokens", response.model, response.total_tokens);

        let answer = ModelAnswer::parse(&response.content)?;

        // A sanitized name never starts with a dot, so one here means an empty stem.
        let clean_filename = clean_and_fix(&display_name, &answer.filename);
        if clean_filename.is_empty() || clean_filename.starts_with('.') {
            return Err(PictagError::ModelResponse(format!(
                "suggested filename {:?} is empty after sanitization",
                answer.filename
            )));
        }

        Ok(TaggingRecord {
            timestamp: now_timestamp(),
            status: Status::Ok,
            total_tokens: Some(response.total_tokens),
            model: Some(response.model),
            original_filepath: input.to_string(),
            original_filename: Some(display_name),
            width: Some(prepared.width),
            height: Some(prepared.height),
            category: Some(answer.category),
            genre: answer.genre,
            filename: Some(answer.filename),
            clean_filename: Some(clean_filename),
            filename_already_makes_sense: answer.filename_already_makes_sense,
            tags: Some(join_tags(&answer.tags)),
            description: Some(answer.description),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::VisionResponse;
    use async_trait::async_trait;
    use image::DynamicImage;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct Canned {
        reply: String,
        seen: Mutex<Vec<VisionRequest>>,
    }

    impl Canned {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VisionModel for Canned {
        async fn describe(&self, request: &VisionRequest) -> Result<VisionResponse> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(VisionResponse {
                content: self.reply.clone(),
                total_tokens: 842,
                model: "gpt-4o-2024-08-06".to_string(),
            })
        }
    }

    const SUNSET: &str = r#"{
        "description": "Orange sun setting over calm water.",
        "category": "Photo",
        "genre": "realism",
        "tags": [" Sunset", "BAY", "water "],
        "filename_already_makes_sense": false,
        "filename": "Sunset Over The Bay!!.jpg"
    }"#;

    fn write_image(dir: &std::path::Path, name: &str, w: u32, h: u32) -> String {
        let path = dir.join(name);
        DynamicImage::new_rgb8(w, h)
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_prompt_mentions_filename() {
        let prompt = build_prompt("IMG_0042.JPG");
        assert!(prompt.contains("Current filename: \"IMG_0042.JPG\""));
        assert!(prompt.contains("\"filename_already_makes_sense\": false"));
    }

    #[test]
    fn test_answer_requires_filename() {
        let err = ModelAnswer::parse(r#"{"description": "x", "category": "art", "tags": []}"#);
        assert!(matches!(err, Err(PictagError::ModelResponse(_))));
    }

    #[test]
    fn test_answer_rejects_unknown_category() {
        let err = ModelAnswer::parse(
            r#"{"description": "x", "category": "diagram", "tags": [], "filename": "a.png"}"#,
        );
        assert!(matches!(err, Err(PictagError::ModelResponse(_))));
    }

    #[test]
    fn test_answer_optional_fields() {
        let answer = ModelAnswer::parse(
            r#"{"description": "x", "category": "comic", "tags": ["a"], "filename": "a.png", "genre": ""}"#,
        )
        .unwrap();
        assert_eq!(answer.category, Category::Comic);
        assert_eq!(answer.genre, None);
        assert_eq!(answer.filename_already_makes_sense, None);
    }

    #[tokio::test]
    async fn test_tag_one_merges_derived_fields() {
        let dir = tempdir().unwrap();
        let input = write_image(dir.path(), "photo1.JPG", 1200, 600);

        let tagger = Tagger::new(Canned::new(SUNSET), Client::new(), TaggerOptions::default());
        let record = tagger.tag_one(&input).await.unwrap();

        assert_eq!(record.status, Status::Ok);
        assert_eq!(record.original_filepath, input);
        assert_eq!(record.original_filename.as_deref(), Some("photo1.JPG"));
        assert_eq!(record.filename.as_deref(), Some("Sunset Over The Bay!!.jpg"));
        assert_eq!(record.clean_filename.as_deref(), Some("sunset_over_the_bay.jpg"));
        assert_eq!(record.tags.as_deref(), Some("sunset;bay;water"));
        assert_eq!(record.category, Some(Category::Photo));
        assert_eq!(record.total_tokens, Some(842));
        assert_eq!(record.model.as_deref(), Some("gpt-4o-2024-08-06"));
        assert_eq!((record.width, record.height), (Some(512), Some(256)));

        let seen = tagger.model().seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].prompt.contains("\"photo1.JPG\""));
        assert!(seen[0].json_output);
        assert_eq!(seen[0].temperature, 0.0);
    }

    #[tokio::test]
    async fn test_tag_one_forces_original_extension() {
        let dir = tempdir().unwrap();
        let input = write_image(dir.path(), "scan.png", 10, 10);
        let reply = r#"{"description": "d", "category": "art", "tags": [], "filename": "Old Map.jpg"}"#;

        let tagger = Tagger::new(Canned::new(reply), Client::new(), TaggerOptions::default());
        let record = tagger.tag_one(&input).await.unwrap();
        assert_eq!(record.clean_filename.as_deref(), Some("old_map.png"));
        assert_eq!(record.tags.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_tag_one_rejects_empty_suggestion() {
        let dir = tempdir().unwrap();
        let input = write_image(dir.path(), "a.png", 10, 10);
        let reply = r#"{"description": "d", "category": "meme", "tags": [], "filename": "!!!"}"#;

        let tagger = Tagger::new(Canned::new(reply), Client::new(), TaggerOptions::default());
        assert!(tagger.tag_one(&input).await.is_err());
    }

    #[tokio::test]
    async fn test_tag_one_rejects_malformed_json() {
        let dir = tempdir().unwrap();
        let input = write_image(dir.path(), "a.png", 10, 10);

        let tagger = Tagger::new(Canned::new("not json"), Client::new(), TaggerOptions::default());
        assert!(matches!(
            tagger.tag_one(&input).await,
            Err(PictagError::ModelResponse(_))
        ));
    }
}
