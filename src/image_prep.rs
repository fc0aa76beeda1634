// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Loading, downscaling and encoding images for the vision model

use base64::{engine::general_purpose, Engine as _};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use reqwest::Client;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use crate::{PictagError, Result};

/// Where an input image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource<'a> {
    Local(&'a Path),
    Remote(&'a str),
}

impl<'a> ImageSource<'a> {
    /// Inputs starting with `http` are fetched, everything else is a path.
    pub fn parse(input: &'a str) -> Self {
        if input.starts_with("http") {
            ImageSource::Remote(input)
        } else {
            ImageSource::Local(Path::new(input))
        }
    }

    /// Filename shown to the model: last URL path segment or path basename.
    pub fn display_name(&self) -> Result<String> {
        match self {
            ImageSource::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| PictagError::InvalidInput(format!("{:?} has no file name", path))),
            ImageSource::Remote(url) => {
                let parsed = reqwest::Url::parse(url)
                    .map_err(|e| PictagError::InvalidInput(format!("bad URL {:?}: {}", url, e)))?;
                Ok(parsed
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .unwrap_or_default()
                    .to_string())
            }
        }
    }

    pub async fn load(&self, http: &Client) -> Result<DynamicImage> {
        match self {
            // Format is taken from the file contents, not the extension.
            ImageSource::Local(path) => Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?),
            ImageSource::Remote(url) => {
                debug!("Fetching image from {}", url);
                let response = http.get(*url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(PictagError::ApiStatus { status, body });
                }
                let bytes = response.bytes().await?;
                Ok(image::load_from_memory(&bytes)?)
            }
        }
    }
}

/// Downscale so the longer side is at most `max_dimension`; never upscales.
pub fn resize_to_fit(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    let longest = width.max(height);
    if longest <= max_dimension {
        return img;
    }

    let scale = max_dimension as f64 / longest as f64;
    let new_width = ((width as f64 * scale) as u32).max(1);
    let new_height = ((height as f64 * scale) as u32).max(1);

    img.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

/// PNG bytes of `img`
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// `data:image/png;base64,...` URL of `img`
pub fn png_data_url(img: &DynamicImage) -> Result<String> {
    let png = encode_png(img)?;
    Ok(format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png)))
}

/// Image ready to send, with the dimensions actually sent
pub struct PreparedImage {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

/// Load, downscale and encode one input.
pub async fn prepare(source: &ImageSource<'_>, http: &Client, max_dimension: u32) -> Result<PreparedImage> {
    let img = resize_to_fit(source.load(http).await?, max_dimension);
    let (width, height) = img.dimensions();
    debug!("Prepared image at {}x{}", width, height);
    Ok(PreparedImage {
        data_url: png_data_url(&img)?,
        width,
        height,
    })
}
