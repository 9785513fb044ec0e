#![forbid(unsafe_code)]

//! Content safety and text utilities for PinkQuill.
//!
//! Everything here is a pure, synchronous function over strings (the retry helper is the one
//! async exception, and it is executor-agnostic):
//! - [`sanitize`]: allow-list HTML sanitizing (strict and minimal profiles)
//! - [`text`]: plain-text extraction, excerpts and word counts
//! - [`links`]: screening of user-supplied link URLs
//! - [`image`]: storage image URL classification and resize/quality transforms
//! - [`toast`]: the wording and timing of user notifications
//! - [`retry`], [`format`]: backoff, error categorisation and display formatting
//!
//! None of the content functions fail. Configuration is the only fallible input.

pub mod config;
pub mod defaults;
pub mod error;
pub mod format;
pub mod image;
pub mod links;
pub mod retry;
pub mod sanitize;
pub mod text;
pub mod toast;

pub use config::QuillConfig;
pub use error::{Error, Result};
pub use image::{
    AvatarDimension, AvatarMode, AvatarSize, ImageSettings, ImageTransformer, ResizeMode,
    TransformOptions,
};
pub use links::{UrlPolicy, sanitize_url, sanitize_url_with};
pub use sanitize::{
    SafeHtml, SanitizeProfile, clean_html_for_display, create_safe_html, sanitize_html,
    sanitize_html_with, sanitize_minimal,
};
pub use text::{Excerpt, count_words, excerpt, get_excerpt, get_excerpt_by_words, strip_html};

/// Every setting derived from a [`QuillConfig`], built once and shared read-only.
#[derive(Debug, Clone)]
pub struct Settings {
    pub strict: SanitizeProfile,
    pub minimal: SanitizeProfile,
    pub url_policy: UrlPolicy,
    pub images: ImageTransformer,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strict: SanitizeProfile::strict(),
            minimal: SanitizeProfile::minimal(),
            url_policy: UrlPolicy::default(),
            images: ImageTransformer::default(),
        }
    }
}

impl Settings {
    pub fn from_config(config: &QuillConfig) -> Result<Self> {
        Ok(Self {
            strict: SanitizeProfile::strict().with_config(config, "sanitize.strict"),
            minimal: SanitizeProfile::minimal().with_config(config, "sanitize.minimal"),
            url_policy: UrlPolicy::from_config(config)?,
            images: ImageTransformer::new(ImageSettings::from_config(config)?),
        })
    }

    pub fn sanitize(&self, html: &str) -> String {
        sanitize_html_with(html, &self.strict)
    }

    pub fn sanitize_minimal(&self, html: &str) -> String {
        sanitize_html_with(html, &self.minimal)
    }

    pub fn sanitize_url(&self, url: &str) -> String {
        sanitize_url_with(url, self.url_policy)
    }
}
