//! Storage image URLs: classification and on-the-fly resize/quality transforms.
//!
//! Public objects live under `.../storage/v1/object/public/{bucket}/{path}`. The storage host
//! serves resized variants of the same object from `.../storage/v1/render/image/public/...`
//! with `width`, `height`, `quality` and `resize` query parameters. Any other URL is passed
//! through untouched.

use crate::{Error, QuillConfig, Result};
use std::str::FromStr;
use std::sync::OnceLock;
use url::form_urlencoded;

/// Substring that identifies a public object URL on the trusted storage host.
pub const STORAGE_PUBLIC_MARKER: &str = "supabase.co/storage/v1/object/public/";
pub const OBJECT_PATH: &str = "/storage/v1/object/public/";
pub const RENDER_PATH: &str = "/storage/v1/render/image/public/";

pub const DEFAULT_QUALITY: u8 = 75;
pub const AVATAR_QUALITY: u8 = 80;
/// Quality used for the 2x and 3x entries of an avatar `srcset`.
pub const AVATAR_HIDPI_QUALITY: u8 = 70;

pub const DEFAULT_AVATAR: &str = "/defaultprofile.png";

/// Tiny SVG shown while an avatar loads.
pub const AVATAR_BLUR_DATA_URL: &str = "data:image/svg+xml;base64,PHN2ZyB3aWR0aD0iNDAiIGhlaWdodD0iNDAiIHZpZXdCb3g9IjAgMCA0MCA0MCIgZmlsbD0ibm9uZSIgeG1sbnM9Imh0dHA6Ly93d3cudzMub3JnLzIwMDAvc3ZnIj48cmVjdCB3aWR0aD0iNDAiIGhlaWdodD0iNDAiIGZpbGw9IiNlMmQ4ZjMiLz48L3N2Zz4=";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResizeMode {
    #[default]
    Cover,
    Contain,
    Fill,
}

impl ResizeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Contain => "contain",
            Self::Fill => "fill",
        }
    }
}

impl FromStr for ResizeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cover" => Ok(Self::Cover),
            "contain" => Ok(Self::Contain),
            "fill" => Ok(Self::Fill),
            _ => Err(Error::UnknownResizeMode {
                value: s.to_string(),
            }),
        }
    }
}

/// Parameters of a render URL. `None` (or zero) width/height are omitted; `quality` falls back
/// to the transformer's default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u8>,
    pub resize: ResizeMode,
}

impl TransformOptions {
    pub fn width(width: u32) -> Self {
        Self {
            width: Some(width),
            ..Self::default()
        }
    }
}

/// Avatar sizes used across the app, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AvatarSize {
    Xs,
    Sm,
    #[default]
    Md,
    Lg,
    Xl,
    Xl2,
    Xl3,
    Xl4,
}

impl AvatarSize {
    pub const ALL: [AvatarSize; 8] = [
        Self::Xs,
        Self::Sm,
        Self::Md,
        Self::Lg,
        Self::Xl,
        Self::Xl2,
        Self::Xl3,
        Self::Xl4,
    ];

    pub fn pixels(self) -> u32 {
        match self {
            Self::Xs => 24,
            Self::Sm => 32,
            Self::Md => 40,
            Self::Lg => 48,
            Self::Xl => 64,
            Self::Xl2 => 80,
            Self::Xl3 => 128,
            Self::Xl4 => 160,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Xs => "xs",
            Self::Sm => "sm",
            Self::Md => "md",
            Self::Lg => "lg",
            Self::Xl => "xl",
            Self::Xl2 => "2xl",
            Self::Xl3 => "3xl",
            Self::Xl4 => "4xl",
        }
    }
}

impl FromStr for AvatarSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lc = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|size| size.name() == lc)
            .ok_or_else(|| Error::UnknownAvatarSize {
                value: s.to_string(),
            })
    }
}

/// A named avatar size or an explicit pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarDimension {
    Named(AvatarSize),
    Pixels(u32),
}

impl Default for AvatarDimension {
    fn default() -> Self {
        Self::Named(AvatarSize::default())
    }
}

impl AvatarDimension {
    pub fn pixels(self) -> u32 {
        match self {
            Self::Named(size) => size.pixels(),
            Self::Pixels(px) => px,
        }
    }
}

impl From<AvatarSize> for AvatarDimension {
    fn from(value: AvatarSize) -> Self {
        Self::Named(value)
    }
}

impl From<u32> for AvatarDimension {
    fn from(value: u32) -> Self {
        Self::Pixels(value)
    }
}

impl FromStr for AvatarDimension {
    type Err = Error;

    /// Accepts a size name (`"md"`, `"2xl"`) or a pixel count (`"50"`).
    fn from_str(s: &str) -> Result<Self> {
        if let Ok(px) = s.trim().parse::<u32>() {
            return Ok(Self::Pixels(px));
        }
        s.parse::<AvatarSize>().map(Self::Named)
    }
}

/// What [`ImageTransformer::avatar_url`] does with a storage avatar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AvatarMode {
    /// Width-only render URL at twice the display size.
    #[default]
    Optimize,
    /// Return the stored URL verbatim.
    ///
    /// The render endpoint can crop avatars server-side; this mode hands the original image
    /// to the client and leaves the circular crop to CSS.
    Original,
}

impl FromStr for AvatarMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimize" => Ok(Self::Optimize),
            "original" => Ok(Self::Original),
            _ => Err(Error::UnknownAvatarMode {
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSettings {
    pub storage_marker: String,
    pub default_quality: u8,
    pub avatar_quality: u8,
    pub avatar_mode: AvatarMode,
    pub default_avatar: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            storage_marker: STORAGE_PUBLIC_MARKER.to_string(),
            default_quality: DEFAULT_QUALITY,
            avatar_quality: AVATAR_QUALITY,
            avatar_mode: AvatarMode::default(),
            default_avatar: DEFAULT_AVATAR.to_string(),
        }
    }
}

impl ImageSettings {
    /// Reads the `images.*` keys, falling back to the defaults for absent ones.
    pub fn from_config(config: &QuillConfig) -> Result<Self> {
        let mut settings = Self::default();
        if let Some(marker) = config.require_str("images.storageMarker")? {
            settings.storage_marker = marker.to_string();
        }
        if let Some(q) = read_quality(config, "images.defaultQuality")? {
            settings.default_quality = q;
        }
        if let Some(q) = read_quality(config, "images.avatarQuality")? {
            settings.avatar_quality = q;
        }
        if let Some(mode) = config.require_str("images.avatarMode")? {
            settings.avatar_mode = mode.parse()?;
        }
        if let Some(path) = config.require_str("images.defaultAvatar")? {
            settings.default_avatar = path.to_string();
        }
        Ok(settings)
    }
}

fn read_quality(config: &QuillConfig, key: &str) -> Result<Option<u8>> {
    let Some(q) = config.require_u64(key)? else {
        return Ok(None);
    };
    match u8::try_from(q) {
        Ok(q) if (1..=100).contains(&q) => Ok(Some(q)),
        _ => Err(Error::ConfigType {
            key: key.to_string(),
            expected: "quality between 1 and 100",
        }),
    }
}

fn non_zero(v: Option<u32>) -> Option<u32> {
    v.filter(|&v| v > 0)
}

/// URL rewriting against one storage host configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageTransformer {
    settings: ImageSettings,
}

impl ImageTransformer {
    pub fn new(settings: ImageSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ImageSettings {
        &self.settings
    }

    pub fn is_storage_url(&self, url: Option<&str>) -> bool {
        match url {
            Some(url) if !url.is_empty() => url.contains(self.settings.storage_marker.as_str()),
            _ => false,
        }
    }

    /// Render URL for a storage object, or the input unchanged for any other URL.
    /// Absent input yields `""`.
    pub fn optimized_image_url(&self, url: Option<&str>, options: &TransformOptions) -> String {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            return String::new();
        };
        if !self.is_storage_url(Some(url)) {
            return url.to_string();
        }

        let render_url = url.replacen(OBJECT_PATH, RENDER_PATH, 1);

        let mut params = form_urlencoded::Serializer::new(String::new());
        if let Some(w) = non_zero(options.width) {
            params.append_pair("width", &w.to_string());
        }
        if let Some(h) = non_zero(options.height) {
            params.append_pair("height", &h.to_string());
        }
        let quality = options.quality.unwrap_or(self.settings.default_quality);
        params.append_pair("quality", &quality.to_string());
        if options.resize != ResizeMode::Cover {
            params.append_pair("resize", options.resize.as_str());
        }

        format!("{render_url}?{}", params.finish())
    }

    /// Avatar render URL at twice the display size, for high-density screens.
    ///
    /// Only the width is requested: asking for both dimensions makes the storage host crop,
    /// which zooms in on faces. CSS `object-fit: cover` does the circular crop instead.
    pub fn optimized_avatar_url(&self, url: Option<&str>, size: AvatarDimension) -> String {
        self.optimized_image_url(
            url,
            &TransformOptions {
                width: Some(size.pixels() * 2),
                quality: Some(self.settings.avatar_quality),
                ..TransformOptions::default()
            },
        )
    }

    /// The stored avatar URL exactly as given; see [`AvatarMode::Original`].
    pub fn original_avatar_url(&self, url: Option<&str>) -> String {
        url.unwrap_or_default().to_string()
    }

    /// Avatar URL with the placeholder for missing input. Storage avatars are handled per the
    /// configured [`AvatarMode`].
    pub fn avatar_url(&self, url: Option<&str>, size: AvatarDimension) -> String {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            return self.settings.default_avatar.clone();
        };
        match self.settings.avatar_mode {
            AvatarMode::Optimize => self.optimized_avatar_url(Some(url), size),
            AvatarMode::Original => self.original_avatar_url(Some(url)),
        }
    }

    /// The `src` an avatar element should use: the placeholder when there is no URL or the
    /// image failed to load, the avatar transform for storage URLs, anything else as-is.
    pub fn resolve_avatar_src(
        &self,
        url: Option<&str>,
        size: AvatarDimension,
        load_failed: bool,
    ) -> String {
        match url.filter(|u| !u.is_empty()) {
            None => self.settings.default_avatar.clone(),
            Some(_) if load_failed => self.settings.default_avatar.clone(),
            Some(u) if self.is_storage_url(Some(u)) => self.avatar_url(Some(u), size),
            Some(u) => u.to_string(),
        }
    }

    /// `srcset` with 1x, 2x and 3x entries; empty for anything but a storage URL.
    pub fn avatar_src_set(&self, url: Option<&str>, base_size: u32) -> String {
        if !self.is_storage_url(url) {
            return String::new();
        }

        [1u32, 2, 3]
            .into_iter()
            .map(|scale| {
                let quality = if scale == 1 {
                    self.settings.avatar_quality
                } else {
                    AVATAR_HIDPI_QUALITY
                };
                let src = self.optimized_image_url(
                    url,
                    &TransformOptions {
                        width: Some(base_size * scale),
                        quality: Some(quality),
                        ..TransformOptions::default()
                    },
                );
                format!("{src} {scale}x")
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Image-loader contract for a front-end image component: always emits `width` and
    /// `quality` for storage URLs and passes other sources through.
    pub fn image_loader(&self, src: &str, width: u32, quality: Option<u8>) -> String {
        if !self.is_storage_url(Some(src)) {
            return src.to_string();
        }
        let render_url = src.replacen(OBJECT_PATH, RENDER_PATH, 1);
        let quality = quality
            .filter(|&q| q > 0)
            .unwrap_or(self.settings.default_quality);
        let params = form_urlencoded::Serializer::new(String::new())
            .append_pair("width", &width.to_string())
            .append_pair("quality", &quality.to_string())
            .finish();
        format!("{render_url}?{params}")
    }
}

fn default_transformer() -> &'static ImageTransformer {
    static TRANSFORMER: OnceLock<ImageTransformer> = OnceLock::new();
    TRANSFORMER.get_or_init(ImageTransformer::default)
}

pub fn is_storage_url(url: Option<&str>) -> bool {
    default_transformer().is_storage_url(url)
}

pub fn optimized_image_url(url: Option<&str>, options: &TransformOptions) -> String {
    default_transformer().optimized_image_url(url, options)
}

pub fn optimized_avatar_url(url: Option<&str>, size: impl Into<AvatarDimension>) -> String {
    default_transformer().optimized_avatar_url(url, size.into())
}

pub fn original_avatar_url(url: Option<&str>) -> String {
    default_transformer().original_avatar_url(url)
}

pub fn avatar_url(url: Option<&str>, size: impl Into<AvatarDimension>) -> String {
    default_transformer().avatar_url(url, size.into())
}

pub fn avatar_src_set(url: Option<&str>, base_size: u32) -> String {
    default_transformer().avatar_src_set(url, base_size)
}

pub fn image_loader(src: &str, width: u32, quality: Option<u8>) -> String {
    default_transformer().image_loader(src, width, quality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STORAGE_URL: &str =
        "https://loaitxbibjftsytlgddi.supabase.co/storage/v1/object/public/avatars/test.jpg";

    #[test]
    fn classifies_storage_urls() {
        assert!(is_storage_url(Some(STORAGE_URL)));
        assert!(!is_storage_url(Some("https://example.com/image.jpg")));
        assert!(!is_storage_url(Some("/defaultprofile.png")));
        assert!(!is_storage_url(Some("")));
        assert!(!is_storage_url(None));
    }

    #[test]
    fn rewrites_object_path_to_render_path() {
        let out = optimized_image_url(Some(STORAGE_URL), &TransformOptions::width(100));
        assert_eq!(
            out,
            "https://loaitxbibjftsytlgddi.supabase.co/storage/v1/render/image/public/avatars/test.jpg?width=100&quality=75"
        );
        assert!(!out.contains("/object/public/"));
    }

    #[test]
    fn emits_parameters_in_order() {
        let out = optimized_image_url(
            Some(STORAGE_URL),
            &TransformOptions {
                width: Some(200),
                height: Some(150),
                quality: Some(50),
                resize: ResizeMode::Contain,
            },
        );
        assert!(out.ends_with("?width=200&height=150&quality=50&resize=contain"));
    }

    #[test]
    fn omits_cover_resize_and_zero_dimensions() {
        let out = optimized_image_url(
            Some(STORAGE_URL),
            &TransformOptions {
                width: Some(0),
                height: Some(150),
                ..TransformOptions::default()
            },
        );
        assert!(out.ends_with("?height=150&quality=75"));
        assert!(!out.contains("resize="));

        let out = optimized_image_url(
            Some(STORAGE_URL),
            &TransformOptions {
                resize: ResizeMode::Fill,
                ..TransformOptions::default()
            },
        );
        assert!(out.ends_with("?quality=75&resize=fill"));
    }

    #[test]
    fn passes_through_other_hosts_and_empties_missing_input() {
        let url = "https://example.com/image.jpg";
        assert_eq!(optimized_image_url(Some(url), &TransformOptions::width(100)), url);
        assert_eq!(optimized_image_url(None, &TransformOptions::default()), "");
        assert_eq!(optimized_image_url(Some(""), &TransformOptions::default()), "");
    }

    #[test]
    fn avatar_requests_double_width_without_height() {
        let out = optimized_avatar_url(Some(STORAGE_URL), AvatarSize::Md);
        assert!(out.contains("width=80"));
        assert!(!out.contains("height="));
        assert!(out.contains("quality=80"));

        let out = optimized_avatar_url(Some(STORAGE_URL), 50u32);
        assert!(out.contains("width=100"));
    }

    #[test]
    fn original_avatar_mode_returns_url_verbatim() {
        assert_eq!(original_avatar_url(Some(STORAGE_URL)), STORAGE_URL);
        assert_eq!(original_avatar_url(None), "");

        let transformer = ImageTransformer::new(ImageSettings {
            avatar_mode: AvatarMode::Original,
            ..ImageSettings::default()
        });
        assert_eq!(
            transformer.avatar_url(Some(STORAGE_URL), AvatarSize::Xl.into()),
            STORAGE_URL
        );
    }

    #[test]
    fn avatar_url_falls_back_to_placeholder() {
        assert_eq!(avatar_url(None, AvatarSize::Md), DEFAULT_AVATAR);
        assert_eq!(avatar_url(Some(""), AvatarSize::Md), DEFAULT_AVATAR);
        assert!(avatar_url(Some(STORAGE_URL), AvatarSize::Md).contains("/render/image/"));
        assert_eq!(
            avatar_url(Some("https://example.com/me.png"), AvatarSize::Md),
            "https://example.com/me.png"
        );
    }

    #[test]
    fn resolve_avatar_src_uses_placeholder_after_load_failure() {
        let t = ImageTransformer::default();
        let size = AvatarDimension::default();
        assert_eq!(t.resolve_avatar_src(Some(STORAGE_URL), size, true), DEFAULT_AVATAR);
        assert_eq!(t.resolve_avatar_src(None, size, false), DEFAULT_AVATAR);
        assert!(t
            .resolve_avatar_src(Some(STORAGE_URL), size, false)
            .contains("width=80"));
        assert_eq!(
            t.resolve_avatar_src(Some("https://images.example.com/a.jpg"), size, false),
            "https://images.example.com/a.jpg"
        );
    }

    #[test]
    fn src_set_has_three_densities() {
        let out = avatar_src_set(Some(STORAGE_URL), 40);
        let entries: Vec<&str> = out.split(", ").collect();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].contains("width=40&quality=80") && entries[0].ends_with(" 1x"));
        assert!(entries[1].contains("width=80&quality=70") && entries[1].ends_with(" 2x"));
        assert!(entries[2].contains("width=120&quality=70") && entries[2].ends_with(" 3x"));

        assert_eq!(avatar_src_set(Some("https://example.com/img.jpg"), 40), "");
        assert_eq!(avatar_src_set(None, 40), "");
    }

    #[test]
    fn image_loader_always_sets_width_and_quality() {
        assert!(image_loader(STORAGE_URL, 640, None).ends_with("?width=640&quality=75"));
        assert!(image_loader(STORAGE_URL, 640, Some(90)).ends_with("?width=640&quality=90"));
        assert_eq!(image_loader("/local.png", 640, None), "/local.png");
    }

    #[test]
    fn avatar_size_table() {
        let px: Vec<u32> = AvatarSize::ALL.iter().map(|s| s.pixels()).collect();
        assert_eq!(px, vec![24, 32, 40, 48, 64, 80, 128, 160]);
        assert_eq!("2xl".parse::<AvatarSize>().unwrap(), AvatarSize::Xl2);
        assert_eq!(
            "50".parse::<AvatarDimension>().unwrap(),
            AvatarDimension::Pixels(50)
        );
        assert!("huge".parse::<AvatarDimension>().is_err());
    }

    #[test]
    fn settings_from_config() {
        let cfg = QuillConfig::from_value(json!({
            "images": {
                "storageMarker": "cdn.pinkquill.com/storage/v1/object/public/",
                "defaultQuality": 60,
                "avatarMode": "original"
            }
        }));
        let settings = ImageSettings::from_config(&cfg).unwrap();
        assert_eq!(settings.default_quality, 60);
        assert_eq!(settings.avatar_quality, AVATAR_QUALITY);
        assert_eq!(settings.avatar_mode, AvatarMode::Original);

        let t = ImageTransformer::new(settings);
        let url = "https://cdn.pinkquill.com/storage/v1/object/public/posts/a.png";
        assert_eq!(
            t.optimized_image_url(Some(url), &TransformOptions::width(10)),
            "https://cdn.pinkquill.com/storage/v1/render/image/public/posts/a.png?width=10&quality=60"
        );

        let bad = QuillConfig::from_value(json!({ "images": { "defaultQuality": 500 } }));
        assert!(ImageSettings::from_config(&bad).is_err());
    }
}
