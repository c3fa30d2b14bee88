/// Transform-URL construction for the image rendering endpoint
///
/// The storage host serves original assets under a public object prefix and
/// resized/recompressed renditions under a parallel render prefix that takes
/// the transform as query parameters. Everything here is a pure derivation;
/// URLs we don't recognize pass through untouched.

use std::panic;

/// Public object prefix served by the storage host
const OBJECT_PREFIX: &str = "/storage/v1/object/public/";
/// Render endpoint that accepts transform query parameters
const RENDER_PREFIX: &str = "/storage/v1/render/image/public/";

/// Progressive tier widths
const TIER_PLACEHOLDER: u32 = 20; // Blurred first-paint stand-in
const TIER_THUMBNAIL: u32 = 400; // Grid display
const TIER_MEDIUM: u32 = 800; // Detail view
const TIER_FULL: u32 = 1920; // Full-screen / lightbox

/// Progressive tier qualities
const QUALITY_PLACEHOLDER: u8 = 20;
const QUALITY_THUMBNAIL: u8 = 60;
const QUALITY_MEDIUM: u8 = 75;
const QUALITY_FULL: u8 = 85;

/// Blur radius applied to the placeholder tier
const PLACEHOLDER_BLUR: u8 = 10;

/// Delivery format requested from the render endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFormat {
    Avif,
    Webp,
    Jpeg,
}

impl DeliveryFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryFormat::Avif => "avif",
            DeliveryFormat::Webp => "webp",
            DeliveryFormat::Jpeg => "jpeg",
        }
    }
}

/// How the renderer fits the image into the requested box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    Cover,
    Contain,
    Fill,
}

impl ResizeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResizeMode::Cover => "cover",
            ResizeMode::Contain => "contain",
            ResizeMode::Fill => "fill",
        }
    }
}

/// Transform parameters for one rendition
///
/// Optional fields are omitted from the query string when unset;
/// quality/format/resize always carry their defaults (80, webp, cover).
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: u8,
    pub format: DeliveryFormat,
    pub resize: ResizeMode,
    pub blur: Option<u8>,
    pub brightness: Option<i32>,
    pub contrast: Option<i32>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            quality: 80,
            format: DeliveryFormat::Webp,
            resize: ResizeMode::Cover,
            blur: None,
            brightness: None,
            contrast: None,
        }
    }
}

impl TransformOptions {
    /// Shorthand for a width/quality rendition with default format and fit
    pub fn sized(width: u32, quality: u8) -> Self {
        Self {
            width: Some(width),
            quality,
            ..Self::default()
        }
    }
}

/// Build a transform URL against the render endpoint
///
/// Recognizes URLs under the public object prefix, rewrites them to the
/// render prefix, and appends the transform as query parameters. A URL that
/// does not belong to the storage host (a bare relative path, an external
/// image) is returned unchanged. This function never fails.
pub fn cdn_image_url(url: &str, opts: &TransformOptions) -> String {
    let Some(pos) = url.find(OBJECT_PREFIX) else {
        return url.to_string();
    };

    let object_path = &url[pos + OBJECT_PREFIX.len()..];
    let base = format!("{}{}{}", &url[..pos], RENDER_PREFIX, object_path);

    let mut params: Vec<String> = Vec::new();
    if let Some(width) = opts.width {
        params.push(format!("width={}", width));
    }
    if let Some(height) = opts.height {
        params.push(format!("height={}", height));
    }
    params.push(format!("quality={}", opts.quality));
    params.push(format!("format={}", opts.format.as_str()));
    params.push(format!("resize={}", opts.resize.as_str()));
    if let Some(blur) = opts.blur {
        params.push(format!("blur={}", blur));
    }
    if let Some(brightness) = opts.brightness {
        params.push(format!("brightness={}", brightness));
    }
    if let Some(contrast) = opts.contrast {
        params.push(format!("contrast={}", contrast));
    }

    // Object URLs normally carry no query of their own, but don't corrupt
    // one if it's there
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base, separator, params.join("&"))
}

/// Pick the best delivery format the running environment can decode
///
/// Best-effort probe: AVIF if decodable, then WebP, then JPEG. A probe that
/// panics counts as "unsupported" rather than taking the caller down.
pub fn optimal_format() -> DeliveryFormat {
    if probe_decoder(image::ImageFormat::Avif) {
        return DeliveryFormat::Avif;
    }
    if probe_decoder(image::ImageFormat::WebP) {
        return DeliveryFormat::Webp;
    }
    DeliveryFormat::Jpeg
}

/// Check whether a decoder for `format` is compiled in
fn probe_decoder(format: image::ImageFormat) -> bool {
    panic::catch_unwind(move || format.reading_enabled()).unwrap_or(false)
}

/// Build a transform URL using the probed optimal format
pub fn smart_image_url(url: &str, mut opts: TransformOptions) -> String {
    opts.format = optimal_format();
    cdn_image_url(url, &opts)
}

/// The four renditions used for progressive display, lowest fidelity first
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressiveImageUrls {
    pub placeholder: String,
    pub thumbnail: String,
    pub medium: String,
    pub full: String,
}

/// Derive the progressive rendition set for one source URL
///
/// Callers load these in order and swap in each higher-fidelity rendition as
/// it arrives, so first paint never waits on the full asset.
pub fn progressive_image_urls(url: &str) -> ProgressiveImageUrls {
    let placeholder = TransformOptions {
        blur: Some(PLACEHOLDER_BLUR),
        ..TransformOptions::sized(TIER_PLACEHOLDER, QUALITY_PLACEHOLDER)
    };

    ProgressiveImageUrls {
        placeholder: cdn_image_url(url, &placeholder),
        thumbnail: cdn_image_url(url, &TransformOptions::sized(TIER_THUMBNAIL, QUALITY_THUMBNAIL)),
        medium: cdn_image_url(url, &TransformOptions::sized(TIER_MEDIUM, QUALITY_MEDIUM)),
        full: cdn_image_url(url, &TransformOptions::sized(TIER_FULL, QUALITY_FULL)),
    }
}

/// Thumbnail-tier transform used by the preloader's first fetch
pub fn thumbnail_url(url: &str) -> String {
    cdn_image_url(url, &TransformOptions::sized(TIER_THUMBNAIL, QUALITY_THUMBNAIL))
}

/// Full-tier transform used once the thumbnail has landed
pub fn full_url(url: &str) -> String {
    cdn_image_url(url, &TransformOptions::sized(TIER_FULL, QUALITY_FULL))
}
