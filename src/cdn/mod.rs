/// CDN image delivery module
///
/// This module handles:
/// - Building transform URLs against the storage host's render endpoint
/// - Runtime delivery-format detection (AVIF / WebP / JPEG)
/// - Preloading images through a layered fallback chain
/// - Batched gallery preloading with cancellation and disk caching

pub mod preload;
pub mod preloader;
pub mod transform;
