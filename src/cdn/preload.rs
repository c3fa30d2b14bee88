/// Image preloading with a layered fallback chain
///
/// First paint should never wait on a full-resolution asset and a failed
/// transform should never take the page down. Loading tries the small
/// thumbnail rendition first, upgrades to the full rendition in the
/// background, and falls back to the original untransformed URL when the
/// render endpoint misbehaves. Only a failure of every tier is an error.

use std::path::{Path, PathBuf};

use super::transform::{full_url, thumbnail_url};

/// Fetches raw image bytes for a URL
///
/// The transport is pluggable: the binary reads from local disk, tests
/// script successes and failures.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> impl std::future::Future<Output = Result<Vec<u8>, String>> + Send;
}

/// Which tier of the fallback chain ended up winning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadTier {
    /// Full-resolution transform (the happy path)
    Full,
    /// Original untransformed URL (render endpoint unavailable)
    Original,
    /// Thumbnail only (every upgrade failed, but we have something to show)
    Thumbnail,
}

/// A successfully preloaded image, safe to treat as renderable
#[derive(Debug, Clone, PartialEq)]
pub struct PreloadedImage {
    /// The source URL the preload was requested for
    pub source_url: String,
    pub tier: PreloadTier,
    pub bytes: Vec<u8>,
}

/// Fetch one URL and verify the bytes actually decode
///
/// A transform that returns an error page or truncated body must count as a
/// failed tier, not as a loaded image.
async fn load_tier<F: ImageFetcher>(fetcher: &F, url: &str) -> Result<Vec<u8>, String> {
    let bytes = fetcher.fetch(url).await?;

    image::load_from_memory(&bytes)
        .map_err(|e| format!("Fetched bytes do not decode as an image: {}", e))?;

    Ok(bytes)
}

/// Preload one image through the fallback chain
///
/// Tier order: thumbnail transform, then the full transform, then the
/// original URL. On thumbnail failure the original is loaded directly. The
/// returned future resolves only once a renderable asset has loaded, and
/// errs only if every attempted tier failed.
pub async fn preload_image<F: ImageFetcher>(
    fetcher: &F,
    url: &str,
) -> Result<PreloadedImage, String> {
    // Tier 1: small thumbnail transform for fast first paint
    match load_tier(fetcher, &thumbnail_url(url)).await {
        Ok(thumb_bytes) => {
            // Tier 2: upgrade to the full-resolution transform
            if let Ok(bytes) = load_tier(fetcher, &full_url(url)).await {
                return Ok(PreloadedImage {
                    source_url: url.to_string(),
                    tier: PreloadTier::Full,
                    bytes,
                });
            }

            // Tier 3: render endpoint failed us, try the original asset
            if let Ok(bytes) = load_tier(fetcher, url).await {
                println!("📸 Preloaded original (transform unavailable): {}", url);
                return Ok(PreloadedImage {
                    source_url: url.to_string(),
                    tier: PreloadTier::Original,
                    bytes,
                });
            }

            // The thumbnail already loaded, so the image is still renderable
            println!("⚠️  Upgrades failed, keeping thumbnail tier: {}", url);
            Ok(PreloadedImage {
                source_url: url.to_string(),
                tier: PreloadTier::Thumbnail,
                bytes: thumb_bytes,
            })
        }
        Err(thumb_err) => {
            // Thumbnail failed: go straight to the original URL
            match load_tier(fetcher, url).await {
                Ok(bytes) => {
                    println!("📸 Preloaded original (thumbnail failed): {}", url);
                    Ok(PreloadedImage {
                        source_url: url.to_string(),
                        tier: PreloadTier::Original,
                        bytes,
                    })
                }
                Err(orig_err) => Err(format!(
                    "All fallback tiers failed for {}: thumbnail: {}; original: {}",
                    url, thumb_err, orig_err
                )),
            }
        }
    }
}

/// Reads image bytes from a local root directory
///
/// Maps a URL to a file below `root` by dropping the scheme/host and query
/// string. Used by the maintenance binary and as the demo transport.
pub struct FsImageFetcher {
    root: PathBuf,
}

impl FsImageFetcher {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve a URL to its on-disk location below the root
    fn local_path(&self, url: &str) -> PathBuf {
        let without_query = url.split('?').next().unwrap_or(url);

        // Drop scheme and host for absolute URLs
        let path = without_query
            .strip_prefix("https://")
            .or_else(|| without_query.strip_prefix("http://"))
            .and_then(|rest| rest.find('/').map(|i| &rest[i..]))
            .unwrap_or(without_query);

        self.root.join(path.trim_start_matches('/'))
    }
}

impl ImageFetcher for FsImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let path = self.local_path(url);

        tokio::fs::read(&path)
            .await
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))
    }
}
