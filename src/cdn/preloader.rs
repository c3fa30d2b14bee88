/// Batched gallery preloading
///
/// A small priority prefix (hero / above-the-fold images) loads immediately
/// with tight concurrency; the rest loads in fixed-size batches separated by
/// a short delay so decode work never starves rendering. One image failing
/// never aborts the run: it is counted as processed and the batch moves on.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use super::preload::{preload_image, ImageFetcher, PreloadedImage};

/// Images loaded immediately, ahead of the batched remainder
const DEFAULT_PRIORITY_COUNT: usize = 3;
/// Concurrency window for the priority prefix
const DEFAULT_PRIORITY_CONCURRENCY: usize = 2;
/// Concurrency window for regular batches
const DEFAULT_BATCH_SIZE: usize = 4;
/// Pause between regular batches
const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);

/// Progress snapshot delivered after every completed load
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreloadProgress {
    /// Images finished (loaded or failed)
    pub processed: usize,
    /// Images that actually loaded
    pub loaded: usize,
    pub total: usize,
    /// processed / total, 0..=100, monotonically non-decreasing
    pub percent: f32,
}

/// Final tally of one preload run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadSummary {
    pub total: usize,
    pub loaded: usize,
    pub failed: usize,
    /// True when cancellation suppressed some batches
    pub cancelled: bool,
}

/// Cooperative cancellation for a running preloader
///
/// Cancelling stops future batches from being scheduled; loads already in
/// flight run to completion.
#[derive(Debug, Clone)]
pub struct PreloadHandle {
    flag: Arc<AtomicBool>,
}

impl PreloadHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Priority-aware batch preloader over any [`ImageFetcher`]
pub struct SmartImagePreloader {
    priority_count: usize,
    priority_concurrency: usize,
    batch_size: usize,
    batch_delay: Duration,
    cancelled: Arc<AtomicBool>,
    /// When set, winning bytes are written here keyed by a URL hash
    cache_dir: Option<PathBuf>,
}

impl Default for SmartImagePreloader {
    fn default() -> Self {
        Self::new()
    }
}

impl SmartImagePreloader {
    pub fn new() -> Self {
        Self {
            priority_count: DEFAULT_PRIORITY_COUNT,
            priority_concurrency: DEFAULT_PRIORITY_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            cancelled: Arc::new(AtomicBool::new(false)),
            cache_dir: None,
        }
    }

    /// Enable disk caching of preloaded assets under `dir`
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    /// Shrink the inter-batch pause (tests)
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Handle for cancelling this preloader from elsewhere
    pub fn handle(&self) -> PreloadHandle {
        PreloadHandle {
            flag: Arc::clone(&self.cancelled),
        }
    }

    /// Preload every URL, priority prefix first, then delayed batches
    ///
    /// `on_progress` fires after each completed load with a monotonically
    /// non-decreasing percentage. An empty list completes immediately at
    /// 100%. Individual failures are logged, counted as processed, and do
    /// not stop the run.
    pub async fn preload_all<F>(
        &self,
        urls: &[String],
        fetcher: Arc<F>,
        mut on_progress: impl FnMut(PreloadProgress),
    ) -> PreloadSummary
    where
        F: ImageFetcher + Send + Sync + 'static,
    {
        let total = urls.len();
        if total == 0 {
            on_progress(PreloadProgress {
                processed: 0,
                loaded: 0,
                total: 0,
                percent: 100.0,
            });
            return PreloadSummary {
                total: 0,
                loaded: 0,
                failed: 0,
                cancelled: false,
            };
        }

        let mut processed = 0usize;
        let mut loaded = 0usize;
        let mut cancelled = false;

        let split = self.priority_count.min(total);
        let (priority, regular) = urls.split_at(split);

        println!(
            "🖼️  Preloading {} images ({} priority, {} batched)",
            total,
            priority.len(),
            regular.len()
        );

        // Priority prefix: no inter-batch delay, tighter concurrency
        for chunk in priority.chunks(self.priority_concurrency.max(1)) {
            if self.cancelled.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }

            self.run_batch(chunk, &fetcher, total, &mut processed, &mut loaded, &mut on_progress)
                .await;
        }

        // Regular remainder: fixed-size batches with a breather in between
        if !cancelled {
            for chunk in regular.chunks(self.batch_size.max(1)) {
                if self.cancelled.load(Ordering::Relaxed) {
                    cancelled = true;
                    break;
                }

                tokio::time::sleep(self.batch_delay).await;
                self.run_batch(chunk, &fetcher, total, &mut processed, &mut loaded, &mut on_progress)
                    .await;
            }
        }

        if cancelled {
            println!("🛑 Preload cancelled after {} of {} images", processed, total);
        } else {
            println!("✅ Preload complete: {} loaded, {} failed", loaded, total - loaded);
        }

        PreloadSummary {
            total,
            loaded,
            failed: processed - loaded,
            cancelled,
        }
    }

    /// Load one concurrency window and fold results into the running tally
    async fn run_batch<F>(
        &self,
        chunk: &[String],
        fetcher: &Arc<F>,
        total: usize,
        processed: &mut usize,
        loaded: &mut usize,
        on_progress: &mut impl FnMut(PreloadProgress),
    ) where
        F: ImageFetcher + Send + Sync + 'static,
    {
        let mut batch = JoinSet::new();
        for url in chunk {
            let fetcher = Arc::clone(fetcher);
            let url = url.clone();
            batch.spawn(async move { preload_image(&*fetcher, &url).await });
        }

        while let Some(joined) = batch.join_next().await {
            *processed += 1;
            match joined {
                Ok(Ok(image)) => {
                    *loaded += 1;
                    self.cache_to_disk(&image);
                }
                Ok(Err(e)) => {
                    eprintln!("⚠️  {}", e);
                }
                Err(e) => {
                    eprintln!("⚠️  Preload task panicked: {}", e);
                }
            }

            on_progress(PreloadProgress {
                processed: *processed,
                loaded: *loaded,
                total,
                percent: (*processed as f32 / total as f32) * 100.0,
            });
        }
    }

    /// Best-effort disk cache write; failures only warn
    fn cache_to_disk(&self, image: &PreloadedImage) {
        let Some(dir) = &self.cache_dir else {
            return;
        };

        let path = dir.join(format!("{}.bin", url_cache_key(&image.source_url)));
        if let Err(e) = fs::write(&path, &image.bytes) {
            eprintln!("⚠️  Failed to cache {}: {}", path.display(), e);
        }
    }
}

/// Stable cache filename stem for a source URL
fn url_cache_key(url: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    hasher.finish()
}

/// Get the preload cache directory
/// Returns ~/.cache/print-shop/preloaded on Linux
pub fn get_preload_cache_dir() -> PathBuf {
    let mut path = dirs_next::cache_dir()
        .or_else(|| dirs_next::home_dir())
        .expect("Could not determine cache directory");

    path.push("print-shop");
    path.push("preloaded");

    // Ensure the directory exists
    fs::create_dir_all(&path).expect("Failed to create preload cache directory");

    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdn::preload::tests::{tiny_png, FakeFetcher};
    use crate::cdn::transform::{full_url, thumbnail_url};
    use std::sync::Mutex;

    fn gallery_urls(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| {
                format!(
                    "https://cdn.example.com/storage/v1/object/public/gallery/img{}.jpg",
                    i
                )
            })
            .collect()
    }

    /// Fetcher where every tier of every URL succeeds, except `broken`
    fn fetcher_with_one_broken(urls: &[String], broken: Option<&str>) -> FakeFetcher {
        let mut responses = Vec::new();
        for url in urls {
            if broken == Some(url.as_str()) {
                continue;
            }
            responses.push((thumbnail_url(url), tiny_png()));
            responses.push((full_url(url), tiny_png()));
            responses.push((url.clone(), tiny_png()));
        }
        FakeFetcher::new(responses)
    }

    fn quick_preloader() -> SmartImagePreloader {
        SmartImagePreloader::new().with_batch_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_empty_list_completes_at_100() {
        let fetcher = Arc::new(fetcher_with_one_broken(&[], None));
        let reports = Mutex::new(Vec::new());

        let summary = quick_preloader()
            .preload_all(&[], fetcher, |p| reports.lock().unwrap().push(p))
            .await;

        assert_eq!(summary.total, 0);
        assert!(!summary.cancelled);
        let reports = reports.into_inner().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].percent, 100.0);
    }

    #[tokio::test]
    async fn test_one_total_failure_does_not_abort_the_batch() {
        let urls = gallery_urls(5);
        // Third image fails every tier
        let fetcher = Arc::new(fetcher_with_one_broken(&urls, Some(urls[2].as_str())));
        let reports = Mutex::new(Vec::new());

        let summary = quick_preloader()
            .preload_all(&urls, fetcher, |p| reports.lock().unwrap().push(p))
            .await;

        assert_eq!(summary.total, 5);
        assert_eq!(summary.loaded, 4);
        assert_eq!(summary.failed, 1);
        assert!(!summary.cancelled);

        let reports = reports.into_inner().unwrap();
        assert_eq!(reports.last().unwrap().percent, 100.0);
    }

    #[tokio::test]
    async fn test_progress_is_monotone() {
        let urls = gallery_urls(9);
        let fetcher = Arc::new(fetcher_with_one_broken(&urls, None));
        let reports = Mutex::new(Vec::new());

        quick_preloader()
            .preload_all(&urls, fetcher, |p| reports.lock().unwrap().push(p))
            .await;

        let reports = reports.into_inner().unwrap();
        assert_eq!(reports.len(), 9);
        for pair in reports.windows(2) {
            assert!(pair[1].percent >= pair[0].percent);
        }
    }

    #[tokio::test]
    async fn test_cancel_before_start_loads_nothing() {
        let urls = gallery_urls(20);
        let fetcher = Arc::new(fetcher_with_one_broken(&urls, None));

        let preloader = quick_preloader();
        let handle = preloader.handle();
        handle.cancel();

        let summary = preloader.preload_all(&urls, fetcher, |_| {}).await;

        assert!(summary.cancelled);
        // Even the priority prefix is suppressed when cancelled up front
        assert_eq!(summary.loaded, 0);
        assert_eq!(summary.failed, 0);
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_during_priority_phase_suppresses_later_chunks() {
        let urls = gallery_urls(20);
        let fetcher = Arc::new(fetcher_with_one_broken(&urls, None));

        let preloader = quick_preloader();
        let handle = preloader.handle();

        // Cancel from the first progress report, mid priority prefix
        let summary = preloader
            .preload_all(&urls, fetcher, |_| handle.cancel())
            .await;

        assert!(summary.cancelled);
        // Only the first priority chunk ran; in-flight loads completed
        assert_eq!(summary.loaded, DEFAULT_PRIORITY_CONCURRENCY);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_caches_winning_bytes_to_disk() {
        let dir = crate::cdn::preload::tests::unique_temp_dir("preload-cache");
        std::fs::create_dir_all(&dir).unwrap();

        let urls = gallery_urls(1);
        let fetcher = Arc::new(fetcher_with_one_broken(&urls, None));

        quick_preloader()
            .with_cache_dir(dir.clone())
            .preload_all(&urls, fetcher, |_| {})
            .await;

        let cached = dir.join(format!("{}.bin", url_cache_key(&urls[0])));
        assert_eq!(std::fs::read(cached).unwrap(), tiny_png());
    }
}
