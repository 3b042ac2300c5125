//! Progress-callback trait for per-page job events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the job walks the document. Events come from the blocking
//! pdfium stage, so implementations must be `Send + Sync`.
//!
//! # Example
//!
//! ```rust
//! use pagecast::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     items: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, items: usize) {
//!         self.items.fetch_add(items, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} items)", page_num, total_pages, items);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { items: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by a job as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first page is read.
    ///
    /// # Arguments
    /// * `total_pages` — number of pages that will be processed
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page is traversed or rasterised.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page is done.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — pages in this job
    /// * `items`       — fragments plus images the page produced (1 for a
    ///   cropped page image)
    fn on_page_complete(&self, page_num: usize, total_pages: usize, items: usize) {
        let _ = (page_num, total_pages, items);
    }

    /// Called when something on a page failed.
    ///
    /// Non-fatal item errors are reported here too; the page still
    /// completes afterwards.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after all pages have been attempted.
    ///
    /// # Arguments
    /// * `total_pages`   — pages in this job
    /// * `success_count` — pages that completed without any item error
    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        items: AtomicUsize,
        errors: AtomicUsize,
        started_total: AtomicUsize,
        completed_total: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_conversion_start(&self, total_pages: usize) {
            self.started_total.store(total_pages, Ordering::SeqCst);
        }

        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, items: usize) {
            self.items.fetch_add(items, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_complete(&self, _total_pages: usize, success_count: usize) {
            self.completed_total.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 42);
        cb.on_page_error(2, 5, "image 1 unreadable");
        cb.on_conversion_complete(5, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_conversion_start(2);
        tracker.on_page_start(1, 2);
        tracker.on_page_complete(1, 2, 7);
        tracker.on_page_start(2, 2);
        tracker.on_page_error(2, 2, "image 3 could not be saved");
        tracker.on_page_complete(2, 2, 4);
        tracker.on_conversion_complete(2, 1);

        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.items.load(Ordering::SeqCst), 11);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed_total.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn config_holds_shared_callback() {
        let tracker = Arc::new(TrackingCallback::default());
        let config = crate::config::ConversionConfig::builder()
            .progress_callback(tracker.clone())
            .build()
            .unwrap();

        if let Some(cb) = &config.progress_callback {
            cb.on_page_complete(1, 1, 5);
        }
        assert_eq!(tracker.items.load(Ordering::SeqCst), 5);
        assert!(format!("{config:?}").contains("<callback>"));
    }
}
