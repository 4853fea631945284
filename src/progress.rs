//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the run moves from stage to stage. The CLI uses this to drive a
//! terminal spinner; library users can forward events anywhere they like.
//!
//! # Example
//!
//! ```rust
//! use paper2post::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     finished: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, stage: Stage) {
//!         let done = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{stage} done ({done} stages so far)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { finished: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::outcome::Stage;
use std::sync::Arc;

/// Called by the pipeline driver as it works through each stage.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Stages run one at a time, but the trait is
/// `Send + Sync` so a callback can be shared with other tasks.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before anything is uploaded or generated.
    fn on_run_start(&self, paper_name: &str) {
        let _ = paper_name;
    }

    /// Called just before a stage starts.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage produced its value.
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage fell back to a substitute value.
    fn on_stage_degraded(&self, stage: Stage, reason: &str) {
        let _ = (stage, reason);
    }

    /// Called once after the post has been written.
    fn on_run_complete(&self, post_path: &str) {
        let _ = post_path;
    }

    /// Called once when the run stops on a fatal error, after any cleanup.
    /// Not followed by [`on_run_complete`](Self::on_run_complete).
    fn on_run_failed(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::SummaryTier;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCallback {
        events: Mutex<Vec<String>>,
    }

    impl PipelineProgressCallback for RecordingCallback {
        fn on_stage_start(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start {stage}"));
        }

        fn on_stage_degraded(&self, stage: Stage, reason: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("degraded {stage}: {reason}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start("paper");
        cb.on_stage_start(Stage::Title);
        cb.on_stage_complete(Stage::Title);
        cb.on_stage_degraded(Stage::Review, "model unavailable");
        cb.on_run_complete("_posts/2024-01-01-paper.markdown");
        cb.on_run_failed("high school summary failed");
    }

    #[test]
    fn overridden_methods_receive_events() {
        let cb = RecordingCallback::default();
        cb.on_stage_start(Stage::Summary(SummaryTier::University));
        cb.on_stage_complete(Stage::Summary(SummaryTier::University));
        cb.on_stage_degraded(Stage::Authors, "no authors found");

        let events = cb.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "start university summary".to_string(),
                "degraded author extraction: no authors found".to_string(),
            ]
        );
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(Stage::Cleanup);
    }
}
