//! Async execution of stack integrations with progress callbacks.

use super::coordinates::CoordinateIndex;
use super::run::{run_stack, StackError, StackOutput};
use crate::data::Frame;
use crate::integrate::HandleResolver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime as TokioRuntime;

/// Configuration for the async runner.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Number of worker threads.
    pub worker_count: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
        }
    }
}

/// Runs stack integrations off-thread, driving callbacks as frames finish.
///
/// Long energy-series scans take minutes; the runner keeps the caller's
/// thread free and reports progress per consumed frame. Cancellation stops
/// the stream at a frame boundary and still delivers the partial output,
/// with `report.cancelled` set.
pub struct StackRunner {
    tokio_runtime: TokioRuntime,
    cancelled: Arc<AtomicBool>,
}

impl StackRunner {
    /// Create a runner with its own multi-thread tokio runtime.
    pub fn new(config: RunnerConfig) -> Self {
        let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_count)
            .enable_all()
            .build()
            .expect("Failed to create Tokio runtime");

        Self {
            tokio_runtime,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Integrate a stack asynchronously.
    ///
    /// `on_progress(consumed, total)` fires after each frame;
    /// `on_complete` receives the final result (or error) exactly once.
    pub fn run_async<P, F>(
        &self,
        frames: Vec<Frame>,
        index: CoordinateIndex,
        mut resolver: HandleResolver,
        on_progress: P,
        on_complete: F,
    ) where
        P: Fn(usize, usize) + Send + Sync + 'static,
        F: FnOnce(Result<StackOutput, StackError>) + Send + 'static,
    {
        self.cancelled.store(false, Ordering::SeqCst);
        let cancelled = self.cancelled.clone();
        let total = frames.len();

        self.tokio_runtime.spawn(async move {
            let result = run_stack(
                frames,
                &index,
                &mut resolver,
                Some(cancelled.as_ref()),
                |done| on_progress(done, total),
            );
            on_complete(result);
        });
    }

    /// Integrate a stack on the runner's runtime, blocking until done.
    pub fn run_blocking(
        &self,
        frames: Vec<Frame>,
        index: &CoordinateIndex,
        resolver: &mut HandleResolver,
    ) -> Result<StackOutput, StackError> {
        self.cancelled.store(false, Ordering::SeqCst);
        run_stack(frames, index, resolver, Some(self.cancelled.as_ref()), |_| {})
    }

    /// Request cancellation of the in-flight run.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FrameMetadata, KEY_ENERGY};
    use crate::geometry::{CalibrationFormat, CalibrationInput, Mask};
    use crate::integrate::{IntegrationKind, IntegratorCache, IntegratorConfig};
    use ndarray::Array2;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    fn resolver() -> HandleResolver {
        let input = CalibrationInput {
            distance: Some(131.06),
            beam_center_x: Some(8.0),
            beam_center_y: Some(8.0),
            pixel_size: Some(0.432),
            tilt: Some(0.0),
        };
        HandleResolver::Fixed(
            IntegratorCache::new(
                input,
                CalibrationFormat::Nika,
                Mask::all_valid(16, 16),
                (16, 16),
                IntegratorConfig {
                    n_q_bins: 10,
                    n_chi_bins: 4,
                    kind: IntegrationKind::Radial,
                },
            )
            .unwrap(),
        )
    }

    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| {
                Frame::new(
                    Array2::from_elem((16, 16), 1.0),
                    FrameMetadata::new().with(KEY_ENERGY, 270.0 + i as f64),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_run_async_completes_with_progress() {
        let runner = StackRunner::new(RunnerConfig { worker_count: 2 });
        let (tx, rx) = mpsc::channel();
        let progress_calls = Arc::new(AtomicUsize::new(0));
        let calls = progress_calls.clone();

        runner.run_async(
            frames(5),
            CoordinateIndex::new([KEY_ENERGY]),
            resolver(),
            move |_done, total| {
                assert_eq!(total, 5);
                calls.fetch_add(1, Ordering::SeqCst);
            },
            move |result| {
                tx.send(result).unwrap();
            },
        );

        let output = rx
            .recv_timeout(std::time::Duration::from_secs(30))
            .unwrap()
            .unwrap();
        assert_eq!(output.container.len(), 5);
        assert!(!output.report.cancelled);
        assert_eq!(progress_calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_run_blocking_matches_stack_size() {
        let runner = StackRunner::new(RunnerConfig { worker_count: 1 });
        let output = runner
            .run_blocking(frames(3), &CoordinateIndex::new([KEY_ENERGY]), &mut resolver())
            .unwrap();

        assert_eq!(output.container.len(), 3);
        assert_eq!(output.report.integrated, 3);
        assert!(output.report.skipped.is_empty());
        assert!(!output.report.cancelled);
    }

    #[test]
    fn test_cancelled_run_yields_valid_partial() {
        // Flag already raised: the loop stops at the first frame boundary
        // and the partial output is still well-formed.
        let result = run_stack(
            frames(4),
            &CoordinateIndex::new([KEY_ENERGY]),
            &mut resolver(),
            Some(&AtomicBool::new(true)),
            |_| {},
        )
        .unwrap();

        assert!(result.report.cancelled);
        assert!(result.container.is_empty());
        assert_eq!(result.report.integrated, 0);
    }
}
