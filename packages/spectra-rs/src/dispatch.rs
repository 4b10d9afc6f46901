use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use log::warn;

use crate::error::OffloadError;
use crate::math::process_spectrum;
use crate::types::{ProcessRequest, ProcessResult};

/// Execution path a processing pass ran on (or will run on).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputePath {
    Inline,
    Offloaded,
}

/// A strategy for executing a spectrum processing pass. Both implementations
/// must produce identical results for the same request.
#[async_trait]
pub trait SpectrumComputer: Send + Sync {
    async fn process(&self, request: ProcessRequest) -> ProcessResult;

    fn path(&self) -> ComputePath;
}

/// Computes on the caller's task. Right for small traces where the work is
/// cheaper than a handoff.
#[derive(Debug, Default)]
pub struct InlineComputer;

#[async_trait]
impl SpectrumComputer for InlineComputer {
    async fn process(&self, request: ProcessRequest) -> ProcessResult {
        process_spectrum(&request)
    }

    fn path(&self) -> ComputePath {
        ComputePath::Inline
    }
}

/// Hands the pass to a blocking worker thread so large traces never stall
/// the control loop. The worker receives an owned copy of the request and
/// returns a self-contained result.
#[derive(Debug, Default)]
pub struct OffloadedComputer;

impl OffloadedComputer {
    async fn try_process(&self, request: ProcessRequest) -> Result<ProcessResult, OffloadError> {
        tokio::task::spawn_blocking(move || process_spectrum(&request))
            .await
            .map_err(|err| OffloadError::WorkerFailed(err.to_string()))
    }
}

#[async_trait]
impl SpectrumComputer for OffloadedComputer {
    async fn process(&self, request: ProcessRequest) -> ProcessResult {
        let fallback = request.clone();
        match self.try_process(request).await {
            Ok(result) => result,
            Err(err) => {
                warn!("offloaded spectrum pass failed, recomputing inline: {err}");
                process_spectrum(&fallback)
            }
        }
    }

    fn path(&self) -> ComputePath {
        ComputePath::Offloaded
    }
}

/// Configuration for the dispatcher
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Traces with at least this many points are offloaded
    pub offload_threshold: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            offload_threshold: 2048,
        }
    }
}

/// A processing result tagged with the trace generation it was computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedResult {
    pub generation: u64,
    pub result: ProcessResult,
}

/// Routes processing passes inline or to the offloaded path by trace size,
/// and tracks a monotonic trace generation so that a result resolving after
/// a newer trace was installed can be recognized as stale and dropped.
pub struct SpectrumDispatcher {
    inline: InlineComputer,
    offloaded: OffloadedComputer,
    offload_threshold: usize,
    generation: AtomicU64,
}

impl SpectrumDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            inline: InlineComputer,
            offloaded: OffloadedComputer,
            offload_threshold: config.offload_threshold,
            generation: AtomicU64::new(0),
        }
    }

    /// Register a new current trace and return its generation. Results
    /// tagged with an older generation must not be applied.
    pub fn begin_trace(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether a result computed for `generation` still describes the
    /// current trace.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.current_generation()
    }

    /// Path a trace of `point_count` samples will take.
    pub fn path_for(&self, point_count: usize) -> ComputePath {
        if point_count >= self.offload_threshold {
            ComputePath::Offloaded
        } else {
            ComputePath::Inline
        }
    }

    /// Run one processing pass for the trace registered as `generation`.
    pub async fn process(&self, generation: u64, request: ProcessRequest) -> TaggedResult {
        let result = match self.path_for(request.points.len()) {
            ComputePath::Inline => self.inline.process(request).await,
            ComputePath::Offloaded => self.offloaded.process(request).await,
        };
        TaggedResult { generation, result }
    }
}

impl Default for SpectrumDispatcher {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::generate_spectrum_trace;

    #[tokio::test]
    async fn inline_and_offloaded_paths_agree() {
        let points = generate_spectrum_trace(28.0, 2.0, 512, 99);
        let request = ProcessRequest::with_coords(points, 800, 400);

        let inline = InlineComputer.process(request.clone()).await;
        let offloaded = OffloadedComputer.process(request).await;

        assert_eq!(inline, offloaded);
    }

    #[tokio::test]
    async fn dispatcher_routes_by_point_count() {
        let dispatcher = SpectrumDispatcher::new(DispatcherConfig {
            offload_threshold: 100,
        });
        assert_eq!(dispatcher.path_for(99), ComputePath::Inline);
        assert_eq!(dispatcher.path_for(100), ComputePath::Offloaded);
    }

    #[tokio::test]
    async fn superseded_generation_is_stale() {
        let dispatcher = SpectrumDispatcher::default();

        let first = dispatcher.begin_trace();
        let request = ProcessRequest::stats(generate_spectrum_trace(28.0, 2.0, 64, 1));
        let pending = dispatcher.process(first, request);

        // A newer trace arrives before the first result is applied.
        let second = dispatcher.begin_trace();

        let resolved = pending.await;
        assert!(!dispatcher.is_current(resolved.generation));
        assert!(dispatcher.is_current(second));
    }

    #[tokio::test]
    async fn results_are_tagged_with_their_generation() {
        let dispatcher = SpectrumDispatcher::default();
        let generation = dispatcher.begin_trace();
        let request = ProcessRequest::stats(generate_spectrum_trace(28.0, 2.0, 64, 5));

        let tagged = dispatcher.process(generation, request).await;
        assert_eq!(tagged.generation, generation);
        assert!(tagged.result.noise_floor.is_some());
    }
}
