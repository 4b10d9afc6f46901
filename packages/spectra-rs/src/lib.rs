pub mod collections;
pub mod dispatch;
pub mod error;
pub mod math;
pub mod synth;
pub mod types;

pub use collections::{append_many_with_limit, append_with_limit};
pub use dispatch::{
    ComputePath, DispatcherConfig, InlineComputer, OffloadedComputer, SpectrumComputer,
    SpectrumDispatcher, TaggedResult,
};
pub use error::{OffloadError, Result};
pub use math::{
    build_coords, compute_bounds, compute_noise_floor, find_peaks, nearest_point,
    process_spectrum,
};
pub use synth::{generate_spectrum_trace, SeededLcg, DEFAULT_TRACE_POINTS};
pub use types::{Bounds, ProcessRequest, ProcessResult, SpectrumPoint};
