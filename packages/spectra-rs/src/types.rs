use serde::{Deserialize, Serialize};

/// One sample of a spectrum trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectrumPoint {
    /// Hz
    pub frequency: f64,
    /// dBm
    pub amplitude: f64,
}

impl SpectrumPoint {
    pub fn new(frequency: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            amplitude,
        }
    }
}

/// Min/max envelope of a trace, used to scale screen-space projection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub freq_min: f64,
    pub freq_max: f64,
    pub amp_min: f64,
    pub amp_max: f64,
}

impl Bounds {
    /// Fallback bounds for an empty or all-non-finite trace
    pub fn sentinel() -> Self {
        Self {
            freq_min: 0.0,
            freq_max: 1.0,
            amp_min: -200.0,
            amp_max: 0.0,
        }
    }
}

/// Work order for a spectrum processing pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub points: Vec<SpectrumPoint>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub compute_coords: bool,
}

impl ProcessRequest {
    /// Statistics only, no coordinate projection
    pub fn stats(points: Vec<SpectrumPoint>) -> Self {
        Self {
            points,
            width: None,
            height: None,
            compute_coords: false,
        }
    }

    /// Statistics plus interleaved x,y screen coordinates
    pub fn with_coords(points: Vec<SpectrumPoint>, width: u32, height: u32) -> Self {
        Self {
            points,
            width: Some(width),
            height: Some(height),
            compute_coords: true,
        }
    }
}

/// Self-contained result of a processing pass; holds no references into the
/// submitting state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub bounds: Bounds,
    pub noise_floor: Option<f64>,
    /// Interleaved x,y coordinates for direct canvas rendering
    pub coords: Option<Vec<f32>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}
