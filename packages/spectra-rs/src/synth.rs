use crate::types::SpectrumPoint;

/// Trace length used by the acquisition simulator.
pub const DEFAULT_TRACE_POINTS: usize = 256;

const BASELINE_DBM: f64 = -120.0;

/// Numerical Recipes LCG. The exact multiplier/increment/modulus are part of
/// the contract: a fixed seed must reproduce byte-identical traces across
/// implementations.
#[derive(Debug, Clone)]
pub struct SeededLcg {
    state: u32,
}

impl SeededLcg {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next draw in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        f64::from(self.state) / 4_294_967_296.0
    }
}

/// Deterministic synthetic trace: a noisy baseline at -120 dBm plus a main
/// Gaussian signal at mid-span and two spurious tones at 30% and 70% of the
/// index range. Frequencies are evenly spaced across the span and converted
/// to Hz.
pub fn generate_spectrum_trace(
    center_freq_ghz: f64,
    span_ghz: f64,
    num_points: usize,
    seed: u32,
) -> Vec<SpectrumPoint> {
    if num_points == 0 {
        return Vec::new();
    }

    let mut rng = SeededLcg::new(seed);
    let start_freq = center_freq_ghz - span_ghz / 2.0;
    let step = if num_points > 1 {
        span_ghz / (num_points - 1) as f64
    } else {
        0.0
    };
    let n = num_points as f64;

    (0..num_points)
        .map(|i| {
            let idx = i as f64;
            let frequency = (start_freq + step * idx) * 1e9;

            let noise = BASELINE_DBM + rng.next_f64() * 4.0 - 2.0;
            let signal_peak = -20.0 * gaussian(idx - n / 2.0, n / 10.0) + 5.0;
            let spur1 = -45.0 * gaussian(idx - n * 0.3, n / 25.0);
            let spur2 = -52.0 * gaussian(idx - n * 0.7, n / 28.0);

            SpectrumPoint {
                frequency,
                amplitude: noise + signal_peak + spur1 + spur2,
            }
        })
        .collect()
}

fn gaussian(offset: f64, width: f64) -> f64 {
    (-(offset / width).powi(2)).exp()
}
