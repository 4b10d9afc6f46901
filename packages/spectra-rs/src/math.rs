use rayon::prelude::*;

use crate::types::{Bounds, ProcessRequest, ProcessResult, SpectrumPoint};

/// Traces at or above this size sort their amplitude copy in parallel.
/// The sorted output is identical either way.
const PAR_SORT_THRESHOLD: usize = 16_384;

/// Single-pass min/max fold over frequency and amplitude.
///
/// Non-finite samples never win a comparison; if either axis ends up without
/// a finite extreme the sentinel range for that axis is substituted, so the
/// output never contains NaN or infinities.
pub fn compute_bounds(points: &[SpectrumPoint]) -> Bounds {
    if points.is_empty() {
        return Bounds::sentinel();
    }

    let mut freq_min = f64::INFINITY;
    let mut freq_max = f64::NEG_INFINITY;
    let mut amp_min = f64::INFINITY;
    let mut amp_max = f64::NEG_INFINITY;

    for p in points {
        if p.frequency < freq_min {
            freq_min = p.frequency;
        }
        if p.frequency > freq_max {
            freq_max = p.frequency;
        }
        if p.amplitude < amp_min {
            amp_min = p.amplitude;
        }
        if p.amplitude > amp_max {
            amp_max = p.amplitude;
        }
    }

    if !freq_min.is_finite() || !freq_max.is_finite() {
        freq_min = 0.0;
        freq_max = 1.0;
    }
    if !amp_min.is_finite() || !amp_max.is_finite() {
        amp_min = -200.0;
        amp_max = 0.0;
    }

    Bounds {
        freq_min,
        freq_max,
        amp_min,
        amp_max,
    }
}

/// Displayed-average-noise-level estimate: mean of the lowest 20% of samples
/// (at least 5), rounded to one decimal place. `None` for an empty trace.
pub fn compute_noise_floor(points: &[SpectrumPoint]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }

    let mut amps: Vec<f64> = points.iter().map(|p| p.amplitude).collect();
    if amps.len() >= PAR_SORT_THRESHOLD {
        amps.par_sort_unstable_by(f64::total_cmp);
    } else {
        amps.sort_unstable_by(f64::total_cmp);
    }

    let sample_size = 5usize.max(amps.len() / 5).min(amps.len());
    let sum: f64 = amps[..sample_size].iter().sum();
    Some(round1(sum / sample_size as f64))
}

/// Project a trace into screen space as interleaved x,y pairs.
///
/// Origin is top-left; y is inverted so higher amplitude draws higher on
/// screen. A zero-width span on either axis falls back to 1 to avoid
/// dividing by zero on a degenerate single-value trace.
pub fn build_coords(
    points: &[SpectrumPoint],
    width: u32,
    height: u32,
    bounds: &Bounds,
) -> Vec<f32> {
    let freq_span = match bounds.freq_max - bounds.freq_min {
        span if span == 0.0 => 1.0,
        span => span,
    };
    let amp_span = match bounds.amp_max - bounds.amp_min {
        span if span == 0.0 => 1.0,
        span => span,
    };

    let w = f64::from(width);
    let h = f64::from(height);

    let mut coords = Vec::with_capacity(points.len() * 2);
    for p in points {
        let x = (p.frequency - bounds.freq_min) / freq_span * w;
        let y = h - (p.amplitude - bounds.amp_min) / amp_span * h;
        coords.push(x as f32);
        coords.push(y as f32);
    }
    coords
}

/// Top `max_peaks` samples by amplitude, descending. The sort is stable so
/// equal amplitudes keep their original trace order.
pub fn find_peaks(points: &[SpectrumPoint], max_peaks: usize) -> Vec<SpectrumPoint> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| b.amplitude.total_cmp(&a.amplitude));
    sorted.truncate(max_peaks);
    sorted
}

/// Sample with the smallest `|frequency - frequency_hz|`; the first such
/// point wins ties. `None` for an empty trace.
pub fn nearest_point(points: &[SpectrumPoint], frequency_hz: f64) -> Option<SpectrumPoint> {
    let mut nearest = *points.first()?;
    let mut best = (nearest.frequency - frequency_hz).abs();

    for p in &points[1..] {
        let distance = (p.frequency - frequency_hz).abs();
        if distance < best {
            best = distance;
            nearest = *p;
        }
    }

    Some(nearest)
}

/// Combined pass: bounds, noise floor, and (when requested with a viewport)
/// screen coordinates.
pub fn process_spectrum(request: &ProcessRequest) -> ProcessResult {
    let bounds = compute_bounds(&request.points);
    let noise_floor = compute_noise_floor(&request.points);

    match (request.compute_coords, request.width, request.height) {
        (true, Some(width), Some(height)) => ProcessResult {
            bounds,
            noise_floor,
            coords: Some(build_coords(&request.points, width, height, &bounds)),
            width: Some(width),
            height: Some(height),
        },
        _ => ProcessResult {
            bounds,
            noise_floor,
            coords: None,
            width: None,
            height: None,
        },
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(frequency: f64, amplitude: f64) -> SpectrumPoint {
        SpectrumPoint::new(frequency, amplitude)
    }

    #[test]
    fn bounds_of_empty_trace_are_sentinel() {
        let bounds = compute_bounds(&[]);
        assert_eq!(bounds, Bounds::sentinel());
        assert_eq!(bounds.freq_min, 0.0);
        assert_eq!(bounds.freq_max, 1.0);
        assert_eq!(bounds.amp_min, -200.0);
        assert_eq!(bounds.amp_max, 0.0);
    }

    #[test]
    fn bounds_match_input_extremes() {
        let trace = [pt(1e9, -80.0), pt(2e9, -40.0), pt(3e9, -60.0)];
        let bounds = compute_bounds(&trace);
        assert_eq!(bounds.freq_min, 1e9);
        assert_eq!(bounds.freq_max, 3e9);
        assert_eq!(bounds.amp_min, -80.0);
        assert_eq!(bounds.amp_max, -40.0);
    }

    #[test]
    fn bounds_fall_back_per_axis_on_non_finite_input() {
        let trace = [pt(f64::NAN, -80.0), pt(f64::NAN, -40.0)];
        let bounds = compute_bounds(&trace);
        assert_eq!(bounds.freq_min, 0.0);
        assert_eq!(bounds.freq_max, 1.0);
        assert_eq!(bounds.amp_min, -80.0);
        assert_eq!(bounds.amp_max, -40.0);
    }

    #[test]
    fn noise_floor_of_empty_trace_is_none() {
        assert_eq!(compute_noise_floor(&[]), None);
    }

    #[test]
    fn noise_floor_uses_minimum_sample_window() {
        let amplitudes = [
            -100.0, -102.0, -101.0, -99.0, -100.0, -101.0, -102.0, -99.0, -100.0, -50.0,
        ];
        let trace: Vec<SpectrumPoint> = amplitudes
            .iter()
            .enumerate()
            .map(|(i, &a)| pt(i as f64 * 1e6, a))
            .collect();

        // 10 samples -> window of max(5, 2) = 5 lowest: the -50 outlier is
        // excluded entirely.
        let floor = compute_noise_floor(&trace).unwrap();
        assert!(floor > -110.0 && floor < -95.0, "floor = {floor}");
        assert_eq!(floor, -101.2);
    }

    #[test]
    fn noise_floor_rounds_to_one_decimal() {
        let trace = [
            pt(1.0, -100.07),
            pt(2.0, -100.07),
            pt(3.0, -100.07),
            pt(4.0, -100.07),
            pt(5.0, -100.07),
        ];
        assert_eq!(compute_noise_floor(&trace), Some(-100.1));
    }

    #[test]
    fn coords_map_endpoints_to_viewport_edges() {
        let trace = [pt(1e9, -100.0), pt(2e9, -50.0)];
        let bounds = compute_bounds(&trace);
        let coords = build_coords(&trace, 800, 400, &bounds);
        assert_eq!(coords.len(), 4);
        // Lowest frequency, lowest amplitude -> left edge, bottom edge
        assert_eq!(coords[0], 0.0);
        assert_eq!(coords[1], 400.0);
        // Highest frequency, highest amplitude -> right edge, top edge
        assert_eq!(coords[2], 800.0);
        assert_eq!(coords[3], 0.0);
    }

    #[test]
    fn coords_survive_degenerate_single_value_trace() {
        let trace = [pt(1e9, -60.0), pt(1e9, -60.0)];
        let bounds = compute_bounds(&trace);
        let coords = build_coords(&trace, 100, 100, &bounds);
        for v in coords {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn find_peaks_returns_top_amplitudes_descending() {
        let trace = [pt(1.0, -80.0), pt(2.0, -40.0), pt(3.0, -60.0)];
        let peaks = find_peaks(&trace, 3);
        assert_eq!(peaks[0].amplitude, -40.0);
        assert_eq!(peaks[1].amplitude, -60.0);
        assert_eq!(peaks[2].amplitude, -80.0);
    }

    #[test]
    fn find_peaks_breaks_ties_by_trace_order() {
        let trace = [pt(1.0, -50.0), pt(2.0, -50.0), pt(3.0, -50.0)];
        let peaks = find_peaks(&trace, 2);
        assert_eq!(peaks[0].frequency, 1.0);
        assert_eq!(peaks[1].frequency, 2.0);
    }

    #[test]
    fn nearest_point_minimizes_frequency_distance() {
        let trace = [pt(1000.0, -80.0), pt(2000.0, -50.0), pt(3000.0, -60.0)];
        let nearest = nearest_point(&trace, 2100.0).unwrap();
        assert_eq!(nearest.frequency, 2000.0);
    }

    #[test]
    fn nearest_point_first_wins_ties() {
        let trace = [pt(1000.0, -80.0), pt(3000.0, -50.0)];
        let nearest = nearest_point(&trace, 2000.0).unwrap();
        assert_eq!(nearest.frequency, 1000.0);
    }

    #[test]
    fn nearest_point_of_empty_trace_is_none() {
        assert!(nearest_point(&[], 1e9).is_none());
    }

    #[test]
    fn process_spectrum_skips_coords_without_viewport() {
        let trace = vec![pt(1e9, -80.0), pt(2e9, -40.0)];
        let result = process_spectrum(&ProcessRequest::stats(trace));
        assert!(result.coords.is_none());
        assert!(result.width.is_none());
        assert_eq!(result.bounds.amp_max, -40.0);
    }

    #[test]
    fn process_spectrum_includes_coords_with_viewport() {
        let trace = vec![pt(1e9, -80.0), pt(2e9, -40.0)];
        let result = process_spectrum(&ProcessRequest::with_coords(trace, 640, 480));
        let coords = result.coords.unwrap();
        assert_eq!(coords.len(), 4);
        assert_eq!(result.width, Some(640));
        assert_eq!(result.height, Some(480));
    }
}
