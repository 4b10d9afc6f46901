use spectra_rs::{find_peaks, SpectrumPoint};

use crate::types::Marker;

/// Auto peak search: the three strongest samples, labeled `M1..M3` in
/// descending amplitude order. Replaces any existing marker set.
pub fn find_markers(spectrum: &[SpectrumPoint]) -> Vec<Marker> {
    find_peaks(spectrum, 3)
        .into_iter()
        .enumerate()
        .map(|(index, point)| Marker {
            label: format!("M{}", index + 1),
            frequency: point.frequency,
            amplitude: point.amplitude,
        })
        .collect()
}

/// Next manual marker label: one past the highest existing numeric suffix,
/// starting at `M1`. Retired suffixes below the maximum are never reused.
pub fn next_marker_label(markers: &[Marker]) -> String {
    let max = markers
        .iter()
        .filter_map(|m| m.label.strip_prefix('M'))
        .filter_map(|suffix| suffix.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("M{}", max + 1)
}
