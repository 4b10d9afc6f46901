use chrono::Utc;
use rand::Rng;

use crate::logs::create_id;
use crate::types::{Measurement, MeasurementLogEntry, MeasurementStatus};

/// Nominal baseline and walk parameters for one tracked measurement.
#[derive(Debug, Clone, Copy)]
pub struct MeasurementSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub base: f64,
    pub variance: f64,
    pub decimals: usize,
    pub status: MeasurementStatus,
    pub description: &'static str,
}

pub const MEASUREMENT_SPECS: &[MeasurementSpec] = &[
    MeasurementSpec {
        id: "evm",
        label: "Residual EVM",
        unit: "%",
        base: 0.58,
        variance: 0.08,
        decimals: 2,
        status: MeasurementStatus::Good,
        description: "Analyzer residual EVM for FR2 wideband waveforms.",
    },
    MeasurementSpec {
        id: "danl",
        label: "Displayed Avg Noise Level",
        unit: "dBm/Hz",
        base: -174.0,
        variance: 1.2,
        decimals: 1,
        status: MeasurementStatus::Good,
        description: "Noise floor after cross-correlation averaging.",
    },
    MeasurementSpec {
        id: "toi",
        label: "Third Order Intercept",
        unit: "dBm",
        base: 28.0,
        variance: 1.5,
        decimals: 1,
        status: MeasurementStatus::Good,
        description: "Linearity reference measured with two-tone stimulus.",
    },
    MeasurementSpec {
        id: "aclr",
        label: "ACLR",
        unit: "dB",
        base: 69.0,
        variance: 1.8,
        decimals: 1,
        status: MeasurementStatus::Good,
        description: "Adjacent channel leakage ratio for wideband 5G NR signal.",
    },
    MeasurementSpec {
        id: "noiseFigure",
        label: "Noise Figure",
        unit: "dB",
        base: 0.45,
        variance: 0.05,
        decimals: 2,
        status: MeasurementStatus::Good,
        description: "Two-path cross-correlation noise figure measurement.",
    },
];

pub fn spec_for(id: &str) -> Option<&'static MeasurementSpec> {
    MEASUREMENT_SPECS.iter().find(|spec| spec.id == id)
}

/// Display snapshot at the nominal baseline.
pub fn measurement_snapshot(spec: &MeasurementSpec) -> Measurement {
    Measurement {
        id: spec.id.to_string(),
        label: spec.label.to_string(),
        value: format!("{:.*}", spec.decimals, spec.base),
        unit: Some(spec.unit.to_string()),
        delta: Some(format!("+0.00 {}", spec.unit)),
        status: spec.status,
        description: Some(spec.description.to_string()),
    }
}

/// One step of the bounded random walk around each measurement's baseline.
///
/// Each value moves to `base ± variance`; a measurement-log entry is emitted
/// only when the step from the previous displayed value reaches 35% of that
/// measurement's variance. Measurements without a spec entry pass through
/// untouched.
pub fn walk_measurements<R: Rng>(
    measurements: &[Measurement],
    rng: &mut R,
) -> (Vec<Measurement>, Vec<MeasurementLogEntry>) {
    let mut log_entries = Vec::new();

    let next = measurements
        .iter()
        .map(|measurement| {
            let Some(spec) = spec_for(&measurement.id) else {
                return measurement.clone();
            };

            let prev_value: f64 = measurement.value.parse().unwrap_or(spec.base);
            let raw = spec.base + (rng.gen::<f64>() - 0.5) * spec.variance * 2.0;
            let factor = 10f64.powi(spec.decimals as i32);
            let clamped = (raw * factor).round() / factor;
            let delta_value = clamped - prev_value;

            let value = format!("{:.*}", spec.decimals, clamped);
            let delta = format!("{:+.*} {}", spec.decimals, delta_value, spec.unit);

            if delta_value.abs() >= spec.variance * 0.35 {
                log_entries.push(MeasurementLogEntry {
                    id: create_id("measure"),
                    timestamp: Utc::now(),
                    measurement_id: measurement.id.clone(),
                    label: measurement.label.clone(),
                    value: value.clone(),
                    unit: Some(spec.unit.to_string()),
                    status: measurement.status,
                    delta: Some(delta.clone()),
                });
            }

            Measurement {
                value,
                delta: Some(delta),
                ..measurement.clone()
            }
        })
        .collect();

    (next, log_entries)
}
