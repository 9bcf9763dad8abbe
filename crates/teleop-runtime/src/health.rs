//! Presentation-only health bands for status metrics.
//!
//! Classification never feeds back into control: a red CPU gauge is
//! information for the operator, not a reason to stop the vehicle.

use std::fmt;

use teleop_types::StatusSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Cpu,
    Memory,
    Temperature,
    Disk,
    Fps,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::Temperature => "temperature",
            Metric::Disk => "disk",
            Metric::Fps => "fps",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricBand {
    Normal,
    Warning,
    Danger,
}

/// Classify one reading.
///
/// | Metric | Warning | Danger |
/// |---|---|---|
/// | CPU % | > 60 | > 80 |
/// | Memory % | > 60 | > 80 |
/// | Temperature °C | > 60 | > 75 |
/// | Disk % | > 75 | > 90 |
/// | FPS | < 10 | < 5 |
pub fn classify(metric: Metric, value: f64) -> MetricBand {
    let (warning, danger, low_is_bad) = match metric {
        Metric::Cpu | Metric::Memory => (60.0, 80.0, false),
        Metric::Temperature => (60.0, 75.0, false),
        Metric::Disk => (75.0, 90.0, false),
        Metric::Fps => (10.0, 5.0, true),
    };
    let (is_danger, is_warning) = if low_is_bad {
        (value < danger, value < warning)
    } else {
        (value > danger, value > warning)
    };
    if is_danger {
        MetricBand::Danger
    } else if is_warning {
        MetricBand::Warning
    } else {
        MetricBand::Normal
    }
}

/// Every metric present in `sample`, with its band. Absent fields are
/// skipped.
pub fn classify_status(sample: &StatusSample) -> Vec<(Metric, f64, MetricBand)> {
    [
        (Metric::Cpu, sample.cpu),
        (Metric::Memory, sample.memory),
        (Metric::Temperature, sample.temperature),
        (Metric::Disk, sample.disk),
        (Metric::Fps, sample.fps),
    ]
    .into_iter()
    .filter_map(|(metric, value)| value.map(|v| (metric, v, classify(metric, v))))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_bands() {
        assert_eq!(classify(Metric::Cpu, 60.0), MetricBand::Normal);
        assert_eq!(classify(Metric::Cpu, 60.1), MetricBand::Warning);
        assert_eq!(classify(Metric::Cpu, 80.0), MetricBand::Warning);
        assert_eq!(classify(Metric::Cpu, 80.5), MetricBand::Danger);
    }

    #[test]
    fn temperature_and_disk_bands() {
        assert_eq!(classify(Metric::Temperature, 70.0), MetricBand::Warning);
        assert_eq!(classify(Metric::Temperature, 76.0), MetricBand::Danger);
        assert_eq!(classify(Metric::Disk, 76.0), MetricBand::Warning);
        assert_eq!(classify(Metric::Disk, 91.0), MetricBand::Danger);
    }

    #[test]
    fn fps_is_bad_when_low() {
        assert_eq!(classify(Metric::Fps, 15.0), MetricBand::Normal);
        assert_eq!(classify(Metric::Fps, 9.0), MetricBand::Warning);
        assert_eq!(classify(Metric::Fps, 4.0), MetricBand::Danger);
    }

    #[test]
    fn absent_fields_are_skipped() {
        let sample = StatusSample {
            cpu: Some(85.0),
            temperature: Some(40.0),
            ..Default::default()
        };
        let bands = classify_status(&sample);
        assert_eq!(
            bands,
            vec![
                (Metric::Cpu, 85.0, MetricBand::Danger),
                (Metric::Temperature, 40.0, MetricBand::Normal),
            ]
        );
    }
}
