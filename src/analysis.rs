//! Resonance tracking across two acquisitions.
//!
//! The sensors are resonators: binding shifts the resonance peak along the
//! sweep. A baseline acquisition and a later one are smoothed, the peak of
//! each channel is located, and the mean peak displacement (in sweep points)
//! is graded.

use core::fmt;

use heapless::Vec;

use crate::channels::ChannelSpectrum;
use crate::MAX_POINTS;

/// Smoothing window used by the measurement setup.
pub const DEFAULT_WINDOW: usize = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnalysisError {
    /// Window must be odd and at least 5 for a cubic fit.
    InvalidWindow { window: usize },
    LengthMismatch { expected: usize, actual: usize },
    /// More than [`MAX_POINTS`] samples.
    TooLong { len: usize },
    /// The spectrum holds no finite value.
    NoPeak,
    /// No channel is valid in both acquisitions.
    NoValidChannels,
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::InvalidWindow { window } => {
                write!(f, "smoothing window {} must be odd and at least 5", window)
            }
            AnalysisError::LengthMismatch { expected, actual } => {
                write!(f, "expected {} points, got {}", expected, actual)
            }
            AnalysisError::TooLong { len } => {
                write!(f, "{} points exceeds the maximum of {}", len, MAX_POINTS)
            }
            AnalysisError::NoPeak => f.write_str("spectrum has no finite value"),
            AnalysisError::NoValidChannels => {
                f.write_str("no channel is valid in both acquisitions")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AnalysisError {}

/// Which half of a [`ChannelSpectrum`] to track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Component {
    Magnitude,
    Phase,
}

impl Component {
    fn of(self, spectrum: &ChannelSpectrum) -> &[f32] {
        match self {
            Component::Magnitude => &spectrum.magnitude,
            Component::Phase => &spectrum.phase,
        }
    }
}

/// Savitzky–Golay smoothing with a quadratic/cubic kernel.
///
/// For a window of `2m + 1` points the weight at offset `k` is
///
/// ```text
/// (3(3m² + 3m − 1) − 15k²) / ((2m − 1)(2m + 1)(2m + 3))
/// ```
///
/// Samples beyond either end are taken as the nearest edge sample.
pub fn smooth(input: &[f32], window: usize, output: &mut [f32]) -> Result<(), AnalysisError> {
    if window < 5 || window % 2 == 0 {
        return Err(AnalysisError::InvalidWindow { window });
    }
    if output.len() != input.len() {
        return Err(AnalysisError::LengthMismatch {
            expected: input.len(),
            actual: output.len(),
        });
    }
    if input.is_empty() {
        return Ok(());
    }

    let m = (window / 2) as isize;
    let mf = m as f32;
    let norm = (2.0 * mf - 1.0) * (2.0 * mf + 1.0) * (2.0 * mf + 3.0);
    let base = 3.0 * (3.0 * mf * mf + 3.0 * mf - 1.0);
    let last = input.len() as isize - 1;

    for (i, out) in output.iter_mut().enumerate() {
        let i = i as isize;
        *out = (-m..=m)
            .map(|k| {
                let kf = k as f32;
                let weight = (base - 15.0 * kf * kf) / norm;
                weight * input[(i + k).clamp(0, last) as usize]
            })
            .sum();
    }

    Ok(())
}

/// Index of the first maximum, ignoring non-finite values.
pub fn peak_index(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

fn smoothed_peak(values: &[f32], window: usize) -> Result<usize, AnalysisError> {
    let mut scratch: Vec<f32, MAX_POINTS> = Vec::new();
    scratch
        .resize(values.len(), 0.0)
        .map_err(|_| AnalysisError::TooLong { len: values.len() })?;
    smooth(values, window, &mut scratch)?;
    peak_index(&scratch).ok_or(AnalysisError::NoPeak)
}

/// Distance in sweep points between the smoothed peaks of two spectra.
pub fn peak_shift(baseline: &[f32], measurement: &[f32], window: usize) -> Result<usize, AnalysisError> {
    if baseline.len() != measurement.len() {
        return Err(AnalysisError::LengthMismatch {
            expected: baseline.len(),
            actual: measurement.len(),
        });
    }
    let before = smoothed_peak(baseline, window)?;
    let after = smoothed_peak(measurement, window)?;
    Ok(before.abs_diff(after))
}

/// Grade of the mean resonance shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ShiftQuality {
    /// At most 10 points.
    Good,
    /// At most 30 points.
    Fair,
    Bad,
}

impl ShiftQuality {
    pub fn grade(mean_shift: f32) -> Self {
        if mean_shift <= 10.0 {
            ShiftQuality::Good
        } else if mean_shift <= 30.0 {
            ShiftQuality::Fair
        } else {
            ShiftQuality::Bad
        }
    }
}

/// Mean peak shift over every channel valid in both acquisitions, graded.
///
/// Channels are paired by position. Returns the grade and the mean shift.
pub fn grade_channels(
    baseline: &[ChannelSpectrum],
    measurement: &[ChannelSpectrum],
    component: Component,
    window: usize,
) -> Result<(ShiftQuality, f32), AnalysisError> {
    let mut total = 0usize;
    let mut count = 0usize;
    for (before, after) in baseline.iter().zip(measurement) {
        if !before.is_valid() || !after.is_valid() {
            continue;
        }
        total += peak_shift(component.of(before), component.of(after), window)?;
        count += 1;
    }

    if count == 0 {
        return Err(AnalysisError::NoValidChannels);
    }

    let mean = total as f32 / count as f32;
    debug!("mean peak shift {} over {} channels", mean, count);
    Ok((ShiftQuality::grade(mean), mean))
}
