//! Gain-factor and system-phase calibration.
//!
//! A [`CalibrationTable`] is built once from a sweep taken against a known
//! reference load and then applied to sweeps of unknown loads taken with the
//! same program. Gain and phase error depend on frequency, so a table only
//! fits results whose start and step frequency match the reference sweep.
//!
//! Calibrated magnitudes follow the datasheet convention: the gain factor
//! maps raw DFT magnitude to admittance, and [`Spectrum::impedance`] gives
//! `1 / magnitude`. Phases are in radians, wrapped into (−π, π].

use core::f32::consts::PI;
use core::fmt;

use heapless::Vec;

use crate::codec::ComplexSample;
use crate::sweep::SweepResult;
use crate::MAX_POINTS;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// Reference magnitude is zero, negative or not finite.
    InvalidReference {
        /// Offending point, `None` for a scalar reference
        index: Option<usize>,
    },
    /// Table and data cover a different number of points.
    LengthMismatch { expected: usize, actual: usize },
    /// Data was captured with a different start or step frequency.
    ProgramMismatch,
    /// A reference sample has zero magnitude, so no gain factor exists.
    DegenerateSample { index: usize },
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationError::InvalidReference { index: Some(i) } => {
                write!(f, "reference value at point {} must be positive and finite", i)
            }
            CalibrationError::InvalidReference { index: None } => {
                f.write_str("reference magnitude must be positive and finite")
            }
            CalibrationError::LengthMismatch { expected, actual } => {
                write!(f, "expected {} points, got {}", expected, actual)
            }
            CalibrationError::ProgramMismatch => {
                f.write_str("sweep was taken with a different frequency program")
            }
            CalibrationError::DegenerateSample { index } => {
                write!(f, "reference sample {} has zero magnitude", index)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CalibrationError {}

/// Wrap an angle into (−π, π].
pub fn wrap_phase(phase: f32) -> f32 {
    let two_pi = 2.0 * PI;
    let mut wrapped = phase - two_pi * libm::floorf((phase + PI) / two_pi);
    if wrapped <= -PI {
        wrapped += two_pi;
    }
    wrapped
}

/// True complex impedance of the reference load at one frequency point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReferenceImpedance {
    pub real: f32,
    pub imag: f32,
}

impl ReferenceImpedance {
    pub const fn new(real: f32, imag: f32) -> Self {
        Self { real, imag }
    }

    /// A purely resistive reference.
    pub const fn resistor(ohms: f32) -> Self {
        Self {
            real: ohms,
            imag: 0.0,
        }
    }

    pub fn magnitude(&self) -> f32 {
        libm::sqrtf(self.real * self.real + self.imag * self.imag)
    }

    pub fn phase(&self) -> f32 {
        libm::atan2f(self.imag, self.real)
    }
}

/// Correction for one frequency point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationPoint {
    pub gain_factor: f32,
    /// System phase in radians.
    pub phase_offset: f32,
}

/// Per-point gain factors and phase offsets for one sweep program.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable {
    start_frequency: u32,
    increment_frequency: u32,
    points: Vec<CalibrationPoint, MAX_POINTS>,
}

fn checked_magnitude(sample: &ComplexSample, index: usize) -> Result<f32, CalibrationError> {
    let magnitude = sample.magnitude();
    if magnitude > 0.0 {
        Ok(magnitude)
    } else {
        Err(CalibrationError::DegenerateSample { index })
    }
}

fn valid_reference(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

impl CalibrationTable {
    /// Magnitude-only calibration against a reference of known `|Z|`.
    ///
    /// ```text
    /// gain_factor[i]  = (1 / reference_magnitude) / |raw[i]|
    /// phase_offset[i] = atan2(imag[i], real[i])
    /// ```
    ///
    /// Applying the table to the reference sweep itself gives zero phase, so
    /// later phases are relative to the reference load's measured phase.
    pub fn from_reference(
        reference: &SweepResult,
        reference_magnitude: f32,
    ) -> Result<Self, CalibrationError> {
        if !valid_reference(reference_magnitude) {
            return Err(CalibrationError::InvalidReference { index: None });
        }

        let mut table = Self::empty(reference);
        for (i, sample) in reference.samples().iter().enumerate() {
            let magnitude = checked_magnitude(sample, i)?;
            table.push(CalibrationPoint {
                gain_factor: (1.0 / reference_magnitude) / magnitude,
                phase_offset: sample.phase(),
            });
        }
        Ok(table)
    }

    /// Complex-reference calibration.
    ///
    /// `true_values[i]` is the reference load's actual impedance at point
    /// `i`. The resulting table maps the measured reference onto that value
    /// in both magnitude and phase:
    ///
    /// ```text
    /// gain_factor[i]  = (1 / |Z_ref[i]|) / |raw[i]|
    /// phase_offset[i] = atan2(imag[i], real[i]) − arg(Z_ref[i])
    /// ```
    pub fn from_complex_reference(
        reference: &SweepResult,
        true_values: &[ReferenceImpedance],
    ) -> Result<Self, CalibrationError> {
        if true_values.len() != reference.len() {
            return Err(CalibrationError::LengthMismatch {
                expected: reference.len(),
                actual: true_values.len(),
            });
        }
        if let Some(i) = true_values
            .iter()
            .position(|z| !valid_reference(z.magnitude()))
        {
            return Err(CalibrationError::InvalidReference { index: Some(i) });
        }

        let mut table = Self::empty(reference);
        for (i, (sample, truth)) in reference.samples().iter().zip(true_values).enumerate() {
            let magnitude = checked_magnitude(sample, i)?;
            table.push(CalibrationPoint {
                gain_factor: (1.0 / truth.magnitude()) / magnitude,
                phase_offset: wrap_phase(sample.phase() - truth.phase()),
            });
        }
        Ok(table)
    }

    fn empty(reference: &SweepResult) -> Self {
        CalibrationTable {
            start_frequency: reference.start_frequency(),
            increment_frequency: reference.increment_frequency(),
            points: Vec::new(),
        }
    }

    // one point per reference sample, and a SweepResult holds at most MAX_POINTS
    fn push(&mut self, point: CalibrationPoint) {
        let pushed = self.points.push(point).is_ok();
        debug_assert!(pushed, "calibration table exceeds MAX_POINTS");
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    pub fn start_frequency(&self) -> u32 {
        self.start_frequency
    }

    pub fn increment_frequency(&self) -> u32 {
        self.increment_frequency
    }

    /// Convert a raw sweep into calibrated magnitude and phase.
    ///
    /// ```text
    /// magnitude[i] = gain_factor[i] × |raw[i]|
    /// phase[i]     = wrap(atan2(imag[i], real[i]) − phase_offset[i])
    /// ```
    pub fn apply(&self, raw: &SweepResult) -> Result<Spectrum, CalibrationError> {
        if raw.len() != self.len() {
            return Err(CalibrationError::LengthMismatch {
                expected: self.len(),
                actual: raw.len(),
            });
        }
        if !raw.same_program(self.start_frequency, self.increment_frequency) {
            return Err(CalibrationError::ProgramMismatch);
        }

        let mut spectrum = Spectrum::new(self.start_frequency, self.increment_frequency);
        for (sample, point) in raw.samples().iter().zip(self.points.iter()) {
            spectrum.push(
                point.gain_factor * sample.magnitude(),
                wrap_phase(sample.phase() - point.phase_offset),
            );
        }
        Ok(spectrum)
    }
}

/// Magnitude and phase per sweep point.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    start_frequency: u32,
    increment_frequency: u32,
    magnitude: Vec<f32, MAX_POINTS>,
    phase: Vec<f32, MAX_POINTS>,
}

impl Spectrum {
    const fn new(start_frequency: u32, increment_frequency: u32) -> Self {
        Spectrum {
            start_frequency,
            increment_frequency,
            magnitude: Vec::new(),
            phase: Vec::new(),
        }
    }

    // filled from a SweepResult, which holds at most MAX_POINTS samples
    fn push(&mut self, magnitude: f32, phase: f32) {
        let pushed = self.magnitude.push(magnitude).is_ok() && self.phase.push(phase).is_ok();
        debug_assert!(pushed, "spectrum exceeds MAX_POINTS");
    }

    /// Uncalibrated `|raw|` and `atan2(imag, real)` of every point.
    pub fn raw(result: &SweepResult) -> Self {
        let mut spectrum = Spectrum::new(result.start_frequency(), result.increment_frequency());
        for sample in result.samples() {
            spectrum.push(sample.magnitude(), sample.phase());
        }
        spectrum
    }

    pub fn len(&self) -> usize {
        self.magnitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitude.is_empty()
    }

    pub fn magnitude(&self) -> &[f32] {
        &self.magnitude
    }

    pub fn phase(&self) -> &[f32] {
        &self.phase
    }

    /// `1 / magnitude[index]`, the impedance magnitude at that point.
    pub fn impedance(&self, index: usize) -> Option<f32> {
        self.magnitude.get(index).map(|m| 1.0 / m)
    }

    pub fn frequency_at(&self, index: usize) -> u64 {
        self.start_frequency as u64 + index as u64 * self.increment_frequency as u64
    }

    pub(crate) fn into_parts(self) -> (Vec<f32, MAX_POINTS>, Vec<f32, MAX_POINTS>) {
        (self.magnitude, self.phase)
    }
}
