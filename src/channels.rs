//! Sequential acquisition across multiplexed sensor channels.
//!
//! One AD5934 sits behind a bus multiplexer. For each channel the
//! multiplexer is switched, a full sweep is run and the resulting spectrum is
//! written into that channel's output slot. Channels are processed strictly
//! one after another and a failure only marks its own slot.

use heapless::Vec;

use crate::calibration::{CalibrationTable, Spectrum};
use crate::driver::Ad5934Driver;
use crate::sweep::{SweepFailure, SweepProgram};
use crate::{DelayUs, RegisterInterface, MAX_POINTS};

/// Trait for the bus multiplexer placed in front of the AD5934.
pub trait ChannelSelect {
    /// Error type for channel switching
    type Error;

    /// Route the bus to `channel`.
    fn select_channel(&mut self, channel: u8) -> Result<(), Self::Error>;
}

/// Outcome of one channel in an acquisition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelStatus {
    /// Not acquired yet.
    #[default]
    Pending,
    Valid,
    /// The multiplexer refused the channel.
    SelectFailed,
    /// The sweep failed. [`SweepFailure::DeviceFault`] means the device
    /// needs a reset before the next channel can be trusted.
    SweepFailed(SweepFailure),
    /// The sweep succeeded but calibration rejected it, or no table was
    /// supplied for this channel.
    CalibrationFailed,
}

/// Output slot for one channel.
///
/// `magnitude` and `phase` are only meaningful when `status` is
/// [`ChannelStatus::Valid`]; for any other status both are empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelSpectrum {
    pub channel: u8,
    pub status: ChannelStatus,
    pub magnitude: Vec<f32, MAX_POINTS>,
    pub phase: Vec<f32, MAX_POINTS>,
}

impl ChannelSpectrum {
    pub fn is_valid(&self) -> bool {
        self.status == ChannelStatus::Valid
    }

    fn fail(&mut self, channel: u8, status: ChannelStatus) {
        self.channel = channel;
        self.status = status;
        self.magnitude.clear();
        self.phase.clear();
    }

    fn fill(&mut self, channel: u8, spectrum: Spectrum) {
        let (magnitude, phase) = spectrum.into_parts();
        self.channel = channel;
        self.status = ChannelStatus::Valid;
        self.magnitude = magnitude;
        self.phase = phase;
    }
}

/// How sweeps are converted before they land in the output slots.
#[derive(Debug, Clone, Copy)]
pub enum Conversion<'a> {
    /// Uncalibrated `|raw|` and `atan2(imag, real)`.
    Raw,
    /// One table shared by every channel.
    Shared(&'a CalibrationTable),
    /// `tables[i]` calibrates the `i`-th channel in the request.
    PerChannel(&'a [CalibrationTable]),
}

/// Summary of an acquisition run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquisitionReport {
    pub valid: usize,
    pub failed: usize,
}

/// Returned when the output buffer cannot hold every requested channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputTooSmall {
    pub channels: usize,
    pub slots: usize,
}

/// Acquire every channel in `channels`, in order, into `outputs`.
///
/// `outputs[i]` receives `channels[i]`. A channel that cannot be selected,
/// swept or calibrated is marked with the matching [`ChannelStatus`] and the
/// run moves on to the next channel.
///
/// # Errors
///
/// [`OutputTooSmall`] if `outputs` is shorter than `channels`; nothing is
/// touched on the bus in that case.
pub fn acquire_all<I, D, M>(
    driver: &mut Ad5934Driver<I, D>,
    mux: &mut M,
    channels: &[u8],
    program: &SweepProgram,
    conversion: Conversion<'_>,
    outputs: &mut [ChannelSpectrum],
) -> Result<AcquisitionReport, OutputTooSmall>
where
    I: RegisterInterface<AddressType = u8>,
    D: DelayUs,
    M: ChannelSelect,
{
    if outputs.len() < channels.len() {
        return Err(OutputTooSmall {
            channels: channels.len(),
            slots: outputs.len(),
        });
    }

    let mut report = AcquisitionReport::default();

    for (slot, (&channel, output)) in channels.iter().zip(outputs.iter_mut()).enumerate() {
        let status = acquire_channel(driver, mux, channel, slot, program, conversion, output);
        if status == ChannelStatus::Valid {
            report.valid += 1;
        } else {
            warn!("channel {} failed: {:?}", channel, status);
            output.fail(channel, status);
            report.failed += 1;
        }
    }

    info!(
        "acquisition finished: {} valid, {} failed",
        report.valid,
        report.failed
    );
    Ok(report)
}

fn acquire_channel<I, D, M>(
    driver: &mut Ad5934Driver<I, D>,
    mux: &mut M,
    channel: u8,
    slot: usize,
    program: &SweepProgram,
    conversion: Conversion<'_>,
    output: &mut ChannelSpectrum,
) -> ChannelStatus
where
    I: RegisterInterface<AddressType = u8>,
    D: DelayUs,
    M: ChannelSelect,
{
    if mux.select_channel(channel).is_err() {
        return ChannelStatus::SelectFailed;
    }
    debug!("channel {} selected", channel);

    let result = match driver.run_sweep(program) {
        Ok(result) => result,
        Err(e) => return ChannelStatus::SweepFailed(e.failure()),
    };

    let spectrum = match conversion {
        Conversion::Raw => Ok(Spectrum::raw(&result)),
        Conversion::Shared(table) => table.apply(&result),
        Conversion::PerChannel(tables) => match tables.get(slot) {
            Some(table) => table.apply(&result),
            None => return ChannelStatus::CalibrationFailed,
        },
    };

    match spectrum {
        Ok(spectrum) => {
            output.fill(channel, spectrum);
            ChannelStatus::Valid
        }
        Err(_) => ChannelStatus::CalibrationFailed,
    }
}
