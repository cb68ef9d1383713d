#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! Driver for the Analog Devices AD5934 impedance converter, with sweep
//! calibration and multi-channel acquisition on top.
//!
//! Register access is generated by the
//! [`device-driver`](https://crates.io/crates/device-driver) crate; the bus
//! itself is yours to supply through [`RegisterInterface`] (one 8-bit
//! register per access, `AddressType = u8`).
//!
//! # Features
//!
//! - **Type-safe register access** - Generated accessors for every register in the map
//! - **Verified writes** - Value registers are read back after writing (see [`DeviceConfig::verify_writes`])
//! - **Bounded polling** - Status waits give up after [`PollPolicy::max_retries`], a timeout is never reported as a result
//! - **Calibration** - Resistor or complex reference, applied per frequency point
//! - **Multi-channel acquisition** - One device behind a multiplexer, failures isolated per channel
//! - **Resonance tracking** - Smoothed peak shift between two acquisitions
//! - **No_std support** - Fixed-capacity buffers from `heapless`, math from `libm`
//!
//! # Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`codec`] | Pure conversions between physical values and register bytes |
//! | [`control`] | Control/status register field types |
//! | [`registers`] | Generated register block |
//! | [`driver`] | [`Ad5934Driver`]: configuration and commands |
//! | [`sweep`] | [`Ad5934Driver::run_sweep`] and its result type |
//! | [`calibration`] | Gain factor and phase offset tables |
//! | [`channels`] | [`acquire_all`] over a [`ChannelSelect`] multiplexer |
//! | [`analysis`] | Savitzky–Golay smoothing and peak-shift grading |
//! | [`sim`] | Register-level device model for tests and demos |
//!
//! # Usage
//!
//! ```
//! use ad5934::sim::{CountingDelay, SimulatedAd5934};
//! use ad5934::{Ad5934Driver, CalibrationTable, DeviceConfig, SweepProgram};
//!
//! let mut driver = Ad5934Driver::new(SimulatedAd5934::default(), CountingDelay::default());
//! driver.configure(&DeviceConfig::default()).unwrap();
//!
//! let program = SweepProgram {
//!     start_frequency: 30_000,
//!     increment_frequency: 10,
//!     increments: 99,
//!     ..SweepProgram::default()
//! };
//!
//! // sweep a known 200 kΩ resistor, then the unknown
//! let reference = driver.run_sweep(&program).unwrap();
//! let table = CalibrationTable::from_reference(&reference, 200_000.0).unwrap();
//!
//! let measured = driver.run_sweep(&program).unwrap();
//! let spectrum = table.apply(&measured).unwrap();
//! assert_eq!(spectrum.len(), 100);
//! ```
//!
//! # Logging
//!
//! Enable `log` or `defmt` (not both) to get driver events; with neither the
//! logging calls compile away.
//!
//! # Examples
//!
//! - **`demos/basic_sweep.rs`** - Configure, calibrate and sweep one device
//! - **`demos/multi_channel.rs`** - Acquire six multiplexed channels and grade the resonance shift

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod analysis;
pub mod calibration;
pub mod channels;
pub mod codec;
pub mod control;
pub mod driver;
pub mod registers;
pub mod sim;
pub mod sweep;

#[cfg(test)]
mod tests;

pub use device_driver::RegisterInterface;

pub use analysis::{
    grade_channels, peak_index, peak_shift, smooth, AnalysisError, Component, ShiftQuality,
};
pub use calibration::{
    CalibrationError, CalibrationPoint, CalibrationTable, ReferenceImpedance, Spectrum,
};
pub use channels::{
    acquire_all, AcquisitionReport, ChannelSelect, ChannelSpectrum, ChannelStatus, Conversion,
    OutputTooSmall,
};
pub use codec::{CodecError, ComplexSample, SettlingMultiplier};
pub use control::{ClockSource, Operation, OutputRange, PgaGain, PowerMode, Status};
pub use driver::{Ad5934Driver, DeviceConfig, DriverError};
pub use sweep::{PollPolicy, SweepError, SweepFailure, SweepProgram, SweepResult};

/// Most points a single sweep can produce (511 increments plus the start).
pub const MAX_POINTS: usize = 512;

/// Internal oscillator frequency.
pub const DEFAULT_CLOCK_HZ: u32 = 16_776_000;

/// The DDS runs at a sixteenth of the system clock.
pub const DEFAULT_CLOCK_DIVIDER: u32 = 16;

pub const DEFAULT_SETTLING_CYCLES: u16 = 10;
pub const DEFAULT_START_FREQUENCY: u32 = 14_234;
pub const DEFAULT_INCREMENT_FREQUENCY: u32 = 1;
pub const DEFAULT_INCREMENTS: u16 = 500;

/// Trait for delay providers.
///
/// This abstracts over platform-specific delay implementations.
/// Compatible with embedded-hal delay traits.
pub trait DelayUs {
    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}
