//! Frequency sweep execution.
//!
//! A sweep owns the bus from the moment it is programmed until the device
//! reports sweep-complete or a poll budget runs out. Status polling blocks
//! on the driver's [`DelayUs`](crate::DelayUs) provider between attempts.

use core::fmt;

use heapless::Vec;

use crate::codec::{self, CodecError, ComplexSample};
use crate::control::{OutputRange, PgaGain, PowerMode, Status};
use crate::driver::{Ad5934Driver, DriverError};
use crate::{DelayUs, RegisterInterface, MAX_POINTS};

/// Status-poll budget.
///
/// The status register is read once, then up to `max_retries` more times
/// with `interval_us` between reads.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollPolicy {
    pub max_retries: u32,
    pub interval_us: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            max_retries: 1000,
            interval_us: 1000,
        }
    }
}

/// Parameters of one frequency sweep.
///
/// A sweep captures `increments + 1` points; point `i` is measured at
/// `start_frequency + i × increment_frequency`. Frequencies are in Hz.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SweepProgram {
    pub start_frequency: u32,
    pub increment_frequency: u32,
    /// Number of increments, at most 511.
    pub increments: u16,
    pub settling_cycles: u16,
    pub output_range: OutputRange,
    pub gain: PgaGain,
}

impl Default for SweepProgram {
    fn default() -> Self {
        SweepProgram {
            start_frequency: crate::DEFAULT_START_FREQUENCY,
            increment_frequency: crate::DEFAULT_INCREMENT_FREQUENCY,
            increments: crate::DEFAULT_INCREMENTS,
            settling_cycles: crate::DEFAULT_SETTLING_CYCLES,
            output_range: OutputRange::Range1,
            gain: PgaGain::X1,
        }
    }
}

impl SweepProgram {
    /// Number of points a successful sweep returns.
    pub const fn points(&self) -> usize {
        self.increments as usize + 1
    }

    pub const fn frequency_at(&self, index: usize) -> u64 {
        self.start_frequency as u64 + index as u64 * self.increment_frequency as u64
    }

    /// Frequency of the last point.
    pub const fn end_frequency(&self) -> u64 {
        self.frequency_at(self.increments as usize)
    }

    /// Check that every field fits its register for the given clock.
    pub fn validate(&self, clock_hz: u32, divider: u32) -> Result<(), CodecError> {
        codec::encode_settling_cycles(self.settling_cycles)?;
        codec::encode_increments(self.increments)?;
        codec::encode_frequency(self.start_frequency, clock_hz, divider)?;
        codec::encode_frequency(self.increment_frequency, clock_hz, divider)?;
        if self.end_frequency() > codec::max_frequency(clock_hz, divider)? as u64 {
            return Err(CodecError::FrequencyOverflow {
                value: self.end_frequency().min(u32::MAX as u64) as u32,
            });
        }
        Ok(())
    }
}

/// Raw samples of one sweep, in ascending point order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepResult {
    start_frequency: u32,
    increment_frequency: u32,
    samples: Vec<ComplexSample, MAX_POINTS>,
}

impl SweepResult {
    pub const fn new(start_frequency: u32, increment_frequency: u32) -> Self {
        SweepResult {
            start_frequency,
            increment_frequency,
            samples: Vec::new(),
        }
    }

    /// Build a result from samples captured elsewhere (stored reference
    /// sweeps, host-side replays).
    ///
    /// Returns `None` if there are more than [`MAX_POINTS`] samples.
    pub fn from_samples(
        start_frequency: u32,
        increment_frequency: u32,
        samples: &[ComplexSample],
    ) -> Option<Self> {
        Some(SweepResult {
            start_frequency,
            increment_frequency,
            samples: Vec::from_slice(samples).ok()?,
        })
    }

    pub fn start_frequency(&self) -> u32 {
        self.start_frequency
    }

    pub fn increment_frequency(&self) -> u32 {
        self.increment_frequency
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[ComplexSample] {
        &self.samples
    }

    /// Nominal frequency of point `index`.
    pub fn frequency_at(&self, index: usize) -> u64 {
        self.start_frequency as u64 + index as u64 * self.increment_frequency as u64
    }

    /// Whether this sweep was taken with the given start and step frequency.
    pub fn same_program(&self, start_frequency: u32, increment_frequency: u32) -> bool {
        self.start_frequency == start_frequency && self.increment_frequency == increment_frequency
    }

    fn push(&mut self, sample: ComplexSample) {
        // capacity is MAX_POINTS and validate() caps a program at 511 increments
        let pushed = self.samples.push(sample).is_ok();
        debug_assert!(pushed, "sweep exceeds MAX_POINTS");
    }
}

/// Ways a sweep can fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepError<E> {
    /// Register access failed or the program could not be encoded.
    Driver(DriverError<E>),
    /// No data-ready flag within the poll budget. The device is left as is.
    Timeout {
        /// Point that was being waited on
        point: u16,
    },
    /// Every point was read but sweep-complete never came up.
    IncompleteSweep(SweepResult),
    /// The status register returned the error sentinel. Reset the device
    /// before reusing it.
    DeviceFault {
        point: u16,
    },
}

impl<E> SweepError<E> {
    /// The failure class, without the bus error or partial data.
    pub fn failure(&self) -> SweepFailure {
        match self {
            SweepError::Driver(DriverError::Codec(_)) => SweepFailure::InvalidProgram,
            SweepError::Driver(_) => SweepFailure::Transport,
            SweepError::Timeout { .. } => SweepFailure::Timeout,
            SweepError::IncompleteSweep(_) => SweepFailure::Incomplete,
            SweepError::DeviceFault { .. } => SweepFailure::DeviceFault,
        }
    }
}

/// Class of a [`SweepError`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SweepFailure {
    /// Bus error or write-back mismatch.
    Transport,
    /// The program does not fit the registers.
    InvalidProgram,
    Timeout,
    Incomplete,
    /// Needs a reset before the device is used again.
    DeviceFault,
}

impl<E> From<DriverError<E>> for SweepError<E> {
    fn from(error: DriverError<E>) -> Self {
        SweepError::Driver(error)
    }
}

impl<E: fmt::Debug> fmt::Display for SweepError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepError::Driver(e) => write!(f, "{}", e),
            SweepError::Timeout { point } => {
                write!(f, "timed out waiting for data at point {}", point)
            }
            SweepError::IncompleteSweep(result) => write!(
                f,
                "sweep-complete flag not set after {} points",
                result.len()
            ),
            SweepError::DeviceFault { point } => {
                write!(f, "device reported a fault at point {}", point)
            }
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for SweepError<E> {}

enum PollOutcome {
    Ready,
    TimedOut,
    Fault,
}

impl<I, D> Ad5934Driver<I, D>
where
    I: RegisterInterface<AddressType = u8>,
    D: DelayUs,
{
    fn poll_status(&mut self, ready: fn(Status) -> bool) -> Result<PollOutcome, DriverError<I::Error>> {
        let PollPolicy {
            max_retries,
            interval_us,
        } = self.poll;

        for attempt in 0..=max_retries {
            let status = self.read_status()?;
            if status.is_fault() {
                return Ok(PollOutcome::Fault);
            }
            if ready(status) {
                return Ok(PollOutcome::Ready);
            }
            if attempt < max_retries {
                self.delay.delay_us(interval_us);
            }
        }

        Ok(PollOutcome::TimedOut)
    }

    /// Read registers 0x94..=0x97.
    pub fn read_complex_sample(&mut self) -> Result<ComplexSample, DriverError<I::Error>> {
        let raw = [
            self.registers.real_data_high().read()?.value(),
            self.registers.real_data_low().read()?.value(),
            self.registers.imag_data_high().read()?.value(),
            self.registers.imag_data_low().read()?.value(),
        ];
        Ok(codec::decode_complex_sample(raw))
    }

    /// Run one complete sweep and collect `program.increments + 1` samples.
    ///
    /// Sequence: standby, output range, PGA gain, settling cycles, sweep
    /// program, initialize with start frequency, start sweep; then for each
    /// point wait for data-ready, read the sample and step to the next
    /// frequency; finally wait for sweep-complete.
    ///
    /// # Errors
    ///
    /// - [`SweepError::Driver`] on a bus failure or an unencodable program.
    ///   Encoding problems are caught before the first register write.
    /// - [`SweepError::Timeout`] if a point never becomes ready.
    /// - [`SweepError::DeviceFault`] if the status register reads `0xFF`.
    /// - [`SweepError::IncompleteSweep`] if every point was read but the
    ///   sweep-complete flag never appeared; carries the samples.
    pub fn run_sweep(&mut self, program: &SweepProgram) -> Result<SweepResult, SweepError<I::Error>> {
        program
            .validate(self.config.clock_hz, self.config.clock_divider)
            .map_err(DriverError::Codec)?;

        self.set_power_mode(PowerMode::Standby)?;
        self.set_output_range(program.output_range)?;
        self.set_pga_gain(program.gain)?;
        self.set_settling_cycles(program.settling_cycles)?;
        self.program_sweep(program)?;
        self.initialize_start_frequency()?;
        self.start_sweep()?;

        let mut result = SweepResult::new(program.start_frequency, program.increment_frequency);

        for point in 0..=program.increments {
            match self.poll_status(Status::data_valid)? {
                PollOutcome::Ready => {}
                PollOutcome::TimedOut => {
                    warn!("sweep timed out at point {}", point);
                    return Err(SweepError::Timeout { point });
                }
                PollOutcome::Fault => {
                    error!("device fault at point {}", point);
                    return Err(SweepError::DeviceFault { point });
                }
            }

            result.push(self.read_complex_sample()?);

            if point < program.increments {
                self.increment_frequency()?;
            }
        }

        match self.poll_status(Status::sweep_complete)? {
            PollOutcome::Ready => {
                debug!("sweep complete: {} points", result.len());
                Ok(result)
            }
            PollOutcome::TimedOut => {
                warn!("sweep-complete flag missing after {} points", result.len());
                Err(SweepError::IncompleteSweep(result))
            }
            PollOutcome::Fault => {
                error!("device fault after final point");
                Err(SweepError::DeviceFault {
                    point: program.increments,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Operation;
    use crate::registers::address;
    use crate::sim::{CountingDelay, SimError, SimulatedAd5934};

    fn small_program(increments: u16) -> SweepProgram {
        SweepProgram {
            start_frequency: 30_000,
            increment_frequency: 100,
            increments,
            ..SweepProgram::default()
        }
    }

    fn quick_poll() -> PollPolicy {
        PollPolicy {
            max_retries: 5,
            interval_us: 10,
        }
    }

    fn driver(sim: SimulatedAd5934) -> Ad5934Driver<SimulatedAd5934, CountingDelay> {
        let mut d = Ad5934Driver::new(sim, CountingDelay::default());
        d.set_poll_policy(quick_poll());
        d
    }

    #[test]
    fn test_single_point_sweep() {
        let mut d = driver(SimulatedAd5934::default());
        let result = d.run_sweep(&small_program(0)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.frequency_at(0), 30_000);

        let (sim, _) = d.into_parts();
        assert_eq!(sim.increment_commands(), 0);
    }

    #[test]
    fn test_samples_follow_point_order() {
        let mut d = driver(SimulatedAd5934::default());
        let result = d.run_sweep(&small_program(9)).unwrap();
        assert_eq!(result.len(), 10);
        for (i, s) in result.samples().iter().enumerate() {
            assert_eq!(*s, SimulatedAd5934::default_response(i as u16));
            assert_eq!(result.frequency_at(i), 30_000 + 100 * i as u64);
        }
    }

    #[test]
    fn test_command_sequence() {
        let mut d = driver(SimulatedAd5934::default());
        d.run_sweep(&small_program(3)).unwrap();
        let (sim, _) = d.into_parts();
        assert_eq!(
            sim.operations(),
            &[
                Operation::Standby,
                Operation::InitializeStartFrequency,
                Operation::StartSweep,
            ]
        );
        assert_eq!(sim.increment_commands(), 3);
    }

    #[test]
    fn test_timeout_when_never_ready() {
        let mut sim = SimulatedAd5934::default();
        sim.never_ready = true;
        let mut d = driver(sim);
        assert_eq!(
            d.run_sweep(&small_program(4)),
            Err(SweepError::Timeout { point: 0 })
        );
        let (_, delay) = d.into_parts();
        // six status reads with a 10 µs gap between each
        assert_eq!(delay.total_us, 5 * 10);
    }

    #[test]
    fn test_incomplete_sweep_keeps_samples() {
        let mut sim = SimulatedAd5934::default();
        sim.never_complete = true;
        let mut d = driver(sim);
        match d.run_sweep(&small_program(4)) {
            Err(SweepError::IncompleteSweep(partial)) => assert_eq!(partial.len(), 5),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fault_sentinel_is_not_timeout() {
        let mut sim = SimulatedAd5934::default();
        sim.fault_status = true;
        let mut d = driver(sim);
        assert_eq!(
            d.run_sweep(&small_program(4)),
            Err(SweepError::DeviceFault { point: 0 })
        );
        let (_, delay) = d.into_parts();
        assert_eq!(delay.total_us, 0);
    }

    #[test]
    fn test_status_read_failure_is_not_retried() {
        let mut sim = SimulatedAd5934::default();
        sim.fail_read_at = Some(address::STATUS);
        let mut d = driver(sim);
        assert_eq!(
            d.run_sweep(&small_program(4)),
            Err(SweepError::Driver(DriverError::Bus(SimError::Nack {
                address: address::STATUS
            })))
        );
        let (_, delay) = d.into_parts();
        assert_eq!(delay.total_us, 0);
    }

    #[test]
    fn test_data_read_failure_aborts_sweep() {
        let mut sim = SimulatedAd5934::default();
        sim.fail_read_at = Some(address::REAL_DATA + 1);
        let mut d = driver(sim);
        assert_eq!(
            d.run_sweep(&small_program(4)),
            Err(SweepError::Driver(DriverError::Bus(SimError::Nack {
                address: address::REAL_DATA + 1
            })))
        );
        let (sim, _) = d.into_parts();
        assert_eq!(sim.increment_commands(), 0);
    }

    #[test]
    fn test_fault_on_completion_poll() {
        let mut sim = SimulatedAd5934::default();
        // one data-valid read per point, then the completion read faults
        sim.fault_after_status_reads = Some(5);
        let mut d = driver(sim);
        assert_eq!(
            d.run_sweep(&small_program(4)),
            Err(SweepError::DeviceFault { point: 4 })
        );
        let (sim, delay) = d.into_parts();
        assert_eq!(sim.status_reads(), 6);
        assert_eq!(sim.increment_commands(), 4);
        assert_eq!(delay.total_us, 0);
    }

    #[test]
    fn test_invalid_program_rejected_before_bus_access() {
        let mut d = driver(SimulatedAd5934::default());
        let program = SweepProgram {
            increments: 600,
            ..SweepProgram::default()
        };
        assert!(matches!(
            d.run_sweep(&program),
            Err(SweepError::Driver(DriverError::Codec(_)))
        ));
        let (sim, _) = d.into_parts();
        assert_eq!(sim.writes(), 0);
    }

    #[test]
    fn test_end_frequency_out_of_range_rejected_before_bus_access() {
        let mut d = driver(SimulatedAd5934::default());
        let program = SweepProgram {
            start_frequency: 131_000,
            increment_frequency: 1,
            increments: 100,
            ..SweepProgram::default()
        };
        assert!(matches!(
            d.run_sweep(&program),
            Err(SweepError::Driver(DriverError::Codec(CodecError::FrequencyOverflow { .. })))
        ));
        let (sim, _) = d.into_parts();
        assert_eq!(sim.writes(), 0);
    }

    #[test]
    fn test_longest_sweep_fills_capacity() {
        let mut d = driver(SimulatedAd5934::default());
        let result = d.run_sweep(&small_program(511)).unwrap();
        assert_eq!(result.len(), MAX_POINTS);
        assert_eq!(result.samples()[511], SimulatedAd5934::default_response(511));
    }

    #[test]
    fn test_program_helpers() {
        let p = SweepProgram::default();
        assert_eq!(p.points(), 501);
        assert_eq!(p.frequency_at(0), 14_234);
        assert_eq!(p.end_frequency(), 14_734);
    }
}
