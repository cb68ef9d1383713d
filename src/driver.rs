//! Control-register state machine of the AD5934.
//!
//! [`Ad5934Driver`] owns the register interface and a delay provider. Every
//! setter is a read-modify-write of the byte that holds its field, so calls
//! to different setters compose when issued one after the other.
//!
//! The operation lifecycle is driven only by explicit calls:
//!
//! ```text
//! Standby → InitializeStartFrequency → StartSweep → (IncrementFrequency)* → RepeatFrequency? → Standby | PowerDown
//! ```
//!
//! [`initialize_start_frequency`](Ad5934Driver::initialize_start_frequency)
//! must follow every [`program_sweep`](Ad5934Driver::program_sweep) and come
//! before [`start_sweep`](Ad5934Driver::start_sweep). The driver does not
//! track or enforce this ordering.

use core::fmt;

use crate::codec::{self, CodecError};
use crate::control::{ClockSource, Operation, OutputRange, PgaGain, PowerMode, Status};
use crate::registers::{address, Ad5934Registers};
use crate::sweep::{PollPolicy, SweepProgram};
use crate::{DelayUs, RegisterInterface, DEFAULT_CLOCK_DIVIDER, DEFAULT_CLOCK_HZ};

/// Error type for controller operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError<E> {
    /// Error from the register interface (NACK, bus timeout)
    Bus(E),
    /// A register did not read back the value just written to it.
    WriteMismatch {
        /// Register address
        address: u8,
        /// Value written
        expected: u8,
        /// Value read back
        actual: u8,
    },
    /// A parameter cannot be represented in the register format.
    Codec(CodecError),
}

impl<E> From<E> for DriverError<E> {
    fn from(error: E) -> Self {
        DriverError::Bus(error)
    }
}

impl<E: fmt::Debug> fmt::Display for DriverError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Bus(e) => write!(f, "register interface error: {:?}", e),
            DriverError::WriteMismatch {
                address,
                expected,
                actual,
            } => write!(
                f,
                "register 0x{:02X} read back 0x{:02X} after writing 0x{:02X}",
                address, actual, expected
            ),
            DriverError::Codec(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for DriverError<E> {}

/// Static device configuration applied by [`Ad5934Driver::configure`].
///
/// [`DeviceConfig::default()`] matches the measurement setup the driver was
/// built for: internal 16.776 MHz clock, AD5934 DDS divider, 2 V p-p range,
/// PGA ×1 and 10 settling cycles.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Frequency of the clock feeding MCLK, in Hz.
    pub clock_hz: u32,
    /// DDS clock divider: 16 for the AD5934, 4 for the AD5933.
    pub clock_divider: u32,
    pub clock_source: ClockSource,
    pub output_range: OutputRange,
    pub pga_gain: PgaGain,
    pub settling_cycles: u16,
    /// Read every configuration write back and compare.
    pub verify_writes: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            clock_hz: DEFAULT_CLOCK_HZ,
            clock_divider: DEFAULT_CLOCK_DIVIDER,
            clock_source: ClockSource::Internal,
            output_range: OutputRange::Range1,
            pga_gain: PgaGain::X1,
            settling_cycles: crate::DEFAULT_SETTLING_CYCLES,
            verify_writes: true,
        }
    }
}

/// Write one byte-wide value register and optionally read it back.
macro_rules! write_value {
    ($self:ident, $register:ident, $address:expr, $value:expr) => {{
        let value: u8 = $value;
        $self.registers.$register().write(|r| r.set_value(value))?;
        if $self.config.verify_writes {
            let actual = $self.registers.$register().read()?.value();
            if actual != value {
                return Err(DriverError::WriteMismatch {
                    address: $address,
                    expected: value,
                    actual,
                });
            }
        }
    }};
}

/// AD5934 controller owning the register interface and a delay provider.
///
/// # Example
///
/// ```
/// use ad5934::{Ad5934Driver, DeviceConfig, SweepProgram};
/// use ad5934::sim::{CountingDelay, SimulatedAd5934};
///
/// let mut driver = Ad5934Driver::new(SimulatedAd5934::default(), CountingDelay::default());
/// driver.configure(&DeviceConfig::default()).unwrap();
///
/// let program = SweepProgram { increments: 4, ..SweepProgram::default() };
/// let result = driver.run_sweep(&program).unwrap();
/// assert_eq!(result.len(), 5);
/// ```
pub struct Ad5934Driver<I, D> {
    pub(crate) registers: Ad5934Registers<I>,
    pub(crate) delay: D,
    pub(crate) config: DeviceConfig,
    pub(crate) poll: PollPolicy,
}

impl<I, D> Ad5934Driver<I, D>
where
    I: RegisterInterface<AddressType = u8>,
    D: DelayUs,
{
    /// Create a driver with [`DeviceConfig::default()`] and
    /// [`PollPolicy::default()`]. Nothing is written to the device until
    /// [`configure`](Self::configure) or one of the setters is called.
    pub fn new(interface: I, delay: D) -> Self {
        Self::with_config(interface, delay, DeviceConfig::default(), PollPolicy::default())
    }

    pub fn with_config(interface: I, delay: D, config: DeviceConfig, poll: PollPolicy) -> Self {
        Self {
            registers: Ad5934Registers::new(interface),
            delay,
            config,
            poll,
        }
    }

    /// Get a mutable reference to the underlying register device.
    pub fn registers_mut(&mut self) -> &mut Ad5934Registers<I> {
        &mut self.registers
    }

    /// Get a mutable reference to the bus interface.
    pub fn interface_mut(&mut self) -> &mut I {
        self.registers.interface_mut()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }

    /// Replace the status-poll budget used by subsequent sweeps.
    pub fn set_poll_policy(&mut self, poll: PollPolicy) {
        self.poll = poll;
    }

    /// Program the device with `cfg` in the order the part expects:
    /// reset, clock source, output range, PGA gain, settling cycles, standby.
    pub fn configure(&mut self, cfg: &DeviceConfig) -> Result<(), DriverError<I::Error>> {
        self.config = *cfg;
        debug!(
            "configure: clock {} Hz / {}, settling {}",
            cfg.clock_hz,
            cfg.clock_divider,
            cfg.settling_cycles
        );

        self.reset()?;
        self.set_clock_source(cfg.clock_source)?;
        self.set_output_range(cfg.output_range)?;
        self.set_pga_gain(cfg.pga_gain)?;
        self.set_settling_cycles(cfg.settling_cycles)?;
        self.set_power_mode(PowerMode::Standby)?;

        Ok(())
    }

    /// Set the reset bit in control register 0x81, keeping the clock bit.
    ///
    /// The reset bit is a command and is not read back.
    pub fn reset(&mut self) -> Result<(), DriverError<I::Error>> {
        trace!("reset");
        self.registers.control_low().modify(|r| r.set_soft_reset(true))?;
        Ok(())
    }

    pub fn set_clock_source(&mut self, source: ClockSource) -> Result<(), DriverError<I::Error>> {
        self.registers
            .control_low()
            .modify(|r| r.set_external_clock(source.bit()))?;
        if self.config.verify_writes {
            let actual = self.registers.control_low().read()?.external_clock();
            if actual != source.bit() {
                return Err(DriverError::WriteMismatch {
                    address: address::CONTROL_LOW,
                    expected: (source.bit() as u8) << 3,
                    actual: (actual as u8) << 3,
                });
            }
        }
        self.config.clock_source = source;
        Ok(())
    }

    pub fn set_output_range(&mut self, range: OutputRange) -> Result<(), DriverError<I::Error>> {
        self.registers
            .control_high()
            .modify(|r| r.set_output_range(range.bits()))?;
        if self.config.verify_writes {
            let actual = self.registers.control_high().read()?.output_range();
            if actual != range.bits() {
                return Err(DriverError::WriteMismatch {
                    address: address::CONTROL_HIGH,
                    expected: range.bits() << 1,
                    actual: actual << 1,
                });
            }
        }
        self.config.output_range = range;
        Ok(())
    }

    pub fn set_pga_gain(&mut self, gain: PgaGain) -> Result<(), DriverError<I::Error>> {
        self.registers
            .control_high()
            .modify(|r| r.set_pga_gain(gain.bit()))?;
        if self.config.verify_writes {
            let actual = self.registers.control_high().read()?.pga_gain();
            if actual != gain.bit() {
                return Err(DriverError::WriteMismatch {
                    address: address::CONTROL_HIGH,
                    expected: gain.bit() as u8,
                    actual: actual as u8,
                });
            }
        }
        self.config.pga_gain = gain;
        Ok(())
    }

    /// Write the settling-cycle registers, picking the ×1/×2/×4 multiplier
    /// automatically.
    ///
    /// # Errors
    ///
    /// [`CodecError::SettlingOverflow`] above 2044 cycles, before any bus
    /// access.
    pub fn set_settling_cycles(&mut self, cycles: u16) -> Result<(), DriverError<I::Error>> {
        let bytes = codec::encode_settling_cycles(cycles).map_err(DriverError::Codec)?;
        write_value!(self, settling_cycles_high, address::SETTLING_CYCLES, bytes[0]);
        write_value!(self, settling_cycles_low, address::SETTLING_CYCLES + 1, bytes[1]);
        self.config.settling_cycles = cycles;
        Ok(())
    }

    /// Write the start frequency, frequency increment and number of
    /// increments, in that order. Does not start the sweep.
    ///
    /// Every parameter is encoded before the first register write, so an
    /// unrepresentable program leaves the device untouched.
    pub fn program_sweep(&mut self, program: &SweepProgram) -> Result<(), DriverError<I::Error>> {
        let (clock, divider) = (self.config.clock_hz, self.config.clock_divider);
        program.validate(clock, divider).map_err(DriverError::Codec)?;
        let start = codec::encode_frequency(program.start_frequency, clock, divider)
            .map_err(DriverError::Codec)?;
        let increment = codec::encode_frequency(program.increment_frequency, clock, divider)
            .map_err(DriverError::Codec)?;
        let count = codec::encode_increments(program.increments).map_err(DriverError::Codec)?;

        debug!(
            "program sweep: start {} Hz, step {} Hz, {} increments",
            program.start_frequency,
            program.increment_frequency,
            program.increments
        );

        write_value!(self, start_frequency_high, address::START_FREQUENCY, start[0]);
        write_value!(self, start_frequency_mid, address::START_FREQUENCY + 1, start[1]);
        write_value!(self, start_frequency_low, address::START_FREQUENCY + 2, start[2]);

        write_value!(self, increment_frequency_high, address::INCREMENT_FREQUENCY, increment[0]);
        write_value!(self, increment_frequency_mid, address::INCREMENT_FREQUENCY + 1, increment[1]);
        write_value!(self, increment_frequency_low, address::INCREMENT_FREQUENCY + 2, increment[2]);

        write_value!(self, increment_count_high, address::INCREMENT_COUNT, count[0]);
        write_value!(self, increment_count_low, address::INCREMENT_COUNT + 1, count[1]);

        Ok(())
    }

    /// Issue `op` in the upper nibble of control register 0x80, keeping the
    /// range and gain bits.
    pub fn set_operation(&mut self, op: Operation) -> Result<(), DriverError<I::Error>> {
        trace!("operation 0x{:X}", op.bits());
        self.registers
            .control_high()
            .modify(|r| r.set_operation(op.bits()))?;
        if self.config.verify_writes {
            let actual = self.registers.control_high().read()?.operation();
            if actual != op.bits() {
                return Err(DriverError::WriteMismatch {
                    address: address::CONTROL_HIGH,
                    expected: op.bits() << 4,
                    actual: actual << 4,
                });
            }
        }
        Ok(())
    }

    /// Enter standby, power-down, or leave both (`PowerMode::On`).
    pub fn set_power_mode(&mut self, mode: PowerMode) -> Result<(), DriverError<I::Error>> {
        self.set_operation(mode.operation())
    }

    pub fn initialize_start_frequency(&mut self) -> Result<(), DriverError<I::Error>> {
        self.set_operation(Operation::InitializeStartFrequency)
    }

    pub fn start_sweep(&mut self) -> Result<(), DriverError<I::Error>> {
        self.set_operation(Operation::StartSweep)
    }

    pub fn increment_frequency(&mut self) -> Result<(), DriverError<I::Error>> {
        self.set_operation(Operation::IncrementFrequency)
    }

    /// Measure the current frequency point again.
    pub fn repeat_frequency(&mut self) -> Result<(), DriverError<I::Error>> {
        self.set_operation(Operation::RepeatFrequency)
    }

    /// Both control bytes, 0x80 in the upper half.
    pub fn read_control_register(&mut self) -> Result<u16, DriverError<I::Error>> {
        let high = self.registers.control_high().read()?;
        let low = self.registers.control_low().read()?;
        let high = (high.operation() << 4) | (high.output_range() << 1) | high.pga_gain() as u8;
        let low = ((low.soft_reset() as u8) << 4) | ((low.external_clock() as u8) << 3);
        Ok(u16::from_be_bytes([high, low]))
    }

    pub fn read_status(&mut self) -> Result<Status, DriverError<I::Error>> {
        Ok(Status(self.registers.device_status().read()?.value()))
    }

    /// Consume the driver and return the register interface and delay.
    pub fn into_parts(self) -> (I, D) {
        (self.registers.release(), self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{CountingDelay, SimError, SimulatedAd5934};

    fn driver() -> Ad5934Driver<SimulatedAd5934, CountingDelay> {
        Ad5934Driver::new(SimulatedAd5934::default(), CountingDelay::default())
    }

    #[test]
    fn test_setters_compose() {
        let mut d = driver();
        d.set_output_range(OutputRange::Range2).unwrap();
        d.set_pga_gain(PgaGain::X1).unwrap();
        d.set_power_mode(PowerMode::Standby).unwrap();
        d.set_clock_source(ClockSource::External).unwrap();

        // 0xB in the op nibble, range 11, gain x1; external clock
        assert_eq!(d.read_control_register().unwrap(), 0xB7_08);

        d.set_pga_gain(PgaGain::X5).unwrap();
        assert_eq!(d.read_control_register().unwrap(), 0xB6_08);
    }

    #[test]
    fn test_reset_preserves_configuration() {
        let mut d = driver();
        d.set_output_range(OutputRange::Range4).unwrap();
        d.set_clock_source(ClockSource::External).unwrap();
        d.reset().unwrap();

        let (sim, _) = d.into_parts();
        assert_eq!(sim.resets(), 1);
        assert_eq!(sim.register(address::CONTROL_HIGH), 0b0000_0100);
        assert_eq!(sim.register(address::CONTROL_LOW) & 0x08, 0x08);
    }

    #[test]
    fn test_power_mode_keeps_range_bits() {
        let mut d = driver();
        d.set_output_range(OutputRange::Range3).unwrap();
        d.set_power_mode(PowerMode::PowerDown).unwrap();
        assert_eq!(d.read_control_register().unwrap() >> 8, 0xA2);
        d.set_power_mode(PowerMode::On).unwrap();
        assert_eq!(d.read_control_register().unwrap() >> 8, 0x02);
    }

    #[test]
    fn test_settling_cycles_registers() {
        let mut d = driver();
        d.set_settling_cycles(1500).unwrap();
        let (sim, _) = d.into_parts();
        // 1500 → 375 × 4 = 0b11 multiplier, 0x177
        assert_eq!(sim.register(address::SETTLING_CYCLES), 0x07);
        assert_eq!(sim.register(address::SETTLING_CYCLES + 1), 0x77);
    }

    #[test]
    fn test_settling_overflow_touches_nothing() {
        let mut d = driver();
        assert_eq!(
            d.set_settling_cycles(3000),
            Err(DriverError::Codec(CodecError::SettlingOverflow { count: 3000 }))
        );
        let (sim, _) = d.into_parts();
        assert_eq!(sim.writes(), 0);
    }

    #[test]
    fn test_program_sweep_register_order_and_values() {
        let mut d = driver();
        let program = SweepProgram {
            start_frequency: 14_234,
            increment_frequency: 1,
            increments: 500,
            ..SweepProgram::default()
        };
        d.program_sweep(&program).unwrap();

        let (sim, _) = d.into_parts();
        assert_eq!(sim.write_order(), &[0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89]);
        assert_eq!(sim.start_code(), 0x1B_CD_84);
        assert_eq!(sim.increments(), 500);
    }

    #[test]
    fn test_program_sweep_rejects_end_beyond_range() {
        let mut d = driver();
        let program = SweepProgram {
            start_frequency: 130_000,
            increment_frequency: 10,
            increments: 511,
            ..SweepProgram::default()
        };
        assert!(matches!(
            d.program_sweep(&program),
            Err(DriverError::Codec(CodecError::FrequencyOverflow { .. }))
        ));
    }

    #[test]
    fn test_write_verification_detects_stuck_register() {
        let mut sim = SimulatedAd5934::default();
        sim.stuck_register = Some(address::START_FREQUENCY + 1);
        let mut d = Ad5934Driver::new(sim, CountingDelay::default());

        let err = d.program_sweep(&SweepProgram::default()).unwrap_err();
        assert!(matches!(
            err,
            DriverError::WriteMismatch {
                address: 0x83,
                actual: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_power_mode_write_is_verified() {
        let mut sim = SimulatedAd5934::default();
        sim.stuck_register = Some(address::CONTROL_HIGH);
        let mut d = Ad5934Driver::new(sim, CountingDelay::default());
        assert_eq!(
            d.set_power_mode(PowerMode::Standby),
            Err(DriverError::WriteMismatch {
                address: address::CONTROL_HIGH,
                expected: 0xB0,
                actual: 0x00,
            })
        );
    }

    #[test]
    fn test_unverified_power_mode_trusts_the_bus() {
        let mut sim = SimulatedAd5934::default();
        sim.stuck_register = Some(address::CONTROL_HIGH);
        let cfg = DeviceConfig {
            verify_writes: false,
            ..DeviceConfig::default()
        };
        let mut d =
            Ad5934Driver::with_config(sim, CountingDelay::default(), cfg, PollPolicy::default());
        assert_eq!(d.set_power_mode(PowerMode::Standby), Ok(()));
    }

    #[test]
    fn test_bus_failure_surfaces_immediately() {
        let mut sim = SimulatedAd5934::default();
        sim.fail_write_at = Some(address::CONTROL_LOW);
        let mut d = Ad5934Driver::new(sim, CountingDelay::default());
        assert_eq!(
            d.configure(&DeviceConfig::default()),
            Err(DriverError::Bus(SimError::Nack {
                address: address::CONTROL_LOW
            }))
        );
        let (sim, _) = d.into_parts();
        assert_eq!(sim.writes(), 0);
    }

    #[test]
    fn test_configure_sequence() {
        let mut d = driver();
        let cfg = DeviceConfig {
            output_range: OutputRange::Range2,
            pga_gain: PgaGain::X5,
            settling_cycles: 10,
            ..DeviceConfig::default()
        };
        d.configure(&cfg).unwrap();
        assert_eq!(d.config(), &cfg);
        assert_eq!(d.read_control_register().unwrap(), 0xB6_00);
        let (sim, _) = d.into_parts();
        assert_eq!(sim.resets(), 1);
        assert_eq!(sim.register(address::SETTLING_CYCLES + 1), 10);
    }
}
