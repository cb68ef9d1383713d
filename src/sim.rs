//! Register-file model of the AD5934 and a bus multiplexer, for tests and
//! demos.
//!
//! [`SimulatedAd5934`] implements [`RegisterInterface`] over a 256-byte
//! register file and reacts to control-register commands the way the part
//! does: start/increment/repeat latch a new DFT result and raise
//! data-valid, and the last point also raises sweep-complete. Faults can be
//! injected through its public fields.

use core::fmt;

use heapless::Vec;

use crate::channels::ChannelSelect;
use crate::codec::ComplexSample;
use crate::control::{Operation, Status};
use crate::registers::address;
use crate::{DelayUs, RegisterInterface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SimError {
    /// Injected transport failure.
    Nack { address: u8 },
    /// Access wider than one byte.
    UnsupportedWidth { size_bits: u32 },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Nack { address } => write!(f, "NACK at register 0x{:02X}", address),
            SimError::UnsupportedWidth { size_bits } => {
                write!(f, "{}-bit access, registers are 8 bits", size_bits)
            }
        }
    }
}

/// Simulated AD5934.
pub struct SimulatedAd5934 {
    memory: [u8; 256],
    point: u16,
    response: fn(u16) -> ComplexSample,
    operations: Vec<Operation, 64>,
    write_order: Vec<u8, 64>,
    increment_commands: u32,
    writes: u32,
    resets: u32,
    status_reads: u32,

    /// Never raise data-valid.
    pub never_ready: bool,
    /// Never raise sweep-complete.
    pub never_complete: bool,
    /// Status reads return the `0xFF` error sentinel.
    pub fault_status: bool,
    /// Status reads after the first `n` return the `0xFF` error sentinel.
    pub fault_after_status_reads: Option<u32>,
    /// Writes to this address fail with [`SimError::Nack`].
    pub fail_write_at: Option<u8>,
    /// Reads from this address fail with [`SimError::Nack`].
    pub fail_read_at: Option<u8>,
    /// Writes to this address are silently dropped.
    pub stuck_register: Option<u8>,
}

impl Default for SimulatedAd5934 {
    fn default() -> Self {
        Self::new(Self::default_response)
    }
}

impl SimulatedAd5934 {
    /// `response(point)` supplies the DFT result for each sweep point.
    pub fn new(response: fn(u16) -> ComplexSample) -> Self {
        SimulatedAd5934 {
            memory: [0; 256],
            point: 0,
            response,
            operations: Vec::new(),
            write_order: Vec::new(),
            increment_commands: 0,
            writes: 0,
            resets: 0,
            status_reads: 0,
            never_ready: false,
            never_complete: false,
            fault_status: false,
            fault_after_status_reads: None,
            fail_write_at: None,
            fail_read_at: None,
            stuck_register: None,
        }
    }

    /// A slowly rotating phasor with a resonance dip at point 250.
    pub fn default_response(point: u16) -> ComplexSample {
        let p = point as i32;
        let d = p - 250;
        let dip = 4000 * 400 / (400 + d * d);
        ComplexSample::new((12_000 - dip - p * 4) as i16, (-3_000 - p * 3) as i16)
    }

    /// Current value of a register.
    pub fn register(&self, addr: u8) -> u8 {
        self.memory[addr as usize]
    }

    /// Programmed start frequency code.
    pub fn start_code(&self) -> u32 {
        let a = address::START_FREQUENCY as usize;
        u32::from_be_bytes([0, self.memory[a], self.memory[a + 1], self.memory[a + 2]])
    }

    /// Programmed number of increments.
    pub fn increments(&self) -> u16 {
        let a = address::INCREMENT_COUNT as usize;
        u16::from_be_bytes([self.memory[a] & 0x01, self.memory[a + 1]])
    }

    /// Commands other than increment, in the order issued (first 64).
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Addresses of successful writes, in order (first 64).
    pub fn write_order(&self) -> &[u8] {
        &self.write_order
    }

    pub fn increment_commands(&self) -> u32 {
        self.increment_commands
    }

    /// Number of successful register writes.
    pub fn writes(&self) -> u32 {
        self.writes
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Number of successful status register reads.
    pub fn status_reads(&self) -> u32 {
        self.status_reads
    }

    fn status_faulted(&self) -> bool {
        match self.fault_after_status_reads {
            Some(n) => self.status_reads > n,
            None => self.fault_status,
        }
    }

    fn latch_sample(&mut self) {
        let sample = (self.response)(self.point);
        let [re_hi, re_lo] = sample.real.to_be_bytes();
        let [im_hi, im_lo] = sample.imag.to_be_bytes();
        let base = address::REAL_DATA as usize;
        self.memory[base..base + 4].copy_from_slice(&[re_hi, re_lo, im_hi, im_lo]);

        let mut status = 0;
        if !self.never_ready {
            status |= Status::DATA_VALID;
        }
        if self.point >= self.increments() && !self.never_complete {
            status |= Status::SWEEP_COMPLETE;
        }
        self.memory[address::STATUS as usize] = status;
    }

    fn command(&mut self, previous: Option<Operation>, op: Operation) {
        match op {
            Operation::IncrementFrequency => {
                self.increment_commands += 1;
                self.point += 1;
                self.latch_sample();
                return;
            }
            Operation::RepeatFrequency => {
                let _ = self.operations.push(op);
                self.latch_sample();
                return;
            }
            _ => {}
        }

        // rewriting the same command (read-modify-write of range/gain) is not a new command
        if previous == Some(op) {
            return;
        }
        let _ = self.operations.push(op);

        match op {
            Operation::InitializeStartFrequency => {
                self.point = 0;
                self.memory[address::STATUS as usize] = 0;
            }
            Operation::StartSweep => {
                self.point = 0;
                self.latch_sample();
            }
            _ => self.memory[address::STATUS as usize] = 0,
        }
    }
}

impl RegisterInterface for SimulatedAd5934 {
    type Error = SimError;
    type AddressType = u8;

    fn write_register(
        &mut self,
        address: Self::AddressType,
        size_bits: u32,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        if size_bits != 8 {
            return Err(SimError::UnsupportedWidth { size_bits });
        }
        if self.fail_write_at == Some(address) {
            return Err(SimError::Nack { address });
        }
        self.writes += 1;
        let _ = self.write_order.push(address);
        if self.stuck_register == Some(address) {
            return Ok(());
        }

        let value = data[0];
        match address {
            address::CONTROL_HIGH => {
                let previous = Operation::from_bits(self.memory[address as usize] >> 4);
                self.memory[address as usize] = value;
                if let Some(op) = Operation::from_bits(value >> 4) {
                    self.command(previous, op);
                }
            }
            address::CONTROL_LOW => {
                // reset is self-clearing
                if value & 0x10 != 0 {
                    self.resets += 1;
                    self.point = 0;
                    self.memory[address::STATUS as usize] = 0;
                }
                self.memory[address as usize] = value & !0x10;
            }
            _ => self.memory[address as usize] = value,
        }
        Ok(())
    }

    fn read_register(
        &mut self,
        address: Self::AddressType,
        size_bits: u32,
        data: &mut [u8],
    ) -> Result<(), Self::Error> {
        if size_bits != 8 {
            return Err(SimError::UnsupportedWidth { size_bits });
        }
        if self.fail_read_at == Some(address) {
            return Err(SimError::Nack { address });
        }
        if address == address::STATUS {
            self.status_reads += 1;
            if self.status_faulted() {
                data[0] = Status::FAULT;
                return Ok(());
            }
        }
        data[0] = self.memory[address as usize];
        Ok(())
    }
}

/// Delay provider that records how long it was asked to wait.
#[derive(Debug, Default)]
pub struct CountingDelay {
    pub total_us: u64,
    pub calls: u32,
}

impl DelayUs for CountingDelay {
    fn delay_us(&mut self, us: u32) {
        self.total_us += us as u64;
        self.calls += 1;
    }
}

/// Multiplexer model that can refuse chosen channels.
#[derive(Debug, Default)]
pub struct SimulatedMux {
    /// Channels whose selection fails.
    pub failing: Vec<u8, 8>,
    selections: Vec<u8, 32>,
}

impl SimulatedMux {
    pub fn failing_on(channels: &[u8]) -> Self {
        SimulatedMux {
            failing: Vec::from_slice(channels).unwrap_or_default(),
            selections: Vec::new(),
        }
    }

    /// Successfully selected channels, in order.
    pub fn selections(&self) -> &[u8] {
        &self.selections
    }
}

impl ChannelSelect for SimulatedMux {
    type Error = SimError;

    fn select_channel(&mut self, channel: u8) -> Result<(), Self::Error> {
        if self.failing.contains(&channel) {
            return Err(SimError::Nack { address: 0x70 });
        }
        let _ = self.selections.push(channel);
        Ok(())
    }
}
