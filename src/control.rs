//! Typed views of the control and status register fields.
//!
//! Each logical field of the control register gets its own enum with an
//! explicit mapping to the raw bits, so composing fields never relies on
//! OR-ing loose constants together.

/// Operation code held in bits 7:4 of control register 0x80.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    /// No operation. Also used to leave standby/power-down.
    NoOperation,
    /// Excite the load at the start frequency without measuring.
    InitializeStartFrequency,
    /// Begin measuring at the start frequency.
    StartSweep,
    /// Step to the next frequency point.
    IncrementFrequency,
    /// Measure the current frequency point again.
    RepeatFrequency,
    PowerDown,
    Standby,
}

impl Operation {
    pub const fn bits(self) -> u8 {
        match self {
            Operation::NoOperation => 0x0,
            Operation::InitializeStartFrequency => 0x1,
            Operation::StartSweep => 0x2,
            Operation::IncrementFrequency => 0x3,
            Operation::RepeatFrequency => 0x4,
            Operation::PowerDown => 0xA,
            Operation::Standby => 0xB,
        }
    }

    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0x0F {
            0x0 => Some(Operation::NoOperation),
            0x1 => Some(Operation::InitializeStartFrequency),
            0x2 => Some(Operation::StartSweep),
            0x3 => Some(Operation::IncrementFrequency),
            0x4 => Some(Operation::RepeatFrequency),
            0xA => Some(Operation::PowerDown),
            0xB => Some(Operation::Standby),
            _ => None,
        }
    }
}

/// Power state of the excitation and measurement path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerMode {
    /// Active, no command pending.
    On,
    /// Required state before programming a new sweep.
    Standby,
    PowerDown,
}

impl PowerMode {
    pub const fn operation(self) -> Operation {
        match self {
            PowerMode::On => Operation::NoOperation,
            PowerMode::Standby => Operation::Standby,
            PowerMode::PowerDown => Operation::PowerDown,
        }
    }
}

/// Excitation voltage range, bits 2:1 of control register 0x80.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputRange {
    /// 2.0 V p-p
    Range1,
    /// 1.0 V p-p
    Range2,
    /// 200 mV p-p
    Range3,
    /// 400 mV p-p
    Range4,
}

impl OutputRange {
    pub const fn bits(self) -> u8 {
        match self {
            OutputRange::Range1 => 0b00,
            OutputRange::Range2 => 0b11,
            OutputRange::Range3 => 0b01,
            OutputRange::Range4 => 0b10,
        }
    }

    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => OutputRange::Range1,
            0b11 => OutputRange::Range2,
            0b01 => OutputRange::Range3,
            _ => OutputRange::Range4,
        }
    }

    /// Typical peak-to-peak excitation in millivolts.
    pub const fn millivolts_pp(self) -> u16 {
        match self {
            OutputRange::Range1 => 2000,
            OutputRange::Range2 => 1000,
            OutputRange::Range3 => 200,
            OutputRange::Range4 => 400,
        }
    }
}

/// Receive-path PGA gain, bit 0 of control register 0x80.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PgaGain {
    X1,
    X5,
}

impl PgaGain {
    /// Value of the gain bit (`true` selects ×1).
    pub const fn bit(self) -> bool {
        matches!(self, PgaGain::X1)
    }

    pub const fn from_bit(bit: bool) -> Self {
        if bit {
            PgaGain::X1
        } else {
            PgaGain::X5
        }
    }
}

/// System clock source, bit 3 of control register 0x81.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    Internal,
    External,
}

impl ClockSource {
    /// Value of the external-clock bit.
    pub const fn bit(self) -> bool {
        matches!(self, ClockSource::External)
    }

    pub const fn from_bit(bit: bool) -> Self {
        if bit {
            ClockSource::External
        } else {
            ClockSource::Internal
        }
    }
}

/// Snapshot of status register 0x8F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u8);

impl Status {
    pub const DATA_VALID: u8 = 0x02;
    pub const SWEEP_COMPLETE: u8 = 0x04;
    /// Value reported when the device or bus is in an error state.
    pub const FAULT: u8 = 0xFF;

    pub const fn data_valid(self) -> bool {
        !self.is_fault() && self.0 & Self::DATA_VALID != 0
    }

    pub const fn sweep_complete(self) -> bool {
        !self.is_fault() && self.0 & Self::SWEEP_COMPLETE != 0
    }

    pub const fn is_fault(self) -> bool {
        self.0 == Self::FAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_codes_round_trip() {
        for op in [
            Operation::NoOperation,
            Operation::InitializeStartFrequency,
            Operation::StartSweep,
            Operation::IncrementFrequency,
            Operation::RepeatFrequency,
            Operation::PowerDown,
            Operation::Standby,
        ] {
            assert_eq!(Operation::from_bits(op.bits()), Some(op));
        }
        assert_eq!(Operation::from_bits(0x9), None);
    }

    #[test]
    fn test_range_bits_match_register_map() {
        // Shifted into place these are the datasheet's 0b000, 0b110, 0b010, 0b100.
        assert_eq!(OutputRange::Range1.bits() << 1, 0b000);
        assert_eq!(OutputRange::Range2.bits() << 1, 0b110);
        assert_eq!(OutputRange::Range3.bits() << 1, 0b010);
        assert_eq!(OutputRange::Range4.bits() << 1, 0b100);
        for r in [
            OutputRange::Range1,
            OutputRange::Range2,
            OutputRange::Range3,
            OutputRange::Range4,
        ] {
            assert_eq!(OutputRange::from_bits(r.bits()), r);
        }
    }

    #[test]
    fn test_status_flags() {
        assert!(Status(0x02).data_valid());
        assert!(!Status(0x02).sweep_complete());
        assert!(Status(0x06).sweep_complete());
        // the fault sentinel has every bit set but must not read as ready
        assert!(Status(0xFF).is_fault());
        assert!(!Status(0xFF).data_valid());
        assert!(!Status(0xFF).sweep_complete());
    }
}
