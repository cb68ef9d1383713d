//! Register map of the AD5934 (datasheet p. 20).
//!
//! Every register is declared as a single byte at its own address. Multi-byte
//! quantities (frequencies, counts, DFT results) are split across consecutive
//! byte registers, most significant byte at the lowest address, so the bus
//! only ever sees one-byte reads and writes.

device_driver::create_device!(
    device_name: Ad5934Registers,
    dsl: {
        config {
            type RegisterAddressType = u8;
        }
        /// Control register, upper byte: operation code, output range and PGA gain.
        register ControlHigh {
            const ADDRESS = 0x80;
            const SIZE_BITS = 8;

            /// Set for PGA gain ×1, clear for ×5.
            pga_gain: bool = 0,
            output_range: uint = 1..3,
            operation: uint = 4..8,
        },
        /// Control register, lower byte: soft reset and clock source.
        register ControlLow {
            const ADDRESS = 0x81;
            const SIZE_BITS = 8;

            external_clock: bool = 3,
            soft_reset: bool = 4,
        },
        register StartFrequencyHigh {
            const ADDRESS = 0x82;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        },
        register StartFrequencyMid {
            const ADDRESS = 0x83;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        },
        register StartFrequencyLow {
            const ADDRESS = 0x84;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        },
        register IncrementFrequencyHigh {
            const ADDRESS = 0x85;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        },
        register IncrementFrequencyMid {
            const ADDRESS = 0x86;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        },
        register IncrementFrequencyLow {
            const ADDRESS = 0x87;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        },
        /// Number of increments, bit 8.
        register IncrementCountHigh {
            const ADDRESS = 0x88;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        },
        register IncrementCountLow {
            const ADDRESS = 0x89;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        },
        /// Settling cycles: bits 2:1 multiplier, bit 0 count bit 8.
        register SettlingCyclesHigh {
            const ADDRESS = 0x8A;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        },
        register SettlingCyclesLow {
            const ADDRESS = 0x8B;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        },
        register DeviceStatus {
            type Access = RO;
            const ADDRESS = 0x8F;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        },
        register RealDataHigh {
            type Access = RO;
            const ADDRESS = 0x94;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        },
        register RealDataLow {
            type Access = RO;
            const ADDRESS = 0x95;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        },
        register ImagDataHigh {
            type Access = RO;
            const ADDRESS = 0x96;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        },
        register ImagDataLow {
            type Access = RO;
            const ADDRESS = 0x97;
            const SIZE_BITS = 8;

            value: uint = 0..8,
        }
    }
);

impl<I> Ad5934Registers<I> {
    /// Give back the bus interface.
    pub fn release(self) -> I {
        let Ad5934Registers { interface, .. } = self;
        interface
    }

    pub fn interface_mut(&mut self) -> &mut I {
        &mut self.interface
    }
}

/// Register addresses, for bus implementations and test doubles.
pub mod address {
    pub const CONTROL_HIGH: u8 = 0x80;
    pub const CONTROL_LOW: u8 = 0x81;
    pub const START_FREQUENCY: u8 = 0x82;
    pub const INCREMENT_FREQUENCY: u8 = 0x85;
    pub const INCREMENT_COUNT: u8 = 0x88;
    pub const SETTLING_CYCLES: u8 = 0x8A;
    pub const STATUS: u8 = 0x8F;
    pub const REAL_DATA: u8 = 0x94;
    pub const IMAG_DATA: u8 = 0x96;
}
