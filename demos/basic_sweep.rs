//! Basic sweep example - configure, calibrate and measure with one AD5934
//!
//! This example demonstrates:
//! - Wrapping a bus so every register access is printed
//! - One-shot device configuration via `DeviceConfig`
//! - Running a frequency sweep with bounded status polling
//! - Magnitude-only calibration against a known resistor
//!
//! The device is the register-level simulator from `ad5934::sim`; on real
//! hardware replace `TracingBus` with your I2C implementation of
//! `RegisterInterface`.
//!
//! Run with: `cargo run --example basic_sweep`

use ad5934::control::OutputRange;
use ad5934::sim::{SimError, SimulatedAd5934};
use ad5934::{
    Ad5934Driver, CalibrationTable, DelayUs, DeviceConfig, PollPolicy, RegisterInterface,
    SweepProgram,
};

/// Bus wrapper that prints writes while `verbose` is set
struct TracingBus {
    inner: SimulatedAd5934,
    verbose: bool,
}

impl RegisterInterface for TracingBus {
    type Error = SimError;
    type AddressType = u8;

    fn write_register(
        &mut self,
        address: Self::AddressType,
        size_bits: u32,
        data: &[u8],
    ) -> Result<(), Self::Error> {
        if self.verbose {
            println!("  → I2C write 0x{:02X} = 0x{:02X}", address, data[0]);
        }
        self.inner.write_register(address, size_bits, data)
    }

    fn read_register(
        &mut self,
        address: Self::AddressType,
        size_bits: u32,
        data: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.inner.read_register(address, size_bits, data)
    }
}

/// Mock delay provider for demonstration
///
/// In a real application, use embedded-hal delay traits
struct MockDelay;

impl DelayUs for MockDelay {
    fn delay_us(&mut self, _us: u32) {}
}

fn main() {
    println!("=== AD5934 Sweep Demo ===\n");

    let bus = TracingBus {
        inner: SimulatedAd5934::default(),
        verbose: true,
    };
    let mut driver = Ad5934Driver::with_config(
        bus,
        MockDelay,
        DeviceConfig {
            output_range: OutputRange::Range1,
            settling_cycles: 15,
            ..DeviceConfig::default()
        },
        PollPolicy {
            max_retries: 100,
            interval_us: 500,
        },
    );

    println!("1. Configure the device (reset, clock, range, gain, settling, standby):");
    let config = *driver.config();
    driver.configure(&config).unwrap();
    println!(
        "   Control register now 0x{:04X}\n",
        driver.read_control_register().unwrap()
    );

    let program = SweepProgram {
        start_frequency: 30_000,
        increment_frequency: 20,
        increments: 200,
        settling_cycles: 15,
        ..SweepProgram::default()
    };

    println!("2. Program the sweep registers:");
    driver.program_sweep(&program).unwrap();
    println!();

    // quiet from here, a sweep is hundreds of accesses
    driver.interface_mut().verbose = false;

    println!(
        "3. Sweep the 200 kΩ reference ({} Hz .. {} Hz):",
        program.start_frequency,
        program.end_frequency()
    );
    let reference = driver.run_sweep(&program).unwrap();
    let table = CalibrationTable::from_reference(&reference, 200_000.0).unwrap();
    println!("   {} gain factors computed", table.len());
    println!("   gain factor at start: {:.4e}\n", table.points()[0].gain_factor);

    println!("4. Sweep the unknown and apply calibration:");
    let measured = driver.run_sweep(&program).unwrap();
    let spectrum = table.apply(&measured).unwrap();

    for i in (0..spectrum.len()).step_by(40) {
        println!(
            "   {:>6} Hz  |Z| = {:>10.1} Ω  phase = {:+.4} rad",
            spectrum.frequency_at(i),
            spectrum.impedance(i).unwrap_or(f32::NAN),
            spectrum.phase()[i]
        );
    }

    println!("\n=== Demo Complete ===");
}
