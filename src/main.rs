use std::error::Error;

use ad5934::sim::{CountingDelay, SimulatedAd5934};
use ad5934::{Ad5934Driver, CalibrationTable, DeviceConfig, SweepProgram};

fn main() -> Result<(), Box<dyn Error>> {
    let mut driver = Ad5934Driver::new(SimulatedAd5934::default(), CountingDelay::default());
    driver.configure(&DeviceConfig::default())?;

    let program = SweepProgram::default();
    println!(
        "Sweep {} Hz .. {} Hz, {} points",
        program.start_frequency,
        program.end_frequency(),
        program.points()
    );

    let reference = driver.run_sweep(&program)?;
    let table = CalibrationTable::from_reference(&reference, 200_000.0)?;

    let measured = driver.run_sweep(&program)?;
    let spectrum = table.apply(&measured)?;

    for i in (0..spectrum.len()).step_by(100) {
        println!(
            "{:>7} Hz  |Z| = {:>10.1} Ω  phase = {:+.4} rad",
            spectrum.frequency_at(i),
            spectrum.impedance(i).unwrap_or(f32::NAN),
            spectrum.phase()[i]
        );
    }

    println!("Control register: 0x{:04X}", driver.read_control_register()?);
    Ok(())
}
