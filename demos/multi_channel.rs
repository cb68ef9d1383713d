//! Multi-channel example - six sensors behind one multiplexer
//!
//! This example demonstrates:
//! - Implementing `ChannelSelect` for a bus multiplexer
//! - Acquiring a baseline and a later measurement with `acquire_all`
//! - Per-channel failure isolation (channel 3 refuses selection)
//! - Grading the resonance shift between the two acquisitions
//!
//! Run with: `cargo run --example multi_channel`

use ad5934::analysis::DEFAULT_WINDOW;
use ad5934::sim::{CountingDelay, SimulatedAd5934};
use ad5934::{
    acquire_all, grade_channels, Ad5934Driver, ChannelSelect, ChannelSpectrum, Component,
    ComplexSample, Conversion, DeviceConfig, SweepProgram,
};

const CHANNELS: [u8; 6] = [0, 1, 2, 3, 4, 5];

/// Mock TCA9548A-style multiplexer; channel 3 has a broken connector
struct MockMux {
    current: Option<u8>,
}

#[derive(Debug)]
struct NoAck;

impl ChannelSelect for MockMux {
    type Error = NoAck;

    fn select_channel(&mut self, channel: u8) -> Result<(), Self::Error> {
        if channel == 3 {
            println!("  mux: channel {} did not acknowledge", channel);
            return Err(NoAck);
        }
        self.current = Some(channel);
        Ok(())
    }
}

/// Resonance near point 100.
fn baseline_response(point: u16) -> ComplexSample {
    resonance(point, 100)
}

/// Resonance moved to point 112, as after binding.
fn shifted_response(point: u16) -> ComplexSample {
    resonance(point, 112)
}

fn resonance(point: u16, center: i32) -> ComplexSample {
    let d = point as i32 - center;
    let bump = 6000 * 64 / (64 + d * d);
    ComplexSample::new((8000 + bump) as i16, (-2000 + bump / 2) as i16)
}

fn acquire(
    response: fn(u16) -> ComplexSample,
    program: &SweepProgram,
    outputs: &mut [ChannelSpectrum],
) {
    let mut driver = Ad5934Driver::new(SimulatedAd5934::new(response), CountingDelay::default());
    driver.configure(&DeviceConfig::default()).unwrap();

    let mut mux = MockMux { current: None };
    let report = acquire_all(
        &mut driver,
        &mut mux,
        &CHANNELS,
        program,
        Conversion::Raw,
        outputs,
    )
    .unwrap();
    println!(
        "  {} channels valid, {} failed (last selected: {:?})",
        report.valid, report.failed, mux.current
    );
}

fn main() {
    println!("=== AD5934 Multi-Channel Demo ===\n");

    let program = SweepProgram {
        start_frequency: 40_000,
        increment_frequency: 50,
        increments: 250,
        ..SweepProgram::default()
    };

    let mut baseline: Vec<ChannelSpectrum> = vec![ChannelSpectrum::default(); CHANNELS.len()];
    let mut measurement = baseline.clone();

    println!("1. Baseline acquisition:");
    acquire(baseline_response, &program, &mut baseline);

    println!("\n2. Measurement acquisition:");
    acquire(shifted_response, &program, &mut measurement);

    println!("\n3. Per-channel status:");
    for (before, after) in baseline.iter().zip(&measurement) {
        println!(
            "   channel {}: {:?} / {:?}",
            before.channel, before.status, after.status
        );
    }

    println!("\n4. Resonance shift (magnitude, window {}):", DEFAULT_WINDOW);
    match grade_channels(&baseline, &measurement, Component::Magnitude, DEFAULT_WINDOW) {
        Ok((quality, mean)) => println!("   mean shift {:.1} points → {:?}", mean, quality),
        Err(e) => println!("   cannot grade: {}", e),
    }

    println!("\n=== Demo Complete ===");
}
