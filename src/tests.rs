use crate::registers::address;
use crate::sim::{CountingDelay, SimulatedAd5934, SimulatedMux};
use crate::{
    acquire_all, Ad5934Driver, CalibrationError, CalibrationTable, ChannelSpectrum, ChannelStatus,
    Conversion, DeviceConfig, OutputTooSmall, PollPolicy, ReferenceImpedance, Spectrum,
    SweepError, SweepFailure, SweepProgram,
};

fn driver(sim: SimulatedAd5934) -> Ad5934Driver<SimulatedAd5934, CountingDelay> {
    let mut d = Ad5934Driver::with_config(
        sim,
        CountingDelay::default(),
        DeviceConfig::default(),
        PollPolicy {
            max_retries: 3,
            interval_us: 100,
        },
    );
    d.configure(&DeviceConfig::default()).unwrap();
    d
}

fn short_program() -> SweepProgram {
    SweepProgram {
        start_frequency: 50_000,
        increment_frequency: 100,
        increments: 20,
        ..SweepProgram::default()
    }
}

#[test]
fn default_sweep_covers_start_to_end() {
    let mut d = driver(SimulatedAd5934::default());
    let result = d.run_sweep(&SweepProgram::default()).unwrap();

    assert_eq!(result.len(), 501);
    assert_eq!(result.frequency_at(0), 14_234);
    assert_eq!(result.frequency_at(500), 14_734);

    let (sim, _) = d.into_parts();
    assert_eq!(sim.start_code(), 0x1B_CD_84);
    assert_eq!(sim.increments(), 500);
    assert_eq!(sim.increment_commands(), 500);
}

#[test]
fn calibrating_against_the_reference_itself_is_identity() {
    let mut d = driver(SimulatedAd5934::default());
    let program = short_program();
    let reference = d.run_sweep(&program).unwrap();

    let table = CalibrationTable::from_reference(&reference, 1_000.0).unwrap();
    let spectrum = table.apply(&reference).unwrap();
    for i in 0..spectrum.len() {
        let z = spectrum.impedance(i).unwrap();
        assert!((z - 1_000.0).abs() < 0.01, "point {}: {}", i, z);
        assert!(spectrum.phase()[i].abs() < 1e-5);
    }

    let truth = [ReferenceImpedance::new(800.0, -600.0); 21];
    let table = CalibrationTable::from_complex_reference(&reference, &truth).unwrap();
    let spectrum = table.apply(&reference).unwrap();
    let expected_phase = libm::atan2f(-600.0, 800.0);
    for i in 0..spectrum.len() {
        assert!((spectrum.impedance(i).unwrap() - 1_000.0).abs() < 0.01);
        assert!((spectrum.phase()[i] - expected_phase).abs() < 1e-4);
    }
}

#[test]
fn table_rejects_sweep_from_other_program() {
    let mut d = driver(SimulatedAd5934::default());
    let reference = d.run_sweep(&short_program()).unwrap();
    let table = CalibrationTable::from_reference(&reference, 1_000.0).unwrap();

    let other = d
        .run_sweep(&SweepProgram {
            start_frequency: 60_000,
            ..short_program()
        })
        .unwrap();
    assert_eq!(table.apply(&other), Err(CalibrationError::ProgramMismatch));
}

#[test]
fn timeout_is_never_returned_as_data() {
    let mut sim = SimulatedAd5934::default();
    sim.never_ready = true;
    let mut d = driver(sim);
    match d.run_sweep(&short_program()) {
        Err(SweepError::Timeout { point: 0 }) => {}
        other => panic!("expected timeout, got {:?}", other),
    }
    let (_, delay) = d.into_parts();
    assert_eq!(delay.total_us, 3 * 100);
}

#[test]
fn failed_channel_does_not_disturb_neighbours() {
    let mut d = driver(SimulatedAd5934::default());
    let mut mux = SimulatedMux::failing_on(&[3]);
    let channels = [0, 1, 2, 3, 4, 5];
    let mut outputs = vec![ChannelSpectrum::default(); 6];

    let report = acquire_all(
        &mut d,
        &mut mux,
        &channels,
        &short_program(),
        Conversion::Raw,
        &mut outputs,
    )
    .unwrap();

    assert_eq!(report.valid, 5);
    assert_eq!(report.failed, 1);
    assert_eq!(mux.selections(), &[0, 1, 2, 4, 5]);

    let raw_sweep = {
        let mut reference = driver(SimulatedAd5934::default());
        reference.run_sweep(&short_program()).unwrap()
    };
    let expected = Spectrum::raw(&raw_sweep);

    for (i, out) in outputs.iter().enumerate() {
        assert_eq!(out.channel, channels[i]);
        if i == 3 {
            assert_eq!(out.status, ChannelStatus::SelectFailed);
            assert!(out.magnitude.is_empty());
            assert!(out.phase.is_empty());
        } else {
            assert_eq!(out.status, ChannelStatus::Valid);
            assert_eq!(&out.magnitude[..], expected.magnitude());
            assert_eq!(&out.phase[..], expected.phase());
        }
    }
}

#[test]
fn sweep_failure_marks_every_channel() {
    let mut sim = SimulatedAd5934::default();
    sim.fault_status = true;
    let mut d = driver(sim);
    let mut mux = SimulatedMux::default();
    let mut outputs = vec![ChannelSpectrum::default(); 2];

    let report = acquire_all(
        &mut d,
        &mut mux,
        &[7, 8],
        &short_program(),
        Conversion::Raw,
        &mut outputs,
    )
    .unwrap();

    assert_eq!(report.valid, 0);
    assert_eq!(report.failed, 2);
    for out in &outputs {
        assert_eq!(out.status, ChannelStatus::SweepFailed(SweepFailure::DeviceFault));
    }
    assert_eq!(outputs[1].channel, 8);
}

#[test]
fn sweep_failure_kind_is_reported_per_channel() {
    let mut mux = SimulatedMux::default();
    let mut outputs = vec![ChannelSpectrum::default(); 1];

    let mut sim = SimulatedAd5934::default();
    sim.never_ready = true;
    let mut d = driver(sim);
    acquire_all(&mut d, &mut mux, &[0], &short_program(), Conversion::Raw, &mut outputs).unwrap();
    assert_eq!(
        outputs[0].status,
        ChannelStatus::SweepFailed(SweepFailure::Timeout)
    );

    let mut sim = SimulatedAd5934::default();
    sim.fail_read_at = Some(address::IMAG_DATA);
    let mut d = driver(sim);
    acquire_all(&mut d, &mut mux, &[0], &short_program(), Conversion::Raw, &mut outputs).unwrap();
    assert_eq!(
        outputs[0].status,
        ChannelStatus::SweepFailed(SweepFailure::Transport)
    );
    assert!(outputs[0].magnitude.is_empty());
}

#[test]
fn missing_per_channel_table_is_a_calibration_failure() {
    let mut d = driver(SimulatedAd5934::default());
    let program = short_program();
    let reference = d.run_sweep(&program).unwrap();
    let tables = [CalibrationTable::from_reference(&reference, 1_000.0).unwrap()];

    let mut mux = SimulatedMux::default();
    let mut outputs = vec![ChannelSpectrum::default(); 2];
    let report = acquire_all(
        &mut d,
        &mut mux,
        &[0, 1],
        &program,
        Conversion::PerChannel(&tables),
        &mut outputs,
    )
    .unwrap();

    assert_eq!(report.valid, 1);
    assert_eq!(outputs[0].status, ChannelStatus::Valid);
    assert!((1.0 / outputs[0].magnitude[5] - 1_000.0).abs() < 0.01);
    assert_eq!(outputs[1].status, ChannelStatus::CalibrationFailed);
}

#[test]
fn short_output_buffer_is_rejected_before_any_bus_access() {
    let mut d = Ad5934Driver::new(SimulatedAd5934::default(), CountingDelay::default());
    let mut mux = SimulatedMux::default();
    let mut outputs = vec![ChannelSpectrum::default(); 2];

    assert_eq!(
        acquire_all(
            &mut d,
            &mut mux,
            &[0, 1, 2],
            &short_program(),
            Conversion::Raw,
            &mut outputs,
        ),
        Err(OutputTooSmall {
            channels: 3,
            slots: 2
        })
    );
    assert!(mux.selections().is_empty());
    let (sim, _) = d.into_parts();
    assert_eq!(sim.writes(), 0);
}
