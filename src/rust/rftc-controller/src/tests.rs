// Copyright 2025 RFTC Developers
// SPDX-License-Identifier: Apache-2.0

use super::*;
use std::collections::BTreeMap;

use rftc_common::{
    AwgId, CaptureUnitId, DigitalOutId, DigitalOutTrigger, ExternalTrigger, StgId,
};
use rftc_log::{Level, MemoryDiagnostics};
use rftc_sequence::flattened::StepRecord;
use rftc_sequence::{
    CaptureConfig, CaptureSequence, Cycles, DigitalOutputSequence, DigitalOutputVector,
    ParameterBlock, SampleFormat, Stimulus, WaveSequence, WaveSpec,
};

use crate::regmap::{
    AWG, AWG_RAM_BASE, CAPTURE, CAPTURE_CONFIG_ADDR, CAPTURE_PARAM_AREA, CHUNK_ADDR,
    CHUNK_REPEATS, CHUNK_WAVE_WORDS, DATA_ADDR, DATA_LEN, DIGITAL_OUT, EXTERNAL_TRIGGER_ENABLE,
    NUM_CHUNKS, PARAM_ADDR, PARAM_LEN, STG, capture_result_addr, ctrl, digital_out_addr,
};

struct Session {
    device: SimulatedDevice,
    clock: SimulatedClock,
    diagnostics: MemoryDiagnostics,
    controller: Controller<SimulatedDevice>,
}

fn session() -> Session {
    session_with(ControllerSettings::default())
}

fn session_with(settings: ControllerSettings) -> Session {
    session_logging_to(settings, MemoryDiagnostics::new())
}

fn session_logging_to(settings: ControllerSettings, diagnostics: MemoryDiagnostics) -> Session {
    let device = SimulatedDevice::new();
    let clock = SimulatedClock::new();
    let controller = Controller::new(device.clone())
        .with_clock(clock.clone())
        .with_diagnostics(diagnostics.clone())
        .with_settings(settings)
        .unwrap();
    Session {
        device,
        clock,
        diagnostics,
        controller,
    }
}

fn read_u64(device: &SimulatedDevice, addr: u32) -> u64 {
    u64::from(device.register(addr)) | (u64::from(device.register(addr + 4)) << 32)
}

fn sine(frequency_mhz: f64, cycles: u32) -> WaveSpec {
    WaveSpec::Sine {
        frequency_mhz,
        amplitude: 1000.0,
        phase_deg: 0.0,
        cycles: Cycles::Finite(cycles),
    }
}

fn stimulus(num_samples: usize) -> Stimulus {
    let mut stimulus = Stimulus::new(0, 1).unwrap();
    stimulus.add_chunk(vec![7; num_samples], 2, 3).unwrap();
    stimulus
}

#[test]
fn test_start_pulses_exactly_the_requested_units() {
    let Session {
        device,
        mut controller,
        ..
    } = session();
    controller
        .awg()
        .start(&[AwgId::U0, AwgId::U2, AwgId::U5])
        .unwrap();

    let pulses = device.pulses();
    let bits: Vec<u32> = pulses.iter().map(|p| p.bit).collect();
    assert_eq!(bits, vec![ctrl::PREPARE, ctrl::START]);
    for pulse in &pulses {
        assert_eq!(pulse.module, "AWG");
        assert_eq!(pulse.selected, vec![0, 2, 5]);
    }
    assert_eq!(device.register(AWG.target_select()), 0);
    assert_eq!(device.register(AWG.master_ctrl()), 0);
    assert_eq!(
        controller.awg().states(&[AwgId::U0, AwgId::U1]).unwrap(),
        vec![(AwgId::U0, UnitState::Active), (AwgId::U1, UnitState::Idle)]
    );
}

#[test]
fn test_empty_unit_list_touches_nothing() {
    let Session {
        device,
        mut controller,
        ..
    } = session();
    controller.stg().start(&[]).unwrap();
    controller.capture().reset(&[]).unwrap();
    assert!(device.register_writes().is_empty());
    assert!(device.pulses().is_empty());
}

#[test]
fn test_wait_for_stop_times_out() {
    let Session {
        clock,
        diagnostics,
        mut controller,
        ..
    } = session();
    let timeout = Duration::from_secs(1);
    let err = controller
        .awg()
        .wait_for_stop(timeout, &[AwgId::U0])
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.pending_units(), &[0]);
    let elapsed = clock.now();
    assert!(elapsed >= timeout);
    assert!(elapsed <= timeout + controller.settings().poll_interval());
    assert!(!diagnostics.messages_at(Level::Warn).is_empty());
}

#[test]
fn test_wait_for_stop_sees_late_completion() {
    let Session {
        device,
        clock,
        mut controller,
        ..
    } = session();
    device.set_register_after_reads(AWG.status(3), 3, 1 << regmap::status::DONE);
    controller
        .awg()
        .wait_for_stop(Duration::from_secs(1), &[AwgId::U3])
        .unwrap();
    assert_eq!(clock.now(), Duration::from_millis(30));
}

#[test]
fn test_verbose_wait_reports_every_round() {
    let Session {
        device,
        diagnostics,
        mut controller,
        ..
    } = session_logging_to(ControllerSettings::default(), MemoryDiagnostics::verbose());
    device.set_register_after_reads(AWG.status(0), 2, 1 << regmap::status::DONE);
    controller
        .awg()
        .wait_for_stop(Duration::from_secs(1), &[AwgId::U0])
        .unwrap();
    let rounds: Vec<String> = diagnostics
        .messages_at(Level::Info)
        .into_iter()
        .filter(|m| m.contains("Waiting for AWG units [0] to become done"))
        .collect();
    assert_eq!(rounds.len(), 2);

    let Session {
        device,
        diagnostics,
        mut controller,
        ..
    } = session();
    device.set_register_after_reads(AWG.status(0), 2, 1 << regmap::status::DONE);
    controller
        .awg()
        .wait_for_stop(Duration::from_secs(1), &[AwgId::U0])
        .unwrap();
    assert!(!diagnostics.contains("Waiting for"));
}

#[test]
fn test_cancelled_wait() {
    let Session {
        clock,
        mut controller,
        ..
    } = session();
    let token = CancelToken::new();
    token.cancel();
    let err = controller
        .capture()
        .wait_for_stop_with_cancel(
            Duration::from_secs(5),
            &[CaptureUnitId::U1, CaptureUnitId::U4],
            &token,
        )
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled { .. }));
    assert_eq!(err.pending_units(), &[1, 4]);
    assert_eq!(clock.now(), Duration::ZERO);
}

#[test]
fn test_start_timeout_releases_selection() {
    let settings = ControllerSettings {
        ready_timeout_ms: 100,
        ..Default::default()
    };
    let Session {
        device,
        mut controller,
        ..
    } = session_with(settings);
    device.set_auto_ready(false);
    let err = controller
        .stg()
        .start(&[StgId::U0, StgId::U1])
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.pending_units(), &[0, 1]);
    assert_eq!(device.register(STG.target_select()), 0);
    assert_eq!(device.register(STG.master_ctrl()), 0);
    assert!(device.pulses().iter().all(|p| p.bit != ctrl::START));
}

#[test]
fn test_drop_after_failed_start_releases_once() {
    let settings = ControllerSettings {
        ready_timeout_ms: 50,
        ..Default::default()
    };
    let Session {
        device,
        mut controller,
        ..
    } = session_with(settings);
    device.set_auto_ready(false);
    assert!(controller.awg().start(&[AwgId::U4]).unwrap_err().is_timeout());
    drop(controller);
    assert_eq!(device.release_count(), 1);
}

#[test]
fn test_pause_resume_and_restart() {
    let Session {
        device,
        mut controller,
        ..
    } = session();
    let units = [StgId::U2];
    let mut stg = controller.stg();
    stg.start(&units).unwrap();
    assert_eq!(stg.state(StgId::U2).unwrap(), UnitState::Active);
    stg.pause(&units).unwrap();
    assert_eq!(stg.state(StgId::U2).unwrap(), UnitState::Paused);
    stg.resume(&units).unwrap();
    assert_eq!(stg.state(StgId::U2).unwrap(), UnitState::Active);
    stg.terminate(&units).unwrap();
    assert_eq!(stg.state(StgId::U2).unwrap(), UnitState::Idle);

    device.set_auto_complete(true);
    stg.restart(&units).unwrap();
    assert_eq!(stg.state(StgId::U2).unwrap(), UnitState::Done);
    stg.wait_for_stop(Duration::from_millis(1), &units).unwrap();
    stg.clear_done(&units).unwrap();
    assert_eq!(stg.state(StgId::U2).unwrap(), UnitState::Idle);
    stg.wait_for_idle(&units).unwrap();
}

#[test]
fn test_register_failure_is_propagated() {
    let Session {
        device,
        mut controller,
        ..
    } = session();
    device.fail_register(AWG.target_select());
    let err = controller.awg().reset(&[AwgId::U0]).unwrap_err();
    assert!(matches!(err, Error::Register(_)));
    assert!(device.pulses().is_empty());
}

#[test]
fn test_wave_sequence_upload() {
    let Session {
        device,
        diagnostics,
        mut controller,
        ..
    } = session();
    let mut first = WaveSequence::new(1000.0, false).unwrap();
    first.add_step(0, sine(10.0, 2), 0.0).unwrap();
    let mut second = WaveSequence::new(1000.0, false).unwrap();
    second.add_step(4, sine(20.0, 1), 10.0).unwrap();
    let images = [
        first.to_image(SampleFormat::DEFAULT),
        second.to_image(SampleFormat::DEFAULT),
    ];
    controller
        .awg()
        .set_wave_sequences(BTreeMap::from([(AwgId::U1, first), (AwgId::U7, second)]))
        .unwrap();

    for (awg, image) in [1, 7].into_iter().zip(&images) {
        let unit = AWG.unit(awg);
        let param_addr = read_u64(&device, unit + PARAM_ADDR);
        let data_addr = read_u64(&device, unit + DATA_ADDR);
        assert!(param_addr >= AWG_RAM_BASE);
        assert_eq!(param_addr % regmap::DRAM_ALIGN, 0);
        assert_eq!(data_addr % regmap::DRAM_ALIGN, 0);
        assert_eq!(device.register(unit + PARAM_LEN) as usize, image.parameters.len());
        assert_eq!(read_u64(&device, unit + DATA_LEN), image.samples.len() as u64);
        assert_eq!(
            device.memory(param_addr, image.parameters.len()),
            image.parameters.to_vec()
        );
        assert_eq!(device.memory(data_addr, image.samples.len()), image.samples.to_vec());
    }
    assert_eq!(read_u64(&device, AWG.unit(1) + PARAM_ADDR), AWG_RAM_BASE);
    assert_eq!(controller.awg().wave_sequence(AwgId::U7).unwrap().num_steps(), 1);
    assert!(controller.awg().wave_sequence(AwgId::U0).is_none());
    assert!(diagnostics.contains("Uploaded"));
}

#[test]
fn test_oversized_batch_is_rejected_before_writing() {
    let settings = ControllerSettings {
        wave_ram_size: 3000,
        ..Default::default()
    };
    let Session {
        device,
        mut controller,
        ..
    } = session_with(settings);
    let stimuli = BTreeMap::from([(StgId::U0, stimulus(1024)), (StgId::U1, stimulus(1024))]);
    let err = controller.stg().set_stimuli(&stimuli).unwrap_err();
    assert!(matches!(
        err,
        Error::CapacityExceeded {
            required: 4096,
            capacity: 3000
        }
    ));
    assert!(device.dram_writes().is_empty());
    assert!(device.register_writes().is_empty());

    let mut long = WaveSequence::new(1000.0, false).unwrap();
    long.add_step(0, sine(1.0, 2), 0.0).unwrap();
    let err = controller
        .awg()
        .set_wave_sequences(BTreeMap::from([(AwgId::U0, long)]))
        .unwrap_err();
    assert!(matches!(err, Error::CapacityExceeded { .. }));
    assert!(device.dram_writes().is_empty());
}

#[test]
fn test_huge_repeat_count_is_rejected_before_synthesis() {
    let Session {
        device,
        mut controller,
        ..
    } = session();
    let mut huge = WaveSequence::new(1000.0, false).unwrap();
    huge.add_step(
        0,
        WaveSpec::ArbitraryReal {
            samples: vec![0; 1024],
            cycles: Cycles::Finite(u32::MAX),
        },
        0.0,
    )
    .unwrap();
    let err = controller
        .awg()
        .set_wave_sequences(BTreeMap::from([(AwgId::U0, huge)]))
        .unwrap_err();
    assert!(matches!(err, Error::CapacityExceeded { .. }));
    assert!(device.dram_writes().is_empty());
    assert!(device.register_writes().is_empty());
    assert!(controller.awg().wave_sequence(AwgId::U0).is_none());
}

#[test]
fn test_stimulus_upload_fills_chunk_table() {
    let Session {
        device,
        mut controller,
        ..
    } = session();
    let mut second = Stimulus::new(4, 2).unwrap();
    second
        .add_chunk(vec![1; 1024], 0, 1)
        .unwrap()
        .add_chunk(vec![2; 2048], 8, 5)
        .unwrap();
    let stimuli = BTreeMap::from([(StgId::U0, stimulus(1024)), (StgId::U3, second)]);
    controller.stg().set_stimuli(&stimuli).unwrap();

    assert_eq!(read_u64(&device, STG.chunk(0, 0) + CHUNK_ADDR), 0);
    assert_eq!(read_u64(&device, STG.chunk(3, 0) + CHUNK_ADDR), 2048);
    assert_eq!(read_u64(&device, STG.chunk(3, 1) + CHUNK_ADDR), 4096);
    assert_eq!(device.register(STG.chunk(3, 1) + CHUNK_WAVE_WORDS), 128);
    assert_eq!(device.register(STG.chunk(3, 1) + CHUNK_REPEATS), 5);
    assert_eq!(device.register(STG.unit(3) + NUM_CHUNKS), 2);
    assert_eq!(read_u64(&device, STG.unit(3) + DATA_LEN), 6144);
    assert_eq!(
        device.memory(4096, 4096),
        SampleFormat::DEFAULT.serialize_i16(&[2; 2048]).to_vec()
    );
}

#[test]
fn test_capture_hazard_is_reported_after_upload() {
    let Session {
        device,
        diagnostics,
        mut controller,
        ..
    } = session();
    // 100 ns of wave plus 50 ns of blank
    let mut waves = WaveSequence::new(1000.0, false).unwrap();
    waves
        .add_step(0, sine(10.0, 1), 50.0)
        .unwrap()
        .add_step(1, sine(10.0, 1), 0.0)
        .unwrap();
    let mut capture = CaptureSequence::new(AwgId::U1, 1000.0, false).unwrap();
    capture
        .add_step(0, 100.0, 200.0, false)
        .unwrap()
        .add_step(1, 100.0, 20.0, false)
        .unwrap();
    let mut config = CaptureConfig::new();
    config
        .add_capture_sequence(CaptureUnitId::U3, capture)
        .unwrap();

    controller.capture().set_capture_config(config).unwrap();
    assert!(controller.capture().hazards().is_empty());
    assert_eq!(
        read_u64(&device, CAPTURE.config_addr()),
        CAPTURE_CONFIG_ADDR
    );
    assert_eq!(
        read_u64(&device, CAPTURE.unit(3) + DATA_ADDR),
        capture_result_addr(3) + CAPTURE_PARAM_AREA
    );

    controller
        .awg()
        .set_wave_sequences(BTreeMap::from([(AwgId::U1, waves)]))
        .unwrap();
    let hazards = controller.capture().hazards();
    assert_eq!(hazards.len(), 1);
    assert_eq!(hazards[0].unit, CaptureUnitId::U3);
    assert_eq!(hazards[0].step_id, 0);
    let capture = controller.capture();
    assert!(capture.is_capture_step_skipped(CaptureUnitId::U3, 0));
    assert!(!capture.is_capture_step_skipped(CaptureUnitId::U3, 1));
    assert!(!capture.is_capture_step_skipped(CaptureUnitId::U0, 0));
    assert_eq!(diagnostics.messages_at(Level::Warn).len(), 1);
    assert!(diagnostics.contains("skips step 0"));
}

#[test]
fn test_read_captured() {
    let Session {
        device,
        mut controller,
        ..
    } = session();
    let block = ParameterBlock {
        is_iq: false,
        sampling_rate_msps: 500.0,
        records: vec![StepRecord {
            step_id: 9,
            infinite: false,
            num_prime_samples: 20,
            num_post_blank_samples: 5,
        }],
    };
    let mut stored: Vec<i16> = (0..20).collect();
    stored.resize(32, 0);
    let addr = capture_result_addr(2);
    device.load_memory(addr, &block.encode());
    device.load_memory(
        addr + CAPTURE_PARAM_AREA,
        &SampleFormat::DEFAULT.serialize_i16(&stored),
    );

    let captured = controller.capture().read_captured(CaptureUnitId::U2).unwrap();
    assert_eq!(captured.step_ids(), vec![9]);
    let step = captured.get(9).unwrap().as_real().unwrap();
    assert_eq!(step.samples(), &stored[..20]);
    assert_eq!(step.post_blank_ns(), 10.0);

    assert!(
        controller
            .capture()
            .read_captured(CaptureUnitId::U0)
            .is_err()
    );
}

#[test]
fn test_read_captured_rejects_implausible_sample_counts() {
    let Session {
        device,
        mut controller,
        ..
    } = session();
    for num_prime_samples in [1 << 40, u64::MAX - 3] {
        let block = ParameterBlock {
            is_iq: true,
            sampling_rate_msps: 500.0,
            records: vec![StepRecord {
                step_id: 1,
                infinite: false,
                num_prime_samples,
                num_post_blank_samples: 0,
            }],
        };
        device.load_memory(capture_result_addr(5), &block.encode());
        let err = controller
            .capture()
            .read_captured(CaptureUnitId::U5)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Common(rftc_common::Error::Format(_))
        ));
    }
}

#[test]
fn test_digital_output_upload() {
    let Session {
        device,
        mut controller,
        ..
    } = session();
    let mut vector = DigitalOutputVector::new(10.0).unwrap();
    vector.add(0b1010_0101, 100.0).unwrap().add(0, 20.0).unwrap();
    let mut sequence = DigitalOutputSequence::new();
    sequence.add_step(0, vector).unwrap();
    let payload = sequence.serialize();

    controller
        .digital_out()
        .set_sequences(&BTreeMap::from([(DigitalOutId::U2, sequence)]))
        .unwrap();
    let unit = DIGITAL_OUT.unit(2);
    assert_eq!(read_u64(&device, unit + PARAM_ADDR), digital_out_addr(2));
    assert_eq!(device.register(unit + PARAM_LEN) as usize, payload.len());
    assert_eq!(
        device.memory(digital_out_addr(2), payload.len()),
        payload.to_vec()
    );
}

#[test]
fn test_trigger_masks() {
    let Session {
        device,
        mut controller,
        ..
    } = session();
    let mut triggers = controller.triggers();
    triggers
        .set_external_triggers_enabled(&[ExternalTrigger::Line0, ExternalTrigger::Line2], true)
        .unwrap();
    triggers
        .set_external_triggers_enabled(&[ExternalTrigger::Line0], false)
        .unwrap();
    assert_eq!(
        triggers.enabled_external_triggers().unwrap(),
        vec![ExternalTrigger::Line2]
    );
    assert_eq!(device.register(EXTERNAL_TRIGGER_ENABLE), 0b100);

    let mut awg = controller.awg();
    awg.set_external_start_trigger(ExternalTrigger::Line1, &[AwgId::U3, AwgId::U15], true)
        .unwrap();
    assert_eq!(
        awg.external_start_trigger_units(ExternalTrigger::Line1)
            .unwrap(),
        vec![AwgId::U3, AwgId::U15]
    );
    assert!(
        awg.external_start_trigger_units(ExternalTrigger::Line0)
            .unwrap()
            .is_empty()
    );

    let mut dout = controller.digital_out();
    dout.set_cooperative_trigger(
        DigitalOutTrigger::Pause,
        &[DigitalOutId::U0, DigitalOutId::U3],
        true,
    )
    .unwrap();
    assert_eq!(
        dout.cooperative_trigger_units(DigitalOutTrigger::Pause)
            .unwrap(),
        vec![DigitalOutId::U0, DigitalOutId::U3]
    );
    assert!(
        dout.cooperative_trigger_units(DigitalOutTrigger::Start)
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_release_on_drop_and_close() {
    let Session {
        device, controller, ..
    } = session();
    drop(controller);
    assert_eq!(device.release_count(), 1);

    let Session {
        device, controller, ..
    } = session();
    controller.close().unwrap();
    assert_eq!(device.release_count(), 1);
}

#[test]
fn test_release_failure() {
    let Session {
        device,
        diagnostics,
        controller,
        ..
    } = session();
    device.fail_release(true);
    drop(controller);
    assert!(diagnostics.contains("Failed to release"));
    assert_eq!(device.release_count(), 0);

    let Session {
        device, controller, ..
    } = session();
    device.fail_release(true);
    assert!(matches!(controller.close(), Err(Error::Register(_))));
}

#[test]
fn test_settings_are_sanitized() {
    let settings = ControllerSettings {
        poll_interval_ms: 0,
        ..Default::default()
    };
    let Session {
        diagnostics,
        controller,
        ..
    } = session_with(settings);
    assert_eq!(controller.settings().poll_interval_ms, 1);
    assert!(diagnostics.contains("poll_interval_ms"));

    let invalid = ControllerSettings {
        sample_width_bits: 20,
        ..Default::default()
    };
    assert!(
        Controller::new(SimulatedDevice::new())
            .with_settings(invalid)
            .is_err()
    );
}
