mod common;

use crate::common::{init, MockDecoder, MockDevice, REV_TICKS};
use fluxread::{prelude::*, AcquireOutcome};

fn target(c: u16, h: u8) -> TrackTarget {
    TrackTarget::new(DiskCh::new(c, h))
}

#[test]
fn test_retry_convergence() {
    init();
    let mut device = MockDevice::new();
    let decoder = MockDecoder::new(Some(2));

    let result = {
        let mut session = ReadSession::prepare(&mut device, ReadSettings::default()).unwrap();
        match session.acquire(target(5, 0), Some(&decoder)) {
            Ok(result) => result,
            Err(e) => panic!("Failed to acquire track: {}", e),
        }
    };

    assert_eq!(result.outcome, AcquireOutcome::Complete);
    assert!(result.is_complete());
    assert_eq!(result.reads, 2);
    assert_eq!(result.reseeks, 0);
    assert_eq!(device.reads.len(), 2);
    assert_eq!(device.seeks, vec![(5, 0)]);
    assert_eq!(result.track.as_ref().map(|t| t.nr_missing()), Some(0));

    // Both captures are merged into the returned flux.
    assert_eq!(result.flux.index_list().len(), 8);
}

#[test]
fn test_retry_gives_up_without_seek_retries() {
    init();
    let mut device = MockDevice::new();
    let decoder = MockDecoder::new(None);
    let settings = ReadSettings::default().with_retries(3).with_seek_retries(0);

    let result = {
        let mut session = ReadSession::prepare(&mut device, settings).unwrap();
        session.acquire(target(0, 1), Some(&decoder)).unwrap()
    };

    assert_eq!(result.outcome, AcquireOutcome::GaveUp { missing: 2 });
    // One initial capture and three retries.
    assert_eq!(result.reads, 4);
    assert_eq!(result.seek_retry, 1);
    assert_eq!(result.reseeks, 0);
    assert_eq!(device.seeks, vec![(0, 1)]);
    assert!(result.track.is_some());
}

#[test]
fn test_retry_seek_retries_reseek_via_track_zero() {
    init();
    let mut device = MockDevice::new();
    let decoder = MockDecoder::new(None);
    let settings = ReadSettings::default().with_retries(3).with_seek_retries(1);

    let result = {
        let mut session = ReadSession::prepare(&mut device, settings).unwrap();
        session.acquire(target(40, 0), Some(&decoder)).unwrap()
    };

    assert_eq!(result.outcome, AcquireOutcome::GaveUp { missing: 2 });
    assert_eq!(result.reads, 7);
    assert_eq!(result.reseeks, 1);
    assert_eq!(device.seeks, vec![(40, 0), (0, 0), (40, 0)]);
}

#[test]
fn test_retry_reads_at_least_three_revs() {
    init();
    let mut device = MockDevice::new();
    let decoder = MockDecoder::new(Some(3));
    let settings = ReadSettings::default().with_revs(Revs::Whole(1));

    {
        let mut session = ReadSession::prepare(&mut device, settings).unwrap();
        let result = session.acquire(target(1, 0), Some(&decoder)).unwrap();
        assert!(result.is_complete());
    }

    assert_eq!(device.reads, vec![(1, 0), (3, 0), (3, 0)]);
}

#[test]
fn test_retry_runs_pll_ladder_in_order() {
    init();
    let mut device = MockDevice::new();
    let decoder = MockDecoder::new(Some(2));
    let manual = PllParams::new(10, 30);
    let ladder = PllLadder::default().with_override(manual);
    let settings = ReadSettings::default().with_pll_ladder(ladder.clone());

    {
        let mut session = ReadSession::prepare(&mut device, settings).unwrap();
        session.acquire(target(2, 0), Some(&decoder)).unwrap();
    }

    let log = decoder.pll_log.borrow();
    // The initial capture is decoded with the whole ladder, the override first. The retry
    // capture completes the track on its first pass.
    let mut expected: Vec<PllParams> = ladder.iter().copied().collect();
    expected.push(manual);
    assert_eq!(*log, expected);
}

#[test]
fn test_out_of_range_track() {
    init();
    let mut device = MockDevice::new();
    let decoder = MockDecoder::new(Some(1));

    let result = {
        let mut session = ReadSession::prepare(&mut device, ReadSettings::default()).unwrap();
        session.acquire(target(80, 0), Some(&decoder)).unwrap()
    };

    assert_eq!(result.outcome, AcquireOutcome::OutOfRange);
    assert!(result.track.is_none());
    assert_eq!(result.reads, 1);
    assert!(!result.flux.is_empty());
}

#[test]
fn test_raw_capture_without_decoder() {
    init();
    let mut device = MockDevice::new();

    let result = {
        let mut session = ReadSession::prepare(&mut device, ReadSettings::default()).unwrap();
        session.acquire(target(3, 1), None).unwrap()
    };

    assert_eq!(result.outcome, AcquireOutcome::Raw);
    assert_eq!(result.reads, 1);
    assert_eq!(result.reports.len(), 1);
    assert!(result.reports[0].to_string().starts_with("T3.1: Raw Flux ("));
    assert_eq!(device.reads, vec![(3, 0)]);
}

#[test]
fn test_device_error_propagates() {
    init();
    let mut device = MockDevice::failing_after(2);
    let decoder = MockDecoder::new(None);

    let mut session = ReadSession::prepare(&mut device, ReadSettings::default()).unwrap();
    match session.acquire(target(0, 0), Some(&decoder)) {
        Err(FluxReadError::CommandError(msg)) => assert!(msg.contains("No Index")),
        Err(e) => panic!("Unexpected error: {}", e),
        Ok(_) => panic!("Acquire should fail when the device fails"),
    }
}

#[test]
fn test_fake_index_capture() {
    init();
    let mut device = MockDevice::new();
    let settings = ReadSettings::default().with_fake_index(0.2);

    let flux = {
        let mut session = ReadSession::prepare(&mut device, settings).unwrap();
        assert_eq!(session.drive_ticks_per_rev(), Some(REV_TICKS as f64));
        session.read_and_normalise(3, 0).unwrap()
    };

    // Three revolutions plus twice the 0.5ms pre-roll, bounded by time alone.
    assert_eq!(device.reads, vec![(0, 3 * REV_TICKS + 1000)]);
    let index = flux.index_list();
    assert_eq!(index.len(), 4);
    assert_eq!(index[0], 500.0);
    assert_eq!(index[1] - index[0], REV_TICKS as f64);
    assert_eq!(flux.ticks_per_rev(), Some(REV_TICKS as f64));
}

#[test]
fn test_partial_revs_measure_drive_speed() {
    init();
    let mut device = MockDevice::new();
    let settings = ReadSettings::default().with_revs(Revs::Partial(1.5));

    {
        let session = ReadSession::prepare(&mut device, settings).unwrap();
        assert_eq!(session.revs(), 2);
        assert_eq!(session.ticks(), REV_TICKS * 3 / 2);
        assert_eq!(session.drive_ticks_per_rev(), Some(REV_TICKS as f64));
    }
    assert_eq!(device.reads, vec![(2, 0)]);

    // Raw captures read whole revolutions and do not measure the drive.
    let mut device = MockDevice::new();
    let settings = ReadSettings::default().with_revs(Revs::Partial(1.5)).with_raw(true);
    let session = ReadSession::prepare(&mut device, settings).unwrap();
    assert_eq!((session.revs(), session.ticks()), (2, 0));
    drop(session);
    assert!(device.reads.is_empty());
}

#[test]
fn test_adjust_speed_scales_capture() {
    init();
    let mut device = MockDevice::new();
    let settings = ReadSettings::default().with_adjust_speed(0.1);

    let mut session = ReadSession::prepare(&mut device, settings).unwrap();
    let flux = session.read_and_normalise(2, 0).unwrap();
    let tpr = flux.time_per_rev().unwrap();
    assert!((tpr - 0.1).abs() < 1e-9, "time per rev was {}", tpr);
}

#[test]
fn test_adjust_speed_applies_to_every_capture() {
    init();
    let mut device = MockDevice::new();
    let decoder = MockDecoder::new(Some(2));
    let settings = ReadSettings::default().with_adjust_speed(0.1);

    let result = {
        let mut session = ReadSession::prepare(&mut device, settings).unwrap();
        match session.acquire(target(3, 1), Some(&decoder)) {
            Ok(result) => result,
            Err(e) => panic!("Failed to acquire track: {}", e),
        }
    };

    assert_eq!(result.outcome, AcquireOutcome::Complete);
    assert_eq!(result.reads, 2);

    // Two captures of three revolutions each, both scaled from 200ms to 100ms per revolution.
    let index_list = result.flux.index_list();
    assert_eq!(index_list.len(), 8);
    let expected = REV_TICKS as f64 / 2.0;
    for capture in index_list.chunks(4) {
        for pair in capture.windows(2) {
            let spacing = pair[1] - pair[0];
            assert!((spacing - expected).abs() < 1e-6, "index spacing was {}", spacing);
        }
    }

    // Every flux interval was scaled by the same factor.
    assert!(result.flux.intervals().iter().all(|&t| (t - 2.0).abs() < 1e-9));
}

#[test]
fn test_invalid_retries_rejected() {
    let mut device = MockDevice::new();
    match ReadSession::prepare(&mut device, ReadSettings::default().with_retries(0)) {
        Err(FluxReadError::ConfigError(_)) => {}
        _ => panic!("Zero retries should be rejected"),
    }
}
