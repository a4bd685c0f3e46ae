//! End-to-end acquisition loop tests against the synthetic backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use mvgrab::camera::{CameraSession, PlannedFrame, SyntheticProvider, SyntheticSpec};
use mvgrab::frame::RgbFrame;
use mvgrab::settings::CameraSettings;
use mvgrab::sink::{FrameSink, SinkKind, SinkSet};
use mvgrab::stream::{run_stream, StreamOptions};

/// Records the first byte of every frame it sees (the synthetic scene is
/// uniform, so that byte is the frame's sequence number) and requests a
/// stop once `stop_after` frames have arrived.
struct RecordingSink {
    levels: Arc<Mutex<Vec<u8>>>,
    stop_after: usize,
}

impl FrameSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Recorder
    }

    fn accept(&mut self, frame: &RgbFrame) -> Result<()> {
        let level = frame.as_bytes().first().copied().unwrap_or(0);
        self.levels.lock().unwrap().push(level);
        Ok(())
    }

    fn poll_stop(&mut self) -> bool {
        self.levels.lock().unwrap().len() >= self.stop_after
    }
}

fn test_options() -> StreamOptions {
    StreamOptions {
        frame_timeout: Duration::from_millis(10),
        ..StreamOptions::default()
    }
}

fn open_session(spec: SyntheticSpec) -> CameraSession {
    let serial = spec.info.serial.clone();
    let provider = SyntheticProvider::with_devices(vec![spec]);
    let mut session = CameraSession::open(&provider, &serial).unwrap();
    session.configure(&CameraSettings::default()).unwrap();
    session.start().unwrap();
    session
}

#[test]
fn corrupt_frames_are_skipped_without_reaching_sinks() {
    let plan = vec![
        PlannedFrame::Good,
        PlannedFrame::Good,
        PlannedFrame::Corrupt,
        PlannedFrame::Good,
        PlannedFrame::Good,
        PlannedFrame::Corrupt,
        PlannedFrame::Good,
        PlannedFrame::Good,
    ];
    let session = open_session(SyntheticSpec::new("stub://cam0").with_plan(plan));

    let levels = Arc::new(Mutex::new(Vec::new()));
    let mut sinks = SinkSet::new();
    sinks.push(Box::new(RecordingSink {
        levels: levels.clone(),
        stop_after: 6,
    }));

    let stop = AtomicBool::new(false);
    let stats = run_stream(session, sinks, &stop, &test_options());

    assert_eq!(stats.frames_processed, 6);
    assert_eq!(stats.frames_skipped, 2);

    // Only the good frames arrived, in capture order; the corrupt slots
    // (sequence 2 and 5) are absent.
    let seen = levels.lock().unwrap().clone();
    assert_eq!(seen, vec![0, 1, 3, 4, 6, 7]);
}

#[test]
fn teardown_closes_device_even_when_stream_stop_fails() {
    let spec = SyntheticSpec::new("stub://cam1");
    let probe = spec.probe();
    probe.fail_stop.store(true, Ordering::Relaxed);
    let session = open_session(spec);

    let levels = Arc::new(Mutex::new(Vec::new()));
    let mut sinks = SinkSet::new();
    sinks.push(Box::new(RecordingSink {
        levels,
        stop_after: 3,
    }));

    let stop = AtomicBool::new(false);
    let stats = run_stream(session, sinks, &stop, &test_options());

    assert_eq!(stats.frames_processed, 3);
    // Stop was attempted, its injected failure did not prevent close.
    assert!(probe.stop_attempted.load(Ordering::Relaxed));
    assert!(probe.closed.load(Ordering::Relaxed));
}

#[test]
fn external_stop_flag_ends_the_loop_before_any_frame() {
    let spec = SyntheticSpec::new("stub://cam2");
    let probe = spec.probe();
    let session = open_session(spec);

    let mut sinks = SinkSet::new();
    sinks.push(Box::new(RecordingSink {
        levels: Arc::new(Mutex::new(Vec::new())),
        stop_after: usize::MAX,
    }));

    let stop = AtomicBool::new(true);
    let stats = run_stream(session, sinks, &stop, &test_options());

    assert_eq!(stats.frames_processed, 0);
    assert_eq!(stats.frames_skipped, 0);
    assert_eq!(probe.frames_served.load(Ordering::Relaxed), 0);
    assert!(probe.closed.load(Ordering::Relaxed));
}

#[test]
fn serial_is_released_after_teardown() {
    let provider = SyntheticProvider::single("stub://cam3");

    let session = {
        let mut session = CameraSession::open(&provider, "stub://cam3").unwrap();
        session.configure(&CameraSettings::default()).unwrap();
        session.start().unwrap();
        session
    };
    assert!(CameraSession::open(&provider, "stub://cam3").is_err());

    let mut sinks = SinkSet::new();
    sinks.push(Box::new(RecordingSink {
        levels: Arc::new(Mutex::new(Vec::new())),
        stop_after: 1,
    }));
    run_stream(session, sinks, &AtomicBool::new(false), &test_options());

    // The handle was released, so the device can be opened again.
    assert!(CameraSession::open(&provider, "stub://cam3").is_ok());
}
