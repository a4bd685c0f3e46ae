//! Frame acquisition loop.
//!
//! One logical thread of control: each iteration blocks on a frame request
//! up to its timeout, decodes, dispatches to the enabled sinks, then polls
//! for stop requests. A failed request (timeout, bad status, truncated
//! payload) is a recoverable condition: the iteration is skipped with a
//! warning, nothing reaches any sink, and the loop continues. The loop
//! never terminates because of a single bad frame.
//!
//! Teardown runs unconditionally once the loop has started, in a fixed
//! order: recorder sinks are flushed to durable storage, the camera handle
//! is stopped and closed (two independent best-effort steps), and the
//! remaining sinks are released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::camera::CameraSession;
use crate::sink::SinkSet;

#[derive(Clone, Debug)]
pub struct StreamOptions {
    /// Per-frame request timeout.
    pub frame_timeout: Duration,
    /// Throughput emission interval; the counter resets to zero at each
    /// emission boundary.
    pub throughput_interval: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            frame_timeout: Duration::from_millis(3000),
            throughput_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Frames decoded and dispatched to sinks.
    pub frames_processed: u64,
    /// Frame requests that produced no usable frame.
    pub frames_skipped: u64,
}

/// Run the acquisition loop until a stop request, consuming the session
/// and sinks. Teardown is guaranteed: it runs in the required order on
/// every exit path.
pub fn run_stream(
    mut session: CameraSession,
    mut sinks: SinkSet,
    stop: &AtomicBool,
    options: &StreamOptions,
) -> StreamStats {
    let stats = acquisition_loop(&mut session, &mut sinks, stop, options);

    sinks.finish_recorders();
    session.shutdown();
    sinks.finish_remaining();

    log::info!(
        "stream ended: {} frames processed, {} skipped",
        stats.frames_processed,
        stats.frames_skipped
    );
    stats
}

fn acquisition_loop(
    session: &mut CameraSession,
    sinks: &mut SinkSet,
    stop: &AtomicBool,
    options: &StreamOptions,
) -> StreamStats {
    let mut stats = StreamStats::default();
    let mut window_count = 0u64;
    let mut window_start = Instant::now();

    loop {
        if stop.load(Ordering::Relaxed) {
            log::info!("stop signal received");
            break;
        }
        if sinks.stop_requested() {
            log::info!("stop requested by sink");
            break;
        }

        let Some(mosaic) = session.request_frame(options.frame_timeout) else {
            stats.frames_skipped += 1;
            log::warn!("corrupt frame, skipping");
            continue;
        };

        let rgb = mosaic.into_rgb();
        sinks.dispatch(&rgb);
        stats.frames_processed += 1;
        window_count += 1;

        if window_start.elapsed() >= options.throughput_interval {
            log::info!("throughput: {} frames/s", window_count);
            window_count = 0;
            window_start = Instant::now();
        }
    }

    stats
}
