//! Frame sinks.
//!
//! A sink consumes decoded RGB frames: JPEG stills on disk, an MJPEG/AVI
//! recording, or a live preview window. Each sink is optional and
//! independently enabled at loop start; the loop dispatches every good
//! frame to all enabled sinks in a fixed order: stills, then preview,
//! then recorder.
//!
//! Sink failures never terminate the acquisition loop. They are logged,
//! and a sink that fails `MAX_CONSECUTIVE_SINK_FAILURES` times in a row is
//! considered unusable and disabled for the rest of the run.

#[cfg(feature = "preview")]
pub mod preview;
pub mod still;
pub mod video;

pub use still::StillImageSink;
pub use video::{AviWriter, VideoSink};

use anyhow::Result;

use crate::frame::RgbFrame;

/// Consecutive `accept` failures after which a sink is disabled.
pub const MAX_CONSECUTIVE_SINK_FAILURES: u32 = 30;

/// Dispatch class of a sink. Also determines teardown grouping: recorders
/// are flushed before camera teardown, the rest released after.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkKind {
    Still,
    Preview,
    Recorder,
}

const DISPATCH_ORDER: [SinkKind; 3] = [SinkKind::Still, SinkKind::Preview, SinkKind::Recorder];

/// Consumer of decoded frames.
pub trait FrameSink {
    fn name(&self) -> &'static str;

    fn kind(&self) -> SinkKind;

    /// Consume one frame. The frame is borrowed only for the duration of
    /// the call; sinks must not retain it.
    fn accept(&mut self, frame: &RgbFrame) -> Result<()>;

    /// Sink-originated stop request (e.g. preview window key press).
    fn poll_stop(&mut self) -> bool {
        false
    }

    /// Flush and release resources. Called once at teardown.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

struct SinkEntry {
    sink: Box<dyn FrameSink>,
    consecutive_failures: u32,
    disabled: bool,
    finished: bool,
}

/// The set of enabled sinks, dispatched in fixed order.
#[derive(Default)]
pub struct SinkSet {
    entries: Vec<SinkEntry>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn FrameSink>) {
        self.entries.push(SinkEntry {
            sink,
            consecutive_failures: 0,
            disabled: false,
            finished: false,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of sinks still enabled.
    pub fn active(&self) -> usize {
        self.entries.iter().filter(|e| !e.disabled).count()
    }

    /// Dispatch one frame to every enabled sink, stills first, preview
    /// next, recorders last. Failures are logged and counted per sink,
    /// never propagated.
    pub fn dispatch(&mut self, frame: &RgbFrame) {
        for kind in DISPATCH_ORDER {
            for entry in self.entries.iter_mut() {
                if entry.disabled || entry.sink.kind() != kind {
                    continue;
                }
                match entry.sink.accept(frame) {
                    Ok(()) => entry.consecutive_failures = 0,
                    Err(e) => {
                        entry.consecutive_failures += 1;
                        log::warn!(
                            "sink '{}' failed ({} consecutive): {e:#}",
                            entry.sink.name(),
                            entry.consecutive_failures
                        );
                        if entry.consecutive_failures >= MAX_CONSECUTIVE_SINK_FAILURES {
                            entry.disabled = true;
                            log::error!(
                                "sink '{}' disabled after {} consecutive failures",
                                entry.sink.name(),
                                entry.consecutive_failures
                            );
                        }
                    }
                }
            }
        }
    }

    /// True when any enabled sink requests a stop.
    pub fn stop_requested(&mut self) -> bool {
        self.entries
            .iter_mut()
            .filter(|e| !e.disabled)
            .any(|e| e.sink.poll_stop())
    }

    /// Flush recorder sinks to durable storage. First teardown step, runs
    /// before the camera handle is released.
    pub fn finish_recorders(&mut self) {
        self.finish_matching(|kind| kind == SinkKind::Recorder);
    }

    /// Release every remaining sink. Last teardown step.
    pub fn finish_remaining(&mut self) {
        self.finish_matching(|_| true);
    }

    fn finish_matching(&mut self, select: impl Fn(SinkKind) -> bool) {
        for entry in self.entries.iter_mut() {
            if entry.finished || !select(entry.sink.kind()) {
                continue;
            }
            entry.finished = true;
            if let Err(e) = entry.sink.finish() {
                log::warn!("sink '{}' teardown failed: {e:#}", entry.sink.name());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakySink {
        kind: SinkKind,
        fail: bool,
        accepted: Arc<AtomicU32>,
        finished: Arc<AtomicU32>,
    }

    impl FrameSink for FlakySink {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn kind(&self) -> SinkKind {
            self.kind
        }

        fn accept(&mut self, _frame: &RgbFrame) -> Result<()> {
            if self.fail {
                anyhow::bail!("injected failure");
            }
            self.accepted.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    fn frame() -> RgbFrame {
        RgbFrame::from_rgb_bytes(2, 2, vec![0; 12]).unwrap()
    }

    #[test]
    fn failing_sink_is_disabled_after_threshold_others_unaffected() {
        let good_count = Arc::new(AtomicU32::new(0));
        let mut sinks = SinkSet::new();
        sinks.push(Box::new(FlakySink {
            kind: SinkKind::Still,
            fail: true,
            accepted: Arc::new(AtomicU32::new(0)),
            finished: Arc::new(AtomicU32::new(0)),
        }));
        sinks.push(Box::new(FlakySink {
            kind: SinkKind::Recorder,
            fail: false,
            accepted: good_count.clone(),
            finished: Arc::new(AtomicU32::new(0)),
        }));

        let f = frame();
        for _ in 0..MAX_CONSECUTIVE_SINK_FAILURES {
            sinks.dispatch(&f);
        }
        assert_eq!(sinks.active(), 1);

        // The healthy sink saw every frame.
        assert_eq!(
            good_count.load(Ordering::Relaxed),
            MAX_CONSECUTIVE_SINK_FAILURES
        );
    }

    #[test]
    fn finish_runs_once_per_sink() {
        let finished = Arc::new(AtomicU32::new(0));
        let mut sinks = SinkSet::new();
        sinks.push(Box::new(FlakySink {
            kind: SinkKind::Recorder,
            fail: false,
            accepted: Arc::new(AtomicU32::new(0)),
            finished: finished.clone(),
        }));

        sinks.finish_recorders();
        sinks.finish_remaining();
        assert_eq!(finished.load(Ordering::Relaxed), 1);
    }
}
