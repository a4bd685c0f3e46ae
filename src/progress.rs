//! Progress reporting for the command-line tools.
//!
//! Pretty variant renders an `indicatif` bar on stderr; the plain variant
//! (non-TTY, e.g. piped logs) emits periodic log lines instead.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub enum Progress {
    Pretty(ProgressBar),
    Plain {
        label: String,
        total: u64,
        every: u64,
        count: u64,
    },
    Quiet,
}

impl Progress {
    pub fn frames(label: &str, total: u64, is_tty: bool) -> Self {
        if is_tty {
            let bar = ProgressBar::new(total);
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar.set_message(label.to_string());
            Progress::Pretty(bar)
        } else {
            Progress::Plain {
                label: label.to_string(),
                total,
                every: (total / 10).max(1),
                count: 0,
            }
        }
    }

    pub fn quiet() -> Self {
        Progress::Quiet
    }

    pub fn tick(&mut self) {
        match self {
            Progress::Pretty(bar) => bar.inc(1),
            Progress::Plain {
                label,
                total,
                every,
                count,
            } => {
                *count += 1;
                if *count % *every == 0 || *count == *total {
                    log::info!("{}: {}/{}", label, count, total);
                }
            }
            Progress::Quiet => {}
        }
    }

    pub fn done(self, message: &str) {
        match self {
            Progress::Pretty(bar) => bar.finish_with_message(message.to_string()),
            Progress::Plain { .. } => log::info!("{}", message),
            Progress::Quiet => {}
        }
    }
}
