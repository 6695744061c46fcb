use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::scheduler::SchedulerStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Terminal reporting for the `sightline` binary.
#[derive(Clone, Debug)]
pub struct Ui {
    pretty: bool,
}

impl Ui {
    /// `Auto` is pretty on a terminal unless `NO_COLOR` is set.
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        let disable_pretty = std::env::var_os("NO_COLOR").is_some();
        let pretty = is_tty
            && match mode {
                UiMode::Pretty => true,
                UiMode::Auto => !disable_pretty,
                UiMode::Plain => false,
            };
        Self { pretty }
    }

    pub fn is_pretty(&self) -> bool {
        self.pretty
    }

    /// Reports a start-up stage; the returned guard reports completion.
    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Live frame counter. `total` of zero means "until interrupted".
    pub fn session(&self, total: u64) -> SessionProgress {
        if !self.pretty {
            return SessionProgress { bar: None };
        }
        let bar = if total == 0 {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::new(total)
        };
        bar.set_draw_target(ProgressDrawTarget::stderr());
        let template = if total == 0 {
            "{spinner} {pos} frames {msg}"
        } else {
            "{bar:30} {pos}/{len} frames {msg}"
        };
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        SessionProgress { bar: Some(bar) }
    }

    pub fn summary(&self, stats: &SchedulerStats, elapsed: Duration) {
        eprintln!(
            "{} frames in {}: {} detected, {} dropped, {} passes ({} failed), {} utterances",
            stats.frames_seen,
            format_duration(elapsed),
            stats.frames_dispatched,
            stats.frames_dropped,
            stats.passes_completed,
            stats.passes_failed,
            stats.utterances
        );
    }
}

pub struct SessionProgress {
    bar: Option<ProgressBar>,
}

impl SessionProgress {
    pub fn frame(&self, stats: &SchedulerStats) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
            bar.set_message(format!(
                "({} dropped, {} spoken)",
                stats.frames_dropped, stats.utterances
            ));
        }
    }

    /// Prints a line without tearing the progress bar.
    pub fn println(&self, line: &str) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}"),
        }
    }
}

impl Drop for SessionProgress {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    failed: bool,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
            failed: false,
        }
    }

    /// Marks the stage as failed; the guard reports it on drop.
    pub fn fail(mut self) {
        self.failed = true;
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let mark = if self.failed { "✘" } else { "✔" };
        let message = format!("{} {} ({})", mark, self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
