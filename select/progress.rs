use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt;
use std::io::IsTerminal;

/// Stages reported during a grid search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SearchProgressStage {
    CrossValidation,
    Refit,
}

impl SearchProgressStage {
    pub fn describe(self) -> &'static str {
        match self {
            Self::CrossValidation => "cross-validated configurations",
            Self::Refit => "refit of the best configuration",
        }
    }
}

impl fmt::Display for SearchProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Observer for reporting incremental progress while searching.
///
/// Configurations may finish out of order when evaluated in parallel; the
/// `completed` count is monotone regardless.
pub trait SearchProgressObserver: Send {
    fn on_stage_start(&mut self, stage: SearchProgressStage, total: usize) {
        let _ = (stage, total);
    }
    fn on_stage_advance(&mut self, stage: SearchProgressStage, completed: usize) {
        let _ = (stage, completed);
    }
    fn on_stage_finish(&mut self, stage: SearchProgressStage) {
        let _ = stage;
    }
}

#[derive(Default)]
pub struct NoopSearchProgress;

impl SearchProgressObserver for NoopSearchProgress {}

/// Terminal progress bar on stderr; hidden when stderr is not a terminal.
#[derive(Default)]
pub struct ConsoleSearchProgress {
    bar: Option<ProgressBar>,
}

impl ConsoleSearchProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    if let Ok(style) = ProgressStyle::with_template(
        "> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message(message.to_string());
    pb
}

impl SearchProgressObserver for ConsoleSearchProgress {
    fn on_stage_start(&mut self, stage: SearchProgressStage, total: usize) {
        self.bar = Some(create_progress_bar(total as u64, stage.describe()));
    }

    fn on_stage_advance(&mut self, stage: SearchProgressStage, completed: usize) {
        let _ = stage;
        if let Some(bar) = &self.bar {
            bar.set_position(completed as u64);
        }
    }

    fn on_stage_finish(&mut self, stage: SearchProgressStage) {
        let _ = stage;
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
