use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Mutex;

use super::styling::{bright, bright_green, bright_red, bright_yellow, check_mark};
use crate::pipeline::{PipelineState, ProgressSink, ProgressUpdate};

/// Progress bar on stderr driven by pipeline updates.
///
/// Each completed phase is printed above the bar with a check mark.
pub struct TerminalProgress {
    pb: ProgressBar,
    phase: Mutex<Option<&'static str>>,
}

impl TerminalProgress {
    pub fn start() -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());
        Self {
            pb: create_bar(),
            phase: Mutex::new(None),
        }
    }
}

impl ProgressSink for TerminalProgress {
    fn on_progress(&self, update: &ProgressUpdate) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        self.pb.set_position((update.fraction * 100.0).round() as u64);

        let mut phase = self
            .phase
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        match update.state {
            PipelineState::Done => {
                if let Some(previous) = phase.take() {
                    self.pb
                        .println(format!("  {} {}", bright_green(previous), check_mark()));
                }
                self.pb
                    .finish_with_message(bright_green(&update.message).to_string());
                eprintln!();
            }
            PipelineState::Failed => {
                phase.take();
                self.pb
                    .abandon_with_message(bright_red(format!("Failed: {}", update.message)).to_string());
                eprintln!();
            }
            state => {
                let current = phase_label(state);
                if let Some(previous) = phase.replace(current).filter(|p| *p != current) {
                    self.pb
                        .println(format!("  {} {}", bright_green(previous), check_mark()));
                }
                self.pb
                    .set_message(bright_yellow(&update.message).to_string());
            }
        }
    }
}

fn phase_label(state: PipelineState) -> &'static str {
    match state {
        PipelineState::ValidatingInput => "Input validated",
        PipelineState::Authenticating | PipelineState::FetchingCompany => "Authenticated",
        PipelineState::ListingCollaborators => "Collaborators listed",
        PipelineState::ProcessingCollaborators { .. } => "Payslips processed",
        PipelineState::Aggregating | PipelineState::Done | PipelineState::Failed => {
            "Archive built"
        }
    }
}

fn create_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
