use serde::Serialize;
use std::fmt;
use std::sync::Mutex;

/// Stages a collection run moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    ValidatingInput,
    Authenticating,
    FetchingCompany,
    ListingCollaborators,
    ProcessingCollaborators { index: usize, total: usize },
    Aggregating,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidatingInput => f.write_str("validating input"),
            Self::Authenticating => f.write_str("authenticating"),
            Self::FetchingCompany => f.write_str("fetching company"),
            Self::ListingCollaborators => f.write_str("listing collaborators"),
            Self::ProcessingCollaborators { index, total } => {
                write!(f, "processing collaborator {}/{total}", index + 1)
            }
            Self::Aggregating => f.write_str("aggregating"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub state: PipelineState,
    /// Between 0.0 and 1.0, never decreasing within a run.
    pub fraction: f64,
    pub message: String,
}

/// Receives progress notifications from a running pipeline.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

/// Discards every update.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}

// Share of the bar reserved for each broad phase.
pub(super) const AUTH_END: f64 = 0.10;
pub(super) const LISTING_END: f64 = 0.30;
pub(super) const PROCESSING_END: f64 = 0.90;

/// Clamps reported fractions so the sequence a sink sees is monotonic.
pub(super) struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    reached: Mutex<f64>,
}

impl<'a> ProgressTracker<'a> {
    pub(super) fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            reached: Mutex::new(0.0),
        }
    }

    pub(super) fn report(&self, state: PipelineState, fraction: f64, message: impl Into<String>) {
        let fraction = {
            let mut reached = self
                .reached
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *reached = reached.max(fraction.clamp(0.0, 1.0));
            *reached
        };

        self.sink.on_progress(&ProgressUpdate {
            state,
            fraction,
            message: message.into(),
        });
    }

    pub(super) fn fail(&self, message: impl Into<String>) {
        self.report(PipelineState::Failed, 0.0, message);
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;

    /// Sink that keeps every update, for assertions.
    #[derive(Default)]
    pub struct RecordingSink {
        pub updates: Mutex<Vec<ProgressUpdate>>,
    }

    impl RecordingSink {
        pub fn snapshot(&self) -> Vec<ProgressUpdate> {
            self.updates.lock().unwrap().clone()
        }
    }

    impl ProgressSink for RecordingSink {
        fn on_progress(&self, update: &ProgressUpdate) {
            self.updates.lock().unwrap().push(update.clone());
        }
    }
}
