use std::fmt::{self, Display};

use log::info;

/// Which matrix an epoch was evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalSplit {
    /// The held-out matrix.
    Test,
    /// The training matrix, when no held-out matrix was given.
    Train,
}

impl Display for EvalSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalSplit::Test => f.write_str("test"),
            EvalSplit::Train => f.write_str("train"),
        }
    }
}

/// Something worth reporting during training.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainEvent {
    /// The loss of a single batch, every `log_every` steps.
    BatchLoss { epoch: usize, step: usize, loss: f32 },
    /// The evaluation loss at the end of an epoch.
    EpochLoss {
        epoch: usize,
        split: EvalSplit,
        reconstruction: f32,
        regularization: f32,
    },
    /// The amount of terms whose decoder column is zero.
    InactiveTerms { epoch: usize, count: usize },
    /// The share of unannotated gene-term pairs whose annotated weight is zero.
    DeactivatedGenes { epoch: usize, share: f32 },
}

/// A sink for training events.
pub trait Diagnostics {
    fn record(&mut self, event: &TrainEvent);
}

impl<F: FnMut(&TrainEvent)> Diagnostics for F {
    fn record(&mut self, event: &TrainEvent) {
        self(event)
    }
}

impl Display for TrainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TrainEvent::BatchLoss { epoch, step, loss } => {
                write!(f, "epoch {epoch} | step {step} | batch train loss: {loss:.4}")
            }
            TrainEvent::EpochLoss {
                epoch,
                split,
                reconstruction,
                regularization,
            } => write!(
                f,
                "epoch {epoch} | {split} loss: {:.4} (reconstruction {reconstruction:.4}, regularization {regularization:.4})",
                reconstruction + regularization
            ),
            TrainEvent::InactiveTerms { epoch, count } => {
                write!(f, "epoch {epoch} | deactivated terms: {count}")
            }
            TrainEvent::DeactivatedGenes { epoch, share } => {
                write!(f, "epoch {epoch} | share of deactivated inactive genes: {share:.4}")
            }
        }
    }
}

/// Emits every event through the `log` facade, with the epoch and step also attached as
/// key-values.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn record(&mut self, event: &TrainEvent) {
        match *event {
            TrainEvent::BatchLoss { epoch, step, .. } => {
                info!(epoch = epoch, step = step; "{event}");
            }
            TrainEvent::EpochLoss { epoch, .. }
            | TrainEvent::InactiveTerms { epoch, .. }
            | TrainEvent::DeactivatedGenes { epoch, .. } => {
                info!(epoch = epoch; "{event}");
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub events: Vec<TrainEvent>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Diagnostics for Recorder {
    fn record(&mut self, event: &TrainEvent) {
        self.events.push(event.clone());
    }
}
