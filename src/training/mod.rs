mod diagnostics;
mod trainer;

pub use diagnostics::{Diagnostics, EvalSplit, LogDiagnostics, Recorder, TrainEvent};
pub use trainer::{EpochSummary, ProxTrainer};
