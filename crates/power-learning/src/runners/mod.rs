//! Entry points behind the `train`, `evaluate` and `predict` commands.
//!
//! Each runner composes the loader, pipeline and artifact store for one
//! command and returns a report that renders as text (`Display`) or JSON
//! (`Serialize`).

mod evaluate;
mod predict;
mod train;

pub use evaluate::{EvaluationReport, EvaluationRunner};
pub use predict::{PredictionReport, PredictionRunner};
pub use train::{TrainingReport, TrainingRunner};
