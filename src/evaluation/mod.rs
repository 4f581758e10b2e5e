//! Held-out evaluation of a trained model

pub mod evaluator;
pub mod report;

pub use evaluator::{render_labels, score, EvaluationReport, MetricsRecord, ModelEvaluator};
pub use report::{render_confusion_svg, summary_caption};
