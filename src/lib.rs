pub mod analyze;
pub mod capability;
pub mod core;
pub mod export;
pub mod extract;
pub mod reconcile;

pub use crate::core::cancel::CancelFlag;
pub use crate::core::error::PipelineError;
pub use crate::core::fields::FieldRegistry;
pub use crate::core::model::{
    Document, Extraction, Figure, FigureRecord, Page, QuestionAnswerPair, ScanVerdict,
};
pub use crate::extract::{ExtractorConfig, FigureExtractor};
