//! Turn captured HTTP traffic into a merged, model-authored API test plan.
//!
//! The pipeline runs strictly forward:
//! [`traffic::normalize`] -> [`batch::batch`] -> [`prompt::build_prompt`] ->
//! [`generate::generate`] -> [`merge::merge`], with [`export`] rendering the
//! result.

pub mod batch;
pub mod error;
pub mod export;
pub mod generate;
pub mod merge;
pub mod plan;
pub mod prompt;
pub mod provider;
pub mod traffic;

pub use batch::{BatchConfig, GenerationBatch, SizePolicy};
pub use error::PipelineError;
pub use export::ExportFormat;
pub use generate::{GenerateOptions, GenerationReport, decode_reply, generate, generate_with_report};
pub use merge::{FuzzyConfig, merge, merge_with};
pub use plan::{ArtifactKind, PartialArtifact, TestPlan};
pub use provider::{ChatClient, OpenAiClient, ProviderConfig, ProviderError};
pub use traffic::{SourceFormat, TrafficRecord, normalize};
