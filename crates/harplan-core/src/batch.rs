//! Splitting normalized traffic into model-sized batches.

use crate::plan::ArtifactKind;
use crate::provider::ModelFamily;
use crate::traffic::TrafficRecord;

/// Records per code-generation batch, regardless of model.
pub const CODE_BATCH_SIZE: usize = 2;

/// Rough prompt cost of one endpoint, in tokens.
pub const DEFAULT_TOKENS_PER_ENDPOINT: usize = 1000;

/// How many records go into one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePolicy {
    /// A fixed number of records per batch.
    Fixed(usize),
    /// As many records as fit in `budget_tokens` at `tokens_per_endpoint`
    /// each (at least one).
    TokenBudget {
        budget_tokens: usize,
        tokens_per_endpoint: usize,
    },
}

impl SizePolicy {
    /// The effective chunk size. Never zero.
    pub fn chunk_size(&self) -> usize {
        match *self {
            Self::Fixed(n) => n.max(1),
            Self::TokenBudget {
                budget_tokens,
                tokens_per_endpoint,
            } => (budget_tokens / tokens_per_endpoint.max(1)).max(1),
        }
    }
}

/// Batch sizing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Records per batch for non-chat models and non-code artifacts.
    pub batch_size: usize,
    /// Token budget per request for chat-family models.
    pub token_size: usize,
    pub tokens_per_endpoint: usize,
    pub code_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            token_size: 4096,
            tokens_per_endpoint: DEFAULT_TOKENS_PER_ENDPOINT,
            code_batch_size: CODE_BATCH_SIZE,
        }
    }
}

impl BatchConfig {
    /// Pick the size policy for a model family and artifact kind.
    ///
    /// Code generation always uses small fixed batches. Chat models are
    /// sized from the token budget; everything else uses `batch_size`.
    pub fn policy(&self, family: ModelFamily, kind: ArtifactKind) -> SizePolicy {
        if kind == ArtifactKind::Code {
            return SizePolicy::Fixed(self.code_batch_size);
        }
        match family {
            ModelFamily::Chat => SizePolicy::TokenBudget {
                budget_tokens: self.token_size,
                tokens_per_endpoint: self.tokens_per_endpoint,
            },
            ModelFamily::Reasoning => SizePolicy::Fixed(self.batch_size),
        }
    }
}

/// A contiguous, non-empty slice of the normalized records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationBatch {
    /// Zero-based position of this batch in the run.
    pub index: usize,
    pub records: Vec<TrafficRecord>,
}

impl GenerationBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Split `records` into order-preserving chunks. Empty input yields no
/// batches.
pub fn batch(records: &[TrafficRecord], policy: SizePolicy) -> Vec<GenerationBatch> {
    records
        .chunks(policy.chunk_size())
        .enumerate()
        .map(|(index, chunk)| GenerationBatch {
            index,
            records: chunk.to_vec(),
        })
        .collect()
}

/// Approximate token count of `text` (about four characters per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}
