use thiserror::Error;

/// Failures the pipeline distinguishes between. Everything else travels as
/// `anyhow::Error` with context attached.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The summary text carries no usable `YYYY년 M월 D일` date.
    #[error("summary format error: {0}")]
    Format(String),

    /// An external call (document backend, summarizer, store, webhook) failed.
    #[error("{capability} failed: {message}")]
    Capability {
        capability: &'static str,
        message: String,
    },

    /// Children of one block could not be fetched; that subtree is omitted.
    #[error("child fetch failed for block {block_id}: {message}")]
    PartialFetch { block_id: String, message: String },

    #[error("block nesting depth {depth} exceeds limit {limit}")]
    DepthExceeded { depth: usize, limit: usize },
}

impl PipelineError {
    pub fn capability(capability: &'static str, message: impl Into<String>) -> Self {
        PipelineError::Capability {
            capability,
            message: message.into(),
        }
    }
}
