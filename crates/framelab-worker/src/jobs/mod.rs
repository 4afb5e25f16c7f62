//! Pipeline jobs.
//!
//! Each job wraps its queue payload and implements [`Job`](crate::runtime::Job).

mod auto_annotate;
mod embedding;
mod frame_extraction;

pub use auto_annotate::{AutoAnnotation, AutoAnnotationSummary};
pub use embedding::{EmbeddingExtraction, EmbeddingSummary};
pub use frame_extraction::{ExtractionCompleted, FrameExtraction};

use std::time::Duration;

use framelab_queue::RetryPolicy;

/// Three attempts, one minute apart.
pub fn extraction_retry_policy() -> RetryPolicy {
    RetryPolicy::fixed(3, Duration::from_secs(60))
}

/// Three attempts, two minutes apart. Shared by embeddings and auto-annotation.
pub fn inference_retry_policy() -> RetryPolicy {
    RetryPolicy::fixed(3, Duration::from_secs(120))
}
