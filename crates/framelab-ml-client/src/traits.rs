//! Inference seams.

use async_trait::async_trait;

use crate::error::MlResult;
use crate::types::Detection;

/// Open-vocabulary object detector.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Detect instances of `prompt` in an encoded image.
    ///
    /// Boxes are in pixel coordinates of the submitted image, in the order
    /// the model produced them.
    async fn segment(&self, image: &[u8], prompt: &str) -> MlResult<Vec<Detection>>;
}

/// Image and text embedding model sharing one vector space.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input image, in input order.
    async fn embed_images(&self, images: &[Vec<u8>]) -> MlResult<Vec<Vec<f32>>>;

    async fn embed_text(&self, query: &str) -> MlResult<Vec<f32>>;
}
