//! Client for the inference service.
//!
//! The service hosts an open-vocabulary detector and an image/text
//! embedding model. Both are reached over HTTP; pipeline code depends on the
//! [`Detector`] and [`Embedder`] traits so one client handle can be created
//! at worker startup and shared by every job.

pub mod client;
pub mod error;
pub mod traits;
pub mod types;

pub use client::{MlClient, MlClientConfig};
pub use error::{MlError, MlResult};
pub use traits::{Detector, Embedder};
pub use types::Detection;
