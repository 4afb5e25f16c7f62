//! Request handlers.

pub mod annotations;
pub mod health;
pub mod search;
pub mod videos;

pub use health::{health, ready};
