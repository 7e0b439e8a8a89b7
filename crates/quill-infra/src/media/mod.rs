//! Media storage implementations.

mod local;

pub use local::{LocalMediaConfig, LocalMediaStore};
