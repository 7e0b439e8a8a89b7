//! # Quill Shared
//!
//! Wire types shared between the server and Rust clients.
//! Field names follow the JSON API (camelCase).

pub mod dto;
pub mod response;

pub use response::{ErrorResponse, MessageResponse};
