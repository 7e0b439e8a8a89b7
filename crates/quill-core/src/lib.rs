//! # Quill Core
//!
//! The domain layer of the Quill blog backend.
//! This crate contains the post lifecycle rules, slug generation, and the
//! ports that infrastructure must implement. It has zero infrastructure
//! dependencies.

pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

pub use error::{DomainError, RepoError};
