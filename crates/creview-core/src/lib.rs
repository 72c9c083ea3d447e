//! # creview core
//!
//! Runtime-free logic for creview: data models, C source chunking, the
//! guideline embedding index, structured-output extraction, prompt
//! builders, and the traits that external collaborators (embedding
//! providers, model callers, guideline stores) implement.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O. The `creview`
//! app crate supplies concrete providers and drives the pipeline.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod store;

pub use error::{Result, ReviewError};
