//! # Blogforge Core
//!
//! Runtime-agnostic logic for Blogforge: data models, the error taxonomy,
//! chunking, the vector store abstraction, the completion client trait
//! with structured output, research merging, prompt templates, content
//! generation, SEO metrics and the blog workflow state machine.
//!
//! This crate contains no tokio runtime, sqlx, HTTP client or filesystem
//! I/O. Provider clients and durable storage live in the `blogforge` app
//! crate and plug in through [`completion::CompletionClient`],
//! [`store::VectorStore`] and [`research::WebSearch`].

pub mod chunk;
pub mod completion;
pub mod content;
pub mod embedding;
pub mod error;
pub mod models;
pub mod prompts;
pub mod research;
pub mod seo;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod validate;
pub mod workflow;

pub use error::Error;
