//! # Blogforge
//!
//! A retrieval-augmented blog content backend: research a topic across an
//! embedded knowledge base (and optionally the web), then outline, draft,
//! review and SEO-optimize a post through a bounded workflow.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Knowledge  │──▶│ Chunk+Embed  │──▶│ SQLite       │
//! │  uploads    │   │              │   │ docs+vectors │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │
//!                     ┌───────────────────────┤
//!                     ▼                       ▼
//!              ┌────────────┐          ┌────────────┐
//!              │  Research  │─────────▶│  Workflow  │──▶ outline, draft,
//!              │  KB + web  │          │    FSM     │    review, SEO
//!              └────────────┘          └────────────┘
//! ```
//!
//! Runtime-agnostic logic (models, chunker, prompts, the workflow state
//! machine) lives in `blogforge-core`; this crate adds providers,
//! persistence and the CLI/HTTP frontends.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`provider`] | OpenAI / Ollama clients with retry |
//! | [`cache`] | Completion and embedding cache |
//! | [`web_search`] | Exa-style web search |
//! | [`sqlite_store`] | Durable vector store |
//! | [`repository`] | Documents, research sessions, content records |
//! | [`knowledge`] | Upload, search, delete |
//! | [`content`] | Research and single-shot generation |
//! | [`workflow`] | Blog workflow runner |
//! | [`context`] | Service wiring |
//! | [`server`] | HTTP API |

pub mod cache;
pub mod config;
pub mod content;
pub mod context;
pub mod db;
pub mod knowledge;
pub mod migrate;
pub mod provider;
pub mod repository;
pub mod server;
pub mod sqlite_store;
pub mod web_search;
pub mod workflow;
