//! Turnpike: the model-agnostic request core of a chat pipeline.
//!
//! Turnpike sits between an application's conversation state and its
//! backend SDK adapters. It resolves per-model sampling parameters,
//! applies model-specific request quirks, runs the recursive tool loop,
//! normalizes streamed events into one canonical order, classifies
//! failures into a uniform taxonomy, and coordinates per-turn
//! cancellation. It never speaks a wire protocol itself; backends are
//! supplied by the caller behind the [`backend::Backend`] trait.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use turnpike::models::{ModelCapabilities, ModelDescriptor, ModelFamily, ProviderDescriptor};
//! use turnpike::pipeline::{Pipeline, TurnRequest};
//! use turnpike::types::Turn;
//!
//! # async fn demo(backend: Arc<dyn turnpike::backend::Backend>) -> turnpike::Result<()> {
//! let pipeline = Pipeline::new(backend);
//! let model = ModelDescriptor::new(
//!     "gpt-4.1",
//!     ModelFamily::OpenAi,
//!     ModelCapabilities::full(128_000),
//! );
//! let provider = ProviderDescriptor::new("openai", "OpenAI");
//! let request = TurnRequest::new(model, provider, vec![Turn::user("hello")]);
//! let completion = pipeline.run_turn(request).await?;
//! println!("{}", completion.text);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cancel;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod prelude;
pub mod quirks;
pub mod resolve;
pub mod stream;
pub mod tools;
pub mod types;

pub use error::{Result, TurnpikeError};
