//! # Content Pipeline
//!
//! Turn a video transcript or a web page into a summary or a full article
//! with an LLM, then publish the result to a document store.
//!
//! A run moves strictly forward:
//!
//! ```text
//! source reference ──► ContentSource ──► SourceText ──► enforce_budget ──► BudgetedText
//!                                                                              │
//!          ┌───────────────────────────────────────────────────────────────────┘
//!          ▼
//!   CompletionStage(s) ──► CompletionClient ──► Backend (rate-limit retry) ──► Artifact ──► Publisher(s)
//! ```
//!
//! ## Core Concepts
//!
//! - **[`ContentSource`](source::ContentSource)**: acquires normalized text
//!   from a video transcript or the paragraphs of a web page.
//! - **[`Tokenizer`](tokenizer::Tokenizer)**: counts and truncates text so
//!   the input never exceeds the token budget.
//! - **[`CompletionClient`]**: one chat completion per call. Rate-limited
//!   requests wait out a cooldown and are re-sent; every other failure
//!   surfaces immediately.
//! - **[`Pipeline`]**: runs a [`PipelineShape`] (summary, or outline then
//!   article) and records every state it passes through.
//! - **[`Publisher`](publish::Publisher)**: persists the artifact to Google
//!   Docs or a local file.
//!
//! ## Quick Start
//!
//! ```no_run
//! use content_pipeline::source::{HttpFetcher, WebSource};
//! use content_pipeline::publish::LocalFilePublisher;
//! use content_pipeline::tokenizer::{tokenizer_for_model, Tokenizer};
//! use content_pipeline::{Pipeline, PipelineConfig, PipelineShape, SourceRequest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::load(None)?;
//!     config.validate()?;
//!
//!     let tokenizer: Arc<dyn Tokenizer> = Arc::from(tokenizer_for_model(&config.model));
//!     let pipeline = Pipeline::builder(config.completion_client(None, None)?)
//!         .tokenizer(tokenizer.clone())
//!         .web_source(Arc::new(WebSource::new(HttpFetcher::new(reqwest::Client::new()), tokenizer)))
//!         .publisher(Arc::new(LocalFilePublisher::new("artifacts")))
//!         .token_limit(config.token_limit)
//!         .build()?;
//!
//!     let run = pipeline
//!         .run(SourceRequest::Web("https://en.wikipedia.org/wiki/Rust".into()), PipelineShape::Summarize)
//!         .await?;
//!     if let Some(reference) = run.reference() {
//!         println!("Summary saved: {}", reference);
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod cancel;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod prompt;
pub mod publish;
pub mod source;
pub mod stage;
pub mod tokenizer;
pub mod types;

pub use backend::{Backend, MockBackend, OpenAiBackend, RetryPolicy};
pub use cancel::Cancellation;
pub use client::{CompletionClient, CompletionClientBuilder};
pub use config::PipelineConfig;
pub use diagnostics::{CompletionDiagnostics, RunDiagnostics};
pub use error::{ErrorKind, PipelineError, Result};
pub use pipeline::{
    FailureReason, OutputBudgets, Pipeline, PipelineBuilder, PipelineRun, PipelineShape,
    PipelineState, RunFailure, SourceRequest,
};
pub use stage::CompletionStage;
pub use types::{
    Artifact, ArtifactKind, ArtifactRef, BudgetedText, ChatMessage, CompletionRequest, Role,
    SourceKind, SourceOrigin, SourceText, TranscriptSegment,
};
