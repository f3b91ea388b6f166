//! Protected document acquisition.
//!
//! Retrieves documents from portals that sit behind bot challenges, then
//! classifies what came back and extracts normalized text from it.
//!
//! - [`retrieval::Retriever`] drives a browser session through challenge
//!   detection, solving and fallback to a direct HTTP transport.
//! - [`classify::classify`] decides what a response body actually is.
//! - [`extract::TextExtractor`] turns document bytes into text.
//! - [`pipeline::DocumentPipeline`] composes all three.

pub mod browser;
pub mod challenge;
pub mod classify;
pub mod cli;
pub mod config;
pub mod extract;
pub mod http_client;
pub mod models;
pub mod pipeline;
pub mod retrieval;
pub mod utils;

pub use models::{AcquiredDocument, OutputMode, RetrievalOutcome, RetrievalRequest};
pub use pipeline::DocumentPipeline;
