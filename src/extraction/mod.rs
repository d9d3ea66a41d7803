// Extraction — filing text in, structured data and classified segments out.
//
// The language service sits behind the ExtractionService trait so the HTTP
// client can be swapped for a scripted fake in tests. ExtractionClient adds
// chunking, retry/backoff and bounded concurrency on top of it.

pub mod aggregate;
pub mod chat;
pub mod chunker;
pub mod client;
pub mod prompts;
pub mod retry;
pub mod traits;

pub use client::ExtractionClient;
pub use traits::{ExtractionResult, ExtractionService};
