// Posture: investment stance scoring from annual-report filings
//
// This is the library root. Each module corresponds to a major subsystem
// of the filings-to-scores pipeline.

pub mod config;
pub mod db;
pub mod extraction;
pub mod filing;
pub mod output;
pub mod pipeline;
pub mod scoring;
pub mod status;
pub mod ticker;
