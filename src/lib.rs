// Lockstep: coordinated sharing detection.
//
// This is the library root. Modules follow the pipeline: events are
// ingested and bucketed, detection filters, matches, builds the graph and
// extracts groups, stats summarizes, and pipeline wires the stages together.

pub mod config;
pub mod detection;
pub mod error;
pub mod events;
pub mod output;
pub mod pipeline;
pub mod stats;

pub use config::{DetectionConfig, WeightPolicy};
pub use error::DetectionError;
pub use events::models::{Event, RawEvent};
pub use pipeline::{DetectionReport, Detector};
