// Event ingestion — normalization and per-object grouping.

pub mod models;
pub mod store;
