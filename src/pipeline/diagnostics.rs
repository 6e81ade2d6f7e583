// Run-level diagnostics surfaced alongside detection results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::MalformedReason;
use crate::events::store::IngestDiagnostics;

/// Counts from the filter and matcher stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub objects_total: usize,
    pub objects_filtered_out: usize,
    pub objects_qualifying: usize,
    pub edges_emitted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub records_seen: usize,
    pub events_ingested: usize,
    /// Dropped malformed records, by reason.
    pub dropped: BTreeMap<MalformedReason, usize>,
    pub self_repeats_collapsed: usize,
    pub objects_total: usize,
    pub objects_filtered_out: usize,
    pub objects_qualifying: usize,
    pub edges_emitted: usize,
    /// True when no usable event reached the filter stage.
    pub empty_input: bool,
    /// Seed used for refinement, when refinement ran.
    pub refine_seed: Option<u64>,
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn new(ingest: &IngestDiagnostics, matched: MatchSummary) -> Self {
        Self {
            records_seen: ingest.records_seen,
            events_ingested: ingest.events_ingested,
            dropped: ingest.dropped.clone(),
            self_repeats_collapsed: ingest.self_repeats_collapsed,
            objects_total: matched.objects_total,
            objects_filtered_out: matched.objects_filtered_out,
            objects_qualifying: matched.objects_qualifying,
            edges_emitted: matched.edges_emitted,
            ..Self::default()
        }
    }

    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}
