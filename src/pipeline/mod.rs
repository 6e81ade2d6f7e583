// Detection pipeline: ingest → filter → match → graph → groups → statistics.
//
// `Detector` validates configuration up front (the only fatal failure) and
// then runs the stages strictly in order. Everything else that can go wrong
// (malformed records, empty input, refinement that doesn't converge) ends
// up in the report's diagnostics next to whatever results exist.

pub mod diagnostics;
pub mod parallel;

use chrono::TimeDelta;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::DetectionConfig;
use crate::detection::filter::RepetitionFilter;
use crate::detection::graph::{CoordinationGraph, CoordinationGraphBuilder};
use crate::detection::groups::{GroupExtraction, GroupExtractor, GroupingMode};
use crate::detection::louvain::LouvainLimits;
use crate::detection::matcher::PairwiseCoordinationMatcher;
use crate::error::DetectionError;
use crate::events::models::{Event, RawEvent};
use crate::events::store::{EventStore, ObjectBucket};
use crate::stats::{self, Statistics};

pub use diagnostics::{Diagnostics, MatchSummary};

/// Everything a run produces.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionReport {
    pub graph: CoordinationGraph,
    pub groups: GroupExtraction,
    pub statistics: Statistics,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone)]
pub struct Detector {
    config: DetectionConfig,
    window: TimeDelta,
    refine_limits: LouvainLimits,
}

impl Detector {
    /// Validate the configuration and build a detector.
    pub fn new(config: DetectionConfig) -> Result<Self, DetectionError> {
        config.validate()?;
        let window = config.time_window().ok_or_else(|| {
            DetectionError::InvalidConfiguration(format!(
                "time_window of {} seconds is out of range",
                config.time_window_secs
            ))
        })?;
        if config.refine {
            info!(seed = config.effective_seed(), "Group refinement enabled");
        }
        Ok(Self {
            config,
            window,
            refine_limits: LouvainLimits::default(),
        })
    }

    /// Override the iteration caps used when `refine` is set.
    pub fn with_refine_limits(mut self, limits: LouvainLimits) -> Self {
        self.refine_limits = limits;
        self
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn filter(&self) -> RepetitionFilter {
        RepetitionFilter::new(self.config.min_repetition)
    }

    pub fn matcher(&self) -> PairwiseCoordinationMatcher {
        PairwiseCoordinationMatcher::new(self.window)
    }

    pub fn grouping_mode(&self) -> GroupingMode {
        if self.config.refine {
            GroupingMode::Refined {
                seed: self.config.effective_seed(),
            }
        } else {
            GroupingMode::Components
        }
    }

    /// Normalize raw records into a store, honoring `dedupe_self_repeats`.
    pub fn ingest(&self, raws: impl IntoIterator<Item = RawEvent>) -> EventStore {
        EventStore::ingest(raws, self.config.dedupe_self_repeats)
    }

    pub fn detect(&self, raws: impl IntoIterator<Item = RawEvent>) -> DetectionReport {
        self.detect_with_progress(raws, false)
    }

    /// Run on already-typed events.
    pub fn detect_events(&self, events: Vec<Event>) -> DetectionReport {
        let store = EventStore::from_events(events, self.config.dedupe_self_repeats);
        self.detect_store(&store, &ProgressBar::hidden())
    }

    /// Like `detect`, optionally drawing a progress bar over the objects
    /// being matched.
    pub fn detect_with_progress(
        &self,
        raws: impl IntoIterator<Item = RawEvent>,
        show_progress: bool,
    ) -> DetectionReport {
        let store = self.ingest(raws);
        let pb = if show_progress {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  Matching [{bar:30}] {pos}/{len} objects ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb
        } else {
            ProgressBar::hidden()
        };
        let report = self.detect_store(&store, &pb);
        pb.finish_and_clear();
        report
    }

    /// Sequential filter + match over a built store.
    pub fn detect_store(&self, store: &EventStore, pb: &ProgressBar) -> DetectionReport {
        let outcome = self.filter().apply(store.buckets());
        pb.set_length(outcome.kept.len() as u64);

        let matcher = self.matcher();
        let mut builder = CoordinationGraphBuilder::new(self.config.weight_policy);
        let mut edges_emitted = 0;
        for bucket in &outcome.kept {
            let edges = matcher.match_bucket(bucket);
            edges_emitted += edges.len();
            builder.extend(&edges);
            pb.inc(1);
        }

        let summary = MatchSummary {
            objects_total: store.buckets().len(),
            objects_filtered_out: outcome.dropped,
            objects_qualifying: outcome.kept.len(),
            edges_emitted,
        };
        self.finish(store, summary, builder)
    }

    /// Match a slice of buckets into a private accumulator.
    ///
    /// Used by the parallel path, one call per worker.
    pub fn match_into_builder<'a>(
        &self,
        buckets: impl IntoIterator<Item = &'a ObjectBucket>,
    ) -> (CoordinationGraphBuilder, usize) {
        let matcher = self.matcher();
        let mut builder = CoordinationGraphBuilder::new(self.config.weight_policy);
        let mut emitted = 0;
        for bucket in buckets {
            let edges = matcher.match_bucket(bucket);
            emitted += edges.len();
            builder.extend(&edges);
        }
        (builder, emitted)
    }

    /// Graph, groups and statistics from a finished accumulator.
    pub(crate) fn finish(
        &self,
        store: &EventStore,
        summary: MatchSummary,
        builder: CoordinationGraphBuilder,
    ) -> DetectionReport {
        let mut diagnostics = Diagnostics::new(store.diagnostics(), summary);

        let graph = builder.build();
        let mode = self.grouping_mode();
        if let GroupingMode::Refined { seed } = mode {
            diagnostics.refine_seed = Some(seed);
        }
        let groups = GroupExtractor::new(mode)
            .with_limits(self.refine_limits)
            .extract(&graph);
        diagnostics.warnings.extend(groups.warnings.iter().cloned());

        let statistics = match stats::aggregate(&graph, &groups, store.events()) {
            Ok(statistics) => statistics,
            Err(e) => {
                warn!(error = %e, "Nothing to analyze");
                diagnostics.empty_input = matches!(e, DetectionError::EmptyInput);
                diagnostics.warnings.push(e.to_string());
                Statistics::default()
            }
        };

        info!(
            events = diagnostics.events_ingested,
            dropped = diagnostics.dropped_total(),
            qualifying_objects = summary.objects_qualifying,
            edges = graph.edge_count(),
            groups = groups.len(),
            "Detection complete"
        );

        DetectionReport {
            graph,
            groups,
            statistics,
            diagnostics,
        }
    }
}
