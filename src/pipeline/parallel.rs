// Parallel matching across objects.
//
// Object buckets are independent, so qualifying buckets are split into
// contiguous chunks and matched on the blocking pool, each chunk into its
// own accumulator. `buffered` yields results in chunk order and the merge
// happens here on one task, so the graph is identical to the sequential run.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tracing::debug;

use super::{DetectionReport, Detector, MatchSummary};
use crate::detection::graph::CoordinationGraphBuilder;
use crate::events::models::RawEvent;
use crate::events::store::EventStore;

/// Ingest and detect, matching objects on up to `concurrency` workers.
pub async fn detect_parallel(detector: &Detector, raws: Vec<RawEvent>) -> Result<DetectionReport> {
    let store = Arc::new(detector.ingest(raws));
    detect_store_parallel(detector, store).await
}

pub async fn detect_store_parallel(
    detector: &Detector,
    store: Arc<EventStore>,
) -> Result<DetectionReport> {
    let filter = detector.filter();
    let qualifying: Vec<usize> = store
        .buckets()
        .iter()
        .enumerate()
        .filter(|(_, bucket)| filter.qualifies(bucket))
        .map(|(i, _)| i)
        .collect();

    let concurrency = detector.config().concurrency.max(1);
    let chunk_size = qualifying.len().div_ceil(concurrency).max(1);
    let chunks: Vec<Vec<usize>> = qualifying.chunks(chunk_size).map(<[usize]>::to_vec).collect();
    debug!(
        objects = qualifying.len(),
        chunks = chunks.len(),
        concurrency,
        "Matching objects in parallel"
    );

    let results: Vec<Result<(CoordinationGraphBuilder, usize)>> =
        stream::iter(chunks.into_iter().map(|chunk| {
            let store = Arc::clone(&store);
            let worker = detector.clone();
            async move {
                tokio::task::spawn_blocking(move || {
                    worker.match_into_builder(chunk.iter().filter_map(|&i| store.buckets().get(i)))
                })
                .await
                .context("Matcher worker failed")
            }
        }))
        .buffered(concurrency)
        .collect()
        .await;

    let mut builder = CoordinationGraphBuilder::new(detector.config().weight_policy);
    let mut edges_emitted = 0;
    for result in results {
        let (partial, emitted) = result?;
        builder.merge(partial);
        edges_emitted += emitted;
    }

    let summary = MatchSummary {
        objects_total: store.buckets().len(),
        objects_filtered_out: store.buckets().len() - qualifying.len(),
        objects_qualifying: qualifying.len(),
        edges_emitted,
    };
    Ok(detector.finish(&store, summary, builder))
}
