// EventStore — normalized input plus the per-object buckets built from it.
//
// Everything here is computed once at construction and read-only after.
// Buckets are grouped through a HashMap (amortized O(1) per event), then
// laid out sorted by object id so iteration order never depends on hashing.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::models::{Event, RawEvent};
use crate::error::MalformedReason;

/// All events that referenced one object, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectBucket {
    pub object_id: String,
    pub events: Vec<Event>,
}

impl ObjectBucket {
    /// Number of distinct accounts that shared this object. O(n).
    pub fn distinct_accounts(&self) -> usize {
        self.events
            .iter()
            .map(|e| e.account_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// What ingestion did with the input, for the run-level diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestDiagnostics {
    /// Records offered to the store, valid or not.
    pub records_seen: usize,
    /// Events kept (after dedupe, if enabled).
    pub events_ingested: usize,
    pub dropped: BTreeMap<MalformedReason, usize>,
    pub self_repeats_collapsed: usize,
}

impl IngestDiagnostics {
    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<Event>,
    buckets: Vec<ObjectBucket>,
    diagnostics: IngestDiagnostics,
}

impl EventStore {
    /// Normalize raw records, dropping and counting the malformed ones.
    pub fn ingest(raws: impl IntoIterator<Item = RawEvent>, dedupe_self_repeats: bool) -> Self {
        let mut dropped: BTreeMap<MalformedReason, usize> = BTreeMap::new();
        let mut records_seen = 0;
        let mut events = Vec::new();

        for raw in raws {
            records_seen += 1;
            match Event::try_from(raw) {
                Ok(event) => events.push(event),
                Err(e) => {
                    debug!(reason = %e.reason, "Dropping malformed event");
                    *dropped.entry(e.reason).or_default() += 1;
                }
            }
        }

        let mut store = Self::from_events(events, dedupe_self_repeats);
        store.diagnostics.records_seen = records_seen;
        store.diagnostics.dropped = dropped;

        if store.diagnostics.dropped_total() > 0 {
            info!(
                dropped = store.diagnostics.dropped_total(),
                kept = store.events.len(),
                "Ingestion dropped malformed events"
            );
        }
        store
    }

    /// Build a store from already-typed events.
    pub fn from_events(events: Vec<Event>, dedupe_self_repeats: bool) -> Self {
        let records_seen = events.len();

        let mut by_object: HashMap<String, Vec<Event>> = HashMap::new();
        for event in events {
            by_object
                .entry(event.object_id.clone())
                .or_default()
                .push(event);
        }

        let mut self_repeats_collapsed = 0;
        let mut buckets: Vec<ObjectBucket> = by_object
            .into_iter()
            .map(|(object_id, mut events)| {
                events.sort_by(|a, b| {
                    a.timestamp
                        .cmp(&b.timestamp)
                        .then_with(|| a.account_id.cmp(&b.account_id))
                        .then_with(|| a.content_id.cmp(&b.content_id))
                });
                if dedupe_self_repeats {
                    let before = events.len();
                    // Sorted oldest first, so the first share per account wins.
                    let mut seen: HashSet<String> = HashSet::new();
                    events.retain(|e| seen.insert(e.account_id.clone()));
                    self_repeats_collapsed += before - events.len();
                }
                ObjectBucket { object_id, events }
            })
            .collect();
        buckets.sort_by(|a, b| a.object_id.cmp(&b.object_id));

        let events: Vec<Event> = buckets
            .iter()
            .flat_map(|b| b.events.iter().cloned())
            .collect();

        debug!(
            events = events.len(),
            objects = buckets.len(),
            self_repeats_collapsed,
            "Event store built"
        );

        Self {
            diagnostics: IngestDiagnostics {
                records_seen,
                events_ingested: events.len(),
                dropped: BTreeMap::new(),
                self_repeats_collapsed,
            },
            events,
            buckets,
        }
    }

    /// Every kept event, grouped by object id then oldest first.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Buckets sorted by object id; each bucket sorted by timestamp.
    pub fn buckets(&self) -> &[ObjectBucket] {
        &self.buckets
    }

    pub fn bucket(&self, object_id: &str) -> Option<&ObjectBucket> {
        self.buckets
            .binary_search_by(|b| b.object_id.as_str().cmp(object_id))
            .ok()
            .and_then(|i| self.buckets.get(i))
    }

    pub fn diagnostics(&self) -> &IngestDiagnostics {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_buckets_sorted_by_time() {
        let store = EventStore::from_events(
            vec![
                Event::at_secs("b", "x", 30),
                Event::at_secs("a", "x", 10),
                Event::at_secs("c", "y", 5),
                Event::at_secs("c", "x", 20),
            ],
            false,
        );
        let x = store.bucket("x").unwrap();
        let secs: Vec<i64> = x.events.iter().map(|e| e.timestamp.timestamp()).collect();
        assert_eq!(secs, vec![10, 20, 30]);
        assert_eq!(store.buckets().len(), 2);
        assert!(store.bucket("z").is_none());
    }

    #[test]
    fn test_dedupe_keeps_earliest() {
        let store = EventStore::from_events(
            vec![
                Event::at_secs("a", "x", 50),
                Event::at_secs("a", "x", 10),
                Event::at_secs("b", "x", 12),
            ],
            true,
        );
        let x = store.bucket("x").unwrap();
        assert_eq!(x.len(), 2);
        assert_eq!(x.events[0].timestamp.timestamp(), 10);
        assert_eq!(store.diagnostics().self_repeats_collapsed, 1);
    }

    #[test]
    fn test_duplicates_retained_without_dedupe() {
        let store = EventStore::from_events(
            vec![Event::at_secs("a", "x", 1), Event::at_secs("a", "x", 1)],
            false,
        );
        assert_eq!(store.len(), 2);
        assert_eq!(store.bucket("x").unwrap().distinct_accounts(), 1);
    }

    #[test]
    fn test_malformed_counted_not_fatal() {
        let raws = vec![
            RawEvent::new(json!("a"), json!("x"), json!(0)),
            RawEvent::new(json!("b"), json!("x"), json!("not a time")),
            RawEvent::new(json!(null), json!("x"), json!(0)),
            RawEvent::new(json!(1.5), json!("x"), json!(0)),
        ];
        let store = EventStore::ingest(raws, false);
        let diag = store.diagnostics();
        assert_eq!(store.len(), 1);
        assert_eq!(diag.records_seen, 4);
        assert_eq!(diag.dropped_total(), 3);
        assert_eq!(diag.dropped[&MalformedReason::UnparsableTimestamp], 1);
        assert_eq!(diag.dropped[&MalformedReason::MissingAccount], 1);
        assert_eq!(diag.dropped[&MalformedReason::InvalidAccount], 1);
    }

    #[test]
    fn test_unreadable_records_counted_separately() {
        let raws = crate::events::models::parse_records(
            "{\"account_id\": \"a\", \"object_id\": \"x\", \"timestamp\": 0}\nnot json\n[1]\n",
        )
        .unwrap();
        let store = EventStore::ingest(raws, false);
        let diag = store.diagnostics();
        assert_eq!(diag.records_seen, 3);
        assert_eq!(diag.dropped[&MalformedReason::UnreadableRecord], 2);
        assert!(!diag.dropped.contains_key(&MalformedReason::MissingAccount));
    }
}
