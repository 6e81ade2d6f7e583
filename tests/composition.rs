// Composition tests — the whole pipeline on small hand-built datasets.
//
// These tests exercise the data flow between modules:
//   EventStore -> RepetitionFilter -> Matcher -> Graph -> Groups -> Statistics
// through the public `Detector` API, without touching the filesystem.

use std::collections::BTreeSet;

use lockstep::config::{DetectionConfig, WeightPolicy};
use lockstep::detection::louvain::LouvainLimits;
use lockstep::events::models::{Event, RawEvent};
use lockstep::output::truncate_chars;
use lockstep::pipeline::{parallel, DetectionReport, Detector};
use serde_json::json;

fn detector(config: DetectionConfig) -> Detector {
    Detector::new(config).unwrap()
}

fn config(window: f64, min_repetition: usize) -> DetectionConfig {
    DetectionConfig {
        time_window_secs: window,
        min_repetition,
        concurrency: 1,
        ..DetectionConfig::default()
    }
}

/// Three accounts share "x" at 0s, 5s and 40s.
fn abc_events() -> Vec<Event> {
    vec![
        Event::at_secs("A", "x", 0),
        Event::at_secs("B", "x", 5),
        Event::at_secs("C", "x", 40),
    ]
}

/// A larger, deterministic dataset: two tight rings plus background noise.
fn mixed_events() -> Vec<Event> {
    let mut events = Vec::new();
    let ring_a = ["r1", "r2", "r3", "r4"];
    let ring_b = ["s1", "s2", "s3"];
    for round in 0..6i64 {
        let base = round * 1_000;
        for (i, account) in ring_a.iter().enumerate() {
            events.push(Event::at_secs(*account, format!("slogan-{round}"), base + i as i64 * 3));
        }
        for (i, account) in ring_b.iter().enumerate() {
            events.push(Event::at_secs(
                *account,
                format!("link-{}", round % 3),
                base + 500 + i as i64 * 7,
            ));
        }
    }
    for i in 0..20i64 {
        events.push(Event::at_secs(format!("noise{i}"), format!("meme-{}", i % 4), i * 97));
    }
    events
}

fn as_json(report: &DetectionReport) -> serde_json::Value {
    serde_json::to_value(report).unwrap()
}

// ============================================================
// Worked scenarios
// ============================================================

#[test]
fn pair_inside_window_forms_group_and_outsider_is_excluded() {
    let report = detector(config(10.0, 2)).detect_events(abc_events());

    assert_eq!(report.graph.edge_count(), 1);
    assert_eq!(report.graph.weight("A", "B"), 1);
    assert_eq!(report.graph.weight("A", "C"), 0);
    assert_eq!(report.graph.weight("B", "C"), 0);

    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups.groups[0].members, vec!["A", "B"]);
    assert_eq!(report.groups.group_of("C"), None);

    assert!(report.statistics.user("C").is_none());
    let a = report.statistics.user("A").unwrap();
    assert_eq!(a.group_id, Some(0));
    assert_eq!(a.degree, 1);
    assert_eq!(a.total_edge_weight, 1);
    assert!((a.mean_time_delta_secs - 5.0).abs() < 1e-9);
}

#[test]
fn min_repetition_three_keeps_object_but_not_the_far_share() {
    let report = detector(config(10.0, 3)).detect_events(abc_events());

    assert_eq!(report.diagnostics.objects_qualifying, 1);
    assert_eq!(report.graph.edge_count(), 1);
    assert_eq!(report.groups.groups[0].members, vec!["A", "B"]);
}

#[test]
fn min_repetition_above_account_count_filters_everything() {
    let report = detector(config(10.0, 4)).detect_events(abc_events());

    assert_eq!(report.diagnostics.objects_filtered_out, 1);
    assert!(report.graph.is_empty());
    assert!(report.groups.is_empty());
    assert!(!report.diagnostics.empty_input);
}

#[test]
fn empty_input_is_flagged_not_fatal() {
    let report = detector(DetectionConfig::default()).detect(Vec::new());

    assert!(report.diagnostics.empty_input);
    assert!(report.graph.is_empty());
    assert!(report.groups.is_empty());
    assert!(report.statistics.users.is_empty());
    assert!(!report.diagnostics.warnings.is_empty());
}

#[test]
fn all_malformed_records_count_as_empty_input() {
    let raws = vec![
        RawEvent::default(),
        RawEvent::new(json!("a"), json!("x"), json!("not a time")),
        RawEvent::new(json!(null), json!("x"), json!(0)),
    ];
    let report = detector(DetectionConfig::default()).detect(raws);

    assert_eq!(report.diagnostics.records_seen, 3);
    assert_eq!(report.diagnostics.events_ingested, 0);
    assert_eq!(report.diagnostics.dropped_total(), 3);
    assert!(report.diagnostics.empty_input);
}

#[test]
fn malformed_records_are_dropped_and_the_rest_still_detected() {
    let raws = vec![
        RawEvent::new(json!("A"), json!("x"), json!("1970-01-01T00:00:00Z")),
        RawEvent::new(json!("B"), json!("x"), json!(3)),
        RawEvent::new(json!("C"), json!(null), json!(4)),
    ];
    let report = detector(config(10.0, 2)).detect(raws);

    assert_eq!(report.diagnostics.dropped_total(), 1);
    assert_eq!(report.graph.weight("A", "B"), 1);
}

#[test]
fn repeated_shares_add_weight_under_linear_policy() {
    let events = vec![
        Event::at_secs("A", "x", 0),
        Event::at_secs("B", "x", 1),
        Event::at_secs("A", "x", 2),
        Event::at_secs("B", "y", 100),
        Event::at_secs("A", "y", 104),
    ];
    let linear = detector(config(10.0, 2)).detect_events(events.clone());
    // x: A0-B1, B1-A2; y: B100-A104
    assert_eq!(linear.graph.weight("A", "B"), 3);

    let per_object = detector(DetectionConfig {
        weight_policy: WeightPolicy::PerObject,
        ..config(10.0, 2)
    })
    .detect_events(events);
    assert_eq!(per_object.graph.weight("A", "B"), 2);
    assert_eq!(per_object.graph.edge("A", "B").unwrap().occurrences, 3);
}

#[test]
fn dedupe_collapses_self_repeats_before_matching() {
    let events = vec![
        Event::at_secs("A", "x", 0),
        Event::at_secs("B", "x", 1),
        Event::at_secs("A", "x", 2),
    ];
    let report = detector(DetectionConfig {
        dedupe_self_repeats: true,
        ..config(10.0, 2)
    })
    .detect_events(events);

    assert_eq!(report.diagnostics.self_repeats_collapsed, 1);
    assert_eq!(report.graph.weight("A", "B"), 1);
}

#[test]
fn group_statistics_cover_every_group() {
    let report = detector(config(10.0, 2)).detect_events(mixed_events());

    assert_eq!(report.statistics.groups.len(), report.groups.len());
    for (group, stats) in report.groups.groups.iter().zip(&report.statistics.groups) {
        assert_eq!(group.id, stats.group_id);
        assert_eq!(group.len(), stats.member_count);
        assert!(stats.density > 0.0 && stats.density <= 1.0);
    }

    let ring = report.groups.group_of("r1").unwrap();
    let ring_stats = &report.statistics.groups[ring];
    assert_eq!(ring_stats.member_count, 4);
    // r1..r4 post within 9s of each other every round.
    assert_eq!(ring_stats.internal_edges, 6);
    assert!((ring_stats.density - 1.0).abs() < 1e-9);
}

// ============================================================
// Properties
// ============================================================

#[test]
fn groups_partition_the_graph_nodes() {
    let report = detector(config(10.0, 2)).detect_events(mixed_events());

    let nodes: BTreeSet<&str> = report.graph.nodes().collect();
    let mut seen = BTreeSet::new();
    for group in &report.groups.groups {
        for member in &group.members {
            assert!(seen.insert(member.as_str()), "{member} in two groups");
        }
    }
    assert_eq!(nodes, seen);
}

#[test]
fn every_edge_is_backed_by_a_qualifying_object() {
    let events = mixed_events();
    let report = detector(config(10.0, 3)).detect_events(events.clone());

    for (pair, edge) in report.graph.edges() {
        for object in edge.objects.keys() {
            let accounts: BTreeSet<&str> = events
                .iter()
                .filter(|e| &e.object_id == object)
                .map(|e| e.account_id.as_str())
                .collect();
            assert!(accounts.len() >= 3, "{object} below threshold");
            assert!(accounts.contains(pair.low.as_str()));
            assert!(accounts.contains(pair.high.as_str()));
        }
    }
}

#[test]
fn detection_is_repeatable() {
    let d = detector(DetectionConfig {
        refine: true,
        refine_seed: Some(11),
        ..config(10.0, 2)
    });
    let first = d.detect_events(mixed_events());
    let second = d.detect_events(mixed_events());
    assert_eq!(as_json(&first), as_json(&second));
}

#[test]
fn input_order_does_not_matter() {
    let d = detector(config(10.0, 2));
    let forward = d.detect_events(mixed_events());
    let mut reversed = mixed_events();
    reversed.reverse();
    let backward = d.detect_events(reversed);
    assert_eq!(as_json(&forward), as_json(&backward));
}

#[test]
fn widening_the_window_never_loses_weight() {
    let narrow = detector(config(4.0, 2)).detect_events(mixed_events());
    let wide = detector(config(20.0, 2)).detect_events(mixed_events());

    assert!(wide.graph.edge_count() >= narrow.graph.edge_count());
    for (pair, edge) in narrow.graph.edges() {
        assert!(wide.graph.weight(&pair.low, &pair.high) >= edge.weight);
    }
}

#[test]
fn raising_min_repetition_never_adds_edges() {
    let loose = detector(config(10.0, 2)).detect_events(mixed_events());
    let strict = detector(config(10.0, 4)).detect_events(mixed_events());

    for (pair, edge) in strict.graph.edges() {
        assert!(loose.graph.weight(&pair.low, &pair.high) >= edge.weight);
    }
    assert!(strict.graph.edge_count() <= loose.graph.edge_count());
}

#[test]
fn refined_groups_still_partition_and_record_seed() {
    let report = detector(DetectionConfig {
        refine: true,
        ..config(10.0, 2)
    })
    .detect_events(mixed_events());

    assert_eq!(report.diagnostics.refine_seed, Some(0));
    assert!(report.groups.modularity.is_some());
    let members: usize = report.groups.groups.iter().map(|g| g.len()).sum();
    assert_eq!(members, report.graph.node_count());
}

#[test]
fn unconverged_refinement_is_a_warning_not_a_failure() {
    // Two 4-account cliques joined by one pair, each pair through its own object.
    let left = ["a1", "a2", "a3", "a4"];
    let right = ["b1", "b2", "b3", "b4"];
    let mut pairs = vec![("a4", "b1")];
    for side in [left, right] {
        for i in 0..4 {
            for j in (i + 1)..4 {
                pairs.push((side[i], side[j]));
            }
        }
    }
    let mut events = Vec::new();
    for (n, (a, b)) in pairs.iter().enumerate() {
        let t = n as i64 * 1_000;
        events.push(Event::at_secs(*a, format!("o{n}"), t));
        events.push(Event::at_secs(*b, format!("o{n}"), t + 1));
    }

    let d = detector(DetectionConfig {
        refine: true,
        refine_seed: Some(3),
        ..config(10.0, 2)
    })
    .with_refine_limits(LouvainLimits {
        max_passes: 1,
        ..LouvainLimits::default()
    });
    let report = d.detect_events(events);

    assert_eq!(report.groups.warnings.len(), 1);
    assert!(report
        .diagnostics
        .warnings
        .iter()
        .any(|w| w.contains("did not converge")));
    let nodes: BTreeSet<&str> = report.graph.nodes().collect();
    let members: BTreeSet<&str> = report
        .groups
        .groups
        .iter()
        .flat_map(|g| g.members.iter().map(String::as_str))
        .collect();
    assert_eq!(nodes.len(), 8);
    assert_eq!(members, nodes);
    assert_eq!(report.groups.membership.len(), 8);
}

// ============================================================
// Parallel matching
// ============================================================

#[tokio::test]
async fn parallel_matches_sequential() {
    let sequential = detector(config(10.0, 2)).detect_events(mixed_events());

    let raws: Vec<RawEvent> = mixed_events()
        .into_iter()
        .map(|e| {
            RawEvent::new(
                json!(e.account_id),
                json!(e.object_id),
                json!(e.timestamp.timestamp()),
            )
        })
        .collect();
    let d = detector(DetectionConfig {
        concurrency: 3,
        ..config(10.0, 2)
    });
    let parallel = parallel::detect_parallel(&d, raws).await.unwrap();

    assert_eq!(as_json(&sequential), as_json(&parallel));
}

#[tokio::test]
async fn parallel_handles_empty_input() {
    let d = detector(DetectionConfig::default());
    let report = parallel::detect_parallel(&d, Vec::new()).await.unwrap();
    assert!(report.diagnostics.empty_input);
    assert!(report.groups.is_empty());
}

// ============================================================
// Output helpers
// ============================================================

#[test]
fn long_object_ids_truncate_on_char_boundaries() {
    let id = "ünïcödé ".repeat(20);
    let short = truncate_chars(&id, 10);
    assert_eq!(short.chars().count(), 13);
    assert!(short.ends_with("..."));
    assert_eq!(truncate_chars("short", 10), "short");
}
