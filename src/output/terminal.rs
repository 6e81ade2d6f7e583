// Colored terminal output for coordinated groups and accounts.
//
// main.rs delegates all formatting here. Nothing in this module affects
// detection results; it only reads a finished report.

use colored::Colorize;

use super::truncate_chars;
use crate::events::store::ObjectBucket;
use crate::pipeline::{DetectionReport, Diagnostics};
use crate::stats::{GroupStatistics, ObjectStatistics, UserStatistics};

/// Display run diagnostics: what was ingested, dropped, filtered and matched.
pub fn display_diagnostics(diag: &Diagnostics) {
    println!("\n{}", "=== Run Summary ===".bold());
    println!(
        "  Records: {}  Events kept: {}  Dropped: {}",
        diag.records_seen,
        diag.events_ingested,
        diag.dropped_total()
    );
    for (reason, count) in &diag.dropped {
        println!("    {:<22} {}", reason.as_str().dimmed(), count);
    }
    if diag.self_repeats_collapsed > 0 {
        println!("  Self-repeats collapsed: {}", diag.self_repeats_collapsed);
    }
    println!(
        "  Objects: {} total, {} filtered out, {} compared",
        diag.objects_total, diag.objects_filtered_out, diag.objects_qualifying
    );
    println!("  Coordination edges emitted: {}", diag.edges_emitted);
    if let Some(seed) = diag.refine_seed {
        println!("  Refinement seed: {seed}");
    }
    for warning in &diag.warnings {
        println!("  {} {}", "Warning:".yellow(), warning);
    }
}

/// Display every group with its members and heaviest objects.
pub fn display_groups(report: &DetectionReport) {
    let groups = &report.groups.groups;
    if groups.is_empty() {
        println!("\nNo coordinated groups found.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Coordinated Groups ({}) ===", groups.len()).bold()
    );

    for (group, stats) in groups.iter().zip(&report.statistics.groups) {
        println!(
            "\n  {} {}  members: {}  weight: {}  density: {}",
            "Group".bold(),
            group.id,
            stats.member_count,
            stats.total_internal_weight,
            colorize_density(stats),
        );
        let members = truncate_chars(&group.members.join(", "), 160);
        println!("    Members: {}", members.dimmed());
        for object in &stats.top_objects {
            println!(
                "    {:>5}x  {}",
                object.occurrences,
                truncate_chars(&object.object_id, 100)
            );
        }
    }
}

/// Display the `limit` accounts with the highest total edge weight.
pub fn display_top_users(users: &[UserStatistics], limit: usize) {
    if users.is_empty() {
        return;
    }
    let mut ranked: Vec<&UserStatistics> = users.iter().collect();
    ranked.sort_by(|a, b| {
        b.total_edge_weight
            .cmp(&a.total_edge_weight)
            .then_with(|| a.account_id.cmp(&b.account_id))
    });

    println!(
        "\n{}",
        format!("=== Most Coordinated Accounts (top {}) ===", limit.min(ranked.len())).bold()
    );
    println!(
        "  {:>4}  {:<32} {:>6} {:>6} {:>7} {:>7} {:>8}",
        "Rank".dimmed(),
        "Account".dimmed(),
        "Group".dimmed(),
        "Weight".dimmed(),
        "Degree".dimmed(),
        "Objects".dimmed(),
        "Mean Δs".dimmed(),
    );
    println!("  {}", "-".repeat(78).dimmed());

    for (i, user) in ranked.iter().take(limit).enumerate() {
        let group = user
            .group_id
            .map_or_else(|| "-".to_string(), |g| g.to_string());
        println!(
            "  {:>4}. {:<32} {:>6} {:>6} {:>7} {:>7} {:>8.1}",
            i + 1,
            truncate_chars(&user.account_id, 29),
            group,
            user.total_edge_weight,
            user.degree,
            user.coordinated_objects,
            user.mean_time_delta_secs,
        );
    }
}

/// Display the objects that drove coordination, tightest timing first.
pub fn display_objects(objects: &[ObjectStatistics], limit: usize) {
    if objects.is_empty() {
        return;
    }
    println!(
        "\n{}",
        format!("=== Coordinated Objects (top {}) ===", limit.min(objects.len())).bold()
    );
    for object in objects.iter().take(limit) {
        println!(
            "  {:>8.1}s  {:>4} users  {:>4} posts  {}",
            object.mean_time_delta_secs,
            object.users,
            object.posts,
            truncate_chars(&object.object_id, 90).dimmed(),
        );
    }
}

/// Display objects surviving the repetition filter with their account counts.
pub fn display_qualifying_objects(buckets: &[&ObjectBucket], threshold: usize) {
    if buckets.is_empty() {
        println!("No object was shared by at least {threshold} distinct accounts.");
        return;
    }
    println!(
        "\n{}",
        format!(
            "=== Objects shared by ≥{threshold} accounts ({}) ===",
            buckets.len()
        )
        .bold()
    );
    for bucket in buckets {
        println!(
            "  {:>5} accounts {:>6} events  {}",
            bucket.distinct_accounts(),
            bucket.len(),
            truncate_chars(&bucket.object_id, 100)
        );
    }
}

/// Colorize group density: near-cliques stand out.
fn colorize_density(stats: &GroupStatistics) -> colored::ColoredString {
    let text = format!("{:.2}", stats.density);
    match stats.density {
        d if d >= 0.75 => text.red().bold(),
        d if d >= 0.40 => text.yellow(),
        _ => text.green(),
    }
}
