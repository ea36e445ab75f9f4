use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use url::Url;

use crate::domain::model::{
    AggregateReport, BackendOutcome, DedupStats, Item, SearchRequest, Summary,
};

/// Merges per-backend outcomes into the final report, re-imposing request
/// order regardless of completion order. Pure apart from the timestamp;
/// see [`aggregate_with_timestamp`] for the fully deterministic form.
pub fn aggregate(
    request: &SearchRequest,
    outcomes: HashMap<String, BackendOutcome>,
) -> AggregateReport {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    aggregate_with_timestamp(request, outcomes, timestamp)
}

pub fn aggregate_with_timestamp(
    request: &SearchRequest,
    mut outcomes: HashMap<String, BackendOutcome>,
    timestamp: String,
) -> AggregateReport {
    let mut ordered: Vec<BackendOutcome> = request
        .platforms
        .iter()
        .map(|platform| {
            outcomes.remove(platform).unwrap_or_else(|| {
                BackendOutcome::failed(platform, "no outcome recorded", Duration::ZERO)
            })
        })
        .collect();

    let deduplicated = if request.deduplicate {
        Some(deduplicate(&mut ordered))
    } else {
        None
    };

    let successful = ordered.iter().filter(|o| o.success).count();
    let total_items: usize = ordered.iter().filter(|o| o.success).map(|o| o.total).sum();

    let summary = Summary {
        total_platforms: request.platforms.len(),
        successful,
        failed: request.platforms.len() - successful,
        total_items,
        deduplicated,
    };

    AggregateReport {
        keyword: request.keyword.clone(),
        platforms: request.platforms.clone(),
        limit: request.limit,
        timestamp,
        outcomes: ordered,
        summary,
    }
}

/// Single-pass exact-key dedup across successful outcomes in request order,
/// so earlier platforms win ties. URL keys are preferred; items without a
/// URL fall back to a normalized title. Items with neither are always kept.
fn deduplicate(ordered: &mut [BackendOutcome]) -> DedupStats {
    let mut seen: HashSet<String> = HashSet::new();
    let mut stats = DedupStats {
        total_before: 0,
        total_removed: 0,
        url_duplicates: 0,
        title_duplicates: 0,
    };

    for outcome in ordered.iter_mut().filter(|o| o.success) {
        stats.total_before += outcome.items.len();
        let mut kept = Vec::with_capacity(outcome.items.len());

        for item in outcome.items.drain(..) {
            match dedup_key(&item) {
                Some(DedupKey::Url(key)) => {
                    if seen.insert(key) {
                        kept.push(item);
                    } else {
                        stats.url_duplicates += 1;
                    }
                }
                Some(DedupKey::Title(key)) => {
                    if seen.insert(key) {
                        kept.push(item);
                    } else {
                        stats.title_duplicates += 1;
                    }
                }
                None => kept.push(item),
            }
        }

        outcome.total = kept.len();
        outcome.items = kept;
    }

    stats.total_removed = stats.url_duplicates + stats.title_duplicates;
    stats
}

enum DedupKey {
    Url(String),
    Title(String),
}

fn dedup_key(item: &Item) -> Option<DedupKey> {
    if let Some(key) = item.url().and_then(canonical_url) {
        return Some(DedupKey::Url(key));
    }
    item.title()
        .map(normalize_title)
        .filter(|t| !t.is_empty())
        .map(DedupKey::Title)
}

/// Canonical dedup form of a URL: scheme + host (+ explicit port) + path,
/// query and fragment dropped, trailing slash trimmed. Unparseable URLs get
/// no URL key. Key types are prefixed so URL and title keys cannot collide.
fn canonical_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?;

    let path = url.path().trim_end_matches('/');
    let mut key = format!("u:{}://{}", url.scheme(), host.to_lowercase());
    if let Some(port) = url.port() {
        key.push_str(&format!(":{}", port));
    }
    key.push_str(path);
    Some(key)
}

fn normalize_title(title: &str) -> String {
    let collapsed = title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    format!("t:{}", collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(json: serde_json::Value) -> Item {
        Item::from_value(json).unwrap()
    }

    fn ok(platform: &str, items: Vec<Item>) -> BackendOutcome {
        BackendOutcome::succeeded(platform, items, Duration::from_millis(10))
    }

    fn outcome_map(outcomes: Vec<BackendOutcome>) -> HashMap<String, BackendOutcome> {
        outcomes
            .into_iter()
            .map(|o| (o.platform.clone(), o))
            .collect()
    }

    fn request(platforms: &[&str]) -> SearchRequest {
        SearchRequest::new("rust", platforms.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_summary_counts_add_up() {
        let req = request(&["github", "reddit", "bing"]);
        let outcomes = outcome_map(vec![
            ok("github", vec![item(serde_json::json!({"title": "a"}))]),
            ok("reddit", vec![]),
            BackendOutcome::failed("bing", "rate limited", Duration::ZERO),
        ]);

        let report = aggregate(&req, outcomes);

        assert_eq!(report.summary.total_platforms, 3);
        assert_eq!(report.summary.successful, 2);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(
            report.summary.successful + report.summary.failed,
            report.summary.total_platforms
        );
        assert_eq!(report.summary.total_items, 1);
    }

    #[test]
    fn test_two_backends_three_items_each() {
        let three = |p: &str| {
            ok(
                p,
                (0..3)
                    .map(|i| item(serde_json::json!({"title": format!("{} {}", p, i)})))
                    .collect(),
            )
        };
        let req = request(&["github", "reddit"]).with_limit(Some(3));
        let report = aggregate(&req, outcome_map(vec![three("github"), three("reddit")]));

        assert_eq!(report.summary.total_items, 6);
        assert_eq!(report.summary.successful, 2);
        assert_eq!(report.summary.failed, 0);
    }

    #[test]
    fn test_outcomes_follow_request_order_not_completion_order() {
        let req = request(&["zz", "aa", "mm"]);
        let outcomes = outcome_map(vec![ok("mm", vec![]), ok("aa", vec![]), ok("zz", vec![])]);

        let report = aggregate(&req, outcomes);

        let order: Vec<&str> = report.outcomes.iter().map(|o| o.platform.as_str()).collect();
        assert_eq!(order, vec!["zz", "aa", "mm"]);
    }

    #[test]
    fn test_missing_outcome_becomes_failure() {
        let req = request(&["github", "reddit"]);
        let outcomes = outcome_map(vec![ok("github", vec![])]);

        let report = aggregate(&req, outcomes);

        let reddit = report.outcome("reddit").unwrap();
        assert!(!reddit.success);
        assert_eq!(report.summary.failed, 1);
    }

    #[test]
    fn test_dedup_identical_normalized_urls() {
        let req = request(&["github", "reddit"]).with_deduplicate(true);
        let outcomes = outcome_map(vec![
            ok(
                "github",
                vec![item(
                    serde_json::json!({"title": "Rust", "url": "https://example.com/rust/"}),
                )],
            ),
            ok(
                "reddit",
                vec![item(
                    serde_json::json!({"title": "rust lang", "url": "https://EXAMPLE.com/rust?ref=reddit"}),
                )],
            ),
        ]);

        let report = aggregate(&req, outcomes);
        let stats = report.summary.deduplicated.as_ref().unwrap();

        assert_eq!(report.summary.total_items, 1);
        assert_eq!(stats.total_before, 2);
        assert_eq!(stats.total_removed, 1);
        assert_eq!(stats.url_duplicates, 1);
        assert_eq!(stats.title_duplicates, 0);
        // Earlier platform wins the tie.
        assert_eq!(report.outcome("github").unwrap().total, 1);
        assert_eq!(report.outcome("reddit").unwrap().total, 0);
    }

    #[test]
    fn test_dedup_title_fallback_when_no_url() {
        let req = request(&["github", "reddit"]).with_deduplicate(true);
        let outcomes = outcome_map(vec![
            ok(
                "github",
                vec![item(serde_json::json!({"title": "Async  Rust Guide"}))],
            ),
            ok(
                "reddit",
                vec![item(serde_json::json!({"title": "async rust guide"}))],
            ),
        ]);

        let report = aggregate(&req, outcomes);
        let stats = report.summary.deduplicated.unwrap();

        assert_eq!(stats.title_duplicates, 1);
        assert_eq!(stats.url_duplicates, 0);
        assert_eq!(report.summary.total_items, 1);
    }

    #[test]
    fn test_dedup_removed_equals_url_plus_title() {
        let req = request(&["a", "b"]).with_deduplicate(true);
        let outcomes = outcome_map(vec![
            ok(
                "a",
                vec![
                    item(serde_json::json!({"url": "https://x.dev/a"})),
                    item(serde_json::json!({"title": "shared title"})),
                ],
            ),
            ok(
                "b",
                vec![
                    item(serde_json::json!({"url": "https://x.dev/a#section"})),
                    item(serde_json::json!({"title": "Shared   Title"})),
                    item(serde_json::json!({"title": "unique"})),
                ],
            ),
        ]);

        let report = aggregate(&req, outcomes);
        let stats = report.summary.deduplicated.unwrap();

        assert_eq!(stats.total_removed, stats.url_duplicates + stats.title_duplicates);
        assert_eq!(stats.url_duplicates, 1);
        assert_eq!(stats.title_duplicates, 1);
        assert_eq!(report.summary.total_items, stats.total_before - stats.total_removed);
    }

    #[test]
    fn test_dedup_keeps_items_without_url_or_title() {
        let req = request(&["a"]).with_deduplicate(true);
        let outcomes = outcome_map(vec![ok(
            "a",
            vec![
                item(serde_json::json!({"score": 1})),
                item(serde_json::json!({"score": 2})),
            ],
        )]);

        let report = aggregate(&req, outcomes);

        assert_eq!(report.summary.total_items, 2);
        assert_eq!(report.summary.deduplicated.unwrap().total_removed, 0);
    }

    #[test]
    fn test_dedup_disabled_leaves_duplicates() {
        let req = request(&["a", "b"]);
        let dup = serde_json::json!({"url": "https://x.dev/a"});
        let outcomes = outcome_map(vec![
            ok("a", vec![item(dup.clone())]),
            ok("b", vec![item(dup)]),
        ]);

        let report = aggregate(&req, outcomes);

        assert_eq!(report.summary.total_items, 2);
        assert!(report.summary.deduplicated.is_none());
    }

    #[test]
    fn test_canonical_url_normalization() {
        assert_eq!(
            canonical_url("https://Example.com/path/?q=1"),
            canonical_url("https://example.com/path")
        );
        assert_ne!(
            canonical_url("https://example.com/path"),
            canonical_url("https://example.com/other")
        );
        assert_eq!(canonical_url("not a url"), None);
        // Explicit non-default port is significant.
        assert_ne!(
            canonical_url("http://example.com:8080/x"),
            canonical_url("http://example.com/x")
        );
    }

    #[test]
    fn test_aggregate_with_timestamp_is_deterministic() {
        let req = request(&["a"]);
        let build = || {
            outcome_map(vec![ok(
                "a",
                vec![item(serde_json::json!({"title": "t", "url": "https://x.dev"}))],
            )])
        };

        let first = aggregate_with_timestamp(&req, build(), "2026-01-01T00:00:00Z".to_string());
        let second = aggregate_with_timestamp(&req, build(), "2026-01-01T00:00:00Z".to_string());

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
