use std::fmt::Write as _;

use crate::domain::model::{AggregateReport, Item};
use crate::utils::error::Result;

/// Longest description rendered per item before elision.
const DESCRIPTION_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Markdown,
    Json { pretty: bool },
}

/// Pure rendering of a report. Iterates outcomes strictly in request order,
/// so formatting the same report twice is byte-identical.
pub fn format_report(report: &AggregateReport, mode: OutputMode) -> Result<String> {
    match mode {
        OutputMode::Json { pretty: true } => Ok(serde_json::to_string_pretty(report)?),
        OutputMode::Json { pretty: false } => Ok(serde_json::to_string(report)?),
        OutputMode::Markdown => Ok(format_markdown(report)),
        OutputMode::Text => Ok(format_text(report)),
    }
}

fn format_text(report: &AggregateReport) -> String {
    let mut out = String::new();
    let s = &report.summary;

    let _ = writeln!(out, "Union search: {}", report.keyword);
    let _ = writeln!(out, "Time: {}", report.timestamp);
    let _ = write!(
        out,
        "Platforms: {} (ok {}, failed {}), items: {}",
        s.total_platforms, s.successful, s.failed, s.total_items
    );
    if let Some(dedup) = &s.deduplicated {
        let _ = write!(
            out,
            " ({} duplicates removed: {} by url, {} by title)",
            dedup.total_removed, dedup.url_duplicates, dedup.title_duplicates
        );
    }
    out.push('\n');

    for outcome in &report.outcomes {
        out.push('\n');
        match &outcome.error {
            Some(error) => {
                let _ = writeln!(
                    out,
                    "[failed] {} ({} ms): {}",
                    outcome.platform, outcome.timing_ms, error
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "[ok] {}: {} items ({} ms)",
                    outcome.platform, outcome.total, outcome.timing_ms
                );
                for (i, item) in outcome.items.iter().enumerate() {
                    let _ = writeln!(out, "  {}. {}", i + 1, item.title().unwrap_or("N/A"));
                    if let Some(url) = item.url() {
                        let _ = writeln!(out, "     {}", url);
                    }
                }
            }
        }
    }

    out
}

fn format_markdown(report: &AggregateReport) -> String {
    let mut out = String::new();
    let s = &report.summary;

    let _ = writeln!(out, "# Union search results: {}", report.keyword);
    let _ = writeln!(out, "\n**Timestamp**: {}", report.timestamp);
    let _ = writeln!(out, "**Platforms**: {}", s.total_platforms);
    let _ = writeln!(out, "**Successful**: {} | **Failed**: {}", s.successful, s.failed);
    let _ = writeln!(out, "**Total items**: {}", s.total_items);
    if let Some(dedup) = &s.deduplicated {
        let _ = writeln!(
            out,
            "**Duplicates removed**: {} ({} by url, {} by title)",
            dedup.total_removed, dedup.url_duplicates, dedup.title_duplicates
        );
    }
    out.push_str("\n---\n");

    for outcome in &report.outcomes {
        let _ = writeln!(out, "\n## {}", outcome.platform.to_uppercase());

        if let Some(error) = &outcome.error {
            let _ = writeln!(out, "\n❌ **Error**: {}", error);
            continue;
        }

        if outcome.items.is_empty() {
            out.push_str("\n⚠️ No results\n");
            continue;
        }

        let _ = writeln!(out, "\n✅ {} results\n", outcome.total);
        for (i, item) in outcome.items.iter().enumerate() {
            render_markdown_item(&mut out, i + 1, item);
        }
        out.push_str("---\n");
    }

    out
}

fn render_markdown_item(out: &mut String, index: usize, item: &Item) {
    let _ = writeln!(out, "### {}. {}", index, item.title().unwrap_or("N/A"));

    if let Some(url) = item.url() {
        let _ = writeln!(out, "- **Link**: {}", url);
    }
    if let Some(description) = item.field_str("description") {
        let short: String = description.chars().take(DESCRIPTION_CHARS).collect();
        let suffix = if description.chars().count() > DESCRIPTION_CHARS {
            "..."
        } else {
            ""
        };
        let _ = writeln!(out, "- **Description**: {}{}", short, suffix);
    }
    if let Some(author) = item.field_str("author") {
        let _ = writeln!(out, "- **Author**: {}", author);
    }
    if let Some(score) = item.data.get("score") {
        let _ = writeln!(out, "- **Score**: {}", score);
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{BackendOutcome, DedupStats, Summary};
    use std::time::Duration;

    fn item(json: serde_json::Value) -> Item {
        Item::from_value(json).unwrap()
    }

    fn sample_report() -> AggregateReport {
        let outcomes = vec![
            BackendOutcome::succeeded(
                "github",
                vec![item(serde_json::json!({
                    "title": "rust-lang/rust",
                    "url": "https://github.com/rust-lang/rust",
                    "description": "Empowering everyone to build reliable software.",
                    "score": 99
                }))],
                Duration::from_millis(120),
            ),
            BackendOutcome::failed("reddit", "rate limited", Duration::from_millis(45)),
        ];
        AggregateReport {
            keyword: "rust".to_string(),
            platforms: vec!["github".to_string(), "reddit".to_string()],
            limit: Some(3),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            outcomes,
            summary: Summary {
                total_platforms: 2,
                successful: 1,
                failed: 1,
                total_items: 1,
                deduplicated: None,
            },
        }
    }

    #[test]
    fn test_format_is_deterministic() {
        let report = sample_report();
        for mode in [
            OutputMode::Text,
            OutputMode::Markdown,
            OutputMode::Json { pretty: true },
        ] {
            let first = format_report(&report, mode).unwrap();
            let second = format_report(&report, mode).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_text_lists_every_requested_platform() {
        let rendered = format_report(&sample_report(), OutputMode::Text).unwrap();
        assert!(rendered.contains("[ok] github: 1 items (120 ms)"));
        assert!(rendered.contains("[failed] reddit (45 ms): rate limited"));
        assert!(rendered.contains("Platforms: 2 (ok 1, failed 1), items: 1"));
    }

    #[test]
    fn test_markdown_structure() {
        let rendered = format_report(&sample_report(), OutputMode::Markdown).unwrap();
        assert!(rendered.starts_with("# Union search results: rust"));
        assert!(rendered.contains("## GITHUB"));
        assert!(rendered.contains("### 1. rust-lang/rust"));
        assert!(rendered.contains("- **Link**: https://github.com/rust-lang/rust"));
        assert!(rendered.contains("- **Score**: 99"));
        assert!(rendered.contains("## REDDIT"));
        assert!(rendered.contains("❌ **Error**: rate limited"));
        // Request order: github section before reddit.
        assert!(rendered.find("## GITHUB").unwrap() < rendered.find("## REDDIT").unwrap());
    }

    #[test]
    fn test_markdown_caps_long_descriptions() {
        let mut report = sample_report();
        report.outcomes[0].items = vec![item(serde_json::json!({
            "title": "long",
            "description": "d".repeat(500)
        }))];

        let rendered = format_report(&report, OutputMode::Markdown).unwrap();
        let line = rendered
            .lines()
            .find(|l| l.starts_with("- **Description**"))
            .unwrap();
        assert!(line.ends_with("..."));
        assert!(line.chars().count() < 250);
    }

    #[test]
    fn test_json_shape_matches_payload_contract() {
        let rendered =
            format_report(&sample_report(), OutputMode::Json { pretty: false }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["keyword"], "rust");
        assert_eq!(value["limit_per_platform"], 3);
        assert_eq!(value["results"]["github"]["success"], true);
        assert_eq!(value["results"]["github"]["total"], 1);
        assert_eq!(value["results"]["reddit"]["error"], "rate limited");
        assert_eq!(value["summary"]["total_platforms"], 2);
        assert!(value["summary"].get("deduplicated").is_none());
    }

    #[test]
    fn test_summary_dedup_line_rendered_when_present() {
        let mut report = sample_report();
        report.summary.deduplicated = Some(DedupStats {
            total_before: 4,
            total_removed: 3,
            url_duplicates: 2,
            title_duplicates: 1,
        });

        let text = format_report(&report, OutputMode::Text).unwrap();
        assert!(text.contains("(3 duplicates removed: 2 by url, 1 by title)"));

        let md = format_report(&report, OutputMode::Markdown).unwrap();
        assert!(md.contains("**Duplicates removed**: 3 (2 by url, 1 by title)"));
    }
}
