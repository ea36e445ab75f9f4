use std::time::Duration;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};

/// One search invocation, immutable once built.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub keyword: String,
    /// Requested platforms in report order.
    pub platforms: Vec<String>,
    /// Per-backend result cap; `None` lets each backend decide.
    pub limit: Option<usize>,
    pub max_workers: usize,
    pub overall_timeout: Duration,
    pub deduplicate: bool,
}

impl SearchRequest {
    pub fn new(keyword: impl Into<String>, platforms: Vec<String>) -> Self {
        Self {
            keyword: keyword.into(),
            platforms,
            limit: None,
            max_workers: 5,
            overall_timeout: Duration::from_secs(60),
            deduplicate: false,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn with_deduplicate(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }
}

/// A single backend result entry. The dispatcher does not interpret the
/// contents beyond `url`/`title` for deduplication and rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item {
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Item {
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(data) => Some(Self { data }),
            _ => None,
        }
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub fn url(&self) -> Option<&str> {
        self.field_str("url")
    }

    /// `title` with `name` as the fallback, matching heterogeneous backends.
    pub fn title(&self) -> Option<&str> {
        self.field_str("title").or_else(|| self.field_str("name"))
    }
}

/// Raw result of running one backend command, before classification.
#[derive(Debug, Clone)]
pub struct RawOutcome {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub truncated: bool,
    pub elapsed: Duration,
}

/// Terminal state of one backend task. `success == error.is_none()`;
/// an empty `items` on success is a valid result, not a failure.
#[derive(Debug, Clone, Serialize)]
pub struct BackendOutcome {
    pub platform: String,
    pub success: bool,
    pub items: Vec<Item>,
    pub total: usize,
    pub error: Option<String>,
    pub timing_ms: u64,
}

impl BackendOutcome {
    pub fn succeeded(platform: impl Into<String>, items: Vec<Item>, elapsed: Duration) -> Self {
        let total = items.len();
        Self {
            platform: platform.into(),
            success: true,
            items,
            total,
            error: None,
            timing_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn failed(platform: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            platform: platform.into(),
            success: false,
            items: Vec::new(),
            total: 0,
            error: Some(error.into()),
            timing_ms: elapsed.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    pub total_before: usize,
    pub total_removed: usize,
    pub url_duplicates: usize,
    pub title_duplicates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_platforms: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deduplicated: Option<DedupStats>,
}

/// The complete fan-in result. `outcomes` holds every requested platform in
/// request order, so rendering the same report twice is byte-identical.
#[derive(Debug, Clone)]
pub struct AggregateReport {
    pub keyword: String,
    pub platforms: Vec<String>,
    pub limit: Option<usize>,
    pub timestamp: String,
    pub outcomes: Vec<BackendOutcome>,
    pub summary: Summary,
}

impl AggregateReport {
    pub fn outcome(&self, platform: &str) -> Option<&BackendOutcome> {
        self.outcomes.iter().find(|o| o.platform == platform)
    }
}

impl Serialize for AggregateReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AggregateReport", 6)?;
        state.serialize_field("keyword", &self.keyword)?;
        state.serialize_field("platforms", &self.platforms)?;
        state.serialize_field("limit_per_platform", &self.limit)?;
        state.serialize_field("timestamp", &self.timestamp)?;
        state.serialize_field("results", &ResultsByPlatform(&self.outcomes))?;
        state.serialize_field("summary", &self.summary)?;
        state.end()
    }
}

/// Emits the outcome list as a JSON object keyed by platform, preserving
/// request order instead of falling back to map-key sorting.
struct ResultsByPlatform<'a>(&'a [BackendOutcome]);

impl Serialize for ResultsByPlatform<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for outcome in self.0 {
            map.serialize_entry(&outcome.platform, outcome)?;
        }
        map.end()
    }
}
