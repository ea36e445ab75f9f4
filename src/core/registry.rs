use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;

use crate::domain::model::Item;
use crate::utils::error::{Result, SearchError};

/// Where the item list lives inside a backend's JSON payload.
///
/// Platforms differ here (root array, `items`, `results`, nested paths);
/// modeling the difference as data keeps the dispatcher free of
/// per-platform branches.
#[derive(Debug, Clone)]
pub enum ItemsShape {
    /// The payload itself is the item array.
    Root,
    /// The item array sits under a top-level key.
    Key(String),
    /// The item array sits at the end of a key path.
    Path(Vec<String>),
}

impl ItemsShape {
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }

    pub fn path<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Path(segments.into_iter().map(Into::into).collect())
    }

    /// Pulls the item list out of `value`. A missing key or a non-array
    /// payload yields an empty list; non-object entries are skipped.
    pub fn extract(&self, value: &serde_json::Value) -> Vec<Item> {
        let target = match self {
            Self::Root => Some(value),
            Self::Key(key) => value.get(key),
            Self::Path(segments) => {
                let mut cursor = Some(value);
                for segment in segments {
                    cursor = cursor.and_then(|v| v.get(segment));
                }
                cursor
            }
        };

        match target.and_then(|v| v.as_array()) {
            Some(entries) => entries
                .iter()
                .filter_map(|entry| Item::from_value(entry.clone()))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Invocation contract for one platform client: how to build the command
/// line, where the items live, and how long to wait.
#[derive(Debug, Clone)]
pub struct PlatformDescriptor {
    pub name: String,
    pub description: String,
    pub program: String,
    /// Argument template; `{keyword}` is substituted at invocation time.
    pub args: Vec<String>,
    /// Flag used to pass the per-backend result cap, if the client has one.
    pub limit_flag: Option<String>,
    pub items_shape: ItemsShape,
    pub timeout_hint: Duration,
}

impl PlatformDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        program: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            program: program.into(),
            args,
            limit_flag: None,
            items_shape: ItemsShape::Root,
            timeout_hint: Duration::from_secs(30),
        }
    }

    pub fn with_limit_flag(mut self, flag: impl Into<String>) -> Self {
        self.limit_flag = Some(flag.into());
        self
    }

    pub fn with_items_shape(mut self, shape: ItemsShape) -> Self {
        self.items_shape = shape;
        self
    }

    pub fn with_timeout_hint(mut self, timeout: Duration) -> Self {
        self.timeout_hint = timeout;
        self
    }

    /// Prepends the client script path to the argument template, so the
    /// descriptor stays `interpreter + script + args`.
    fn with_script(mut self, script: String) -> Self {
        self.args.insert(0, script);
        self
    }
}

/// Immutable platform table, built once at startup and passed by reference.
/// Read concurrently without locking.
pub struct PlatformRegistry {
    platforms: Vec<PlatformDescriptor>,
    index: HashMap<String, usize>,
    groups: Vec<(String, Vec<String>)>,
}

impl PlatformRegistry {
    pub fn from_descriptors(platforms: Vec<PlatformDescriptor>) -> Self {
        let index = platforms
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();
        Self {
            platforms,
            index,
            groups: Vec::new(),
        }
    }

    pub fn with_group(mut self, name: impl Into<String>, members: Vec<String>) -> Self {
        self.groups.push((name.into(), members));
        self
    }

    /// The built-in table, mirroring the platform client scripts shipped
    /// alongside the dispatcher.
    pub fn with_defaults() -> Self {
        let py = "python3";
        let script = |rel: &str| format!("scripts/{}", rel);
        let args = |parts: &[&str]| parts.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let platforms = vec![
            PlatformDescriptor::new(
                "github",
                "GitHub repository search",
                py,
                args(&["repo", "{keyword}", "--format", "json"]),
            )
            .with_limit_flag("--limit")
            .with_items_shape(ItemsShape::key("items"))
            .with_script(script("github/github_search.py")),
            PlatformDescriptor::new(
                "reddit",
                "Reddit post and subreddit search",
                py,
                args(&["search", "{keyword}", "--format", "json"]),
            )
            .with_limit_flag("--limit")
            .with_script(script("reddit/cli.py")),
            PlatformDescriptor::new(
                "xiaohongshu",
                "Xiaohongshu note search",
                py,
                args(&["{keyword}", "--pretty"]),
            )
            .with_limit_flag("--limit")
            .with_items_shape(ItemsShape::key("items"))
            .with_script(script("xiaohongshu/tikhub_xhs_search.py")),
            PlatformDescriptor::new(
                "douyin",
                "Douyin video search",
                py,
                args(&["{keyword}", "--pretty"]),
            )
            .with_limit_flag("--limit")
            .with_items_shape(ItemsShape::key("items"))
            .with_timeout_hint(Duration::from_secs(60))
            .with_script(script("douyin/tikhub_douyin_search.py")),
            PlatformDescriptor::new(
                "bilibili",
                "Bilibili video search",
                py,
                args(&["{keyword}", "--json"]),
            )
            .with_limit_flag("--limit")
            .with_script(script("bilibili/video_search.py")),
            PlatformDescriptor::new(
                "youtube",
                "YouTube video search",
                py,
                args(&["{keyword}", "--json"]),
            )
            .with_limit_flag("--limit")
            .with_timeout_hint(Duration::from_secs(60))
            .with_script(script("youtube/youtube_search.py")),
            PlatformDescriptor::new(
                "twitter",
                "Twitter/X post search",
                py,
                args(&["{keyword}", "--pretty"]),
            )
            .with_items_shape(ItemsShape::path(["data", "timeline"]))
            .with_timeout_hint(Duration::from_secs(60))
            .with_script(script("twitter/tikhub_twitter_search.py")),
            PlatformDescriptor::new(
                "weibo",
                "Weibo search (requires cookie configuration)",
                py,
                args(&["{keyword}", "--json"]),
            )
            .with_limit_flag("--limit")
            .with_items_shape(ItemsShape::key("results"))
            .with_script(script("weibo/weibo_search.py")),
            PlatformDescriptor::new(
                "zhihu",
                "Zhihu question and answer search",
                py,
                args(&["{keyword}", "--json"]),
            )
            .with_limit_flag("--limit")
            .with_items_shape(ItemsShape::key("items"))
            .with_script(script("zhihu/zhihu_search.py")),
            PlatformDescriptor::new(
                "xiaoyuzhoufm",
                "Xiaoyuzhou FM podcast search",
                py,
                args(&["{keyword}", "--json"]),
            )
            .with_limit_flag("--size")
            .with_items_shape(ItemsShape::key("podcasts"))
            .with_timeout_hint(Duration::from_secs(60))
            .with_script(script("xiaoyuzhoufm/xiaoyuzhou_search.py")),
            PlatformDescriptor::new(
                "google",
                "Google search",
                py,
                args(&["{keyword}", "--json"]),
            )
            .with_limit_flag("-n")
            .with_items_shape(ItemsShape::key("items"))
            .with_script(script("google_search/google_search.py")),
            PlatformDescriptor::new(
                "tavily",
                "Tavily AI search",
                py,
                args(&["{keyword}", "--json"]),
            )
            .with_limit_flag("--max-results")
            .with_items_shape(ItemsShape::key("results"))
            .with_timeout_hint(Duration::from_secs(60))
            .with_script(script("tavily_search/tavily_search.py")),
            PlatformDescriptor::new("jina", "Jina AI search", py, args(&["{keyword}", "--json"]))
                .with_limit_flag("-m")
                .with_items_shape(ItemsShape::key("results"))
                .with_timeout_hint(Duration::from_secs(60))
                .with_script(script("jina/jina_search.py")),
            PlatformDescriptor::new(
                "duckduckgo",
                "DuckDuckGo search",
                py,
                args(&["{keyword}", "--json"]),
            )
            .with_limit_flag("-m")
            .with_items_shape(ItemsShape::key("results"))
            .with_script(script("duckduckgo/duckduckgo_search.py")),
            PlatformDescriptor::new("brave", "Brave search", py, args(&["{keyword}", "--json"]))
                .with_limit_flag("-m")
                .with_items_shape(ItemsShape::key("results"))
                .with_script(script("brave/brave_search.py")),
            PlatformDescriptor::new("yahoo", "Yahoo search", py, args(&["{keyword}", "--json"]))
                .with_limit_flag("-m")
                .with_items_shape(ItemsShape::key("results"))
                .with_script(script("yahoo/yahoo_search.py")),
            PlatformDescriptor::new(
                "yandex",
                "Yandex search (SerpAPI)",
                py,
                args(&["{keyword}", "--json"]),
            )
            .with_limit_flag("-m")
            .with_items_shape(ItemsShape::key("results"))
            .with_script(script("yandex/yandex_search.py")),
            PlatformDescriptor::new(
                "bing",
                "Bing search (SerpAPI)",
                py,
                args(&["{keyword}", "--json"]),
            )
            .with_limit_flag("-m")
            .with_items_shape(ItemsShape::key("results"))
            .with_script(script("bing/bing_serpapi_search.py")),
            PlatformDescriptor::new(
                "wikipedia",
                "Wikipedia search",
                py,
                args(&["{keyword}", "--json"]),
            )
            .with_limit_flag("-m")
            .with_items_shape(ItemsShape::key("results"))
            .with_script(script("wikipedia/wikipedia_search.py")),
            PlatformDescriptor::new(
                "metaso",
                "Metaso AI search",
                py,
                args(&["{keyword}", "--format", "json", "--summary"]),
            )
            .with_limit_flag("--size")
            .with_items_shape(ItemsShape::key("webpages"))
            .with_timeout_hint(Duration::from_secs(60))
            .with_script(script("metaso/metaso_search.py")),
            PlatformDescriptor::new(
                "volcengine",
                "Volcengine federated search",
                py,
                args(&["summary", "{keyword}"]),
            )
            .with_limit_flag("--count")
            .with_items_shape(ItemsShape::path(["Result", "WebResults"]))
            .with_timeout_hint(Duration::from_secs(60))
            .with_script(script("volcengine/volcengine_search.py")),
            PlatformDescriptor::new(
                "baidu",
                "Baidu Qianfan search",
                py,
                args(&["{keyword}", "--json"]),
            )
            .with_limit_flag("-l")
            .with_items_shape(ItemsShape::key("results"))
            .with_script(script("baidu/baidu_search.py")),
            PlatformDescriptor::new("rss", "RSS feed search", py, args(&["{keyword}", "--json"]))
                .with_limit_flag("-l")
                .with_timeout_hint(Duration::from_secs(60))
                .with_script(script("rss_search/rss_search.py")),
        ];

        let names: Vec<String> = platforms.iter().map(|d| d.name.clone()).collect();
        // xiaohongshu stays resolvable but is left out of "all" while the
        // upstream client is disabled.
        let all: Vec<String> = names
            .iter()
            .filter(|n| n.as_str() != "xiaohongshu")
            .cloned()
            .collect();

        Self::from_descriptors(platforms)
            .with_group("dev", to_names(&["github", "reddit"]))
            .with_group(
                "social",
                to_names(&[
                    "douyin",
                    "bilibili",
                    "youtube",
                    "twitter",
                    "weibo",
                    "zhihu",
                    "xiaoyuzhoufm",
                ]),
            )
            .with_group(
                "search",
                to_names(&[
                    "google",
                    "tavily",
                    "jina",
                    "duckduckgo",
                    "brave",
                    "yahoo",
                    "yandex",
                    "bing",
                    "wikipedia",
                    "metaso",
                    "volcengine",
                    "baidu",
                ]),
            )
            .with_group("rss", to_names(&["rss"]))
            .with_group("all", all)
    }

    pub fn resolve(&self, name: &str) -> Result<&PlatformDescriptor> {
        self.index
            .get(name)
            .map(|&i| &self.platforms[i])
            .ok_or_else(|| SearchError::UnknownPlatform {
                name: name.to_string(),
            })
    }

    pub fn resolve_group(&self, name: &str) -> Result<&[String]> {
        self.groups
            .iter()
            .find(|(group, _)| group == name)
            .map(|(_, members)| members.as_slice())
            .ok_or_else(|| SearchError::UnknownGroup {
                name: name.to_string(),
            })
    }

    pub fn platforms(&self) -> &[PlatformDescriptor] {
        &self.platforms
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.groups
            .iter()
            .map(|(name, members)| (name.as_str(), members.as_slice()))
    }

    /// Turns the CLI's platform/group flags into the request platform set.
    /// Explicit `--platforms` win over `--group`; neither selects `all`.
    pub fn select(&self, platforms: &[String], group: Option<&str>) -> Result<Vec<String>> {
        let selected: Vec<String> = if !platforms.is_empty() {
            for name in platforms {
                self.resolve(name)?;
            }
            platforms.to_vec()
        } else {
            self.resolve_group(group.unwrap_or("all"))?.to_vec()
        };

        if selected.is_empty() {
            return Err(SearchError::EmptyPlatformSet);
        }
        Ok(selected)
    }

    /// Rendering for `--list-platforms`.
    pub fn render_platform_list(&self) -> String {
        let mut out = String::from("# Available platforms\n");
        for descriptor in &self.platforms {
            let _ = writeln!(out, "- {}: {}", descriptor.name, descriptor.description);
        }
        out.push_str("\n# Groups\n");
        for (group, members) in self.groups() {
            let _ = writeln!(out, "- {}: {}", group, members.join(", "));
        }
        out
    }
}

fn to_names(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
