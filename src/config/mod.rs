pub mod env_file;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::core::format::OutputMode;
use crate::domain::model::SearchRequest;
use crate::utils::error::Result;
use crate::utils::validation::{validate_path, validate_positive_number, Validate};

#[derive(Debug, Clone, Parser)]
#[command(name = "unisearch")]
#[command(version)]
#[command(about = "Search multiple platforms concurrently and merge the results")]
pub struct CliConfig {
    /// Search keyword.
    pub keyword: Option<String>,

    /// Platforms to search (space separated). Overrides --group.
    #[arg(long, short = 'p', num_args = 1..)]
    pub platforms: Vec<String>,

    /// Predefined platform group (dev, social, search, rss, all).
    #[arg(long, short = 'g')]
    pub group: Option<String>,

    /// Result cap per platform (default: let each backend decide).
    #[arg(long, short = 'l')]
    pub limit: Option<usize>,

    /// Maximum concurrent backend processes.
    #[arg(long, default_value_t = 5)]
    pub max_workers: usize,

    /// Overall deadline in seconds.
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Drop cross-platform duplicates (exact canonical url/title match).
    #[arg(long)]
    pub deduplicate: bool,

    /// JSON output.
    #[arg(long)]
    pub json: bool,

    /// Pretty-print JSON output.
    #[arg(long, requires = "json")]
    pub pretty: bool,

    /// Markdown output (default is plain text).
    #[arg(long, conflicts_with = "json")]
    pub markdown: bool,

    /// Write the report to a file (atomically) instead of stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// KEY=VALUE file loaded into the environment; existing variables win.
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,

    /// List registered platforms and groups, then exit.
    #[arg(long)]
    pub list_platforms: bool,

    /// Enable verbose logging.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl CliConfig {
    /// A `.json` output path implies JSON mode, as the flags do.
    pub fn output_mode(&self) -> OutputMode {
        let json_path = self
            .output
            .as_ref()
            .and_then(|p| p.extension())
            .is_some_and(|ext| ext == "json");

        if self.json || json_path {
            OutputMode::Json {
                pretty: self.pretty,
            }
        } else if self.markdown {
            OutputMode::Markdown
        } else {
            OutputMode::Text
        }
    }

    /// Builds the immutable request from validated CLI state.
    pub fn to_request(&self, keyword: String, platforms: Vec<String>) -> SearchRequest {
        SearchRequest::new(keyword, platforms)
            .with_limit(self.limit)
            .with_max_workers(self.max_workers)
            .with_overall_timeout(Duration::from_secs(self.timeout))
            .with_deduplicate(self.deduplicate)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("max_workers", self.max_workers, 1)?;
        validate_positive_number("timeout", self.timeout as usize, 1)?;
        if let Some(output) = &self.output {
            validate_path("output", &output.to_string_lossy())?;
        }
        Ok(())
    }
}
