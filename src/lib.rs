pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::config::CliConfig;
pub use crate::core::aggregate::{aggregate, aggregate_with_timestamp};
pub use crate::core::dispatch::dispatch;
pub use crate::core::extract::extract_json;
pub use crate::core::format::{format_report, OutputMode};
pub use crate::core::invoker::CommandInvoker;
pub use crate::core::registry::{ItemsShape, PlatformDescriptor, PlatformRegistry};
pub use crate::domain::model::{AggregateReport, BackendOutcome, Item, SearchRequest};
pub use crate::domain::ports::Invoker;
pub use crate::utils::error::{Result, SearchError};
