pub mod aggregate;
pub mod dispatch;
pub mod extract;
pub mod format;
pub mod invoker;
pub mod registry;

pub use crate::domain::model::{AggregateReport, BackendOutcome, Item, SearchRequest};
pub use crate::domain::ports::Invoker;
pub use crate::utils::error::Result;
