use async_trait::async_trait;

use crate::core::registry::PlatformDescriptor;
use crate::domain::model::{RawOutcome, SearchRequest};
use crate::utils::error::Result;

/// Seam between the dispatcher and the outside world. The production
/// implementation spawns one OS process per call; tests substitute a fake.
///
/// `Err` means the command could not be started at all. A process that ran
/// and misbehaved (non-zero exit, timeout, garbage output) is reported as an
/// `Ok(RawOutcome)` and classified by the dispatcher.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(
        &self,
        descriptor: &PlatformDescriptor,
        request: &SearchRequest,
    ) -> Result<RawOutcome>;
}
