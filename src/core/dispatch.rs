use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant as TokioInstant};

use crate::core::extract::extract_json;
use crate::core::invoker::effective_timeout;
use crate::core::registry::{PlatformDescriptor, PlatformRegistry};
use crate::domain::model::{BackendOutcome, Item, RawOutcome, SearchRequest};
use crate::domain::ports::Invoker;
use crate::utils::error::{Result, SearchError};

/// Fans the request out to one task per platform over a worker pool bounded
/// by `request.max_workers`, then joins everything under the overall
/// deadline.
///
/// Every per-backend failure mode (unknown name, spawn error, timeout,
/// non-zero exit, unparseable output) lands in that backend's outcome and
/// nowhere else; one backend can never abort its siblings.
pub async fn dispatch(
    registry: &PlatformRegistry,
    invoker: Arc<dyn Invoker>,
    request: &SearchRequest,
) -> HashMap<String, BackendOutcome> {
    let request = Arc::new(request.clone());
    let deadline = TokioInstant::now() + request.overall_timeout;
    let semaphore = Arc::new(Semaphore::new(request.max_workers.max(1)));

    let mut outcomes = HashMap::new();
    let mut handles: Vec<(String, JoinHandle<BackendOutcome>)> = Vec::new();

    for platform in &request.platforms {
        let descriptor = match registry.resolve(platform) {
            Ok(descriptor) => descriptor.clone(),
            Err(e) => {
                // Registry misses fail fast without consuming a worker slot.
                outcomes.insert(
                    platform.clone(),
                    BackendOutcome::failed(platform, e.to_string(), Duration::ZERO),
                );
                continue;
            }
        };

        let invoker = Arc::clone(&invoker);
        let request = Arc::clone(&request);
        let semaphore = Arc::clone(&semaphore);

        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            run_backend(invoker.as_ref(), &descriptor, &request).await
        });
        handles.push((platform.clone(), handle));
    }

    for (platform, mut handle) in handles {
        let outcome = match timeout_at(deadline, &mut handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => BackendOutcome::failed(
                &platform,
                format!("backend task panicked: {}", join_err),
                Duration::ZERO,
            ),
            Err(_) => {
                // Force-terminate the straggler; aborting the task drops the
                // invoke future, which takes the child process with it.
                handle.abort();
                BackendOutcome::failed(
                    &platform,
                    SearchError::Timeout {
                        secs: request.overall_timeout.as_secs(),
                    }
                    .to_string(),
                    request.overall_timeout,
                )
            }
        };

        if outcome.success {
            tracing::info!(platform = %platform, items = outcome.total, "backend succeeded");
        } else {
            tracing::warn!(
                platform = %platform,
                error = outcome.error.as_deref().unwrap_or(""),
                "backend failed"
            );
        }
        outcomes.insert(platform, outcome);
    }

    outcomes
}

/// Invoke, extract, classify; all failure modes absorbed locally.
async fn run_backend(
    invoker: &dyn Invoker,
    descriptor: &PlatformDescriptor,
    request: &SearchRequest,
) -> BackendOutcome {
    let started = Instant::now();
    let raw = match invoker.invoke(descriptor, request).await {
        Ok(raw) => raw,
        Err(e) => return BackendOutcome::failed(&descriptor.name, e.to_string(), started.elapsed()),
    };

    let elapsed = raw.elapsed;
    match classify(descriptor, request, &raw) {
        Ok(items) => BackendOutcome::succeeded(&descriptor.name, items, elapsed),
        Err(e) => BackendOutcome::failed(&descriptor.name, e.to_string(), elapsed),
    }
}

/// Turns a raw process result into items or a backend-local error.
fn classify(
    descriptor: &PlatformDescriptor,
    request: &SearchRequest,
    raw: &RawOutcome,
) -> Result<Vec<Item>> {
    if raw.timed_out {
        return Err(SearchError::Timeout {
            secs: effective_timeout(descriptor, request).as_secs(),
        });
    }

    let code = raw.exit_code.unwrap_or(-1);
    if code != 0 {
        let stderr = raw.stderr.trim();
        let stdout = raw.stdout.trim();
        let detail = if !stderr.is_empty() {
            stderr.to_string()
        } else if !stdout.is_empty() {
            stdout.to_string()
        } else {
            format!("exit code {}", code)
        };
        return Err(SearchError::NonZeroExit { code, detail });
    }

    if raw.truncated {
        tracing::warn!(platform = %descriptor.name, "backend output truncated at capture ceiling");
    }

    let value = extract_json(&raw.stdout).map_err(|e| match e {
        SearchError::JsonParse { detail } if !raw.stderr.trim().is_empty() => {
            SearchError::JsonParse {
                detail: format!("{}; stderr={}", detail, raw.stderr.trim()),
            }
        }
        other => other,
    })?;

    let mut items = descriptor.items_shape.extract(&value);
    // Backends are asked to honor the limit flag, but cap client-side too.
    if let Some(limit) = request.limit {
        items.truncate(limit);
    }
    Ok(items)
}
