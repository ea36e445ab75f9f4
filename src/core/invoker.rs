use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use crate::core::registry::PlatformDescriptor;
use crate::domain::model::{RawOutcome, SearchRequest};
use crate::domain::ports::Invoker;
use crate::utils::error::{Result, SearchError};

/// Ceiling on captured stdout/stderr per backend. Output past this point is
/// dropped and the outcome marked truncated.
pub const MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// Effective deadline for one backend: its own hint, never past the
/// request's overall timeout.
pub fn effective_timeout(descriptor: &PlatformDescriptor, request: &SearchRequest) -> Duration {
    descriptor.timeout_hint.min(request.overall_timeout)
}

/// Builds the concrete argument list from the descriptor template:
/// `{keyword}` substitution plus the limit flag when both sides have one.
pub fn render_args(descriptor: &PlatformDescriptor, request: &SearchRequest) -> Vec<String> {
    let mut args: Vec<String> = descriptor
        .args
        .iter()
        .map(|arg| arg.replace("{keyword}", &request.keyword))
        .collect();

    if let (Some(flag), Some(limit)) = (&descriptor.limit_flag, request.limit) {
        args.push(flag.clone());
        args.push(limit.to_string());
    }

    args
}

/// Production [`Invoker`]: one OS process per call, piped capture, hard
/// deadline. No retries here; a backend that wants retries owns them.
#[derive(Debug, Default)]
pub struct CommandInvoker;

impl CommandInvoker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Invoker for CommandInvoker {
    async fn invoke(
        &self,
        descriptor: &PlatformDescriptor,
        request: &SearchRequest,
    ) -> Result<RawOutcome> {
        let args = render_args(descriptor, request);
        let deadline = effective_timeout(descriptor, request);

        tracing::debug!(
            platform = %descriptor.name,
            program = %descriptor.program,
            timeout_secs = deadline.as_secs(),
            "spawning backend command"
        );

        let mut cmd = Command::new(&descriptor.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout must take the process with it.
            .kill_on_drop(true);

        let started = Instant::now();
        let child = cmd.spawn().map_err(SearchError::Invocation)?;

        match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let (stdout, out_truncated) = truncate_capture(output.stdout);
                let (stderr, err_truncated) = truncate_capture(output.stderr);
                Ok(RawOutcome {
                    exit_code: output.status.code(),
                    stdout,
                    stderr,
                    timed_out: false,
                    truncated: out_truncated || err_truncated,
                    elapsed: started.elapsed(),
                })
            }
            Ok(Err(e)) => Err(SearchError::Invocation(e)),
            Err(_) => {
                tracing::warn!(
                    platform = %descriptor.name,
                    timeout_secs = deadline.as_secs(),
                    "backend timed out, process killed"
                );
                Ok(RawOutcome {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    timed_out: true,
                    truncated: false,
                    elapsed: started.elapsed(),
                })
            }
        }
    }
}

fn truncate_capture(bytes: Vec<u8>) -> (String, bool) {
    if bytes.len() <= MAX_CAPTURE_BYTES {
        return (String::from_utf8_lossy(&bytes).into_owned(), false);
    }
    // Back off to a UTF-8 boundary so the lossy conversion does not invent a
    // replacement character at the cut.
    let mut end = MAX_CAPTURE_BYTES;
    while end > 0 && bytes[end] & 0b1100_0000 == 0b1000_0000 {
        end -= 1;
    }
    (String::from_utf8_lossy(&bytes[..end]).into_owned(), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::ItemsShape;

    fn sh(name: &str, script: &str) -> PlatformDescriptor {
        PlatformDescriptor::new(
            name,
            "test backend",
            "/bin/sh",
            vec!["-c".to_string(), script.to_string()],
        )
    }

    fn request(keyword: &str) -> SearchRequest {
        SearchRequest::new(keyword, vec!["test".to_string()])
    }

    #[tokio::test]
    async fn test_invoke_captures_stdout_and_exit_code() {
        let descriptor = sh("echo", "echo '{\"items\": []}'");
        let raw = CommandInvoker::new()
            .invoke(&descriptor, &request("rust"))
            .await
            .unwrap();

        assert_eq!(raw.exit_code, Some(0));
        assert!(!raw.timed_out);
        assert!(!raw.truncated);
        assert_eq!(raw.stdout.trim(), "{\"items\": []}");
    }

    #[tokio::test]
    async fn test_invoke_substitutes_keyword_and_limit() {
        let descriptor = PlatformDescriptor::new(
            "args",
            "test backend",
            "/bin/echo",
            vec!["{keyword}".to_string()],
        )
        .with_limit_flag("--limit")
        .with_items_shape(ItemsShape::Root);

        let req = request("rust async").with_limit(Some(3));
        let raw = CommandInvoker::new()
            .invoke(&descriptor, &req)
            .await
            .unwrap();

        assert_eq!(raw.stdout.trim(), "rust async --limit 3");
    }

    #[tokio::test]
    async fn test_invoke_captures_stderr_on_failure() {
        let descriptor = sh("fail", "echo 'rate limited' >&2; exit 3");
        let raw = CommandInvoker::new()
            .invoke(&descriptor, &request("rust"))
            .await
            .unwrap();

        assert_eq!(raw.exit_code, Some(3));
        assert_eq!(raw.stderr.trim(), "rate limited");
    }

    #[tokio::test]
    async fn test_invoke_kills_on_timeout() {
        let descriptor =
            sh("slow", "sleep 30; echo done").with_timeout_hint(Duration::from_millis(200));

        let started = Instant::now();
        let raw = CommandInvoker::new()
            .invoke(&descriptor, &request("rust"))
            .await
            .unwrap();

        assert!(raw.timed_out);
        assert!(raw.exit_code.is_none());
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "timeout must not wait for the sleep"
        );
    }

    #[tokio::test]
    async fn test_invoke_spawn_failure_is_an_error() {
        let descriptor = PlatformDescriptor::new(
            "missing",
            "test backend",
            "/nonexistent/backend/client",
            vec![],
        );
        let err = CommandInvoker::new()
            .invoke(&descriptor, &request("rust"))
            .await
            .unwrap_err();

        assert!(matches!(err, SearchError::Invocation(_)));
    }

    #[tokio::test]
    async fn test_invoke_truncates_oversized_output() {
        let descriptor = sh(
            "huge",
            "dd if=/dev/zero bs=1024 count=2048 2>/dev/null | tr '\\0' 'x'",
        );
        let raw = CommandInvoker::new()
            .invoke(&descriptor, &request("rust"))
            .await
            .unwrap();

        assert!(raw.truncated);
        assert!(raw.stdout.len() <= MAX_CAPTURE_BYTES);
    }

    #[test]
    fn test_effective_timeout_is_bounded_by_overall() {
        let descriptor = sh("x", "true").with_timeout_hint(Duration::from_secs(60));
        let req = request("rust").with_overall_timeout(Duration::from_secs(10));
        assert_eq!(effective_timeout(&descriptor, &req), Duration::from_secs(10));

        let req = request("rust").with_overall_timeout(Duration::from_secs(120));
        assert_eq!(effective_timeout(&descriptor, &req), Duration::from_secs(60));
    }

    #[test]
    fn test_render_args_without_limit_flag() {
        let descriptor = sh("x", "true");
        let req = request("rust").with_limit(Some(5));
        // No limit flag on the descriptor, so the cap stays client-side.
        assert_eq!(render_args(&descriptor, &req), vec!["-c", "true"]);
    }

    #[test]
    fn test_truncate_capture_respects_utf8_boundary() {
        let mut bytes = vec![b'a'; MAX_CAPTURE_BYTES - 1];
        bytes.extend_from_slice("é".as_bytes()); // straddles the ceiling
        bytes.extend_from_slice(&[b'b'; 16]);

        let (text, truncated) = truncate_capture(bytes);
        assert!(truncated);
        assert!(!text.contains('\u{FFFD}'));
    }
}
