use std::fs;
use std::path::Path;

/// Loads `KEY=VALUE` lines from an env file into the process environment.
///
/// Blank lines, `#` comments, and lines without `=` are skipped. A variable
/// already present in the environment is never overwritten (first-writer
/// wins). A missing file is not an error. Returns the number of variables
/// actually set.
pub fn load_env_file(path: &Path) -> usize {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => {
            tracing::debug!(path = %path.display(), "env file not found, skipping");
            return 0;
        }
    };

    let mut loaded = 0;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || std::env::var_os(key).is_some() {
            continue;
        }
        std::env::set_var(key, value);
        loaded += 1;
    }

    tracing::info!(path = %path.display(), loaded, "loaded environment variables");
    loaded
}
