use anyhow::{Context, Result};
use glob::glob;
use std::{fs, path::PathBuf};
use tracing::{debug, warn};

/// Read every file matching `pattern`, in path order.
pub fn read_payloads(pattern: &str) -> Result<Vec<(PathBuf, Vec<u8>)>> {
    let mut payloads = Vec::new();
    for entry in glob(pattern).with_context(|| format!("bad glob pattern {:?}", pattern))? {
        let path = match entry {
            Ok(p) => p,
            Err(e) => {
                warn!("skipping unreadable path: {}", e);
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let bytes =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        debug!(path = %path.display(), bytes = bytes.len(), "read payload");
        payloads.push((path, bytes));
    }
    Ok(payloads)
}
