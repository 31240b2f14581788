use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Consume the first-boot marker left behind by the deployment scripts.
///
/// Returns true at most once per marker: the file is removed so every
/// later start reads as a normal boot.
pub fn consume_first_boot_marker(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path)
        .with_context(|| format!("remove first-boot marker {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_marker(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("petrel-first-boot-{}-{}", std::process::id(), tag))
    }

    #[test]
    fn marker_is_consumed_exactly_once() {
        let marker = scratch_marker("consumed");
        fs::write(&marker, b"").unwrap();

        assert!(consume_first_boot_marker(&marker).unwrap());
        assert!(!marker.exists(), "marker file should be removed");
        assert!(!consume_first_boot_marker(&marker).unwrap());
    }

    #[test]
    fn missing_marker_reads_as_normal_boot() {
        let marker = scratch_marker("missing");
        assert!(!consume_first_boot_marker(&marker).unwrap());
    }
}
