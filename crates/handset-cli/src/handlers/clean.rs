//! Clean command handler

use crate::{Cli, CleanArgs, CliResult, Reporter};
use handset::ArtifactStore;
use std::time::Duration;

/// Execute the clean command
pub fn execute_clean(cli: &Cli, args: &CleanArgs, reporter: &Reporter) -> CliResult<()> {
    let settings = super::load_settings(cli, &[])?;
    let framework = settings.framework();
    let store = ArtifactStore::new(&framework.output_dir);
    let message = clean(&store, args.all, framework.retention)?;
    reporter.success(&message);
    Ok(())
}

/// Remove artifacts and describe what was done
pub fn clean(store: &ArtifactStore, all: bool, retention: Duration) -> CliResult<String> {
    if all {
        store.purge_all()?;
        Ok(format!("Removed all artifacts under {}", store.root().display()))
    } else {
        let removed = store.purge_older_than(retention)?;
        let days = retention.as_secs() / 86_400;
        Ok(format!(
            "Removed {removed} artifact(s) older than {days} day(s) under {}",
            store.root().display()
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_retention_keeps_fresh_files() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.prepare().unwrap();
        let png = store.save_screenshot("Login", "passed", b"png").unwrap();

        let message = clean(&store, false, Duration::from_secs(7 * 86_400)).unwrap();
        assert!(message.starts_with("Removed 0 artifact(s) older than 7 day(s)"));
        assert!(png.exists());
    }

    #[test]
    fn test_all_removes_everything() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.prepare().unwrap();
        let png = store.save_screenshot("Login", "failed", b"png").unwrap();

        let message = clean(&store, true, Duration::ZERO).unwrap();
        assert!(message.starts_with("Removed all artifacts"));
        assert!(!png.exists());
    }
}
