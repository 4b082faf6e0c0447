//! Canonical file paths for the `DuckDB` data directory.

use std::path::{Path, PathBuf};

/// Environment variable that overrides [`regions_db_path`].
pub const DB_PATH_ENV: &str = "EPI_RISK_DB_PATH";

/// Returns the workspace root directory, resolved at compile time from
/// `CARGO_MANIFEST_DIR`.
#[must_use]
pub fn project_root() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest.ancestors().nth(2).unwrap_or(manifest).to_path_buf()
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the regions database path, honoring [`DB_PATH_ENV`].
#[must_use]
pub fn regions_db_path() -> PathBuf {
    std::env::var_os(DB_PATH_ENV)
        .filter(|v| !v.is_empty())
        .map_or_else(|| data_dir().join("regions.duckdb"), PathBuf::from)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_db_lives_under_data() {
        let path = data_dir().join("regions.duckdb");
        assert!(path.ends_with("data/regions.duckdb"));
        assert!(path.starts_with(project_root()));
    }
}
