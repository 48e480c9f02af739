//! Read-only static asset store.
//!
//! Both HTTP surfaces serve pages out of one directory (`storage.assets_dir`,
//! default `data/`): `index.html` for the provisioning UI, `404.html` for
//! unmatched paths, plus whatever else lives there.  The files themselves are
//! served by `tower-http`'s `ServeDir`/`ServeFile` (see
//! `infrastructure::http::responses`); this type only records where the root
//! is, whether it mounted, and what it contains.
//!
//! A store that failed to mount is still a valid value.  It has no root, the
//! listing returns [`AssetError::Unmounted`], and the HTTP layer falls back
//! to plain text bodies.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

/// Error type for asset store operations.
#[derive(Debug, Error)]
pub enum AssetError {
    /// The asset directory could not be mounted at startup.
    #[error("asset store is not mounted")]
    Unmounted,

    /// The asset root is missing or not a directory.
    #[error("asset directory {0} does not exist")]
    MissingRoot(PathBuf),

    #[error("I/O error listing assets in {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One entry of [`AssetStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEntry {
    /// URL path, e.g. `/index.html`.
    pub path: String,
    pub size: u64,
}

/// Directory of static pages.
#[derive(Debug, Clone)]
pub struct AssetStore {
    root: Option<PathBuf>,
}

impl AssetStore {
    /// Mounts `root`.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::MissingRoot`] if `root` is not a directory.
    pub fn mount(root: impl Into<PathBuf>) -> Result<Self, AssetError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(AssetError::MissingRoot(root));
        }
        info!(root = %root.display(), "Asset store mounted");
        Ok(Self { root: Some(root) })
    }

    /// Mounts `root`, or returns an unmounted store if that fails.
    ///
    /// The failure is logged; the caller carries on without assets.
    pub fn mount_or_degraded(root: impl Into<PathBuf>) -> Self {
        Self::mount(root).unwrap_or_else(|e| {
            warn!(error = %e, "Static assets unavailable");
            Self::unmounted()
        })
    }

    /// A store with no backing directory.
    pub fn unmounted() -> Self {
        Self { root: None }
    }

    pub fn is_mounted(&self) -> bool {
        self.root.is_some()
    }

    /// The mounted directory, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Lists the files directly inside the root, sorted by path.
    ///
    /// # Errors
    ///
    /// [`AssetError::Unmounted`] or [`AssetError::Io`].
    pub fn list(&self) -> Result<Vec<AssetEntry>, AssetError> {
        let root = self.root.as_ref().ok_or(AssetError::Unmounted)?;
        let io_err = |source: std::io::Error| AssetError::Io {
            path: root.clone(),
            source,
        };

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(root).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let meta = entry.metadata().map_err(io_err)?;
            if !meta.is_file() {
                continue;
            }
            entries.push(AssetEntry {
                path: format!("/{}", entry.file_name().to_string_lossy()),
                size: meta.len(),
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_assets() -> (AssetStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("modbus_bridge_assets_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("css")).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>setup</h1>").unwrap();
        std::fs::write(dir.join("script.js"), "// js").unwrap();
        std::fs::write(dir.join("css").join("site.css"), "body{}").unwrap();
        (AssetStore::mount(&dir).expect("mount"), dir)
    }

    #[test]
    fn test_mount_exposes_root() {
        // Arrange
        let (store, dir) = temp_assets();

        // Assert
        assert!(store.is_mounted());
        assert_eq!(store.root(), Some(dir.as_path()));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_mount_of_a_file_is_refused() {
        let (_, dir) = temp_assets();
        assert!(matches!(
            AssetStore::mount(dir.join("index.html")),
            Err(AssetError::MissingRoot(_))
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_list_returns_top_level_files_sorted() {
        let (store, dir) = temp_assets();

        let entries = store.list().expect("list");

        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/index.html", "/script.js"]);
        assert_eq!(entries[0].size, 14);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_root_degrades_to_unmounted() {
        let store = AssetStore::mount_or_degraded("/nonexistent/modbus-bridge/data");
        assert!(!store.is_mounted());
        assert!(store.root().is_none());
        assert!(matches!(store.list(), Err(AssetError::Unmounted)));
    }
}
