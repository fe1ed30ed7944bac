//! Graph snapshot files.
//!
//! A snapshot file is the pretty-printed JSON form of [`GraphSnapshot`].
//! Loading validates ids through [`Store::from_snapshot`]; saving writes to a
//! sibling temp file and renames it over the target.

use std::path::{Path, PathBuf};

use nodeloom_core::store::Store;
use nodeloom_types::error::GraphError;
use nodeloom_types::graph::GraphSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a valid graph snapshot: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} holds an inconsistent graph: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: GraphError,
    },

    #[error("graph could not be serialized: {0}")]
    Serialize(#[source] serde_json::Error),
}

pub async fn read_snapshot(path: &Path) -> Result<GraphSnapshot, SnapshotError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| SnapshotError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a snapshot file into a fresh [`Store`], rejecting duplicate ids and
/// dangling references.
pub async fn load_store(path: &Path) -> Result<Store, SnapshotError> {
    let snapshot = read_snapshot(path).await?;
    let store = Store::from_snapshot(snapshot).map_err(|source| SnapshotError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "graph snapshot loaded");
    Ok(store)
}

/// Read a snapshot file without consistency checks, so a broken graph can
/// still be validated and repaired.
pub async fn restore_store(path: &Path) -> Result<Store, SnapshotError> {
    Ok(Store::restore(read_snapshot(path).await?))
}

pub async fn write_snapshot(path: &Path, snapshot: &GraphSnapshot) -> Result<(), SnapshotError> {
    let mut content = serde_json::to_string_pretty(snapshot).map_err(SnapshotError::Serialize)?;
    content.push('\n');

    let io_err = |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };
    let tmp = staging_path(path);
    tokio::fs::write(&tmp, content).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;

    tracing::debug!(
        path = %path.display(),
        nodes = snapshot.nodes.len(),
        edges = snapshot.edges.len(),
        groups = snapshot.groups.len(),
        "graph snapshot written"
    );
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
