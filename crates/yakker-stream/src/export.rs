//! Keeps the scoreboard's livedata file in step with the published snapshot.

use crate::{Error, Result, server::render, snapshot::Snapshot};
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LivedataWriter {
    path: PathBuf,
}

impl LivedataWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, snapshot: &Snapshot) -> Result<()> {
        write_atomic(&self.path, render::livedata_xml(snapshot).as_bytes()).await?;
        debug!(path = ?self.path, sequence = snapshot.sequence, "livedata written");
        Ok(())
    }
}

/// Readers of `path` only ever see a complete document: the bytes go to a
/// sibling temp file which is then renamed over the target.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let export_err = |source| Error::Export {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(export_err)?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    {
        let mut temp_file = fs::File::create(&temp_path).await.map_err(export_err)?;
        temp_file.write_all(contents).await.map_err(export_err)?;
        temp_file.sync_all().await.map_err(export_err)?;
    }

    fs::rename(&temp_path, path).await.map_err(export_err)
}
