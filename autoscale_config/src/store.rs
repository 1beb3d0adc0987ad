//! File-backed calibration factor store.
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use autoscale_traits::{BoxError, FactorStore};
use serde::{Deserialize, Serialize};

/// Write via a sibling temp file and rename, so readers never see a
/// half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredFactor {
    scale_factor: f32,
}

/// Persists the factor as a one-key TOML file.
#[derive(Debug, Clone)]
pub struct FileFactorStore {
    path: PathBuf,
}

impl FileFactorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FactorStore for FileFactorStore {
    /// A missing, unreadable or malformed file reads as "nothing stored".
    fn load_factor(&self) -> Option<f32> {
        let text = fs::read_to_string(&self.path).ok()?;
        toml::from_str::<StoredFactor>(&text)
            .ok()
            .map(|s| s.scale_factor)
    }

    fn save_factor(&mut self, factor: f32) -> Result<(), BoxError> {
        if !factor.is_finite() {
            return Err(format!("refusing to store non-finite factor {factor}").into());
        }
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }
        let body = toml::to_string(&StoredFactor {
            scale_factor: factor,
        })?;
        write_atomic(&self.path, body.as_bytes())?;
        Ok(())
    }

    fn clear_factor(&mut self) -> Result<(), BoxError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
