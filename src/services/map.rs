use anyhow::{Result, bail};
use camino::Utf8PathBuf;
use std::sync::{PoisonError, RwLock};

/// Map-service collaborator: reloads data derived from a map.
#[cfg_attr(test, mockall::automock)]
pub trait MapService: Send + Sync {
    /// Reload simulation data for `map`.
    fn reload_map(&self, map: &str) -> Result<()>;
}

/// Map service backed by a directory of maps, one subdirectory each.
#[derive(Debug)]
pub struct FileMapService {
    maps_dir: Utf8PathBuf,
    loaded: RwLock<Option<String>>,
}

impl FileMapService {
    pub fn new(maps_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            maps_dir: maps_dir.into(),
            loaded: RwLock::new(None),
        }
    }

    /// Name of the last successfully loaded map
    pub fn loaded_map(&self) -> Option<String> {
        self.loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MapService for FileMapService {
    fn reload_map(&self, map: &str) -> Result<()> {
        let map_dir = self.maps_dir.join(map);
        if !map_dir.is_dir() {
            bail!("Failed to load new simulation map: {} not found in {}", map, self.maps_dir);
        }

        *self.loaded.write().unwrap_or_else(PoisonError::into_inner) = Some(map.to_string());
        tracing::info!("Reloaded simulation map from {}", map_dir);
        Ok(())
    }
}
