use std::fs;
use std::path::{Path, PathBuf};
use crate::config::CheckpointConfig;
use crate::error::{Error, Result};

/// Checkpoint files on local disk.
///
/// ## Layout
/// - One file per block height: `checkpoint_{height}.bin`
/// - Written to a `.tmp` file first, then renamed into place
///
/// ## Retention
/// - At most `max_checkpoints` files, oldest heights deleted first after
///   each save
///
/// ## Recovery
/// - `load_latest()` returns the highest height, or `NoCheckpointFound`
/// - Blob validation (checksum, version) is left to `Checkpoint::decode`
pub struct CheckpointStore {
    directory: PathBuf,
    max_checkpoints: usize,
}

impl CheckpointStore {
    pub fn new(directory: impl AsRef<Path>, max_checkpoints: usize) -> Self {
        CheckpointStore {
            directory: directory.as_ref().to_path_buf(),
            max_checkpoints: max_checkpoints.max(1),
        }
    }

    pub fn from_config(config: &CheckpointConfig) -> Self {
        Self::new(&config.directory, config.max_checkpoints)
    }

    fn path_for(&self, height: u64) -> PathBuf {
        self.directory.join(format!("checkpoint_{}.bin", height))
    }

    pub fn save(&self, height: u64, blob: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.directory)?;

        let path = self.path_for(height);
        let tmp = path.with_extension("bin.tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &path)?;

        tracing::info!(height, bytes = blob.len(), "Saved checkpoint to {:?}", path);

        self.cleanup_old_checkpoints()?;
        Ok(path)
    }

    /// Highest-height checkpoint on disk.
    pub fn load_latest(&self) -> Result<(u64, Vec<u8>)> {
        let checkpoints = self.list_checkpoints()?;
        let (height, path) = checkpoints.last().ok_or(Error::NoCheckpointFound)?;
        let blob = fs::read(path)?;
        tracing::info!(height, "Loaded checkpoint from {:?}", path);
        Ok((*height, blob))
    }

    pub fn load_at_height(&self, height: u64) -> Result<Vec<u8>> {
        let path = self.path_for(height);
        if !path.exists() {
            return Err(Error::NoCheckpointFound);
        }
        Ok(fs::read(path)?)
    }

    /// All checkpoints, sorted by height.
    pub fn list_checkpoints(&self) -> Result<Vec<(u64, PathBuf)>> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }

        let mut checkpoints = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            let height = path.file_name()
                .and_then(|n| n.to_str())
                .and_then(|s| s.strip_prefix("checkpoint_"))
                .and_then(|s| s.strip_suffix(".bin"))
                .and_then(|s| s.parse::<u64>().ok());
            if let Some(height) = height {
                checkpoints.push((height, path));
            }
        }
        checkpoints.sort_by_key(|(height, _)| *height);
        Ok(checkpoints)
    }

    fn cleanup_old_checkpoints(&self) -> Result<()> {
        let checkpoints = self.list_checkpoints()?;
        if checkpoints.len() <= self.max_checkpoints {
            return Ok(());
        }

        let to_delete = checkpoints.len() - self.max_checkpoints;
        for (height, path) in checkpoints.iter().take(to_delete) {
            fs::remove_file(path)?;
            tracing::info!(height, "Deleted old checkpoint {:?}", path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("collateral-checkpoints-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_missing_directory_has_no_checkpoint() {
        let store = CheckpointStore::new(scratch_dir("missing"), 3);
        assert!(matches!(store.load_latest(), Err(Error::NoCheckpointFound)));
    }

    #[test]
    fn test_latest_by_height_and_retention() {
        let dir = scratch_dir("retention");
        let store = CheckpointStore::new(&dir, 2);
        store.save(9, b"nine").unwrap();
        store.save(10, b"ten").unwrap();
        store.save(100, b"hundred").unwrap();

        let heights: Vec<u64> = store.list_checkpoints().unwrap().into_iter().map(|(h, _)| h).collect();
        assert_eq!(heights, vec![10, 100]);
        assert_eq!(store.load_latest().unwrap(), (100, b"hundred".to_vec()));
        assert_eq!(store.load_at_height(10).unwrap(), b"ten".to_vec());
        assert!(matches!(store.load_at_height(9), Err(Error::NoCheckpointFound)));

        fs::remove_dir_all(&dir).unwrap();
    }
}
