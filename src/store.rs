//! Persistence of the single trained model slot.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::Result;
use crate::nn::ModelSnapshot;

/// Key of the one slot every store holds.
pub const MODEL_KEY: &str = "trainedModel";

/// Holds at most one serialized model.
///
/// The slot is neither versioned nor tied to a dataset. A snapshot trained
/// under different normalization constants must not be saved here.
pub trait ModelStore {
    /// Replaces whatever model is stored.
    fn save(&mut self, snapshot: &ModelSnapshot) -> Result<()>;

    /// `None` when nothing has been saved.
    fn load(&self) -> Result<Option<ModelSnapshot>>;

    fn clear(&mut self) -> Result<()>;
}

/// In-process store keeping the snapshot as JSON text.
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    slot: Option<String>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for MemoryModelStore {
    fn save(&mut self, snapshot: &ModelSnapshot) -> Result<()> {
        self.slot = Some(snapshot.to_json()?);
        Ok(())
    }

    fn load(&self) -> Result<Option<ModelSnapshot>> {
        self.slot
            .as_deref()
            .map(ModelSnapshot::from_json)
            .transpose()
    }

    fn clear(&mut self) -> Result<()> {
        self.slot = None;
        Ok(())
    }
}

/// Directory-backed store; the model survives process restarts.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    dir: PathBuf,
}

impl FileModelStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        FileModelStore { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{MODEL_KEY}.json"))
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!(".{MODEL_KEY}.json.tmp"))
    }
}

impl ModelStore for FileModelStore {
    fn save(&mut self, snapshot: &ModelSnapshot) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let temp = self.temp_path();
        fs::write(&temp, snapshot.to_json()?)?;
        fs::rename(&temp, self.path())?;
        info!("saved model to {}", self.path().display());
        Ok(())
    }

    fn load(&self) -> Result<Option<ModelSnapshot>> {
        match fs::read_to_string(self.path()) {
            Ok(json) => Ok(Some(ModelSnapshot::from_json(&json)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no stored model at {}", self.path().display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&mut self) -> Result<()> {
        remove_if_present(&self.path())?;
        info!("cleared stored model at {}", self.path().display());
        Ok(())
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}
