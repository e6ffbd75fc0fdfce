use config::ConfigError;
use data_ingestion::config::load_section;
use log::info;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Durable storage for fitted models, keyed by model name.
pub trait ModelStore: Send + Sync {
    fn save(&self, name: &str, bytes: &[u8]) -> io::Result<()>;

    fn load(&self, name: &str) -> io::Result<Vec<u8>>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub dir: PathBuf,
    #[serde(default = "default_model_name")]
    pub model_name: String,
}

fn default_model_name() -> String {
    "rfregressor_volatility".to_string()
}

impl StoreConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        load_section(path, "store")
    }
}

/// Stores each model as `<dir>/<name>.bin`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.bin", name))
    }
}

impl ModelStore for FileStore {
    fn save(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(name);
        fs::write(&path, bytes)?;
        info!("Saved model {} to {} ({} bytes)", name, path.display(), bytes.len());
        Ok(())
    }

    fn load(&self, name: &str) -> io::Result<Vec<u8>> {
        let path = self.path_for(name);
        info!("Loading model {} from {}", name, path.display());
        fs::read(path)
    }
}

/// In-process store; counts saves so callers can check persistence happened.
#[derive(Debug, Default)]
pub struct MemoryStore {
    models: RwLock<HashMap<String, Vec<u8>>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.read().contains_key(name)
    }
}

impl ModelStore for MemoryStore {
    fn save(&self, name: &str, bytes: &[u8]) -> io::Result<()> {
        let mut models = self.models.write();
        models.insert(name.to_string(), bytes.to_vec());
        // counted under the write lock
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self, name: &str) -> io::Result<Vec<u8>> {
        self.models
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no model named {}", name)))
    }
}
