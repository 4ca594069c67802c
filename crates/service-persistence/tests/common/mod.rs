use service_persistence::StoreConfig;
use std::path::PathBuf;
use uuid::Uuid;

/// SQLite file in the temp dir, removed together with its `-wal`/`-shm`
/// companions on drop. Declare it before the `Storage` that uses it.
pub struct TempDb {
  path: PathBuf,
}

impl TempDb {
  pub fn new(prefix: &str) -> Self {
    Self { path: std::env::temp_dir().join(format!("{}_{}.db", prefix, Uuid::new_v4())) }
  }

  pub fn config(&self) -> StoreConfig {
    StoreConfig::new(self.path.to_str().unwrap())
  }
}

impl Drop for TempDb {
  fn drop(&mut self) {
    for suffix in ["", "-wal", "-shm"] {
      let mut file = self.path.clone().into_os_string();
      file.push(suffix);
      let _ = std::fs::remove_file(file);
    }
  }
}
