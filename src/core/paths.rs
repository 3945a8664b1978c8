use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "KB_DATA_DIR";

/// Layout of the on-disk data directory
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub root: PathBuf,
    pub config: PathBuf,
    pub database: PathBuf,
}

impl DataPaths {
    /// Resolve from `--data-dir`, then `KB_DATA_DIR`, then `./.knowledge`
    pub fn resolve(explicit: Option<&Path>) -> Self {
        let root = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| {
                std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(".knowledge")
            });
        Self::from_root(root)
    }

    pub fn from_root(root: PathBuf) -> Self {
        Self {
            config: root.join("config.yaml"),
            database: root.join("knowledge.db"),
            root,
        }
    }

    pub fn required_folders(&self) -> Vec<(&PathBuf, &str)> {
        vec![(&self.root, "Knowledge base data")]
    }
}
