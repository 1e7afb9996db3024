use thiserror::Error;
use tracing::debug;

use crate::engine::{EngineError, EngineFs};

pub const CARTRIDGE_EXTENSIONS: [&str; 3] = ["gba", "gbc", "gb"];
pub const SAVE_EXTENSION: &str = "sav";

const DEFAULT_GAMES_DIR: &str = "/data/games";
const DEFAULT_SAVES_DIR: &str = "/data/saves";

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("no file at {path}")]
    NotFound { path: String },
    #[error("virtual filesystem {operation} on {path} failed: {source}")]
    Io {
        operation: &'static str,
        path: String,
        #[source]
        source: EngineError,
    },
}

impl VfsError {
    fn io(operation: &'static str, path: &str, source: EngineError) -> Self {
        Self::Io {
            operation,
            path: path.to_string(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLayout {
    pub games_dir: String,
    pub saves_dir: String,
}

impl Default for PathLayout {
    fn default() -> Self {
        Self {
            games_dir: DEFAULT_GAMES_DIR.to_string(),
            saves_dir: DEFAULT_SAVES_DIR.to_string(),
        }
    }
}

impl PathLayout {
    pub fn cartridge_path(&self, name: &str) -> String {
        join_path(&self.games_dir, name)
    }

    pub fn save_path(&self, name: &str) -> String {
        join_path(&self.saves_dir, name)
    }
}

pub fn is_cartridge_name(name: &str) -> bool {
    if name.is_empty() || name.contains('/') {
        return false;
    }
    match name.rsplit_once('.') {
        Some((_, extension)) => CARTRIDGE_EXTENSIONS
            .iter()
            .any(|allowed| extension.eq_ignore_ascii_case(allowed)),
        None => false,
    }
}

pub fn save_name_for(cartridge_name: &str) -> String {
    let stem = cartridge_name
        .rsplit_once('.')
        .map_or(cartridge_name, |(stem, _)| stem);
    format!("{stem}.{SAVE_EXTENSION}")
}

#[derive(Debug, Clone, Default)]
pub struct VirtualFileBridge {
    layout: PathLayout,
}

impl VirtualFileBridge {
    pub fn new(layout: PathLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &PathLayout {
        &self.layout
    }

    pub fn write<F: EngineFs + ?Sized>(
        &self,
        fs: &mut F,
        path: &str,
        bytes: &[u8],
    ) -> Result<(), VfsError> {
        fs.write_file(path, bytes)
            .map_err(|source| VfsError::io("write", path, source))?;
        fs.sync()
            .map_err(|source| VfsError::io("sync", path, source))?;
        debug!(path, byte_len = bytes.len(), "vfs_write");
        Ok(())
    }

    pub fn read<F: EngineFs + ?Sized>(&self, fs: &mut F, path: &str) -> Result<Vec<u8>, VfsError> {
        if !fs.path_exists(path) {
            return Err(VfsError::NotFound {
                path: path.to_string(),
            });
        }
        fs.read_file(path)
            .map_err(|source| VfsError::io("read", path, source))
    }

    /// Returns whether a file was removed; a missing path is not an error.
    pub fn safe_remove<F: EngineFs + ?Sized>(
        &self,
        fs: &mut F,
        path: &str,
    ) -> Result<bool, VfsError> {
        if !fs.path_exists(path) {
            return Ok(false);
        }
        fs.unlink(path)
            .map_err(|source| VfsError::io("unlink", path, source))?;
        debug!(path, "vfs_removed");
        Ok(true)
    }

    pub fn write_cartridge<F: EngineFs + ?Sized>(
        &self,
        fs: &mut F,
        name: &str,
        bytes: &[u8],
    ) -> Result<String, VfsError> {
        let path = self.layout.cartridge_path(name);
        self.write(fs, &path, bytes)?;
        Ok(path)
    }

    pub fn replace_save<F: EngineFs + ?Sized>(
        &self,
        fs: &mut F,
        name: &str,
        bytes: &[u8],
    ) -> Result<String, VfsError> {
        let path = self.layout.save_path(name);
        self.safe_remove(fs, &path)?;
        self.write(fs, &path, bytes)?;
        Ok(path)
    }

    pub fn read_cartridge<F: EngineFs + ?Sized>(
        &self,
        fs: &mut F,
        name: &str,
    ) -> Result<Vec<u8>, VfsError> {
        self.read(fs, &self.layout.cartridge_path(name))
    }

    pub fn read_save<F: EngineFs + ?Sized>(
        &self,
        fs: &mut F,
        name: &str,
    ) -> Result<Vec<u8>, VfsError> {
        self.read(fs, &self.layout.save_path(name))
    }
}

fn join_path(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}
