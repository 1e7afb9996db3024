use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vfs::save_name_for;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Cartridge,
    Save,
}

impl AssetKind {
    pub const fn label(self) -> &'static str {
        match self {
            AssetKind::Cartridge => "cartridge",
            AssetKind::Save => "save",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAsset {
    pub hash: String,
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub uploaded_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUpload {
    pub name: String,
    pub hash: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },
    #[error("{endpoint} rejected the request ({status}): {message}")]
    Rejected {
        endpoint: String,
        status: u16,
        message: String,
    },
    #[error("unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
    #[error("csrf token cookie `{cookie}` is not set")]
    MissingCsrf { cookie: String },
}

#[async_trait(?Send)]
pub trait AssetStore {
    async fn login(&self, credentials: &Credentials) -> Result<Account, PersistenceError>;
    async fn register(&self, credentials: &Credentials) -> Result<(), PersistenceError>;
    async fn list(&self, kind: AssetKind) -> Result<Vec<StoredAsset>, PersistenceError>;
    async fn fetch(&self, kind: AssetKind, hash: &str) -> Result<Vec<u8>, PersistenceError>;
    async fn upload(
        &self,
        kind: AssetKind,
        items: &[AssetUpload],
    ) -> Result<Vec<StoredAsset>, PersistenceError>;
    async fn delete_cartridge(&self, hash: &str) -> Result<(), PersistenceError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Library {
    cartridges: Vec<StoredAsset>,
    saves: Vec<StoredAsset>,
}

impl Library {
    pub fn cartridges(&self) -> &[StoredAsset] {
        &self.cartridges
    }

    pub fn saves(&self) -> &[StoredAsset] {
        &self.saves
    }

    pub fn assets(&self, kind: AssetKind) -> &[StoredAsset] {
        match kind {
            AssetKind::Cartridge => &self.cartridges,
            AssetKind::Save => &self.saves,
        }
    }

    fn assets_mut(&mut self, kind: AssetKind) -> &mut Vec<StoredAsset> {
        match kind {
            AssetKind::Cartridge => &mut self.cartridges,
            AssetKind::Save => &mut self.saves,
        }
    }

    pub fn replace(&mut self, kind: AssetKind, assets: Vec<StoredAsset>) {
        *self.assets_mut(kind) = assets;
    }

    pub fn merge(&mut self, kind: AssetKind, assets: Vec<StoredAsset>) {
        let existing = self.assets_mut(kind);
        for asset in assets {
            match existing.iter_mut().find(|entry| entry.hash == asset.hash) {
                Some(entry) => *entry = asset,
                None => existing.push(asset),
            }
        }
    }

    pub fn remove(&mut self, kind: AssetKind, hash: &str) -> Option<StoredAsset> {
        let assets = self.assets_mut(kind);
        let index = assets.iter().position(|asset| asset.hash == hash)?;
        Some(assets.remove(index))
    }

    pub fn find(&self, kind: AssetKind, hash: &str) -> Option<&StoredAsset> {
        self.assets(kind).iter().find(|asset| asset.hash == hash)
    }

    pub fn contains_hash(&self, kind: AssetKind, hash: &str) -> bool {
        self.find(kind, hash).is_some()
    }

    /// Most recently uploaded save named after `cartridge`.
    pub fn save_for(&self, cartridge: &StoredAsset) -> Option<&StoredAsset> {
        let expected = save_name_for(&cartridge.name);
        self.saves
            .iter()
            .filter(|save| save.name == expected)
            .max_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at))
    }
}
