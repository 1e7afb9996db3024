use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use async_trait::async_trait;

use crate::engine::{Engine, EngineError, EngineFs};
use crate::hashing::content_hash;
use crate::persist::{
    Account, AssetKind, AssetStore, AssetUpload, Credentials, PersistenceError, StoredAsset,
};

/// Every mutating engine primitive, in call order. `path_exists` is a query and
/// is not recorded.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EngineCall {
    WriteFile(String),
    ReadFile(String),
    Unlink(String),
    Sync,
    LoadGame(String),
    PauseGame,
    ResumeGame,
    QuitGame,
    ButtonPress(String),
    ButtonUnpress(String),
    SetFastForward(u8),
    SetVolume(f32),
    QuickReload,
    ToggleInput(bool),
}

#[derive(Debug, Default)]
struct EngineLog {
    calls: Vec<EngineCall>,
    files: BTreeMap<String, Vec<u8>>,
    reject_loads: bool,
    fail_sync: bool,
    failing_quits: usize,
}

/// Engine double. Clones share one log, so a test can keep a clone after
/// handing the engine to a controller.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingEngine {
    log: Rc<RefCell<EngineLog>>,
}

impl RecordingEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_file(self, path: &str, bytes: Vec<u8>) -> Self {
        self.log.borrow_mut().files.insert(path.to_string(), bytes);
        self
    }

    pub(crate) fn rejecting_loads(self) -> Self {
        self.log.borrow_mut().reject_loads = true;
        self
    }

    pub(crate) fn failing_sync(self) -> Self {
        self.log.borrow_mut().fail_sync = true;
        self
    }

    /// The next `count` quits fail.
    pub(crate) fn fail_next_quits(&self, count: usize) {
        self.log.borrow_mut().failing_quits = count;
    }

    pub(crate) fn boxed(&self) -> Box<dyn Engine> {
        Box::new(self.clone())
    }

    pub(crate) fn calls(&self) -> Vec<EngineCall> {
        self.log.borrow().calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.log.borrow_mut().calls.clear();
    }

    pub(crate) fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.log.borrow().files.get(path).cloned()
    }

    pub(crate) fn position(&self, call: &EngineCall) -> Option<usize> {
        self.log.borrow().calls.iter().position(|entry| entry == call)
    }

    fn record(&self, call: EngineCall) {
        self.log.borrow_mut().calls.push(call);
    }

    fn names_under(&self, dir: &str) -> Vec<String> {
        let prefix = format!("{dir}/");
        self.log
            .borrow()
            .files
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .map(ToString::to_string)
            .collect()
    }
}

impl EngineFs for RecordingEngine {
    fn write_file(&mut self, path: &str, bytes: &[u8]) -> Result<(), EngineError> {
        self.record(EngineCall::WriteFile(path.to_string()));
        self.log
            .borrow_mut()
            .files
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, EngineError> {
        self.record(EngineCall::ReadFile(path.to_string()));
        self.file(path)
            .ok_or_else(|| EngineError::call("readFile", format!("ENOENT: {path}")))
    }

    fn unlink(&mut self, path: &str) -> Result<(), EngineError> {
        self.record(EngineCall::Unlink(path.to_string()));
        self.log
            .borrow_mut()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| EngineError::call("unlink", format!("ENOENT: {path}")))
    }

    fn path_exists(&mut self, path: &str) -> bool {
        self.log.borrow().files.contains_key(path)
    }

    fn sync(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::Sync);
        if self.log.borrow().fail_sync {
            return Err(EngineError::call("FSSync", "quota exceeded"));
        }
        Ok(())
    }
}

impl Engine for RecordingEngine {
    fn load_game(&mut self, path: &str) -> Result<bool, EngineError> {
        self.record(EngineCall::LoadGame(path.to_string()));
        let log = self.log.borrow();
        Ok(!log.reject_loads && log.files.contains_key(path))
    }

    fn pause_game(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::PauseGame);
        Ok(())
    }

    fn resume_game(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::ResumeGame);
        Ok(())
    }

    fn quit_game(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::QuitGame);
        let mut log = self.log.borrow_mut();
        if log.failing_quits > 0 {
            log.failing_quits -= 1;
            return Err(EngineError::call("quitGame", "module aborted"));
        }
        Ok(())
    }

    fn button_press(&mut self, name: &str) -> Result<(), EngineError> {
        self.record(EngineCall::ButtonPress(name.to_string()));
        Ok(())
    }

    fn button_unpress(&mut self, name: &str) -> Result<(), EngineError> {
        self.record(EngineCall::ButtonUnpress(name.to_string()));
        Ok(())
    }

    fn set_fast_forward_multiplier(&mut self, multiplier: u8) -> Result<(), EngineError> {
        self.record(EngineCall::SetFastForward(multiplier));
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), EngineError> {
        self.record(EngineCall::SetVolume(volume));
        Ok(())
    }

    fn quick_reload(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::QuickReload);
        Ok(())
    }

    fn toggle_input(&mut self, enabled: bool) -> Result<(), EngineError> {
        self.record(EngineCall::ToggleInput(enabled));
        Ok(())
    }

    fn list_roms(&mut self) -> Result<Vec<String>, EngineError> {
        Ok(self.names_under("/data/games"))
    }

    fn list_saves(&mut self) -> Result<Vec<String>, EngineError> {
        Ok(self.names_under("/data/saves"))
    }
}

#[derive(Debug)]
struct StoredEntry {
    kind: AssetKind,
    asset: StoredAsset,
    bytes: Vec<u8>,
}

/// Asset store double keyed by content hash.
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    entries: RefCell<Vec<StoredEntry>>,
    uploads: RefCell<Vec<String>>,
    reject_credentials: bool,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_asset(self, kind: AssetKind, name: &str, bytes: &[u8]) -> Self {
        self.insert(kind, name, bytes);
        self
    }

    pub(crate) fn rejecting_credentials(mut self) -> Self {
        self.reject_credentials = true;
        self
    }

    pub(crate) fn uploaded_names(&self) -> Vec<String> {
        self.uploads.borrow().clone()
    }

    fn insert(&self, kind: AssetKind, name: &str, bytes: &[u8]) -> StoredAsset {
        let mut entries = self.entries.borrow_mut();
        let asset = StoredAsset {
            hash: content_hash(bytes),
            name: name.to_string(),
            owner: "ana".to_string(),
            size: bytes.len() as u64,
            uploaded_at: format!("2024-01-01T00:00:{:02}", entries.len()),
        };
        entries.push(StoredEntry {
            kind,
            asset: asset.clone(),
            bytes: bytes.to_vec(),
        });
        asset
    }

    fn not_found(endpoint: &str) -> PersistenceError {
        PersistenceError::Rejected {
            endpoint: endpoint.to_string(),
            status: 404,
            message: "not found".to_string(),
        }
    }
}

#[async_trait(?Send)]
impl AssetStore for MemoryStore {
    async fn login(&self, credentials: &Credentials) -> Result<Account, PersistenceError> {
        if self.reject_credentials {
            return Err(PersistenceError::Rejected {
                endpoint: "/api/login".to_string(),
                status: 401,
                message: "invalid username or password".to_string(),
            });
        }
        Ok(Account {
            username: credentials.username.clone(),
        })
    }

    async fn register(&self, _credentials: &Credentials) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn list(&self, kind: AssetKind) -> Result<Vec<StoredAsset>, PersistenceError> {
        Ok(self
            .entries
            .borrow()
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.asset.clone())
            .collect())
    }

    async fn fetch(&self, kind: AssetKind, hash: &str) -> Result<Vec<u8>, PersistenceError> {
        self.entries
            .borrow()
            .iter()
            .find(|entry| entry.kind == kind && entry.asset.hash == hash)
            .map(|entry| entry.bytes.clone())
            .ok_or_else(|| Self::not_found("/api/fetch"))
    }

    async fn upload(
        &self,
        kind: AssetKind,
        items: &[AssetUpload],
    ) -> Result<Vec<StoredAsset>, PersistenceError> {
        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            stored.push(self.insert(kind, &item.name, &item.bytes));
            self.uploads.borrow_mut().push(item.name.clone());
        }
        Ok(stored)
    }

    async fn delete_cartridge(&self, hash: &str) -> Result<(), PersistenceError> {
        let mut entries = self.entries.borrow_mut();
        let index = entries
            .iter()
            .position(|entry| entry.kind == AssetKind::Cartridge && entry.asset.hash == hash)
            .ok_or_else(|| Self::not_found("/api/deleterom"))?;
        entries.remove(index);
        Ok(())
    }
}
