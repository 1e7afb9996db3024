use std::cell::RefCell;

use serde::Serialize;
use tracing::{info, warn};

use crate::controller::{SaveImport, SessionController};
use crate::error::SessionError;
use crate::hashing::content_hash;
use crate::persist::{
    Account, AssetKind, AssetStore, AssetUpload, Credentials, Library, StoredAsset,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    pub skipped: Vec<String>,
}

pub async fn login(
    store: &dyn AssetStore,
    library: &RefCell<Library>,
    credentials: &Credentials,
) -> Result<Account, SessionError> {
    let account = store.login(credentials).await?;
    info!(username = %account.username, "signed_in");
    refresh_library(store, library).await?;
    Ok(account)
}

pub async fn register(
    store: &dyn AssetStore,
    credentials: &Credentials,
) -> Result<(), SessionError> {
    store.register(credentials).await?;
    info!(username = %credentials.username, "account_registered");
    Ok(())
}

pub async fn refresh_library(
    store: &dyn AssetStore,
    library: &RefCell<Library>,
) -> Result<(), SessionError> {
    let cartridges = store.list(AssetKind::Cartridge).await?;
    let saves = store.list(AssetKind::Save).await?;
    info!(
        cartridges = cartridges.len(),
        saves = saves.len(),
        "library_refreshed"
    );
    let mut library = library.borrow_mut();
    library.replace(AssetKind::Cartridge, cartridges);
    library.replace(AssetKind::Save, saves);
    Ok(())
}

/// Removes a stored cartridge. The local mirror only changes once the
/// service confirmed the delete.
pub async fn delete_cartridge(
    store: &dyn AssetStore,
    library: &RefCell<Library>,
    hash: &str,
) -> Result<Option<StoredAsset>, SessionError> {
    if let Err(error) = store.delete_cartridge(hash).await {
        warn!(hash, error = %error, "cartridge_delete_failed");
        return Err(error.into());
    }
    let removed = library.borrow_mut().remove(AssetKind::Cartridge, hash);
    info!(hash, name = ?removed.as_ref().map(|asset| asset.name.as_str()), "cartridge_deleted");
    Ok(removed)
}

pub async fn upload_cartridges(
    session: &RefCell<SessionController>,
    store: &dyn AssetStore,
    library: &RefCell<Library>,
    names: &[String],
) -> Result<UploadReport, SessionError> {
    let mut report = UploadReport::default();
    let mut pending: Vec<AssetUpload> = Vec::new();
    {
        let mut session = session.borrow_mut();
        let library = library.borrow();
        for name in names {
            let bytes = session.export_cartridge_bytes(name)?;
            let hash = content_hash(&bytes);
            let known = library.contains_hash(AssetKind::Cartridge, &hash)
                || pending.iter().any(|upload| upload.hash == hash);
            if known {
                report.skipped.push(name.clone());
                continue;
            }
            pending.push(AssetUpload {
                name: name.clone(),
                hash,
                bytes,
            });
        }
    }

    if pending.is_empty() {
        info!(skipped = report.skipped.len(), "cartridge_upload_skipped");
        return Ok(report);
    }

    let stored = store.upload(AssetKind::Cartridge, &pending).await?;
    report.uploaded = pending.into_iter().map(|upload| upload.name).collect();
    library.borrow_mut().merge(AssetKind::Cartridge, stored);
    info!(
        uploaded = report.uploaded.len(),
        skipped = report.skipped.len(),
        "cartridges_uploaded"
    );
    Ok(report)
}

pub async fn upload_save(
    session: &RefCell<SessionController>,
    store: &dyn AssetStore,
    library: &RefCell<Library>,
    save_name: &str,
) -> Result<Vec<StoredAsset>, SessionError> {
    let bytes = session.borrow_mut().export_save_bytes(save_name)?;
    let upload = AssetUpload {
        name: save_name.to_string(),
        hash: content_hash(&bytes),
        bytes,
    };
    let stored = store.upload(AssetKind::Save, &[upload]).await?;
    library.borrow_mut().merge(AssetKind::Save, stored.clone());
    info!(save = save_name, "save_uploaded");
    Ok(stored)
}

pub async fn resume_stored(
    session: &RefCell<SessionController>,
    store: &dyn AssetStore,
    cartridge: &StoredAsset,
    save: Option<&StoredAsset>,
) -> Result<(), SessionError> {
    let rom = store.fetch(AssetKind::Cartridge, &cartridge.hash).await?;
    let save_bytes = match save {
        Some(save) => Some((store.fetch(AssetKind::Save, &save.hash).await?, save)),
        None => None,
    };

    let import = save_bytes.as_ref().map(|(bytes, save)| SaveImport {
        bytes,
        name: Some(save.name.as_str()),
    });
    session
        .borrow_mut()
        .import_and_play(&rom, &cartridge.name, import)?;
    info!(
        rom = %cartridge.name,
        save = ?save.map(|save| save.name.as_str()),
        "stored_session_resumed"
    );
    Ok(())
}
