use std::cell::RefCell;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use session::{
    Account, AssetKind, AssetStore, AssetUpload, Credentials, PersistenceError, StoredAsset,
};
use tracing::{debug, warn};

pub(crate) const CSRF_HEADER: &str = "X-CSRF-TOKEN";

const LOGIN_PATH: &str = "/api/login";
const REGISTER_PATH: &str = "/api/register";

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

pub(crate) fn list_path(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Cartridge => "/api/loadroms",
        AssetKind::Save => "/api/loadsaves",
    }
}

pub(crate) fn upload_path(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Cartridge => "/api/uploadroms",
        AssetKind::Save => "/api/uploadsaves",
    }
}

pub(crate) fn asset_path(kind: AssetKind, hash: &str) -> String {
    match kind {
        AssetKind::Cartridge => format!("/api/roms/{hash}"),
        AssetKind::Save => format!("/api/saves/{hash}"),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    #[serde(default)]
    username: Option<String>,
}

/// Builds the rejection for a non-success response, preferring the
/// service's `{"error": ...}` message over the raw body.
pub(crate) fn rejection(endpoint: &str, status: u16, body: &str) -> PersistenceError {
    let decoded = serde_json::from_str::<ErrorBody>(body).unwrap_or_default();
    let message = decoded
        .error
        .or(decoded.msg)
        .unwrap_or_else(|| match body.trim() {
            "" => format!("status {status}"),
            raw => raw.to_string(),
        });
    PersistenceError::Rejected {
        endpoint: endpoint.to_string(),
        status,
        message,
    }
}

#[cfg(target_arch = "wasm32")]
fn with_credentials(request: RequestBuilder) -> RequestBuilder {
    request.fetch_credentials_include()
}

#[cfg(not(target_arch = "wasm32"))]
fn with_credentials(request: RequestBuilder) -> RequestBuilder {
    request
}

pub struct HttpAssetStore {
    client: Client,
    base_url: String,
    csrf_cookie: String,
    read_cookie: fn(&str) -> Option<String>,
    account: RefCell<Option<Account>>,
}

impl HttpAssetStore {
    pub fn new(base_url: &str, csrf_cookie: &str, read_cookie: fn(&str) -> Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            csrf_cookie: csrf_cookie.to_string(),
            read_cookie,
            account: RefCell::new(None),
        }
    }

    pub fn account(&self) -> Option<Account> {
        self.account.borrow().clone()
    }

    fn url(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }

    fn csrf_token(&self) -> Result<String, PersistenceError> {
        (self.read_cookie)(&self.csrf_cookie).ok_or_else(|| PersistenceError::MissingCsrf {
            cookie: self.csrf_cookie.clone(),
        })
    }

    fn mutating(&self, request: RequestBuilder) -> Result<RequestBuilder, PersistenceError> {
        Ok(request.header(CSRF_HEADER, self.csrf_token()?))
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Response, PersistenceError> {
        let response = with_credentials(request)
            .send()
            .await
            .map_err(|error| PersistenceError::Transport {
                endpoint: path.to_string(),
                message: error.to_string(),
            })?;
        let status = response.status();
        if status.is_success() {
            debug!(endpoint = path, status = status.as_u16(), "request_ok");
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let error = rejection(path, status.as_u16(), &body);
        warn!(endpoint = path, status = status.as_u16(), error = %error, "request_rejected");
        Err(error)
    }

    async fn json<T: DeserializeOwned>(
        path: &str,
        response: Response,
    ) -> Result<T, PersistenceError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|error| PersistenceError::Transport {
                endpoint: path.to_string(),
                message: error.to_string(),
            })?;
        serde_json::from_slice(&bytes).map_err(|error| PersistenceError::Decode {
            endpoint: path.to_string(),
            message: error.to_string(),
        })
    }
}

#[async_trait(?Send)]
impl AssetStore for HttpAssetStore {
    async fn login(&self, credentials: &Credentials) -> Result<Account, PersistenceError> {
        let request = self.client.post(self.url(LOGIN_PATH)).json(credentials);
        let response = self.send(LOGIN_PATH, request).await?;
        let body: LoginBody = Self::json(LOGIN_PATH, response).await?;
        let account = Account {
            username: body
                .username
                .unwrap_or_else(|| credentials.username.clone()),
        };
        *self.account.borrow_mut() = Some(account.clone());
        Ok(account)
    }

    async fn register(&self, credentials: &Credentials) -> Result<(), PersistenceError> {
        let request = self.client.post(self.url(REGISTER_PATH)).json(credentials);
        self.send(REGISTER_PATH, request).await?;
        Ok(())
    }

    async fn list(&self, kind: AssetKind) -> Result<Vec<StoredAsset>, PersistenceError> {
        let path = list_path(kind);
        let response = self.send(path, self.client.get(self.url(path))).await?;
        Self::json(path, response).await
    }

    async fn fetch(&self, kind: AssetKind, hash: &str) -> Result<Vec<u8>, PersistenceError> {
        let path = asset_path(kind, hash);
        let response = self.send(&path, self.client.get(self.url(&path))).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|error| PersistenceError::Transport {
                endpoint: path.clone(),
                message: error.to_string(),
            })?;
        Ok(bytes.to_vec())
    }

    async fn upload(
        &self,
        kind: AssetKind,
        items: &[AssetUpload],
    ) -> Result<Vec<StoredAsset>, PersistenceError> {
        let path = upload_path(kind);
        let form = items.iter().fold(Form::new(), |form, item| {
            let part = Part::bytes(item.bytes.clone()).file_name(item.name.clone());
            form.part(kind.label(), part)
                .text(format!("{}_hash", kind.label()), item.hash.clone())
        });
        let request = self.mutating(self.client.post(self.url(path)).multipart(form))?;
        let response = self.send(path, request).await?;
        Self::json(path, response).await
    }

    async fn delete_cartridge(&self, hash: &str) -> Result<(), PersistenceError> {
        let path = asset_path(AssetKind::Cartridge, hash);
        let request = self.mutating(self.client.delete(self.url(&path)))?;
        self.send(&path, request).await?;
        Ok(())
    }
}
