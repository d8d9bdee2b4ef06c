//! Backend contract consumed by the pipeline.
//!
//! A backend implements [`StorageConnector`] (websites and assets),
//! [`HostingConnector`] (published output) or both. The pipeline only talks
//! to these traits; [`ConnectorRegistry`] picks the backend for a request.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use pipeline_logging::{pipeline_debug, pipeline_info};
use publish_core::{ConnectorFile, FileAction, Job, PublishStage, Session};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hooks::{DefaultHostingHook, HostingHook};
use crate::jobs::JobManager;

pub type WebsiteId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectorType {
    Storage,
    Hosting,
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorType::Storage => write!(f, "storage"),
            ConnectorType::Hosting => write!(f, "hosting"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorErrorKind {
    NotFound,
    NotLoggedIn,
    InvalidInput,
    Backend,
}

impl ConnectorErrorKind {
    fn default_status(self) -> u16 {
        match self {
            ConnectorErrorKind::NotFound => 404,
            ConnectorErrorKind::NotLoggedIn => 401,
            ConnectorErrorKind::InvalidInput => 400,
            ConnectorErrorKind::Backend => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ConnectorError {
    pub kind: ConnectorErrorKind,
    pub message: String,
    /// Status reported by the backend itself; wins over the kind's default.
    pub status: Option<u16>,
}

impl ConnectorError {
    pub fn new(kind: ConnectorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::NotFound, message)
    }

    pub fn not_logged_in(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::NotLoggedIn, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ConnectorErrorKind::Backend, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn http_status(&self) -> u16 {
        self.status.unwrap_or_else(|| self.kind.default_status())
    }
}

/// Website listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteMeta {
    pub website_id: WebsiteId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub connector_user_settings: HashMap<String, Value>,
}

/// Editable fields of [`WebsiteMeta`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteMetaFileContent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub connector_user_settings: HashMap<String, Value>,
}

impl WebsiteMeta {
    pub fn from_file_content(website_id: impl Into<WebsiteId>, content: WebsiteMetaFileContent) -> Self {
        Self {
            website_id: website_id.into(),
            name: content.name,
            image_url: content.image_url,
            connector_user_settings: content.connector_user_settings,
        }
    }
}

/// The editable source of a website: HTML bytes as stored plus the JSON
/// site description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebsiteData {
    pub html: Vec<u8>,
    /// `Content-Type` the backend reported for the HTML, if any.
    pub content_type: Option<String>,
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
    pub size: u64,
}

/// Login state of one connector for one session, as listed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorInfo {
    pub connector_id: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub connector_type: ConnectorType,
    pub is_logged_in: bool,
}

/// Called with `(written, total)` after each file of a batch.
pub type WriteProgress<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// Identity and login lifecycle shared by every backend.
///
/// The provided methods keep the session token under the connector id, which
/// is enough for backends that only need a bearer token.
#[async_trait]
pub trait Connector: Send + Sync {
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    fn connector_type(&self) -> ConnectorType;

    async fn is_logged_in(&self, session: &Session) -> bool {
        session.get(self.id()).is_some()
    }

    /// Where to send the user for an OAuth login, if the backend uses one.
    async fn get_oauth_url(&self, _session: &Session) -> Result<Option<String>, ConnectorError> {
        Ok(None)
    }

    /// HTML login form, for backends that collect credentials themselves.
    async fn get_login_form(
        &self,
        _session: &Session,
        _redirect_to: &str,
    ) -> Result<Option<String>, ConnectorError> {
        Ok(None)
    }

    async fn set_token(&self, session: &mut Session, token: Value) -> Result<(), ConnectorError> {
        session.insert(self.id(), token);
        Ok(())
    }

    async fn logout(&self, session: &mut Session) -> Result<(), ConnectorError> {
        session.remove(self.id());
        Ok(())
    }
}

#[async_trait]
pub trait StorageConnector: Connector {
    async fn list_websites(&self, session: &Session) -> Result<Vec<WebsiteMeta>, ConnectorError>;

    async fn read_website(
        &self,
        session: &Session,
        website_id: &str,
    ) -> Result<WebsiteData, ConnectorError>;

    async fn create_website(
        &self,
        session: &Session,
        meta: WebsiteMetaFileContent,
    ) -> Result<WebsiteId, ConnectorError>;

    async fn update_website(
        &self,
        session: &Session,
        website_id: &str,
        data: WebsiteData,
    ) -> Result<(), ConnectorError>;

    async fn delete_website(&self, session: &Session, website_id: &str) -> Result<(), ConnectorError>;

    /// Copies meta and source into a new website. Assets stay shared.
    async fn duplicate_website(
        &self,
        session: &Session,
        website_id: &str,
    ) -> Result<WebsiteId, ConnectorError> {
        let meta = self.get_website_meta(session, website_id).await?;
        let data = self.read_website(session, website_id).await?;
        let copy = WebsiteMetaFileContent {
            name: format!("{} copy", meta.name),
            image_url: meta.image_url,
            connector_user_settings: meta.connector_user_settings,
        };
        let new_id = self.create_website(session, copy).await?;
        self.update_website(session, &new_id, data).await?;
        Ok(new_id)
    }

    async fn get_website_meta(
        &self,
        session: &Session,
        website_id: &str,
    ) -> Result<WebsiteMeta, ConnectorError>;

    async fn set_website_meta(
        &self,
        session: &Session,
        website_id: &str,
        meta: WebsiteMetaFileContent,
    ) -> Result<(), ConnectorError>;

    /// Writes a batch of assets. Returns the final path of every file, in
    /// input order, since a backend may rename on write.
    async fn write_assets(
        &self,
        session: &Session,
        website_id: &str,
        files: Vec<ConnectorFile>,
        progress: Option<WriteProgress<'_>>,
    ) -> Result<Vec<String>, ConnectorError>;

    async fn read_asset(
        &self,
        session: &Session,
        website_id: &str,
        path: &str,
    ) -> Result<ConnectorFile, ConnectorError>;

    async fn delete_assets(
        &self,
        session: &Session,
        website_id: &str,
        paths: &[String],
    ) -> Result<(), ConnectorError>;
}

#[async_trait]
pub trait HostingConnector: Connector {
    /// Customizations applied by the pipeline for this host.
    fn hook(&self) -> Arc<dyn HostingHook> {
        Arc::new(DefaultHostingHook)
    }

    /// Public URL of the published website.
    async fn get_url(&self, session: &Session, website_id: &str) -> Result<String, ConnectorError>;

    /// `Ok(None)` when nothing exists at `path`.
    async fn stat(
        &self,
        session: &Session,
        website_id: &str,
        path: &str,
    ) -> Result<Option<FileStat>, ConnectorError>;

    /// Applies the actions in order, as one unit where the backend allows.
    async fn write_batch(
        &self,
        session: &Session,
        website_id: &str,
        actions: Vec<FileAction>,
    ) -> Result<(), ConnectorError>;

    /// Publishes already rendered files under a job and returns the job once
    /// it is terminal.
    async fn publish(
        &self,
        session: &Session,
        website_id: &str,
        files: Vec<ConnectorFile>,
        jobs: &JobManager,
    ) -> Result<Job, ConnectorError> {
        let job = jobs.start_job(format!("Publishing to {}", self.display_name()));
        pipeline_info!(job = job.id; "Publishing {} files to {}", files.len(), self.id());
        jobs.set_message(&job.id, PublishStage::Writing.status_message());

        let actions = files
            .into_iter()
            .map(|file| FileAction::write_file(file.path, file.content))
            .collect();
        match self.write_batch(session, website_id, actions).await {
            Ok(()) => {
                if let Ok(url) = self.get_url(session, website_id).await {
                    jobs.set_url(&job.id, url);
                }
                jobs.job_success(&job.id, PublishStage::Success.status_message());
            }
            Err(err) => {
                jobs.job_error(&job.id, err.to_string());
            }
        }
        Ok(jobs.get_job(&job.id).unwrap_or(job))
    }
}

/// Registered backends, in registration order.
#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    storage: Vec<Arc<dyn StorageConnector>>,
    hosting: Vec<Arc<dyn HostingConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_storage(&mut self, connector: Arc<dyn StorageConnector>) -> &mut Self {
        self.storage.push(connector);
        self
    }

    pub fn register_hosting(&mut self, connector: Arc<dyn HostingConnector>) -> &mut Self {
        self.hosting.push(connector);
        self
    }

    pub async fn storage(
        &self,
        session: &Session,
        connector_id: Option<&str>,
    ) -> Result<Arc<dyn StorageConnector>, ConnectorError> {
        resolve(&self.storage, session, connector_id, ConnectorType::Storage).await
    }

    pub async fn hosting(
        &self,
        session: &Session,
        connector_id: Option<&str>,
    ) -> Result<Arc<dyn HostingConnector>, ConnectorError> {
        resolve(&self.hosting, session, connector_id, ConnectorType::Hosting).await
    }

    /// Every registered connector with its login state for `session`.
    pub async fn describe(&self, session: &Session) -> Vec<ConnectorInfo> {
        let mut infos = Vec::with_capacity(self.storage.len() + self.hosting.len());
        for connector in &self.storage {
            infos.push(info(connector.as_ref(), session).await);
        }
        for connector in &self.hosting {
            infos.push(info(connector.as_ref(), session).await);
        }
        infos
    }
}

async fn info<C: Connector + ?Sized>(connector: &C, session: &Session) -> ConnectorInfo {
    ConnectorInfo {
        connector_id: connector.id().to_string(),
        display_name: connector.display_name().to_string(),
        connector_type: connector.connector_type(),
        is_logged_in: connector.is_logged_in(session).await,
    }
}

/// Exact id when given, else the first connector the session is logged in
/// to, else the first registered one.
async fn resolve<C: Connector + ?Sized>(
    connectors: &[Arc<C>],
    session: &Session,
    connector_id: Option<&str>,
    connector_type: ConnectorType,
) -> Result<Arc<C>, ConnectorError> {
    if let Some(id) = connector_id {
        return connectors
            .iter()
            .find(|connector| connector.id() == id)
            .cloned()
            .ok_or_else(|| {
                ConnectorError::not_found(format!("Connector not found: {connector_type} {id}"))
            });
    }
    for connector in connectors {
        if connector.is_logged_in(session).await {
            pipeline_debug!("Using logged in {} connector {}", connector_type, connector.id());
            return Ok(connector.clone());
        }
    }
    connectors
        .first()
        .cloned()
        .ok_or_else(|| ConnectorError::not_found(format!("No {connector_type} connector registered")))
}
