#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use publish_core::{ConnectorFile, FileAction, Job, JobId, Session};
use publish_engine::{
    Connector, ConnectorError, ConnectorType, DefaultHostingHook, FileStat, HostingConnector,
    HostingHook, JobManager, StorageConnector, WebsiteData, WebsiteId, WebsiteMeta,
    WebsiteMetaFileContent, WriteProgress,
};
use tokio::sync::Notify;

pub fn init_logging() {
    pipeline_logging::initialize_for_tests();
}

pub const WEBSITE_ID: &str = "site-1";

pub const SITE_HTML: &str = r##"<!doctype html>
<html><head><title>My site</title>
<style>.logo { background: url(img/bg.png) }</style>
<script>console.log("hi")</script>
<script type="text/json" id="silex-json-data">{}</script>
<style class="silex-style-editor-css">.x {}</style>
</head><body class="editable-style">
<nav><a href="#!page-1" class="page-link-active">Home</a><a href="#!page-2">About</a></nav>
<div class="paged-element page-1" data-silex-id="e1"><img src="img/logo.png"></div>
<div class="paged-element page-2 selected-element" data-silex-type="image" data-silex-id="e2"><img src="img/missing.png"></div>
<div data-silex-href="#!page-2" class="button"><span>Go</span></div>
</body></html>"##;

pub const SITE_DATA: &str = r#"{
  "site": { "title": "My site", "headUser": "<meta name=\"generator\" content=\"test\">" },
  "pages": [
    { "id": "page-1", "displayName": "Home" },
    { "id": "page-2", "displayName": "About" }
  ]
}"#;

pub fn session(id: &str) -> Session {
    Session::new(id)
}

/// In-memory backend acting as both storage and hosting.
pub struct MemoryConnector {
    id: String,
    require_login: bool,
    url: String,
    hook: Arc<dyn HostingHook>,
    websites: Mutex<HashMap<String, (WebsiteMeta, WebsiteData)>>,
    assets: Mutex<HashMap<String, Vec<u8>>>,
    entries: Mutex<HashMap<String, FileStat>>,
    batches: Mutex<Vec<Vec<FileAction>>>,
    stat_calls: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
    fail_writes: bool,
}

impl MemoryConnector {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            require_login: false,
            url: format!("https://{id}.example.com/"),
            hook: Arc::new(DefaultHostingHook),
            websites: Mutex::default(),
            assets: Mutex::default(),
            entries: Mutex::default(),
            batches: Mutex::default(),
            stat_calls: Mutex::default(),
            gate: Mutex::default(),
            fail_writes: false,
        }
    }

    /// The sample two-page website with two of its three assets stored.
    pub fn with_sample_site(self) -> Self {
        self.with_website(WEBSITE_ID, SITE_HTML, SITE_DATA)
            .with_asset("img/bg.png", b"bg")
            .with_asset("img/logo.png", b"logo")
    }

    pub fn with_website(mut self, id: &str, html: &str, data: &str) -> Self {
        let meta = WebsiteMeta::from_file_content(
            id,
            WebsiteMetaFileContent {
                name: id.to_string(),
                ..Default::default()
            },
        );
        let website = WebsiteData {
            html: html.as_bytes().to_vec(),
            content_type: Some("text/html; charset=utf-8".to_string()),
            data: data.to_string(),
        };
        self.websites
            .get_mut()
            .unwrap()
            .insert(id.to_string(), (meta, website));
        self
    }

    pub fn with_asset(mut self, path: &str, bytes: &[u8]) -> Self {
        self.assets
            .get_mut()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        self
    }

    pub fn with_entry(mut self, path: &str, is_dir: bool) -> Self {
        self.entries
            .get_mut()
            .unwrap()
            .insert(path.to_string(), FileStat { is_dir, size: 0 });
        self
    }

    /// The first `read_website` call waits until `gate` is notified.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        *self.gate.get_mut().unwrap() = Some(gate);
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn HostingHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn requiring_login(mut self) -> Self {
        self.require_login = true;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn batches(&self) -> Vec<Vec<FileAction>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn stat_calls(&self) -> Vec<String> {
        self.stat_calls.lock().unwrap().clone()
    }

    pub fn asset(&self, path: &str) -> Option<Vec<u8>> {
        self.assets.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        "Memory"
    }

    fn connector_type(&self) -> ConnectorType {
        ConnectorType::Storage
    }

    async fn is_logged_in(&self, session: &Session) -> bool {
        !self.require_login || session.get(self.id()).is_some()
    }
}

#[async_trait]
impl StorageConnector for MemoryConnector {
    async fn list_websites(&self, _session: &Session) -> Result<Vec<WebsiteMeta>, ConnectorError> {
        let mut list: Vec<WebsiteMeta> = self
            .websites
            .lock()
            .unwrap()
            .values()
            .map(|(meta, _)| meta.clone())
            .collect();
        list.sort_by(|a, b| a.website_id.cmp(&b.website_id));
        Ok(list)
    }

    async fn read_website(
        &self,
        _session: &Session,
        website_id: &str,
    ) -> Result<WebsiteData, ConnectorError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.websites
            .lock()
            .unwrap()
            .get(website_id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| ConnectorError::not_found(format!("Website {website_id} not found")))
    }

    async fn create_website(
        &self,
        _session: &Session,
        meta: WebsiteMetaFileContent,
    ) -> Result<WebsiteId, ConnectorError> {
        let mut websites = self.websites.lock().unwrap();
        let id = format!("site-{}", websites.len() + 1);
        websites.insert(
            id.clone(),
            (WebsiteMeta::from_file_content(id.clone(), meta), WebsiteData::default()),
        );
        Ok(id)
    }

    async fn update_website(
        &self,
        _session: &Session,
        website_id: &str,
        data: WebsiteData,
    ) -> Result<(), ConnectorError> {
        match self.websites.lock().unwrap().get_mut(website_id) {
            Some(entry) => {
                entry.1 = data;
                Ok(())
            }
            None => Err(ConnectorError::not_found(website_id)),
        }
    }

    async fn delete_website(&self, _session: &Session, website_id: &str) -> Result<(), ConnectorError> {
        self.websites
            .lock()
            .unwrap()
            .remove(website_id)
            .map(|_| ())
            .ok_or_else(|| ConnectorError::not_found(website_id))
    }

    async fn get_website_meta(
        &self,
        _session: &Session,
        website_id: &str,
    ) -> Result<WebsiteMeta, ConnectorError> {
        self.websites
            .lock()
            .unwrap()
            .get(website_id)
            .map(|(meta, _)| meta.clone())
            .ok_or_else(|| ConnectorError::not_found(website_id))
    }

    async fn set_website_meta(
        &self,
        _session: &Session,
        website_id: &str,
        meta: WebsiteMetaFileContent,
    ) -> Result<(), ConnectorError> {
        match self.websites.lock().unwrap().get_mut(website_id) {
            Some(entry) => {
                entry.0 = WebsiteMeta::from_file_content(website_id, meta);
                Ok(())
            }
            None => Err(ConnectorError::not_found(website_id)),
        }
    }

    async fn write_assets(
        &self,
        _session: &Session,
        _website_id: &str,
        files: Vec<ConnectorFile>,
        progress: Option<WriteProgress<'_>>,
    ) -> Result<Vec<String>, ConnectorError> {
        let total = files.len();
        let mut paths = Vec::with_capacity(total);
        for (index, file) in files.into_iter().enumerate() {
            let path = file.path.trim_start_matches('/').to_string();
            self.assets
                .lock()
                .unwrap()
                .insert(path.clone(), file.content.as_bytes().to_vec());
            paths.push(path);
            if let Some(progress) = progress {
                progress(index + 1, total);
            }
        }
        Ok(paths)
    }

    async fn read_asset(
        &self,
        _session: &Session,
        _website_id: &str,
        path: &str,
    ) -> Result<ConnectorFile, ConnectorError> {
        self.assets
            .lock()
            .unwrap()
            .get(path)
            .map(|bytes| ConnectorFile::new(path, bytes.clone()))
            .ok_or_else(|| ConnectorError::not_found(format!("Asset {path} not found")))
    }

    async fn delete_assets(
        &self,
        _session: &Session,
        _website_id: &str,
        paths: &[String],
    ) -> Result<(), ConnectorError> {
        let mut assets = self.assets.lock().unwrap();
        for path in paths {
            assets.remove(path);
        }
        Ok(())
    }
}

#[async_trait]
impl HostingConnector for MemoryConnector {
    fn hook(&self) -> Arc<dyn HostingHook> {
        self.hook.clone()
    }

    async fn get_url(&self, _session: &Session, website_id: &str) -> Result<String, ConnectorError> {
        Ok(format!("{}{}", self.url, website_id))
    }

    async fn stat(
        &self,
        _session: &Session,
        _website_id: &str,
        path: &str,
    ) -> Result<Option<FileStat>, ConnectorError> {
        self.stat_calls.lock().unwrap().push(path.to_string());
        Ok(self.entries.lock().unwrap().get(path).copied())
    }

    async fn write_batch(
        &self,
        _session: &Session,
        _website_id: &str,
        actions: Vec<FileAction>,
    ) -> Result<(), ConnectorError> {
        if self.fail_writes {
            return Err(ConnectorError::backend("disk full").with_status(507));
        }
        let mut entries = self.entries.lock().unwrap();
        for action in &actions {
            let is_dir = action.is_mkdir();
            entries.insert(action.path().to_string(), FileStat { is_dir, size: 0 });
        }
        self.batches.lock().unwrap().push(actions);
        Ok(())
    }
}

/// Polls until the job is terminal.
pub async fn wait_for_job(jobs: &JobManager, id: &JobId) -> Job {
    for _ in 0..500 {
        if let Some(job) = jobs.get_job(id) {
            if job.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not finish");
}

pub fn paths(actions: &[FileAction]) -> Vec<&str> {
    actions.iter().map(FileAction::path).collect()
}

pub fn write_content<'a>(actions: &'a [FileAction], path: &str) -> Option<&'a str> {
    actions.iter().find_map(|action| match action {
        FileAction::WriteFile { path: p, content, .. } if p == path => {
            std::str::from_utf8(content.as_bytes()).ok()
        }
        _ => None,
    })
}

pub fn logged_in(session: &mut Session, connector_id: &str) {
    session.insert(connector_id, serde_json::json!({ "token": "t" }));
}

pub fn unique(values: &[&str]) -> bool {
    values.iter().collect::<HashSet<_>>().len() == values.len()
}
