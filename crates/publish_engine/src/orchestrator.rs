//! One publication run, from reading the source website to the final batch
//! write.
//!
//! Phases run strictly in sequence. Between phases the run checks its
//! cancellation token and the state of its job; a stopped run returns
//! without touching the backend again. Structural failures end the job in
//! `ERROR`, while a failed asset download only adds a warning to the final
//! message.
use std::collections::HashSet;
use std::sync::Arc;

use pipeline_logging::{pipeline_debug, pipeline_error, pipeline_info, pipeline_warn};
use publish_core::{
    join_path, ConnectorFile, DataError, FileAction, JobId, PersistentData, PublishStage, Session,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::assets::{extract_assets, Asset};
use crate::cleanup::{cleanup, CleanupRules};
use crate::config::PublisherConfig;
use crate::connector::{ConnectorError, HostingConnector, StorageConnector};
use crate::decode::decode_html;
use crate::dom::Document;
use crate::fetch::{AssetFetcher, FetchError};
use crate::hooks::{HookError, HostingHook, OutputFolders};
use crate::jobs::JobManager;
use crate::pages::{split_pages, PageSplitError};
use crate::queue::TaskQueue;
use crate::split::{split_in_files, SCRIPT_FILE, STYLES_FILE};

/// Base URL used to resolve relative asset references when the request does
/// not name one.
pub const LOCAL_BASE_URL: &str = "http://localhost/";

/// Publication options sent by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicationSettings {
    /// Folder of the hosting backend receiving the site.
    pub root_path: String,
    /// Public URL of the site; makes rewritten references absolute.
    pub root_url: Option<String>,
    /// URL the editable source is served from.
    pub base_url: Option<String>,
    /// File name of the first page; `<id>.html` when unset.
    pub new_first_page_name: Option<String>,
}


pub struct SourceLocation {
    pub storage: Arc<dyn StorageConnector>,
    pub website_id: String,
    pub base_url: Url,
}

pub struct DestinationLocation {
    pub hosting: Arc<dyn HostingConnector>,
    pub website_id: String,
}

/// Everything one publication needs, owned by its [`PublishJob`].
pub struct PublishContext {
    pub session: Session,
    pub from: SourceLocation,
    pub to: DestinationLocation,
    pub hook: Arc<dyn HostingHook>,
    pub fetcher: Arc<dyn AssetFetcher>,
    pub settings: PublicationSettings,
    /// Pre-rendered files written under the root path.
    pub extra_files: Vec<ConnectorFile>,
    /// Storage paths of assets copied into the assets folder.
    pub extra_assets: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Malformed HTML: {0}")]
    MalformedHtml(String),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Pages(#[from] PageSplitError),
    #[error(transparent)]
    Connector(#[from] ConnectorError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("{path} exists and is not a folder")]
    NotAFolder { path: String },
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("Publication canceled.")]
    Canceled,
}

impl PublishError {
    pub fn http_status(&self) -> u16 {
        match self {
            PublishError::Connector(err) => err.http_status(),
            PublishError::MalformedHtml(_)
            | PublishError::Data(_)
            | PublishError::Pages(_)
            | PublishError::InvalidUrl { .. } => 400,
            PublishError::Hook(_) | PublishError::NotAFolder { .. } | PublishError::Canceled => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Success(String),
    Error(String),
    Aborted,
}

enum AssetSource {
    Url(Url),
    StoragePath(String),
}

struct Download {
    display_name: String,
    dest_path: String,
    source: AssetSource,
}

pub struct PublishJob {
    ctx: PublishContext,
    jobs: JobManager,
    job_id: JobId,
    token: CancellationToken,
    cleanup: CleanupRules,
    stat_queue: TaskQueue,
    download_queue: TaskQueue,
}

impl PublishJob {
    pub fn new(ctx: PublishContext, jobs: JobManager, job_id: JobId, token: CancellationToken) -> Self {
        Self {
            ctx,
            jobs,
            job_id,
            token,
            cleanup: CleanupRules::default(),
            stat_queue: TaskQueue::default(),
            download_queue: TaskQueue::default(),
        }
    }

    pub fn with_config(mut self, config: &PublisherConfig) -> Self {
        self.cleanup = config.cleanup.clone();
        self.stat_queue = config.stat_queue();
        self.download_queue = config.download_queue();
        self
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Drives the job to a terminal state.
    pub async fn run(self) -> PublishOutcome {
        let id = self.job_id.clone();
        match self.execute().await {
            Ok(message) => {
                if self.jobs.job_success(&id, message.clone()) {
                    pipeline_info!(job = id; "{}", message);
                    PublishOutcome::Success(message)
                } else {
                    pipeline_warn!(job = id; "Stopped before it could complete");
                    PublishOutcome::Aborted
                }
            }
            Err(PublishError::Canceled) => {
                self.jobs
                    .job_error(&id, PublishStage::Aborted.status_message());
                pipeline_warn!(job = id; "Publication canceled");
                PublishOutcome::Aborted
            }
            Err(err) => {
                let message = err.to_string();
                pipeline_error!(job = id; "Publication failed: {}", message);
                self.jobs.job_error(&id, message.clone());
                PublishOutcome::Error(message)
            }
        }
    }

    async fn execute(&self) -> Result<String, PublishError> {
        let ctx = &self.ctx;
        self.enter(PublishStage::Starting)?;

        self.enter(PublishStage::DownloadingSource)?;
        let source = ctx
            .from
            .storage
            .read_website(&ctx.session, &ctx.from.website_id)
            .await?;
        let decoded = decode_html(&source.html, source.content_type.as_deref())
            .map_err(|err| PublishError::MalformedHtml(err.to_string()))?;
        // `Document` is not `Send`; keep it scoped so it is dropped before the first await.
        let (hook, folders, root_path, assets, split, pages) = {
            let mut doc = Document::try_parse(&decoded.html)
                .map_err(|err| PublishError::MalformedHtml(err.to_string()))?;
            let data = PersistentData::from_json(&source.data)?;
            pipeline_debug!(
                job = self.job_id;
                "Read {} ({}), {} pages",
                ctx.from.website_id,
                decoded.encoding_label,
                data.pages.len()
            );

            self.enter(PublishStage::Splitting)?;
            let hook = ctx.hook.as_ref();
            hook.before_split(&mut doc, &data)?;
            cleanup(&mut doc, &self.cleanup);
            let folders = OutputFolders::from_hook(hook);
            let root_url = self.root_url()?;
            let root_path = ctx.settings.root_path.as_str();
            let assets = extract_assets(
                &ctx.from.base_url,
                root_url.as_ref(),
                root_path,
                &mut doc,
                |reference| hook.dest_folder(reference),
            );
            let split = split_in_files(root_url.as_ref(), &mut doc, &data.site.head_user, &folders);
            let pages = split_pages(
                ctx.settings.new_first_page_name.as_deref(),
                hook,
                &doc,
                &data,
                root_path,
            )?;
            (hook, folders, root_path, assets, split, pages)
        };

        self.enter(PublishStage::ResolvingDestination)?;
        let mut actions = self.create_folders(root_path, &folders).await?;

        self.enter(PublishStage::DownloadingAssets)?;
        let (downloads, skipped) = self.downloads(&assets, root_path, &folders);
        let (asset_actions, failed) = self.download_all(downloads).await;
        let files_not_downloaded: Vec<String> = skipped.into_iter().chain(failed).collect();
        self.ensure_running()?;

        self.enter(PublishStage::Writing)?;
        actions.extend(pages);
        if !split.style_tags.is_empty() {
            let path = join_path(&[root_path, folders.css.as_str(), STYLES_FILE]);
            actions.push(FileAction::write_file(path, split.style_content()).with_display_name(STYLES_FILE));
        }
        if !split.script_tags.is_empty() {
            let path = join_path(&[root_path, folders.js.as_str(), SCRIPT_FILE]);
            actions.push(FileAction::write_file(path, split.script_content()).with_display_name(SCRIPT_FILE));
        }
        actions.extend(asset_actions);
        actions.extend(ctx.extra_files.iter().map(|file| {
            FileAction::write_file(join_path(&[root_path, file.path.as_str()]), file.content.clone())
        }));
        let actions = hook.before_write(actions)?;
        pipeline_info!(job = self.job_id; "Writing {} actions", actions.len());
        ctx.to
            .hosting
            .write_batch(&ctx.session, &ctx.to.website_id, actions)
            .await?;

        self.enter(PublishStage::Finalizing)?;
        hook.finalize_publication(ctx).await?;
        match ctx.to.hosting.get_url(&ctx.session, &ctx.to.website_id).await {
            Ok(url) => {
                self.jobs.set_url(&self.job_id, url);
            }
            Err(err) => pipeline_warn!(job = self.job_id; "Published URL unavailable: {}", err),
        }
        self.ensure_running()?;

        let mut message = PublishStage::Success.status_message().to_string();
        if !files_not_downloaded.is_empty() {
            message.push_str(&format!(
                " Warning: some files could not be downloaded: {}",
                files_not_downloaded.join(", ")
            ));
        }
        Ok(message)
    }

    fn ensure_running(&self) -> Result<(), PublishError> {
        if self.token.is_cancelled() || self.jobs.is_terminal(&self.job_id) {
            return Err(PublishError::Canceled);
        }
        Ok(())
    }

    fn enter(&self, stage: PublishStage) -> Result<(), PublishError> {
        self.ensure_running()?;
        pipeline_info!(job = self.job_id; "{:?}", stage);
        self.jobs.set_message(&self.job_id, stage.status_message());
        Ok(())
    }

    fn root_url(&self) -> Result<Option<Url>, PublishError> {
        match self.ctx.settings.root_url.as_deref().filter(|url| !url.is_empty()) {
            Some(raw) => Url::parse(raw).map(Some).map_err(|err| PublishError::InvalidUrl {
                url: raw.to_string(),
                message: err.to_string(),
            }),
            None => Ok(self.ctx.hook.root_url()),
        }
    }

    /// `mkdir` actions for the output folders that do not exist yet. Folders
    /// are checked through the stat queue, one call at a time by default.
    async fn create_folders(
        &self,
        root_path: &str,
        folders: &OutputFolders,
    ) -> Result<Vec<FileAction>, PublishError> {
        let mut seen = HashSet::new();
        let paths: Vec<String> = [
            root_path.to_string(),
            join_path(&[root_path, folders.html.as_str()]),
            join_path(&[root_path, folders.css.as_str()]),
            join_path(&[root_path, folders.js.as_str()]),
            join_path(&[root_path, folders.assets.as_str()]),
        ]
        .into_iter()
        .filter(|path| !path.is_empty() && path != "/")
        .filter(|path| seen.insert(path.clone()))
        .collect();

        let hosting = &self.ctx.to.hosting;
        let session = &self.ctx.session;
        let website_id = self.ctx.to.website_id.as_str();
        let stats = self
            .stat_queue
            .run(paths, |path| async move {
                let stat = hosting.stat(session, website_id, &path).await;
                (path, stat)
            })
            .await;

        let mut actions = Vec::new();
        for (path, stat) in stats {
            match stat? {
                None => actions.push(FileAction::mkdir(path)),
                Some(stat) if stat.is_dir => {}
                Some(_) => return Err(PublishError::NotAFolder { path }),
            }
        }
        Ok(actions)
    }

    /// One download per destination path, extracted assets first. Extra
    /// assets whose destination is already taken by another file are
    /// returned by name instead of overwriting it.
    fn downloads(
        &self,
        assets: &[Asset],
        root_path: &str,
        folders: &OutputFolders,
    ) -> (Vec<Download>, Vec<String>) {
        let mut seen = HashSet::new();
        let mut downloads = Vec::new();
        let mut skipped = Vec::new();
        for asset in assets {
            // Every reference to one source shares its destination.
            if !seen.insert(asset.dest_path.clone()) {
                continue;
            }
            match Url::parse(&asset.src_path) {
                Ok(url) => downloads.push(Download {
                    display_name: asset.display_name.clone(),
                    dest_path: asset.dest_path.clone(),
                    source: AssetSource::Url(url),
                }),
                Err(err) => {
                    pipeline_warn!(job = self.job_id; "Skipping asset {}: {}", asset.src_path, err)
                }
            }
        }
        for path in &self.ctx.extra_assets {
            let display_name = path.rsplit('/').next().unwrap_or(path).to_string();
            if display_name.is_empty() {
                continue;
            }
            let dest_path = join_path(&[root_path, folders.assets.as_str(), display_name.as_str()]);
            if !seen.insert(dest_path.clone()) {
                pipeline_warn!(
                    job = self.job_id;
                    "Skipping asset {}: {} is already published by another file",
                    path,
                    dest_path
                );
                self.jobs
                    .log(&self.job_id, vec![format!("{display_name}: {dest_path} is already taken")]);
                skipped.push(display_name);
                continue;
            }
            downloads.push(Download {
                display_name,
                dest_path,
                source: AssetSource::StoragePath(path.clone()),
            });
        }
        (downloads, skipped)
    }

    /// Fetches every download through the download queue. Failures are
    /// logged and returned by display name; they never fail the job.
    async fn download_all(&self, downloads: Vec<Download>) -> (Vec<FileAction>, Vec<String>) {
        let ctx = &self.ctx;
        let token = &self.token;
        let results = self
            .download_queue
            .run(downloads, |download| async move {
                if token.is_cancelled() {
                    return None;
                }
                let bytes = match &download.source {
                    AssetSource::Url(url) => ctx.fetcher.fetch(&ctx.session, url).await,
                    AssetSource::StoragePath(path) => ctx
                        .from
                        .storage
                        .read_asset(&ctx.session, &ctx.from.website_id, path)
                        .await
                        .map(|file| file.content.as_bytes().to_vec())
                        .map_err(|err| FetchError::from_connector(&err)),
                };
                Some((download, bytes))
            })
            .await;

        let mut actions = Vec::new();
        let mut failed = Vec::new();
        for (download, bytes) in results.into_iter().flatten() {
            match bytes {
                Ok(bytes) => actions.push(
                    FileAction::write_file(download.dest_path, bytes)
                        .with_display_name(download.display_name),
                ),
                Err(err) => {
                    pipeline_warn!(
                        job = self.job_id;
                        "Could not download {}: {}",
                        download.display_name,
                        err
                    );
                    self.jobs
                        .log(&self.job_id, vec![format!("{}: {}", download.display_name, err)]);
                    failed.push(download.display_name);
                }
            }
        }
        (actions, failed)
    }
}
