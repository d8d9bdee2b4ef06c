use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pipeline_logging::{pipeline_info, pipeline_warn};
use publish_core::{ConnectorFile, Job, JobId, PublishStage, Session, SessionId};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{AssetSource, PublisherConfig};
use crate::connector::{Connector, ConnectorError, ConnectorRegistry};
use crate::fetch::{AssetFetcher, FetchError, ReqwestFetcher, StorageFetcher};
use crate::jobs::JobManager;
use crate::orchestrator::{
    DestinationLocation, PublicationSettings, PublishContext, PublishError, PublishJob,
    SourceLocation, LOCAL_BASE_URL,
};

/// Query part of a publish request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishQuery {
    pub website_id: String,
    #[serde(default)]
    pub storage_id: Option<String>,
    #[serde(default)]
    pub hosting_id: Option<String>,
}

/// Body of a publish request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishRequest {
    pub files: Vec<ConnectorFile>,
    pub publication: PublicationSettings,
    pub assets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishResponse {
    pub url: String,
    pub job: Job,
}

#[derive(Debug, Clone)]
struct ActiveJob {
    job_id: JobId,
    token: CancellationToken,
}

type ActiveJobs = Arc<Mutex<HashMap<SessionId, ActiveJob>>>;

/// Entry point of the pipeline: resolves connectors, keeps at most one
/// running publication per session and runs it in the background.
pub struct PublicationService {
    registry: ConnectorRegistry,
    jobs: JobManager,
    config: PublisherConfig,
    http_fetcher: Option<Arc<ReqwestFetcher>>,
    active: ActiveJobs,
}

impl PublicationService {
    pub fn new(registry: ConnectorRegistry, config: PublisherConfig) -> Result<Self, FetchError> {
        let http_fetcher = match config.asset_source {
            AssetSource::Http => Some(Arc::new(ReqwestFetcher::new(&config.fetch)?)),
            AssetSource::Storage => None,
        };
        Ok(Self {
            registry,
            jobs: JobManager::new(config.grace_period()),
            config,
            http_fetcher,
            active: Arc::default(),
        })
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Starts the periodic eviction of finished jobs.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        self.jobs.spawn_sweeper(self.config.sweep_interval())
    }

    /// Starts a publication and returns as soon as its job exists. A
    /// publication already running for the same session is stopped before
    /// this returns.
    pub async fn publish(
        &self,
        session: &Session,
        query: &PublishQuery,
        request: PublishRequest,
    ) -> Result<PublishResponse, PublishError> {
        let storage = self
            .registry
            .storage(session, query.storage_id.as_deref())
            .await?;
        let hosting = self
            .registry
            .hosting(session, query.hosting_id.as_deref())
            .await?;
        ensure_logged_in(storage.as_ref(), session).await?;
        ensure_logged_in(hosting.as_ref(), session).await?;

        let raw_base = request
            .publication
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(LOCAL_BASE_URL);
        let base_url = Url::parse(raw_base).map_err(|err| PublishError::InvalidUrl {
            url: raw_base.to_string(),
            message: err.to_string(),
        })?;
        let url = hosting.get_url(session, &query.website_id).await?;

        let job = self.jobs.start_job(format!("Publishing {}", query.website_id));
        let token = CancellationToken::new();
        // Swap under one lock so two concurrent publishes for a session
        // cannot both stay registered.
        let previous = self.lock_active().insert(
            session.id.clone(),
            ActiveJob {
                job_id: job.id.clone(),
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            self.abort(previous);
        }
        pipeline_info!(
            job = job.id;
            "Publishing {} from {} to {}",
            query.website_id,
            storage.id(),
            hosting.id()
        );

        let fetcher: Arc<dyn AssetFetcher> = match &self.http_fetcher {
            Some(fetcher) => fetcher.clone(),
            None => Arc::new(StorageFetcher::new(
                storage.clone(),
                query.website_id.clone(),
                base_url.clone(),
            )),
        };
        let ctx = PublishContext {
            session: session.clone(),
            from: SourceLocation {
                storage,
                website_id: query.website_id.clone(),
                base_url,
            },
            to: DestinationLocation {
                hosting: hosting.clone(),
                website_id: query.website_id.clone(),
            },
            hook: hosting.hook(),
            fetcher,
            settings: request.publication,
            extra_files: request.files,
            extra_assets: request.assets,
        };
        let publish_job =
            PublishJob::new(ctx, self.jobs.clone(), job.id.clone(), token).with_config(&self.config);

        let active = self.active.clone();
        let session_id = session.id.clone();
        tokio::spawn(async move {
            let job_id = publish_job.job_id().clone();
            publish_job.run().await;
            let mut active = active.lock().unwrap_or_else(PoisonError::into_inner);
            if active.get(&session_id).is_some_and(|entry| entry.job_id == job_id) {
                active.remove(&session_id);
            }
        });

        Ok(PublishResponse { url, job })
    }

    /// Publishes already rendered files without running the pipeline.
    pub async fn publish_files(
        &self,
        session: &Session,
        query: &PublishQuery,
        files: Vec<ConnectorFile>,
    ) -> Result<Job, PublishError> {
        let hosting = self
            .registry
            .hosting(session, query.hosting_id.as_deref())
            .await?;
        ensure_logged_in(hosting.as_ref(), session).await?;
        Ok(hosting
            .publish(session, &query.website_id, files, &self.jobs)
            .await?)
    }

    /// Stops the running publication of `session`, if any. The job ends in
    /// `ERROR` with a cancellation message.
    pub fn stop(&self, session_id: &str) -> bool {
        let previous = self.lock_active().remove(session_id);
        previous.is_some_and(|previous| self.abort(previous))
    }

    pub fn job_status(&self, job_id: &JobId) -> Option<Job> {
        self.jobs.get_job(job_id)
    }

    /// Job currently publishing for `session_id`.
    pub fn active_job(&self, session_id: &str) -> Option<JobId> {
        self.lock_active()
            .get(session_id)
            .map(|entry| entry.job_id.clone())
    }

    fn abort(&self, previous: ActiveJob) -> bool {
        previous.token.cancel();
        let stopped = self
            .jobs
            .job_error(&previous.job_id, PublishStage::Aborted.status_message());
        if stopped {
            pipeline_warn!(job = previous.job_id; "Stopped by a newer publication");
        }
        stopped
    }

    fn lock_active(&self) -> MutexGuard<'_, HashMap<SessionId, ActiveJob>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn ensure_logged_in<C: Connector + ?Sized>(
    connector: &C,
    session: &Session,
) -> Result<(), ConnectorError> {
    if connector.is_logged_in(session).await {
        Ok(())
    } else {
        Err(ConnectorError::not_logged_in(format!(
            "Not logged in to {}",
            connector.display_name()
        )))
    }
}
