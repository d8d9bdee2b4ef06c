//! Publish engine: turns an editable website into a static multi-page site
//! and hands the result to a hosting backend.
pub mod api;
mod assets;
mod cleanup;
mod config;
mod connector;
mod decode;
mod dom;
mod fetch;
mod hooks;
mod jobs;
mod orchestrator;
mod pages;
mod queue;
mod service;
mod split;

pub use api::{ApiError, ApiResponse, JOB_NOT_FOUND};
pub use assets::{extract_assets, Asset, AssetReference};
pub use cleanup::{
    cleanup, CleanupRules, CleanupSummary, DEPENDENCY_ATTR, ELEMENT_ID_ATTR, ELEMENT_TYPE_ATTR,
    STATIC_ASSET_ATTR,
};
pub use config::{AssetSource, ConfigError, PublisherConfig};
pub use connector::{
    Connector, ConnectorError, ConnectorErrorKind, ConnectorInfo, ConnectorRegistry,
    ConnectorType, FileStat, HostingConnector, StorageConnector, WebsiteData, WebsiteId,
    WebsiteMeta, WebsiteMetaFileContent, WriteProgress,
};
pub use decode::{decode_html, DecodeError, DecodedHtml};
pub use dom::{Document, DomError, ElementDraft, ElementExt};
pub use fetch::{AssetFetcher, FailureKind, FetchError, FetchSettings, ReqwestFetcher, StorageFetcher};
pub use hooks::{DefaultHostingHook, HookError, HostingHook, OutputFolders};
pub use jobs::JobManager;
pub use orchestrator::{
    DestinationLocation, PublicationSettings, PublishContext, PublishError, PublishJob,
    PublishOutcome, SourceLocation, LOCAL_BASE_URL,
};
pub use pages::{
    split_pages, PageSplitError, ACTIVE_LINK_CLASS, CURRENT_PAGE_ATTR, PAGED_CLASS,
    PAGED_VISIBLE_CLASS, PAGE_LINK_PREFIX,
};
pub use queue::TaskQueue;
pub use service::{PublicationService, PublishQuery, PublishRequest, PublishResponse};
pub use split::{split_in_files, InlineTag, SplitFiles, LINK_ATTR, SCRIPT_FILE, STYLES_FILE};
