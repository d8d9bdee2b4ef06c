//! Publish core: IO-free model of a publication run.
//!
//! Jobs and their store, the JSON site description, the file actions sent to
//! storage backends and the orchestrator's stage machine live here so they
//! can be tested without a runtime.
mod action;
mod data;
mod job;
mod session;
mod stage;
mod store;

pub use action::{join_path, ConnectorFile, FileAction, FileContent};
pub use data::{DataError, ElementData, PageData, PersistentData, SiteMeta};
pub use job::{Job, JobId, JobStatus};
pub use session::{Session, SessionId};
pub use stage::PublishStage;
pub use store::{JobStore, DEFAULT_GRACE_PERIOD};
