/// Phases of one publication, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishStage {
    Starting,
    DownloadingSource,
    Splitting,
    ResolvingDestination,
    DownloadingAssets,
    Writing,
    Finalizing,
    Success,
    Error,
    Aborted,
}

impl PublishStage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PublishStage::Success | PublishStage::Error | PublishStage::Aborted
        )
    }

    /// Progress text shown to the client while the phase runs.
    pub fn status_message(self) -> &'static str {
        match self {
            PublishStage::Starting => "Starting publication.",
            PublishStage::DownloadingSource => "Downloading website...",
            PublishStage::Splitting => "Splitting file.",
            PublishStage::ResolvingDestination => "Creating folders.",
            PublishStage::DownloadingAssets => "Downloading assets...",
            PublishStage::Writing => "Writing files.",
            PublishStage::Finalizing => "Finalizing publication.",
            PublishStage::Success => "Done.",
            PublishStage::Error => "Publication failed.",
            PublishStage::Aborted => "Publication canceled.",
        }
    }
}
