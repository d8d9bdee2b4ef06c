use async_trait::async_trait;
use publish_core::{FileAction, PageData, PersistentData};
use url::Url;

use crate::assets::AssetReference;
use crate::dom::Document;
use crate::orchestrator::PublishContext;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("hosting hook failed: {0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Folder names resolved once per publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFolders {
    pub html: String,
    pub css: String,
    pub js: String,
    pub assets: String,
}

impl Default for OutputFolders {
    fn default() -> Self {
        Self::from_hook(&DefaultHostingHook)
    }
}

impl OutputFolders {
    pub fn from_hook(hook: &dyn HostingHook) -> Self {
        Self {
            html: hook.html_folder().to_string(),
            css: hook.css_folder().to_string(),
            js: hook.js_folder().to_string(),
            assets: hook.assets_folder().to_string(),
        }
    }
}

/// Customization points a hosting provider may override.
///
/// Every method has a default, so a provider only implements what differs
/// from a plain static host.
#[async_trait]
pub trait HostingHook: Send + Sync {
    /// Absolute URL the site will be served from. When set, rewritten asset
    /// references become absolute.
    fn root_url(&self) -> Option<Url> {
        None
    }

    fn html_folder(&self) -> &str {
        ""
    }

    fn css_folder(&self) -> &str {
        "css"
    }

    fn js_folder(&self) -> &str {
        "js"
    }

    fn assets_folder(&self) -> &str {
        "assets"
    }

    /// Destination folder of a referenced file, or `None` to leave the
    /// reference untouched. Only stylesheet links land in the css folder;
    /// icons, manifests and other linked files go with the assets.
    fn dest_folder(&self, reference: &AssetReference<'_>) -> Option<String> {
        match reference.tag_name.map(str::to_ascii_lowercase).as_deref() {
            Some("script") => Some(self.js_folder().to_string()),
            Some("link") if reference.is_stylesheet() => Some(self.css_folder().to_string()),
            Some("link") | Some("img") | Some("source") | Some("video") => {
                Some(self.assets_folder().to_string())
            }
            Some(_) => None,
            None if reference.extension.is_empty() => None,
            None => Some(self.assets_folder().to_string()),
        }
    }

    /// Output file name of a page, given its default `<id>.html` name.
    fn permalink(&self, file_name: &str) -> String {
        file_name.to_string()
    }

    fn page_title(&self, site_title: &str, page: &PageData) -> String {
        if site_title.is_empty() {
            page.display_name.clone()
        } else {
            format!("{} - {}", site_title, page.display_name)
        }
    }

    /// `href` written into navigation anchors for a permalink.
    fn page_link(&self, permalink: &str) -> String {
        permalink.to_string()
    }

    fn before_split(&self, _doc: &mut Document, _data: &PersistentData) -> Result<(), HookError> {
        Ok(())
    }

    fn before_write(&self, actions: Vec<FileAction>) -> Result<Vec<FileAction>, HookError> {
        Ok(actions)
    }

    /// Runs once the batch write succeeded (cache purge, deploy trigger).
    async fn finalize_publication(&self, _ctx: &PublishContext) -> Result<(), HookError> {
        Ok(())
    }
}

/// Plain static host: every hook keeps its default.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHostingHook;

impl HostingHook for DefaultHostingHook {}
