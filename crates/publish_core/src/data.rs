use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("malformed website data: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("duplicate page id {0}")]
    DuplicatePageId(String),
}

/// JSON companion of the editable HTML document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentData {
    #[serde(default)]
    pub site: SiteMeta,
    #[serde(default)]
    pub pages: Vec<PageData>,
    #[serde(default)]
    pub elements: Vec<ElementData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Raw markup typed by the site owner into the head editor.
    #[serde(default)]
    pub head_user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

impl PageData {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementData {
    pub id: String,
    #[serde(rename = "type", default)]
    pub element_type: String,
    #[serde(default)]
    pub page_names: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PersistentData {
    /// Parses and validates the site description.
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let data: PersistentData = serde_json::from_str(json)?;
        data.validate()?;
        Ok(data)
    }

    pub fn validate(&self) -> Result<(), DataError> {
        let mut seen = HashSet::new();
        for page in &self.pages {
            if !seen.insert(page.id.as_str()) {
                return Err(DataError::DuplicatePageId(page.id.clone()));
            }
        }
        Ok(())
    }

    /// Canonical home page.
    pub fn first_page(&self) -> Option<&PageData> {
        self.pages.first()
    }

    pub fn page(&self, id: &str) -> Option<&PageData> {
        self.pages.iter().find(|page| page.id == id)
    }
}
