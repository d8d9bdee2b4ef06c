use pipeline_logging::{pipeline_debug, pipeline_warn};
use serde::{Deserialize, Serialize};

use scraper::Selector;

use crate::dom::Document;

/// Attribute read by the published runtime script; never stripped.
pub const ELEMENT_TYPE_ATTR: &str = "data-silex-type";
pub const ELEMENT_ID_ATTR: &str = "data-silex-id";
pub const STATIC_ASSET_ATTR: &str = "data-silex-static";
pub const DEPENDENCY_ATTR: &str = "data-dependency";

/// Editor-only markup removed before anything else runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupRules {
    pub remove_selectors: Vec<String>,
    pub strip_attributes: Vec<String>,
}

impl Default for CleanupRules {
    fn default() -> Self {
        Self {
            remove_selectors: vec![
                ".silex-style-editor-css".to_string(),
                "#silex-json-styles".to_string(),
                r#"script[type="text/json"]"#.to_string(),
                ".silex-json-data".to_string(),
            ],
            strip_attributes: vec![
                ELEMENT_ID_ATTR.to_string(),
                STATIC_ASSET_ATTR.to_string(),
                DEPENDENCY_ATTR.to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub removed_elements: usize,
    pub stripped_attributes: usize,
}

/// Best-effort sweep of editor markup. Unparsable selectors are skipped.
pub fn cleanup(doc: &mut Document, rules: &CleanupRules) -> CleanupSummary {
    let mut summary = CleanupSummary::default();

    for raw in &rules.remove_selectors {
        let selector = match Selector::parse(raw) {
            Ok(selector) => selector,
            Err(err) => {
                pipeline_warn!("Skipping cleanup selector {:?}: {}", raw, err);
                continue;
            }
        };
        for id in doc.select(&selector) {
            // Already gone with a matched ancestor.
            if !doc.is_attached(id) {
                continue;
            }
            doc.remove(id);
            summary.removed_elements += 1;
        }
    }

    let strip: Vec<&str> = rules
        .strip_attributes
        .iter()
        .map(String::as_str)
        .filter(|attr| !attr.eq_ignore_ascii_case(ELEMENT_TYPE_ATTR))
        .collect();
    for id in doc.find_all(|_| true) {
        summary.stripped_attributes += doc
            .update_element(id, |element| {
                strip
                    .iter()
                    .filter(|attr| element.remove_attr(attr).is_some())
                    .count()
            })
            .unwrap_or(0);
    }

    pipeline_debug!(
        "Cleanup removed {} elements and {} attributes",
        summary.removed_elements,
        summary.stripped_attributes
    );
    summary
}
