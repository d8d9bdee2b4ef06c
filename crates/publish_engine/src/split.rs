use publish_core::join_path;
use url::Url;

use scraper::node::Element;

use crate::dom::{Document, ElementDraft, ElementExt};
use crate::hooks::OutputFolders;

/// Attribute marking an element that navigates like a link in the editor.
pub const LINK_ATTR: &str = "data-silex-href";
pub const SCRIPT_FILE: &str = "script.js";
pub const STYLES_FILE: &str = "styles.css";

/// An inline `<script>` or `<style>` taken out of the head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineTag {
    pub attrs: Vec<(String, String)>,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitFiles {
    pub script_tags: Vec<InlineTag>,
    pub style_tags: Vec<InlineTag>,
}

impl SplitFiles {
    /// Body of the external script file.
    pub fn script_content(&self) -> String {
        join_contents(&self.script_tags)
    }

    /// Body of the external stylesheet.
    pub fn style_content(&self) -> String {
        join_contents(&self.style_tags)
    }
}

/// Moves inline head scripts and styles out to external files, appends the
/// owner's head markup and turns editor link elements into anchors.
pub fn split_in_files(
    root_url: Option<&Url>,
    doc: &mut Document,
    user_head: &str,
    folders: &OutputFolders,
) -> SplitFiles {
    let mut files = SplitFiles::default();
    let prefix = root_url
        .map(|url| {
            let url = url.as_str();
            if url.ends_with('/') {
                url.to_string()
            } else {
                format!("{url}/")
            }
        })
        .unwrap_or_default();

    if let Some(head) = doc.head() {
        files.script_tags = take_inline(doc, head, |element| {
            element.is("script") && !element.has_attr("src") && is_javascript(element)
        });
        if !files.script_tags.is_empty() {
            let src = format!("{prefix}{}", join_path(&[folders.js.as_str(), SCRIPT_FILE]));
            doc.append_element(
                head,
                ElementDraft::new("script")
                    .attr_pair("src", src)
                    .attr_pair("type", "text/javascript"),
            );
        }

        files.style_tags = take_inline(doc, head, |element| element.is("style"));
        if !files.style_tags.is_empty() {
            let href = format!("{prefix}{}", join_path(&[folders.css.as_str(), STYLES_FILE]));
            doc.append_element(
                head,
                ElementDraft::new("link")
                    .attr_pair("href", href)
                    .attr_pair("rel", "stylesheet")
                    .attr_pair("type", "text/css"),
            );
        }

        if !user_head.trim().is_empty() {
            doc.append_markup(head, user_head);
        }
    }

    convert_link_elements(doc);
    files
}

fn take_inline(
    doc: &mut Document,
    head: ego_tree::NodeId,
    predicate: impl Fn(&Element) -> bool,
) -> Vec<InlineTag> {
    let mut taken = Vec::new();
    for id in doc.find_all_within(head, predicate) {
        let content = doc.text_content(id);
        if content.trim().is_empty() {
            continue;
        }
        let attrs = doc
            .element(id)
            .map(|element| {
                element
                    .attrs()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        doc.remove(id);
        taken.push(InlineTag { attrs, content });
    }
    taken
}

fn is_javascript(element: &Element) -> bool {
    match element.attr("type").map(|t| t.trim().to_ascii_lowercase()) {
        None => true,
        Some(kind) => matches!(
            kind.as_str(),
            "" | "text/javascript" | "application/javascript" | "application/ecmascript"
        ),
    }
}

/// Replaces every body element carrying [`LINK_ATTR`] with an `<a>` that
/// keeps its children and its other attributes.
fn convert_link_elements(doc: &mut Document) {
    let Some(body) = doc.body() else {
        return;
    };
    // Ids survive the moves below, so nested link elements are still found
    // after their ancestor has been replaced.
    for id in doc.find_all_within(body, |element| element.has_attr(LINK_ATTR)) {
        let Some(element) = doc.element(id) else {
            continue;
        };
        let Some(href) = element.attr(LINK_ATTR).map(str::to_string) else {
            continue;
        };
        let mut anchor = ElementDraft::new("a").attr_pair("href", href);
        for (name, value) in element.attrs.iter() {
            let local = &*name.local;
            if name.prefix.is_none() && (local == LINK_ATTR || local == "href") {
                continue;
            }
            anchor = anchor.with_qualified_attr(name.clone(), value);
        }
        doc.replace_element(id, anchor);
    }
}

fn join_contents(tags: &[InlineTag]) -> String {
    tags.iter().fold(String::new(), |mut acc, tag| {
        acc.push('\n');
        acc.push_str(&tag.content);
        acc
    })
}
