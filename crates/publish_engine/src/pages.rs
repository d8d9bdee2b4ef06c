use std::collections::HashSet;

use ego_tree::NodeId;
use publish_core::{join_path, FileAction, PageData, PersistentData};

use crate::dom::{Document, ElementDraft, ElementExt};
use crate::hooks::HostingHook;

pub const PAGED_CLASS: &str = "paged-element";
pub const PAGED_VISIBLE_CLASS: &str = "paged-element-visible";
pub const ACTIVE_LINK_CLASS: &str = "page-link-active";
pub const CURRENT_PAGE_ATTR: &str = "data-current-page";
/// Prefix of `href` values pointing at another page of the site.
pub const PAGE_LINK_PREFIX: &str = "#!";

/// Classes used by the editor's selection tooling only.
const EDITOR_CLASSES: &[&str] = &[
    "selected-element",
    "editable-style",
    "prevent-draggable",
    "prevent-resizable",
    "prevent-selectable",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageSplitError {
    #[error("the website has no pages")]
    NoPages,
    #[error("two pages are published as {0}")]
    DuplicatePermalink(String),
}

/// Produces one standalone HTML file per page of `data`, in page order.
///
/// `new_first_page_name` replaces the `<id>.html` name of the first page
/// (typically `index.html`). Every file lands in
/// `root_path/<html folder>/<permalink>`.
pub fn split_pages(
    new_first_page_name: Option<&str>,
    hook: &dyn HostingHook,
    doc: &Document,
    data: &PersistentData,
    root_path: &str,
) -> Result<Vec<FileAction>, PageSplitError> {
    if data.pages.is_empty() {
        return Err(PageSplitError::NoPages);
    }

    let permalinks = Permalinks::new(new_first_page_name, hook, &data.pages)?;
    let base_title = doc
        .find_first(|element| element.is("title"))
        .map(|id| doc.text_content(id).trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| data.site.title.clone());

    let mut actions = Vec::with_capacity(data.pages.len());
    for (page, permalink) in data.pages.iter().zip(&permalinks.names) {
        let mut page_doc = doc.clone();
        set_title(&mut page_doc, &hook.page_title(&base_title, page));
        if let Some(body) = page_doc.body() {
            page_doc.update_element(body, |element| element.set_attr(CURRENT_PAGE_ATTR, &page.id));
        }
        filter_paged_elements(&mut page_doc, page);
        rewrite_page_links(&mut page_doc, page, hook, &permalinks);
        strip_editor_classes(&mut page_doc);

        let content = format!("<!doctype html>{}", page_doc.document_element_html());
        let path = join_path(&[root_path, hook.html_folder(), permalink.as_str()]);
        actions.push(FileAction::write_file(path, content).with_display_name(permalink.clone()));
    }
    Ok(actions)
}

/// Output file name of every page, in page order.
struct Permalinks<'a> {
    pages: &'a [PageData],
    names: Vec<String>,
}

impl<'a> Permalinks<'a> {
    fn new(
        new_first_page_name: Option<&str>,
        hook: &dyn HostingHook,
        pages: &'a [PageData],
    ) -> Result<Self, PageSplitError> {
        let mut seen = HashSet::new();
        let mut names = Vec::with_capacity(pages.len());
        for (index, page) in pages.iter().enumerate() {
            let file_name = match new_first_page_name {
                Some(name) if index == 0 && !name.is_empty() => name.to_string(),
                _ => format!("{}.html", page.id),
            };
            let permalink = hook.permalink(&file_name);
            if !seen.insert(permalink.clone()) {
                return Err(PageSplitError::DuplicatePermalink(permalink));
            }
            names.push(permalink);
        }
        Ok(Self { pages, names })
    }

    fn of(&self, page_id: &str) -> Option<&str> {
        self.pages
            .iter()
            .position(|page| page.id == page_id)
            .map(|index| self.names[index].as_str())
    }
}

fn set_title(doc: &mut Document, title: &str) {
    if let Some(id) = doc.find_first(|element| element.is("title")) {
        doc.set_text(id, title);
    } else if let Some(head) = doc.head() {
        if let Some(id) = doc.append_element(head, ElementDraft::new("title")) {
            doc.append_text(id, title);
        }
    }
}

/// Keeps paged elements of `page` (marked visible) and drops the others
/// with their subtree.
fn filter_paged_elements(doc: &mut Document, page: &PageData) {
    let paged: Vec<NodeId> = doc.find_all(|element| element.has_class_name(PAGED_CLASS));
    for id in paged {
        if !doc.is_attached(id) {
            continue;
        }
        let belongs = doc
            .element(id)
            .is_some_and(|element| element.has_class_name(&page.id));
        if belongs {
            doc.update_element(id, |element| element.add_class(PAGED_VISIBLE_CLASS));
        } else {
            doc.remove(id);
        }
    }
}

fn rewrite_page_links(
    doc: &mut Document,
    current: &PageData,
    hook: &dyn HostingHook,
    permalinks: &Permalinks<'_>,
) {
    let anchors = doc.find_all(|element| {
        element.is("a")
            && element
                .attr("href")
                .is_some_and(|href| href.starts_with(PAGE_LINK_PREFIX))
    });
    for id in anchors {
        let target = doc
            .element(id)
            .and_then(|element| element.attr("href"))
            .and_then(|href| href.strip_prefix(PAGE_LINK_PREFIX))
            .map(str::to_string);
        let Some(target) = target else {
            continue;
        };
        // Links to pages that no longer exist are left as they are.
        let Some(permalink) = permalinks.of(&target) else {
            continue;
        };
        let href = hook.page_link(permalink);
        let active = target == current.id;
        doc.update_element(id, |element| {
            element.set_attr("href", href);
            if active {
                element.add_class(ACTIVE_LINK_CLASS);
            } else {
                element.remove_class(ACTIVE_LINK_CLASS);
            }
        });
    }
}

fn strip_editor_classes(doc: &mut Document) {
    let tagged = doc.find_all(|element| EDITOR_CLASSES.iter().any(|class| element.has_class_name(class)));
    for id in tagged {
        doc.update_element(id, |element| {
            for class in EDITOR_CLASSES {
                element.remove_class(class);
            }
        });
    }
}
