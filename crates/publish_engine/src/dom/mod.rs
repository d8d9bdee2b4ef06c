//! Mutable document handle used by every publication stage.
//!
//! Wraps a parsed `scraper::Html`; its `ego_tree` is edited in place so
//! stages can rewrite attributes, move subtrees and clone the whole document
//! per output page. Serialization goes through html5ever.
mod element;

use ego_tree::{NodeId, NodeRef};
use scraper::node::{Element, Text};
use scraper::{ElementRef, Html, Node, Selector, StrTendril};

pub use element::{ElementDraft, ElementExt};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("malformed HTML: the document is empty")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct Document {
    html: Html,
}

impl Document {
    /// Lenient parse; the HTML parser repairs anything it is given.
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
        }
    }

    /// Like [`Document::parse`] but rejects blank sources, which would
    /// otherwise publish as empty pages.
    pub fn try_parse(html: &str) -> Result<Self, DomError> {
        if html.trim().is_empty() {
            return Err(DomError::Empty);
        }
        Ok(Self::parse(html))
    }

    /// The `<html>` element.
    pub fn document_element(&self) -> Option<NodeId> {
        self.html
            .tree
            .root()
            .children()
            .find(|child| child.value().is_element())
            .map(|child| child.id())
    }

    pub fn head(&self) -> Option<NodeId> {
        self.find_first(|element| element.is("head"))
    }

    pub fn body(&self) -> Option<NodeId> {
        self.find_first(|element| element.is("body"))
    }

    pub fn find_first(&self, predicate: impl Fn(&Element) -> bool) -> Option<NodeId> {
        element_ids(self.html.tree.root(), &predicate).next()
    }

    /// Attached elements matching `predicate`, in document order.
    pub fn find_all(&self, predicate: impl Fn(&Element) -> bool) -> Vec<NodeId> {
        element_ids(self.html.tree.root(), &predicate).collect()
    }

    /// Descendants of `scope` (excluding `scope`) matching `predicate`.
    pub fn find_all_within(
        &self,
        scope: NodeId,
        predicate: impl Fn(&Element) -> bool,
    ) -> Vec<NodeId> {
        match self.html.tree.get(scope) {
            Some(scope) => element_ids(scope, &predicate)
                .filter(|id| *id != scope.id())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Attached elements matched by a CSS selector, in document order.
    pub fn select(&self, selector: &Selector) -> Vec<NodeId> {
        self.html
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|element| selector.matches(element))
            .map(|element| element.id())
            .collect()
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.html.tree.get(id)?.value().as_element()
    }

    /// Applies `edit` to a draft of the element behind `id` and stores the
    /// result back in the tree.
    pub fn update_element<R>(
        &mut self,
        id: NodeId,
        edit: impl FnOnce(&mut ElementDraft) -> R,
    ) -> Option<R> {
        let mut node = self.html.tree.get_mut(id)?;
        let Node::Element(element) = node.value() else {
            return None;
        };
        let mut draft = ElementDraft::from_element(element);
        let result = edit(&mut draft);
        *element = draft.into_element();
        Some(result)
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.html.tree.get(id) else {
            return String::new();
        };
        node.descendants()
            .filter_map(|descendant| descendant.value().as_text())
            .map(|text| &*text.text)
            .collect()
    }

    /// Replaces every child of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.clear_children(id);
        self.append_text(id, text);
    }

    pub fn append_element(&mut self, parent: NodeId, element: ElementDraft) -> Option<NodeId> {
        let mut node = self.html.tree.get_mut(parent)?;
        Some(node.append(Node::Element(element.into_element())).id())
    }

    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) -> Option<NodeId> {
        let mut node = self.html.tree.get_mut(parent)?;
        let text = Text {
            text: StrTendril::from(text.into()),
        };
        Some(node.append(Node::Text(text)).id())
    }

    /// Parses `markup` as a fragment and appends its nodes to `parent`.
    pub fn append_markup(&mut self, parent: NodeId, markup: &str) {
        if self.html.tree.get(parent).is_none() {
            return;
        }
        let fragment = Html::parse_fragment(markup);
        let grafted = self.html.tree.extend_tree(fragment.tree).id();
        // The fragment parser wraps its nodes in a synthetic <html> element.
        let wrapper = self.html.tree.get(grafted).and_then(|root| {
            root.children()
                .find(|child| child.value().is_element())
                .map(|child| child.id())
        });
        if let (Some(wrapper), Some(mut parent)) = (wrapper, self.html.tree.get_mut(parent)) {
            parent.reparent_from_id_append(wrapper);
        }
    }

    /// Detaches `id` and its subtree from the document.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(mut node) = self.html.tree.get_mut(id) {
            node.detach();
        }
    }

    /// Puts `replacement` where `id` was and moves the children of `id`
    /// into it. Returns the id of the new element.
    pub fn replace_element(&mut self, id: NodeId, replacement: ElementDraft) -> Option<NodeId> {
        self.html.tree.get(id)?.parent()?;
        let new_id = self
            .html
            .tree
            .get_mut(id)?
            .insert_before(Node::Element(replacement.into_element()))
            .id();
        self.html.tree.get_mut(new_id)?.reparent_from_id_append(id);
        self.remove(id);
        Some(new_id)
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        let root = self.html.tree.root().id();
        match self.html.tree.get(id) {
            Some(node) => node.id() == root || node.ancestors().any(|a| a.id() == root),
            None => false,
        }
    }

    /// Serialization of the whole tree, doctype included.
    pub fn to_html(&self) -> String {
        self.html.html()
    }

    /// Outer HTML of the `<html>` element.
    pub fn document_element_html(&self) -> String {
        self.document_element()
            .and_then(|id| self.html.tree.get(id))
            .and_then(ElementRef::wrap)
            .map(|element| element.html())
            .unwrap_or_default()
    }

    fn clear_children(&mut self, id: NodeId) {
        let children: Vec<NodeId> = match self.html.tree.get(id) {
            Some(node) => node.children().map(|child| child.id()).collect(),
            None => return,
        };
        for child in children {
            self.remove(child);
        }
    }
}

fn element_ids<'a, P>(scope: NodeRef<'a, Node>, predicate: &'a P) -> impl Iterator<Item = NodeId> + 'a
where
    P: Fn(&Element) -> bool,
{
    scope
        .descendants()
        .filter(move |node| node.value().as_element().is_some_and(predicate))
        .map(|node| node.id())
}
