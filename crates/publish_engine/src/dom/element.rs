use html5ever::tendril::StrTendril;
use html5ever::{ns, Attribute, LocalName, QualName};
use scraper::node::Element;
use scraper::CaseSensitivity;

/// Read-side helpers used by the stage predicates.
pub trait ElementExt {
    fn is(&self, tag: &str) -> bool;
    fn has_attr(&self, name: &str) -> bool;
    fn has_class_name(&self, class: &str) -> bool;
}

impl ElementExt for Element {
    fn is(&self, tag: &str) -> bool {
        self.name().eq_ignore_ascii_case(tag)
    }

    fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    fn has_class_name(&self, class: &str) -> bool {
        self.has_class(class, CaseSensitivity::CaseSensitive)
    }
}

/// Editable copy of an element.
///
/// `scraper` caches the id and class list inside [`Element`], so edits go
/// through a draft that is turned back into a fresh element afterwards.
/// Attributes keep their qualified names, which preserves prefixes such as
/// `xlink:href`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDraft {
    name: QualName,
    attrs: Vec<Attribute>,
}

impl ElementDraft {
    /// A new element in the HTML namespace.
    pub fn new(name: &str) -> Self {
        Self {
            name: QualName::new(None, ns!(html), LocalName::from(name.to_ascii_lowercase())),
            attrs: Vec::new(),
        }
    }

    pub fn from_element(element: &Element) -> Self {
        let attrs = element
            .attrs
            .iter()
            .map(|(name, value)| Attribute {
                name: name.clone(),
                value: StrTendril::from_slice(value),
            })
            .collect();
        Self {
            name: element.name.clone(),
            attrs,
        }
    }

    pub fn into_element(self) -> Element {
        Element::new(self.name, self.attrs)
    }

    /// Builder form of [`ElementDraft::set_attr`].
    pub fn attr_pair(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Appends an attribute under its qualified name, replacing any previous
    /// value for that name.
    pub fn with_qualified_attr(mut self, name: QualName, value: &str) -> Self {
        let value = StrTendril::from_slice(value);
        match self.attrs.iter_mut().find(|attr| attr.name == name) {
            Some(existing) => existing.value = value,
            None => self.attrs.push(Attribute { name, value }),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name.local
    }

    /// Value of the attribute `name` outside any namespace.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.position(name).map(|index| &*self.attrs[index].value)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = StrTendril::from(value.into());
        match self.position(name) {
            Some(index) => self.attrs[index].value = value,
            None => self.attrs.push(Attribute {
                name: QualName::new(None, ns!(), LocalName::from(name.to_ascii_lowercase())),
                value,
            }),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.position(name)?;
        Some(self.attrs.remove(index).value.to_string())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|existing| existing == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let mut classes: Vec<&str> = self.classes().collect();
        classes.push(class);
        let joined = classes.join(" ");
        self.set_attr("class", joined);
    }

    /// Removes `class`; drops the attribute once no class is left.
    pub fn remove_class(&mut self, class: &str) {
        if !self.has_class(class) {
            return;
        }
        let remaining = self
            .classes()
            .filter(|existing| *existing != class)
            .collect::<Vec<_>>()
            .join(" ");
        if remaining.is_empty() {
            self.remove_attr("class");
        } else {
            self.set_attr("class", remaining);
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.attrs
            .iter()
            .position(|attr| attr.name.ns == ns!() && attr.name.local.as_ref().eq_ignore_ascii_case(name))
    }
}
