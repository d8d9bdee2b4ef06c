use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use ego_tree::NodeId;
use publish_core::join_path;
use regex::{Captures, Regex};
use serde::Serialize;
use url::Url;

use crate::dom::Document;

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(['"]?)([^'")]*)['"]?\s*\)"#).expect("css url pattern")
});

/// A referenced file that must be copied into the published output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Attribute or `url(...)` value exactly as found in the document.
    pub original: String,
    /// Absolute URL the bytes are fetched from.
    pub src_path: String,
    /// Output path, always under the publication root path.
    pub dest_path: String,
    pub tag_name: Option<String>,
    pub display_name: String,
}

/// A file reference met while extracting assets, handed to the
/// destination folder callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetReference<'a> {
    /// Lowercase file extension, empty when the name has none.
    pub extension: &'a str,
    /// `None` for `url(...)` references found in CSS.
    pub tag_name: Option<&'a str>,
    /// `rel` of the referencing element, if any.
    pub rel: Option<&'a str>,
}

impl AssetReference<'_> {
    pub fn is_stylesheet(&self) -> bool {
        self.extension == "css"
            || self.rel.is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|kind| kind.eq_ignore_ascii_case("stylesheet"))
            })
    }
}

/// Where a reference was found; decides how the rewritten value is
/// expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Tag,
    InlineStyle,
    /// Head stylesheet, later moved one folder down into the css folder.
    Stylesheet,
}

struct Resolver<'a, F> {
    base_url: &'a Url,
    root_url: Option<Url>,
    root_path: &'a str,
    dest_folder: F,
    /// Output path relative to the root path, mapped to its source URL.
    claimed: HashMap<String, String>,
    assets: Vec<Asset>,
}

/// Finds every self-hosted file referenced by `doc`, rewrites the reference
/// to its published location and returns one [`Asset`] per occurrence.
///
/// A reference is downloadable when its resolved URL has no query string,
/// is not a `data:` URL and shares its origin with `base_url` (or with
/// `root_url` when given). `dest_folder` returning `None` leaves the
/// reference untouched. Distinct files sharing a name in the same folder get
/// a numbered suffix (`logo-1.png`), so no download overwrites another.
pub fn extract_assets<F>(
    base_url: &Url,
    root_url: Option<&Url>,
    root_path: &str,
    doc: &mut Document,
    dest_folder: F,
) -> Vec<Asset>
where
    F: FnMut(&AssetReference<'_>) -> Option<String>,
{
    let mut resolver = Resolver {
        base_url,
        root_url: root_url.map(with_trailing_slash),
        root_path,
        dest_folder,
        claimed: HashMap::new(),
        assets: Vec::new(),
    };

    let in_head: HashSet<NodeId> = doc
        .head()
        .map(|head| doc.find_all_within(head, |_| true))
        .unwrap_or_default()
        .into_iter()
        .collect();

    for id in doc.find_all(|_| true) {
        let Some(element) = doc.element(id) else {
            continue;
        };
        let tag = element.name().to_string();
        let rel = element.attr("rel");

        let mut updates: Vec<(&'static str, String)> = Vec::new();
        for attr in ["src", "href"] {
            if let Some(value) = element.attr(attr) {
                if let Some(rewritten) = resolver.rewrite(value, Some(&tag), rel, Origin::Tag) {
                    updates.push((attr, rewritten));
                }
            }
        }
        if let Some(style) = element.attr("style") {
            if let Some(rewritten) = rewrite_css_urls(style, |url| {
                resolver.rewrite(url, None, None, Origin::InlineStyle)
            }) {
                updates.push(("style", rewritten));
            }
        }
        if !updates.is_empty() {
            doc.update_element(id, |element| {
                for (attr, value) in updates {
                    element.set_attr(attr, value);
                }
            });
        }

        if tag == "style" {
            let origin = if in_head.contains(&id) {
                Origin::Stylesheet
            } else {
                Origin::InlineStyle
            };
            let css = doc.text_content(id);
            if let Some(rewritten) =
                rewrite_css_urls(&css, |url| resolver.rewrite(url, None, None, origin))
            {
                doc.set_text(id, rewritten);
            }
        }
    }

    resolver.assets
}

impl<F> Resolver<'_, F>
where
    F: FnMut(&AssetReference<'_>) -> Option<String>,
{
    fn rewrite(
        &mut self,
        value: &str,
        tag: Option<&str>,
        rel: Option<&str>,
        origin: Origin,
    ) -> Option<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        let resolved = self.base_url.join(trimmed).ok()?;
        if !self.is_downloadable(&resolved) {
            return None;
        }
        let file_name = resolved
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())?
            .to_string();
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let folder = (self.dest_folder)(&AssetReference {
            extension: &extension,
            tag_name: tag,
            rel,
        })?;

        let (relative, display_name) = self.claim(&folder, &file_name, resolved.as_str());
        self.assets.push(Asset {
            original: value.to_string(),
            src_path: resolved.to_string(),
            dest_path: join_path(&[self.root_path, relative.as_str()]),
            tag_name: tag.map(str::to_string),
            display_name,
        });

        Some(match (&self.root_url, origin) {
            (Some(root), _) => root
                .join(&relative)
                .map(String::from)
                .unwrap_or_else(|_| relative.clone()),
            (None, Origin::Stylesheet) => format!("../{relative}"),
            (None, _) => relative,
        })
    }

    /// Relative output path and file name for `src`. The same source always
    /// gets the same path.
    fn claim(&mut self, folder: &str, file_name: &str, src: &str) -> (String, String) {
        let (stem, extension) = match file_name.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
            _ => (file_name, None),
        };
        let mut candidate = file_name.to_string();
        let mut counter = 1;
        loop {
            let relative = join_path(&[folder, candidate.as_str()]);
            match self.claimed.get(&relative) {
                Some(owner) if owner == src => return (relative, candidate),
                Some(_) => {}
                None => {
                    self.claimed.insert(relative.clone(), src.to_string());
                    return (relative, candidate);
                }
            }
            candidate = match extension {
                Some(extension) => format!("{stem}-{counter}.{extension}"),
                None => format!("{file_name}-{counter}"),
            };
            counter += 1;
        }
    }

    fn is_downloadable(&self, url: &Url) -> bool {
        if url.query().is_some() || url.scheme() == "data" {
            return false;
        }
        let origin = url.origin();
        origin == self.base_url.origin()
            || self
                .root_url
                .as_ref()
                .is_some_and(|root| origin == root.origin())
    }
}

/// Applies `rewrite` to every `url(...)` reference in `css`. Returns `None`
/// when nothing changed.
pub(crate) fn rewrite_css_urls(
    css: &str,
    mut rewrite: impl FnMut(&str) -> Option<String>,
) -> Option<String> {
    let mut changed = false;
    let output = CSS_URL.replace_all(css, |caps: &Captures| {
        let quote = caps.get(1).map_or("", |m| m.as_str());
        let url = caps.get(2).map_or("", |m| m.as_str());
        match rewrite(url) {
            Some(new_url) => {
                changed = true;
                format!("url({quote}{new_url}{quote})")
            }
            None => caps[0].to_string(),
        }
    });
    changed.then(|| output.into_owned())
}

fn with_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_urls_keep_their_quotes() {
        let css = r#"a { background: url("img/a.png") } b { background: url( 'b.png' ) } c { background: url(c.png) }"#;
        let rewritten = rewrite_css_urls(css, |url| Some(format!("x/{url}"))).unwrap();
        assert_eq!(
            rewritten,
            r#"a { background: url("x/img/a.png") } b { background: url('x/b.png') } c { background: url(x/c.png) }"#
        );
    }

    #[test]
    fn untouched_css_reports_no_change() {
        assert_eq!(rewrite_css_urls("a { color: red }", |_| None), None);
        assert_eq!(rewrite_css_urls("a { background: url(a.png) }", |_| None), None);
    }

    #[test]
    fn root_url_gets_a_trailing_slash() {
        let url = Url::parse("https://example.com/site").unwrap();
        assert_eq!(with_trailing_slash(&url).as_str(), "https://example.com/site/");
    }
}
