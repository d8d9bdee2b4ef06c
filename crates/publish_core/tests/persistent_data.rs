use pretty_assertions::assert_eq;
use publish_core::{DataError, PageData, PersistentData, PublishStage};

#[test]
fn parses_site_pages_and_elements() {
    let json = r#"{
        "site": {
            "title": "My site",
            "headUser": "<meta name=\"x\" content=\"y\">",
            "faviconPath": "assets/favicon.ico"
        },
        "pages": [
            {"id": "page-home", "displayName": "Home"},
            {"id": "page-about", "displayName": "About"}
        ],
        "elements": [
            {"id": "silex-id-1", "type": "text", "pageNames": ["page-home"], "style": {}}
        ]
    }"#;

    let data = PersistentData::from_json(json).unwrap();
    assert_eq!(data.site.title, "My site");
    assert_eq!(data.site.head_user, "<meta name=\"x\" content=\"y\">");
    assert_eq!(data.site.extra["faviconPath"], "assets/favicon.ico");
    assert_eq!(
        data.pages,
        vec![
            PageData::new("page-home", "Home"),
            PageData::new("page-about", "About")
        ]
    );
    assert_eq!(data.first_page().unwrap().id, "page-home");
    assert_eq!(data.page("page-about").unwrap().display_name, "About");
    assert_eq!(data.elements[0].element_type, "text");
    assert!(data.elements[0].extra.contains_key("style"));
}

#[test]
fn missing_sections_default_to_empty() {
    let data = PersistentData::from_json("{}").unwrap();
    assert!(data.pages.is_empty());
    assert!(data.elements.is_empty());
    assert_eq!(data.first_page(), None);
}

#[test]
fn malformed_json_is_rejected() {
    let err = PersistentData::from_json("{ not json").unwrap_err();
    assert!(matches!(err, DataError::Malformed(_)));
    assert!(err.to_string().starts_with("malformed website data"));
}

#[test]
fn duplicate_page_ids_are_rejected() {
    let json = r#"{"pages": [{"id": "p"}, {"id": "p"}]}"#;
    let err = PersistentData::from_json(json).unwrap_err();
    assert!(matches!(err, DataError::DuplicatePageId(ref id) if id == "p"));
}

#[test]
fn terminal_stages_are_flagged() {
    assert!(PublishStage::Success.is_terminal());
    assert!(PublishStage::Aborted.is_terminal());
    assert!(!PublishStage::Writing.is_terminal());
    assert_eq!(
        PublishStage::Aborted.status_message(),
        "Publication canceled."
    );
}
