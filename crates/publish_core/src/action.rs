use serde::{Deserialize, Serialize};

/// Body of a file written to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl FileContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Text(text) => text.as_bytes(),
            FileContent::Bytes(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<String> for FileContent {
    fn from(value: String) -> Self {
        FileContent::Text(value)
    }
}

impl From<&str> for FileContent {
    fn from(value: &str) -> Self {
        FileContent::Text(value.to_string())
    }
}

impl From<Vec<u8>> for FileContent {
    fn from(value: Vec<u8>) -> Self {
        FileContent::Bytes(value)
    }
}

/// One entry of a batch write. Directory creations precede the writes that
/// depend on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum FileAction {
    Mkdir {
        path: String,
    },
    #[serde(rename_all = "camelCase")]
    WriteFile {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        content: FileContent,
    },
}

impl FileAction {
    pub fn mkdir(path: impl Into<String>) -> Self {
        FileAction::Mkdir { path: path.into() }
    }

    pub fn write_file(path: impl Into<String>, content: impl Into<FileContent>) -> Self {
        FileAction::WriteFile {
            path: path.into(),
            display_name: None,
            content: content.into(),
        }
    }

    pub fn with_display_name(self, name: impl Into<String>) -> Self {
        match self {
            FileAction::WriteFile { path, content, .. } => FileAction::WriteFile {
                path,
                display_name: Some(name.into()),
                content,
            },
            mkdir => mkdir,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FileAction::Mkdir { path } | FileAction::WriteFile { path, .. } => path,
        }
    }

    pub fn is_mkdir(&self) -> bool {
        matches!(self, FileAction::Mkdir { .. })
    }
}

/// Unit exchanged with storage and hosting connectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorFile {
    pub path: String,
    pub content: FileContent,
}

impl ConnectorFile {
    pub fn new(path: impl Into<String>, content: impl Into<FileContent>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Joins path segments with `/`, skipping empty segments and collapsing the
/// slashes at the seams. A leading slash on the first segment is kept.
pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut joined = String::new();
    for segment in segments {
        let segment = segment.as_ref();
        let trimmed = if joined.is_empty() {
            segment.trim_end_matches('/')
        } else {
            segment.trim_matches('/')
        };
        if trimmed.is_empty() {
            if joined.is_empty() && segment.starts_with('/') {
                joined.push('/');
            }
            continue;
        }
        if !joined.is_empty() && !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(trimmed);
    }
    joined
}
