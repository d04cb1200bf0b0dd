use serde::Serialize;

use crate::db::models::AnswerFile;
use crate::services::storage::BlobStore;

const SYNTAX_BY_EXTENSION: &[(&str, &str)] = &[
    ("txt", "plaintext"),
    ("md", "markdown"),
    ("cs", "csharp"),
    ("js", "javascript"),
    ("ts", "typescript"),
    ("json", "json"),
    ("xml", "xml"),
    ("html", "html"),
    ("css", "css"),
    ("sql", "sql"),
    ("py", "python"),
    ("java", "java"),
    ("cpp", "cpp"),
    ("c", "c"),
    ("cshtml", "razor"),
];

/// Fixed allow-list of inline-renderable file types.
pub(crate) struct PreviewPolicy;

impl PreviewPolicy {
    pub(crate) fn syntax_for(file_name: &str) -> Option<&'static str> {
        let (_, extension) = file_name.rsplit_once('.')?;
        SYNTAX_BY_EXTENSION
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(extension))
            .map(|(_, syntax)| *syntax)
    }

    pub(crate) fn is_renderable(file_name: &str) -> bool {
        Self::syntax_for(file_name).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PreviewUnavailable {
    UnsupportedExtension,
    FileUnavailable,
    NotUtf8,
}

impl PreviewUnavailable {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            PreviewUnavailable::UnsupportedExtension => "unsupported_extension",
            PreviewUnavailable::FileUnavailable => "file_unavailable",
            PreviewUnavailable::NotUtf8 => "not_utf8",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FilePreview {
    pub(crate) file_name: String,
    pub(crate) renderable: bool,
    pub(crate) syntax: Option<&'static str>,
    pub(crate) content: Option<String>,
    pub(crate) line_count: Option<usize>,
    pub(crate) unavailable: Option<&'static str>,
}

/// Reads the file as text if the allow-list says it can be shown inline.
async fn load_text(
    blobs: &dyn BlobStore,
    file: &AnswerFile,
) -> Result<String, PreviewUnavailable> {
    if !PreviewPolicy::is_renderable(&file.file_name) {
        return Err(PreviewUnavailable::UnsupportedExtension);
    }
    let bytes = blobs.read(&file.relative_path).await.map_err(|error| {
        tracing::warn!(
            file_name = %file.file_name,
            locator = %file.relative_path,
            error = %error,
            "Answer file could not be read for preview"
        );
        PreviewUnavailable::FileUnavailable
    })?;
    String::from_utf8(bytes).map_err(|_| PreviewUnavailable::NotUtf8)
}

pub(crate) async fn preview_file(blobs: &dyn BlobStore, file: &AnswerFile) -> FilePreview {
    let syntax = PreviewPolicy::syntax_for(&file.file_name);
    match load_text(blobs, file).await {
        Ok(content) => FilePreview {
            file_name: file.file_name.clone(),
            renderable: true,
            syntax,
            line_count: Some(content.lines().count()),
            content: Some(content),
            unavailable: None,
        },
        Err(reason) => FilePreview {
            file_name: file.file_name.clone(),
            renderable: false,
            syntax,
            content: None,
            line_count: None,
            unavailable: Some(reason.as_str()),
        },
    }
}
