use axum::extract::Multipart;

use crate::api::errors::ApiError;
use crate::services::answer_lifecycle::{FileUpload, UploadLimits};

type EditParts = (Option<String>, Option<Vec<FileUpload>>);

/// Parts of an answer submission or edit body.
#[derive(Debug, Default)]
pub(crate) struct AnswerForm {
    pub(crate) text: Option<String>,
    pub(crate) files: Vec<FileUpload>,
    pub(crate) replace_files: bool,
}

impl AnswerForm {
    /// `None` keeps the stored files; `Some` swaps them for the uploaded set.
    pub(crate) fn replacement(self) -> Result<EditParts, ApiError> {
        if self.replace_files {
            return Ok((self.text, Some(self.files)));
        }
        if !self.files.is_empty() {
            return Err(ApiError::BadRequest(
                "Set replace_files=true to replace the attached files".to_string(),
            ));
        }
        Ok((self.text, None))
    }
}

pub(crate) async fn read_answer_form(
    mut multipart: Multipart,
    limits: UploadLimits,
) -> Result<AnswerForm, ApiError> {
    let mut form = AnswerForm::default();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "text" => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::BadRequest("Invalid answer text".to_string()))?;
                form.text = Some(text);
            }
            "replace_files" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| ApiError::BadRequest("Invalid replace_files flag".to_string()))?;
                form.replace_files = matches!(value.trim(), "true" | "1" | "on");
            }
            "file" | "files" => {
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| ApiError::BadRequest("File name is required".to_string()))?;
                let mut bytes = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|_| ApiError::BadRequest("Failed to read file".to_string()))?
                {
                    let next_size = bytes.len() as u64 + chunk.len() as u64;
                    if next_size > limits.max_file_bytes {
                        return Err(ApiError::BadRequest(format!(
                            "File {file_name} exceeds the {} byte limit",
                            limits.max_file_bytes
                        )));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                form.files.push(FileUpload { file_name, bytes });
            }
            _ => {}
        }
    }

    Ok(form)
}
