//! Multipart form handling for endpoints that accept files.
//!
//! The whole form is read up front: text fields into a map, files into
//! per-field lists. Handlers then pull typed values out by name.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::cloudinary::UploadFile;

/// Errors reading or interpreting a multipart form.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("{0} is required")]
    MissingField(String),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("{field} must be an image or PDF, got {content_type}")]
    UnsupportedType { field: String, content_type: String },

    #[error("{0} is empty")]
    EmptyFile(String),
}

/// A parsed multipart form.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<UploadFile>>,
}

fn is_accepted_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.starts_with("image/") || lower == "application/pdf"
}

impl UploadForm {
    /// Read every part of `multipart`.
    ///
    /// Parts with a file name are files; everything else is text.
    ///
    /// # Errors
    ///
    /// Returns `UploadError` for a malformed body, an empty file or a file
    /// that is neither an image nor a PDF.
    pub async fn read(mut multipart: Multipart) -> Result<Self, UploadError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_owned();
                    let bytes = field.bytes().await?;
                    form.add_file(
                        name,
                        UploadFile {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    )?;
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    fn add_file(&mut self, field: String, file: UploadFile) -> Result<(), UploadError> {
        if file.bytes.is_empty() {
            return Err(UploadError::EmptyFile(field));
        }
        if !is_accepted_type(&file.content_type) {
            return Err(UploadError::UnsupportedType {
                field,
                content_type: file.content_type,
            });
        }
        self.files.entry(field).or_default().push(file);
        Ok(())
    }

    /// Trimmed text value, with blank treated as absent.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// # Errors
    ///
    /// Returns `UploadError::MissingField` when the field is absent or blank.
    pub fn required_text(&self, name: &str) -> Result<&str, UploadError> {
        self.text(name)
            .ok_or_else(|| UploadError::MissingField(name.to_owned()))
    }

    /// Parse a text field with `FromStr`.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::InvalidField` if the value does not parse.
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>, UploadError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.text(name)
            .map(|raw| {
                raw.parse().map_err(|e: T::Err| UploadError::InvalidField {
                    field: name.to_owned(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    /// # Errors
    ///
    /// Returns `UploadError::MissingField` or `UploadError::InvalidField`.
    pub fn required<T>(&self, name: &str) -> Result<T, UploadError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.parse(name)?
            .ok_or_else(|| UploadError::MissingField(name.to_owned()))
    }

    /// Parse a JSON-encoded text field.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::InvalidField` if the value is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, UploadError> {
        self.text(name)
            .map(|raw| {
                serde_json::from_str(raw).map_err(|e| UploadError::InvalidField {
                    field: name.to_owned(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    /// Take the first file sent under `name`.
    pub fn take_file(&mut self, name: &str) -> Option<UploadFile> {
        let files = self.files.get_mut(name)?;
        if files.is_empty() {
            None
        } else {
            Some(files.remove(0))
        }
    }

    /// # Errors
    ///
    /// Returns `UploadError::MissingField` if no file was sent under `name`.
    pub fn require_file(&mut self, name: &str) -> Result<UploadFile, UploadError> {
        self.take_file(name)
            .ok_or_else(|| UploadError::MissingField(name.to_owned()))
    }

    /// Take every file sent under `name`.
    pub fn take_files(&mut self, name: &str) -> Vec<UploadFile> {
        self.files.remove(name).unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn file(content_type: &str, bytes: &[u8]) -> UploadFile {
        UploadFile {
            file_name: "upload.bin".to_string(),
            content_type: content_type.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    fn form_with(fields: &[(&str, &str)]) -> UploadForm {
        UploadForm {
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            files: HashMap::new(),
        }
    }

    #[test]
    fn test_text_fields() {
        let form = form_with(&[("title", "  Linen Shirt "), ("blank", "   ")]);
        assert_eq!(form.text("title"), Some("Linen Shirt"));
        assert_eq!(form.text("blank"), None);
        assert!(matches!(
            form.required_text("blank"),
            Err(UploadError::MissingField(f)) if f == "blank"
        ));
    }

    #[test]
    fn test_typed_fields() {
        let form = form_with(&[
            ("price", "499.00"),
            ("in_stock", "many"),
            ("is_active", "false"),
            ("tags", r#"["a","b"]"#),
        ]);
        assert_eq!(
            form.parse::<rust_decimal::Decimal>("price").unwrap(),
            Some("499.00".parse().unwrap())
        );
        assert!(matches!(
            form.parse::<i32>("in_stock"),
            Err(UploadError::InvalidField { .. })
        ));
        assert_eq!(form.parse::<bool>("is_active").unwrap(), Some(false));
        assert_eq!(
            form.json::<Vec<String>>("tags").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert!(form.required::<i32>("missing").is_err());
    }

    #[test]
    fn test_files_are_checked_and_grouped() {
        let mut form = UploadForm::default();
        form.add_file("product_image".into(), file("image/png", b"a"))
            .unwrap();
        form.add_file("product_image".into(), file("image/jpeg", b"b"))
            .unwrap();
        form.add_file("manual".into(), file("application/pdf", b"%PDF"))
            .unwrap();

        assert!(matches!(
            form.add_file("doc".into(), file("text/html", b"<p>")),
            Err(UploadError::UnsupportedType { .. })
        ));
        assert!(matches!(
            form.add_file("hover_image".into(), file("image/png", b"")),
            Err(UploadError::EmptyFile(_))
        ));

        assert_eq!(form.take_files("product_image").len(), 2);
        assert!(form.take_files("product_image").is_empty());
        assert!(form.require_file("manual").is_ok());
        assert!(form.require_file("manual").is_err());
    }
}
