//! Multipart form parsing.

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::{Multipart, multipart::MultipartError};
use axum::http::StatusCode;
use docreq_common::{AppError, AppResult};
use docreq_core::FileUpload;
use serde::de::DeserializeOwned;

/// A fully read multipart form: text fields plus uploaded files.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: Vec<(String, FileUpload)>,
}

impl FormData {
    /// Read every part of the form into memory.
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_err)? {
            let name = field.name().unwrap_or_default().to_string();

            if let Some(file_name) = field.file_name().map(str::to_string) {
                let data = field.bytes().await.map_err(multipart_err)?;
                // Browsers send an empty part for an untouched file input
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                form.files.push((
                    name,
                    FileUpload {
                        original_name: file_name,
                        data: data.to_vec(),
                    },
                ));
            } else {
                let text = field.text().await.map_err(multipart_err)?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// Non-empty, trimmed text field.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Required text field.
    pub fn required(&self, name: &str) -> AppResult<String> {
        self.text(name)
            .ok_or_else(|| AppError::Validation(format!("{name} is required")))
    }

    /// Required field parsed with [`FromStr`].
    pub fn parse<T: FromStr>(&self, name: &str) -> AppResult<T> {
        self.required(name)?
            .parse()
            .map_err(|_| AppError::Validation(format!("{name} is invalid")))
    }

    /// Required field holding a serde enum value such as `transcript`.
    pub fn value<T: DeserializeOwned>(&self, name: &str) -> AppResult<T> {
        let raw = self.required(name)?;
        serde_json::from_value(serde_json::Value::String(raw))
            .map_err(|_| AppError::Validation(format!("{name} is invalid")))
    }

    /// Remove and return the first file sent under `name`.
    pub fn take_file(&mut self, name: &str) -> Option<FileUpload> {
        let index = self.files.iter().position(|(field, _)| field == name)?;
        Some(self.files.remove(index).1)
    }

    /// Remove and return every file sent under `name`.
    pub fn take_files(&mut self, name: &str) -> Vec<FileUpload> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field == name);
        self.files = rest;
        taken.into_iter().map(|(_, file)| file).collect()
    }
}

fn multipart_err(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::BadRequest(format!("Invalid multipart data: {}", e.body_text()))
    }
}
