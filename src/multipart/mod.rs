//! multipart/form-data decoding.
//!
//! # Data Flow
//! ```text
//! record body (stream of segments)
//!     → decoder.rs (line splitting, boundary detection, part headers)
//!     → sink.rs (one open sink at a time: memory text or upload file)
//!     → FormData (field name → text value or stored file)
//! ```

pub mod decoder;
pub mod sink;

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

pub use decoder::MultipartDecoder;

/// Errors raised while decoding a multipart body.
#[derive(Debug, Error)]
pub enum MultipartError {
    /// Content-Type has no usable `boundary` parameter.
    #[error("multipart body has no boundary in Content-Type")]
    MissingBoundary,

    /// Writing or closing a field sink failed.
    #[error("failed to write field '{field}': {source}")]
    Sink {
        field: String,
        #[source]
        source: std::io::Error,
    },
}

/// Value of one decoded form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormValue {
    Text(String),
    File { filename: String, storage_path: PathBuf },
}

/// One decoded form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub name: String,
    pub value: FormValue,
}

/// Decoded fields in first-seen order. A repeated name overwrites the
/// earlier value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<FormField>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: FormField) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// JSON object keyed by field name.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .filter_map(|f| serde_json::to_value(&f.value).ok().map(|v| (f.name.clone(), v)))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

/// Extract the `boundary` parameter of a multipart Content-Type.
pub fn boundary_from_content_type(content_type: &str) -> Result<String, MultipartError> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| value.trim().trim_matches('"').to_string())
        })
        .filter(|b| !b.is_empty())
        .ok_or(MultipartError::MissingBoundary)
}
