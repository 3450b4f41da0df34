//! Request bodies
//!
//! A body has to survive the 401 retry, so it is stored in a form that can be
//! turned into a fresh `reqwest` request more than once. JSON bodies get the
//! `application/json` content type; binary and multipart bodies leave the
//! content type to the caller or the transport.

use bytes::Bytes;
use reqwest::RequestBuilder;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use tracing::warn;

use crate::error::{ApiError, Result};

/// Body of an API request.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Serialized JSON document
    Json(Bytes),
    /// Opaque bytes sent as-is
    Binary(Bytes),
    /// `multipart/form-data`, rebuilt for every attempt
    Multipart(Vec<MultipartField>),
}

impl RequestBody {
    /// Serialize `value` once; retries reuse the bytes.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_vec(value)
            .map(|bytes| RequestBody::Json(Bytes::from(bytes)))
            .map_err(|e| ApiError::Protocol(format!("serializing request body: {e}")))
    }

    pub fn binary(bytes: impl Into<Bytes>) -> Self {
        RequestBody::Binary(bytes.into())
    }

    pub fn multipart(fields: Vec<MultipartField>) -> Self {
        RequestBody::Multipart(fields)
    }

    /// Whether the pipeline should set `Content-Type: application/json`.
    ///
    /// True for everything except binary and multipart bodies.
    pub fn wants_json_content_type(&self) -> bool {
        !matches!(self, RequestBody::Binary(_) | RequestBody::Multipart(_))
    }

    /// Attach this body to a request under construction.
    pub(crate) fn attach(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            RequestBody::Empty => request,
            RequestBody::Json(bytes) | RequestBody::Binary(bytes) => request.body(bytes.clone()),
            RequestBody::Multipart(fields) => request.multipart(build_form(fields)),
        }
    }
}

/// One field of a multipart form.
#[derive(Debug, Clone)]
pub struct MultipartField {
    name: String,
    value: FieldValue,
}

#[derive(Debug, Clone)]
enum FieldValue {
    Text(String),
    File {
        file_name: String,
        bytes: Bytes,
        mime: Option<String>,
    },
}

impl MultipartField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: impl Into<Bytes>,
        mime: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::File {
                file_name: file_name.into(),
                bytes: bytes.into(),
                mime: mime.map(str::to_owned),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn build_form(fields: &[MultipartField]) -> Form {
    fields.iter().fold(Form::new(), |form, field| match &field.value {
        FieldValue::Text(text) => form.text(field.name.clone(), text.clone()),
        FieldValue::File {
            file_name,
            bytes,
            mime,
        } => {
            let part = || Part::bytes(bytes.to_vec()).file_name(file_name.clone());
            let part = match mime {
                Some(mime) => part().mime_str(mime).unwrap_or_else(|e| {
                    warn!(field = %field.name, mime = %mime, error = %e, "ignoring invalid multipart mime type");
                    part()
                }),
                None => part(),
            };
            form.part(field.name.clone(), part)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_body_serializes_once() {
        let body = RequestBody::json(&json!({"title": "hello"})).unwrap();
        match &body {
            RequestBody::Json(bytes) => assert_eq!(&bytes[..], br#"{"title":"hello"}"#),
            other => panic!("expected Json, got {other:?}"),
        }
        assert!(body.wants_json_content_type());
    }

    #[test]
    fn empty_body_still_wants_json_content_type() {
        assert!(RequestBody::Empty.wants_json_content_type());
        assert!(RequestBody::default().wants_json_content_type());
    }

    #[test]
    fn binary_and_multipart_leave_content_type_alone() {
        assert!(!RequestBody::binary(vec![0u8, 1, 2]).wants_json_content_type());
        assert!(
            !RequestBody::multipart(vec![MultipartField::text("title", "hi")])
                .wants_json_content_type()
        );
    }

    #[test]
    fn multipart_field_accessors() {
        let field = MultipartField::file("image", "cat.png", vec![1u8, 2], Some("image/png"));
        assert_eq!(field.name(), "image");
        // Building twice (original + retry) must work from the same fields
        let fields = vec![field, MultipartField::text("title", "cat")];
        let first = build_form(&fields);
        let second = build_form(&fields);
        assert_ne!(first.boundary(), "");
        assert_ne!(second.boundary(), "");
    }
}
