//! Payload decoding for signing requests
//!
//! A signing request arrives in one of several encodings. Each encoding is
//! handled by a [`PayloadDecoder`] registered in a [`DecoderRegistry`] under
//! the media types it accepts; adding an encoding means registering another
//! decoder, not editing the dispatch.

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::de::{Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::types::SigningError;

pub const JSON: &str = "application/json";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
pub const YAML: &str = "application/yaml";
pub const X_YAML: &str = "application/x-yaml";
pub const TEXT_YAML: &str = "text/yaml";
pub const PLIST: &str = "application/x-plist";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Field carrying the optional download name
pub const NAME_FIELD: &str = "shortcutName";
/// Field carrying the shortcut itself
pub const CONTENT_FIELD: &str = "shortcut";

/// A decoded signing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    /// Name proposed for the signed download, if the client supplied one
    pub name: Option<String>,
    /// Unsigned shortcut bytes
    pub content: Bytes,
}

/// Decodes a request body of one encoding into a [`SigningRequest`]
#[async_trait]
pub trait PayloadDecoder: Send + Sync {
    /// `content_type` is the full header value, including parameters such as
    /// the multipart boundary.
    async fn decode(&self, content_type: &str, body: Bytes) -> Result<SigningRequest, SigningError>;
}

/// Structured payload shared by the JSON and YAML decoders
#[derive(Debug, Default, Deserialize)]
struct PayloadFields {
    #[serde(
        default,
        rename = "shortcutName",
        alias = "ShortcutName",
        alias = "shortcutname"
    )]
    shortcut_name: Option<String>,
    #[serde(default, alias = "Shortcut")]
    shortcut: Option<String>,
}

impl From<PayloadFields> for SigningRequest {
    fn from(fields: PayloadFields) -> Self {
        Self {
            name: fields.shortcut_name,
            content: fields.shortcut.map(Bytes::from).unwrap_or_default(),
        }
    }
}

/// JSON object whose keys match the field names case-insensitively; when a
/// field appears more than once the last occurrence wins
struct JsonFields(PayloadFields);

impl<'de> Deserialize<'de> for JsonFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = JsonFields;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<JsonFields, A::Error> {
                let mut fields = PayloadFields::default();
                while let Some(key) = map.next_key::<String>()? {
                    if key.eq_ignore_ascii_case(NAME_FIELD) {
                        fields.shortcut_name = map.next_value()?;
                    } else if key.eq_ignore_ascii_case(CONTENT_FIELD) {
                        fields.shortcut = map.next_value()?;
                    } else {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
                Ok(JsonFields(fields))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

/// `application/json` bodies
pub struct JsonDecoder;

#[async_trait]
impl PayloadDecoder for JsonDecoder {
    async fn decode(&self, _content_type: &str, body: Bytes) -> Result<SigningRequest, SigningError> {
        let JsonFields(fields) =
            serde_json::from_slice(&body).map_err(|e| SigningError::decode(JSON, e))?;
        Ok(fields.into())
    }
}

/// YAML bodies
pub struct YamlDecoder;

#[async_trait]
impl PayloadDecoder for YamlDecoder {
    async fn decode(&self, _content_type: &str, body: Bytes) -> Result<SigningRequest, SigningError> {
        let fields: PayloadFields =
            serde_yaml::from_slice(&body).map_err(|e| SigningError::decode(YAML, e))?;
        Ok(fields.into())
    }
}

/// `application/x-www-form-urlencoded` bodies
pub struct FormDecoder;

#[async_trait]
impl PayloadDecoder for FormDecoder {
    async fn decode(&self, _content_type: &str, body: Bytes) -> Result<SigningRequest, SigningError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&body)
            .map_err(|e| SigningError::decode(FORM_URLENCODED, e))?;

        // First occurrence of a field wins
        let first = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        Ok(SigningRequest {
            name: first(NAME_FIELD),
            content: first(CONTENT_FIELD).map(Bytes::from).unwrap_or_default(),
        })
    }
}

/// `multipart/form-data` bodies; the shortcut is the `shortcut` part
pub struct MultipartDecoder;

#[async_trait]
impl PayloadDecoder for MultipartDecoder {
    async fn decode(&self, content_type: &str, body: Bytes) -> Result<SigningRequest, SigningError> {
        let decode_err = |e: multer::Error| SigningError::decode(MULTIPART_FORM_DATA, e);

        let boundary = multer::parse_boundary(content_type).map_err(decode_err)?;
        let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(body) });
        let mut multipart = multer::Multipart::new(stream, boundary);

        let mut name: Option<String> = None;
        let mut content: Option<Bytes> = None;

        while let Some(field) = multipart.next_field().await.map_err(decode_err)? {
            let field_name = field.name().map(str::to_owned);
            match field_name.as_deref() {
                Some(NAME_FIELD) => {
                    let text = field.text().await.map_err(decode_err)?;
                    name.get_or_insert(text);
                }
                Some(CONTENT_FIELD) => {
                    let file_name = field.file_name().map(str::to_owned);
                    let bytes = field.bytes().await.map_err(decode_err)?;
                    debug!(
                        file_name = ?file_name,
                        size = bytes.len(),
                        "Read shortcut part from multipart body"
                    );
                    content.get_or_insert(bytes);
                }
                _ => {
                    // Drain parts we do not use so the body is fully consumed
                    field.bytes().await.map_err(decode_err)?;
                }
            }
        }

        Ok(SigningRequest {
            name,
            content: content.unwrap_or_default(),
        })
    }
}

/// Raw shortcut bytes (plist); the whole body is the shortcut
pub struct RawDecoder;

#[async_trait]
impl PayloadDecoder for RawDecoder {
    async fn decode(&self, _content_type: &str, body: Bytes) -> Result<SigningRequest, SigningError> {
        Ok(SigningRequest {
            name: None,
            content: body,
        })
    }
}

/// Media-type keyed set of decoders
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn PayloadDecoder>>,
}

impl DecoderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every encoding the service accepts out of the box
    pub fn with_defaults() -> Self {
        let yaml: Arc<dyn PayloadDecoder> = Arc::new(YamlDecoder);
        let raw: Arc<dyn PayloadDecoder> = Arc::new(RawDecoder);

        let mut registry = Self::new();
        registry.register(JSON, Arc::new(JsonDecoder));
        registry.register(FORM_URLENCODED, Arc::new(FormDecoder));
        registry.register(MULTIPART_FORM_DATA, Arc::new(MultipartDecoder));
        registry.register(YAML, yaml.clone());
        registry.register(X_YAML, yaml.clone());
        registry.register(TEXT_YAML, yaml);
        registry.register(PLIST, raw.clone());
        registry.register(OCTET_STREAM, raw);
        registry
    }

    /// Register (or replace) the decoder for a media type
    pub fn register(&mut self, media_type: &str, decoder: Arc<dyn PayloadDecoder>) {
        self.decoders
            .insert(media_type.trim().to_ascii_lowercase(), decoder);
    }

    /// Media types with a registered decoder, sorted
    pub fn media_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Find the decoder for a `Content-Type` header value
    pub fn lookup(&self, content_type: Option<&str>) -> Result<Arc<dyn PayloadDecoder>, SigningError> {
        let media_type = content_type.map(media_type).unwrap_or_default();
        self.decoders
            .get(&media_type)
            .cloned()
            .ok_or(SigningError::UnsupportedMediaType { media_type })
    }

    /// Dispatch on the declared media type, read the body under `size_cap`
    /// bytes and decode it.
    pub async fn decode(
        &self,
        content_type: Option<&str>,
        body: Body,
        size_cap: usize,
    ) -> Result<SigningRequest, SigningError> {
        let decoder = self.lookup(content_type)?;
        let bytes = read_body(body, size_cap).await?;
        decoder.decode(content_type.unwrap_or_default(), bytes).await
    }
}

/// Essence of a `Content-Type` value: the part before `;`, trimmed and lowercased
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Read a whole body, failing with `BodyTooLarge` once it exceeds `limit` bytes
pub async fn read_body(body: Body, limit: usize) -> Result<Bytes, SigningError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) => {
            if is_length_limit(&*err) {
                Err(SigningError::BodyTooLarge { limit })
            } else {
                Err(SigningError::Decode {
                    media_type: "request body".to_string(),
                    message: err.to_string(),
                })
            }
        }
    }
}

fn is_length_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}
