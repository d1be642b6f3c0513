use crate::auth::{bearer_header, TokenProvider};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::{Unit, UnitPatch};
use crate::services::traits::UnitApi;
use crate::services::types::UnitFilters;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

/// Form field name shared by every attached image
pub const IMAGES_FIELD: &str = "images";

/// Image file attached to a create or update request
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read an image from disk, guessing its MIME type from the extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        debug!("Loaded image {} ({} bytes, {})", file_name, bytes.len(), content_type);
        Ok(Self::new(file_name, content_type, bytes))
    }
}

/// One entry of a multipart unit form, in submission order
#[derive(Debug, Clone, PartialEq)]
pub enum FormEntry {
    Text { name: String, value: String },
    File { name: String, image: ImageUpload },
}

/// Payloads accepted by [`encode_unit_form`]
pub trait UnitForm: Serialize {
    /// Floating-point fields by wire name
    fn float_fields(&self) -> Vec<(&'static str, Option<f64>)>;
}

impl UnitForm for Unit {
    fn float_fields(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![("rentAmount", Some(self.rent_amount))]
    }
}

impl UnitForm for UnitPatch {
    fn float_fields(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![("rentAmount", self.rent_amount)]
    }
}

/// Flatten a unit (or patch) and its images into form entries
///
/// Null fields are skipped. Objects and arrays are sent as JSON strings,
/// scalars as their plain text form. Images follow the fields, one
/// `images` entry each, in the given order. NaN and infinite numbers are
/// rejected rather than silently dropped.
pub fn encode_unit_form<T: UnitForm>(unit: &T, images: &[ImageUpload]) -> Result<Vec<FormEntry>> {
    for (name, value) in unit.float_fields() {
        if let Some(value) = value.filter(|v| !v.is_finite()) {
            return Err(ClientError::invalid_input(format!(
                "{} must be a finite number, got {}",
                name, value
            )));
        }
    }

    let fields = match serde_json::to_value(unit)? {
        Value::Object(fields) => fields,
        other => {
            return Err(ClientError::invalid_input(format!(
                "unit form expects an object, got {}",
                other
            )))
        }
    };

    let mut entries = Vec::with_capacity(fields.len() + images.len());
    for (name, value) in fields {
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(&n),
            nested @ (Value::Array(_) | Value::Object(_)) => serde_json::to_string(&nested)?,
        };
        entries.push(FormEntry::Text { name, value });
    }

    entries.extend(images.iter().map(|image| FormEntry::File {
        name: IMAGES_FIELD.to_string(),
        image: image.clone(),
    }));

    Ok(entries)
}

// Whole floats go out without a fraction: 1850.0 -> "1850"
fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
    }
}

fn build_form(entries: Vec<FormEntry>) -> Result<Form> {
    let mut form = Form::new();
    for entry in entries {
        form = match entry {
            FormEntry::Text { name, value } => form.text(name, value),
            FormEntry::File { name, image } => {
                let part = Part::bytes(image.bytes)
                    .file_name(image.file_name)
                    .mime_str(&image.content_type)
                    .map_err(|_| {
                        ClientError::invalid_input(format!(
                            "invalid image content type '{}'",
                            image.content_type
                        ))
                    })?;
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

/// Authenticated client for the units resource
#[derive(Clone)]
pub struct UnitClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    send_filters: bool,
}

impl UnitClient {
    /// Create a client for `<api_base_url>/units`
    pub fn new(client: Client, api_base_url: &str, tokens: impl TokenProvider + 'static) -> Self {
        Self::with_shared_tokens(client, api_base_url, Arc::new(tokens))
    }

    pub fn with_shared_tokens(
        client: Client,
        api_base_url: &str,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            client,
            base_url: format!("{}/units", api_base_url.trim_end_matches('/')),
            tokens,
            send_filters: false,
        }
    }

    pub fn from_config(config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Ok(Self::with_shared_tokens(config.build_http_client()?, config.base_url(), tokens)
            .with_filters_sent(config.send_unit_filters))
    }

    /// Attach list filters to `GET /units/me` instead of only building them
    pub fn with_filters_sent(mut self, send: bool) -> Self {
        self.send_filters = send;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn authorization(&self) -> Result<HeaderValue> {
        let token = self
            .tokens
            .token()
            .await
            .filter(|t| !t.is_empty())
            .ok_or(ClientError::Authentication)?;
        bearer_header(&token)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        failure: &str,
    ) -> Result<T> {
        let result = Self::send(request, failure).await;
        if let Err(e) = &result {
            error!("Units API error: {}", e);
        }
        result
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder, failure: &str) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        debug!("Units API responded with {}", status);
        if !status.is_success() {
            return Err(ClientError::request(status.as_u16(), failure));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send_form<T: UnitForm>(
        &self,
        request: RequestBuilder,
        unit: &T,
        images: &[ImageUpload],
        failure: &str,
    ) -> Result<Unit> {
        let form = build_form(encode_unit_form(unit, images)?)?;
        // No explicit content type: the multipart encoder sets it with the boundary
        self.execute(request.multipart(form), failure).await
    }
}

#[async_trait]
impl UnitApi for UnitClient {
    async fn get_units(&self, filters: Option<&UnitFilters>) -> Result<Vec<Unit>> {
        let auth = self.authorization().await?;
        let query = filters.map(UnitFilters::query_string).unwrap_or_default();

        let mut url = format!("{}/me", self.base_url);
        if self.send_filters && !query.is_empty() {
            url = format!("{}?{}", url, query);
        } else if !query.is_empty() {
            debug!("Unit filters not sent: {}", query);
        }

        debug!("GET {}", url);
        let request = self.client.get(&url).header(AUTHORIZATION, auth);
        self.execute(request, "Failed to fetch units").await
    }

    async fn create_unit(&self, unit: &Unit, images: &[ImageUpload]) -> Result<Unit> {
        let auth = self.authorization().await?;
        debug!("POST {} ({} images)", self.base_url, images.len());
        let request = self.client.post(&self.base_url).header(AUTHORIZATION, auth);
        self.send_form(request, unit, images, "Failed to create unit")
            .await
    }

    async fn update_unit(&self, id: &str, patch: &UnitPatch, images: &[ImageUpload]) -> Result<Unit> {
        let auth = self.authorization().await?;
        let url = format!("{}/{}", self.base_url, urlencoding::encode(id));
        debug!("PUT {} ({} images)", url, images.len());
        let request = self.client.put(&url).header(AUTHORIZATION, auth);
        self.send_form(request, patch, images, "Failed to update unit")
            .await
    }
}
