use crate::auth::{bearer_header, TokenProvider};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::{DuePayments, MonthlyDuePayments, Payment, PaymentSummary};
use crate::services::traits::PaymentApi;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// Method and extra headers for [`PaymentClient::fetch_with_auth`]
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// Merged under the auth and content-type headers, which always win
    pub headers: HeaderMap,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
        }
    }
}

impl RequestOptions {
    pub fn method(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }
}

/// Authenticated client for the payments resource
#[derive(Clone)]
pub struct PaymentClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl PaymentClient {
    /// Create a client for `<api_base_url>/payments`
    pub fn new(
        client: Client,
        api_base_url: &str,
        tokens: impl TokenProvider + 'static,
    ) -> Self {
        Self::with_shared_tokens(client, api_base_url, Arc::new(tokens))
    }

    /// Like [`PaymentClient::new`] but sharing a token provider with other clients
    pub fn with_shared_tokens(
        client: Client,
        api_base_url: &str,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            client,
            base_url: format!("{}/payments", api_base_url.trim_end_matches('/')),
            tokens,
        }
    }

    pub fn from_config(config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Ok(Self::with_shared_tokens(
            config.build_http_client()?,
            config.base_url(),
            tokens,
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send an authenticated JSON request to `<base_url><path>` and decode the body
    ///
    /// Fails with [`ClientError::Authentication`] before touching the network
    /// when no token is available. Non-2xx responses become
    /// [`ClientError::Request`] using the body's `message` when present.
    pub async fn fetch_with_auth<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let token = self
            .tokens
            .token()
            .await
            .filter(|t| !t.is_empty())
            .ok_or(ClientError::Authentication)?;

        let result = self.send(path, &token, options).await;
        if let Err(e) = &result {
            error!("API Error: {}", e);
        }
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let mut headers = options.headers;
        headers.insert(AUTHORIZATION, bearer_header(token)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        debug!("{} {}", options.method, url);

        let response = self
            .client
            .request(options.method, &url)
            .headers(headers)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(request_error(response).await);
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Turn a non-2xx response into a request error, preferring the body's `message`
async fn request_error(response: Response) -> ClientError {
    let status = response.status();
    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("message").and_then(message_text))
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));

    ClientError::request(status.as_u16(), message)
}

/// Text of an error body's `message` field, or `None` when it is absent or blank
///
/// Validation failures often carry a list of messages; those are joined with `,`.
fn message_text(message: &Value) -> Option<String> {
    let text = match message {
        Value::Null | Value::Bool(false) => return None,
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

#[async_trait]
impl PaymentApi for PaymentClient {
    async fn get_due_payments(&self) -> Result<DuePayments> {
        self.fetch_with_auth("/due", RequestOptions::default()).await
    }

    async fn mark_payment_as_paid(&self, payment_id: &str) -> Result<Payment> {
        let path = format!("/{}/pay", urlencoding::encode(payment_id));
        self.fetch_with_auth(&path, RequestOptions::method(Method::PATCH))
            .await
    }

    async fn get_due_payments_this_month(&self) -> Result<MonthlyDuePayments> {
        self.fetch_with_auth("/due-this-month", RequestOptions::default())
            .await
    }

    async fn get_payment_summary(&self) -> Result<PaymentSummary> {
        self.fetch_with_auth("/payment-summary", RequestOptions::default())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use serde_json::json;

    #[test]
    fn base_url_is_joined_without_double_slash() {
        let client = PaymentClient::new(Client::new(), "http://localhost:3000/api/", StaticToken::none());
        assert_eq!(client.base_url(), "http://localhost:3000/api/payments");
    }

    #[test]
    fn default_options_are_plain_get() {
        let options = RequestOptions::default();
        assert_eq!(options.method, Method::GET);
        assert!(options.headers.is_empty());
        assert_eq!(RequestOptions::method(Method::PATCH).method, Method::PATCH);
    }

    #[test]
    fn message_text_follows_body_shape() {
        assert_eq!(message_text(&json!("Payment not found")).as_deref(), Some("Payment not found"));
        assert_eq!(
            message_text(&json!(["amount must be positive", "id must be uuid"])).as_deref(),
            Some("amount must be positive,id must be uuid")
        );
        assert_eq!(message_text(&json!(42)).as_deref(), Some("42"));
        assert_eq!(message_text(&json!(true)).as_deref(), Some("true"));
        assert_eq!(message_text(&json!("")), None);
        assert_eq!(message_text(&json!([])), None);
        assert_eq!(message_text(&Value::Null), None);
    }

    #[tokio::test]
    async fn missing_token_fails_before_sending() {
        // Nothing listens on port 9; reaching the network would yield a Network error
        let client = PaymentClient::new(Client::new(), "http://127.0.0.1:9/api", StaticToken::none());
        let err = client.get_payment_summary().await.unwrap_err();
        assert!(matches!(err, ClientError::Authentication));
    }

    #[tokio::test]
    async fn unsendable_token_is_an_invalid_token_error() {
        let client = PaymentClient::new(Client::new(), "http://127.0.0.1:9/api", StaticToken::new("a\nb"));
        let err = client.get_payment_summary().await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidToken));
    }

    #[tokio::test]
    async fn empty_token_counts_as_missing() {
        let client = PaymentClient::new(Client::new(), "http://127.0.0.1:9/api", StaticToken::new(""));
        let err = client.get_due_payments().await.unwrap_err();
        assert!(matches!(err, ClientError::Authentication));
    }
}
