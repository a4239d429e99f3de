//! reqwest-backed transport for the catalog API.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use reqwest::Method as HttpMethod;

use super::{Transport, TransportError, TransportRequest, TransportResponse, STATUS_NOT_MODIFIED};
use crate::config::ClientConfig;
use crate::endpoint::Method;
use crate::util::{compact_text, is_http_url};

/// HTTP client executing endpoint descriptors against one API base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, String> {
        let base_url = normalize_base_url(&config.api_base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|error| format!("Failed to construct HTTP client: {error}"))?;
        Ok(Self { base_url, client })
    }

    /// Returns the base URL this client was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        let rendered = request
            .endpoint
            .render()
            .map_err(|error| TransportError::Other(error.to_string()))?;

        let mut builder = self
            .client
            .request(
                http_method(request.endpoint.method()),
                format!("{}{}", self.base_url, rendered.path),
            )
            .header(ACCEPT, "application/json");

        if !rendered.query.is_empty() {
            builder = builder.query(&rendered.query);
        }
        if let Some(token) = request.bearer_token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let Some(validator) = request.validator.as_deref() {
            builder = builder.header(IF_NONE_MATCH, validator);
        }
        if let Some(upload) = request.upload {
            builder = builder
                .header(CONTENT_TYPE, upload.mime_type)
                .body(upload.bytes);
        } else if let Some(json) = rendered.json.as_ref() {
            builder = builder.json(json);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let validator = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);

        if status == STATUS_NOT_MODIFIED {
            return Ok(TransportResponse {
                status,
                body: Vec::new(),
                validator,
            });
        }

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status,
                body: compact_text(&body),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(classify_reqwest_error)?
            .to_vec();
        Ok(TransportResponse {
            status,
            body,
            validator,
        })
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Offline(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

const fn http_method(method: Method) -> HttpMethod {
    match method {
        Method::Get => HttpMethod::GET,
        Method::Post => HttpMethod::POST,
        Method::Put => HttpMethod::PUT,
        Method::Delete => HttpMethod::DELETE,
    }
}

fn normalize_base_url(raw: &str) -> Result<String, String> {
    let base = raw.trim().trim_end_matches('/').to_string();
    if base.is_empty() {
        return Err("API base URL must not be empty".to_string());
    }
    if !is_http_url(&base) {
        return Err("API base URL must include http:// or https://".to_string());
    }
    Ok(base)
}
