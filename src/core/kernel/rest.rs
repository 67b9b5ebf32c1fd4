use crate::core::errors::SourceError;
use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{instrument, trace};

/// REST client trait shared by the protocol transport and every catalog
/// adapter.
///
/// Implementations handle timeouts, default headers (provider User-Agent and
/// auth headers), and map transport failures into the domain error taxonomy.
/// Retry and rate-limit policy deliberately live above this layer.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Make a GET request and return the body as a JSON value.
    async fn get_value(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> Result<Value, SourceError>;

    /// Make a GET request with strongly-typed response.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> Result<T, SourceError>;

    /// Make a POST request with a plaintext body (used for the encrypted
    /// call path, which sends hex ciphertext with a text content type).
    async fn post_text_value(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: String,
    ) -> Result<Value, SourceError>;
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Source name for logging and tracing
    pub source_name: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
    /// Headers attached to every request (e.g. provider auth tokens)
    pub default_headers: Vec<(String, String)>,
}

impl RestClientConfig {
    pub fn new(base_url: String, source_name: String) -> Self {
        Self {
            base_url,
            source_name,
            timeout_seconds: 30,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            default_headers: Vec::new(),
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Attach a header to every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }
}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self { config }
    }

    /// Build the REST client
    pub fn build(self) -> Result<ReqwestRest, SourceError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| {
                SourceError::Config(crate::core::config::ConfigError::InvalidConfiguration(
                    format!("Failed to build HTTP client: {}", e),
                ))
            })?;

        Ok(ReqwestRest {
            client,
            config: self.config,
        })
    }
}

/// Implementation of `RestClient` using reqwest
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("base_url", &self.config.base_url)
            .field("source", &self.config.source_name)
            .finish_non_exhaustive()
    }
}

impl ReqwestRest {
    /// Create a client with the default timeout and no extra headers.
    pub fn new(base_url: String, source_name: String) -> Result<Self, SourceError> {
        RestClientBuilder::new(RestClientConfig::new(base_url, source_name)).build()
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url, endpoint)
    }

    /// Handle the response and extract JSON
    #[instrument(skip(self, response), fields(source = %self.config.source_name, status = %response.status()))]
    async fn handle_response(
        &self,
        endpoint: &str,
        response: Response,
    ) -> Result<Value, SourceError> {
        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            SourceError::remote(endpoint, None, format!("failed to read response body: {}", e))
        })?;

        trace!("Response body: {}", response_text);

        if status.is_success() {
            serde_json::from_str(&response_text).map_err(|e| {
                SourceError::remote(endpoint, None, format!("invalid JSON response: {}", e))
            })
        } else {
            Err(SourceError::remote(
                endpoint,
                Some(i64::from(status.as_u16())),
                response_text,
            ))
        }
    }

    #[instrument(skip(self, body), fields(source = %self.config.source_name, method = %method, endpoint = %endpoint))]
    async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: Option<String>,
    ) -> Result<Value, SourceError> {
        let url = self.build_url(endpoint);
        let mut request = self.client.request(method, &url);

        for (key, value) in &self.config.default_headers {
            request = request.header(key, value);
        }

        for (key, value) in query_params {
            request = request.query(&[(key, value)]);
        }

        if let Some(body) = body {
            request = request
                .header("Content-Type", "text/plain; charset=utf-8")
                .body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::remote(endpoint, None, format!("request failed: {}", e)))?;

        self.handle_response(endpoint, response).await
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    async fn get_value(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> Result<Value, SourceError> {
        self.make_request(Method::GET, endpoint, query_params, None)
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> Result<T, SourceError> {
        self.make_request(Method::GET, endpoint, query_params, None)
            .await
            .and_then(|value| {
                serde_json::from_value(value).map_err(|e| {
                    SourceError::remote(
                        endpoint,
                        None,
                        format!("failed to deserialize JSON: {}", e),
                    )
                })
            })
    }

    async fn post_text_value(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: String,
    ) -> Result<Value, SourceError> {
        self.make_request(Method::POST, endpoint, query_params, Some(body))
            .await
    }
}
