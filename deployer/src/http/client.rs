//! HTTP client implementation

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use stack_models::ErrorResponse;
use tracing::{debug, error};
use url::Url;

use crate::errors::DeployError;

/// HTTP client for the stack orchestration service
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DeployError> {
        let client = Client::builder().timeout(timeout).build()?;

        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| DeployError::ConfigError(format!("invalid base url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(DeployError::ConfigError(format!(
                "base url '{}' cannot have path segments",
                base_url
            )));
        }

        Ok(Self { client, base_url })
    }

    /// Base URL extended with `segments`, each one percent-encoded
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, DeployError> {
        let url = self.url(segments);
        debug!("GET {}", url);

        let response = self.send(self.client.get(url).query(query)).await?;
        let body = response.json().await?;
        Ok(body)
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, DeployError> {
        let url = self.url(segments);
        debug!("POST {}", url);

        let response = self.send(self.client.post(url).json(body)).await?;
        let body = response.json().await?;
        Ok(body)
    }

    /// Make a POST request, ignoring the response body
    pub async fn post_unit<B: Serialize>(&self, segments: &[&str], body: &B) -> Result<(), DeployError> {
        let url = self.url(segments);
        debug!("POST {}", url);

        self.send(self.client.post(url).json(body)).await?;
        Ok(())
    }

    /// Make a PUT request
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, DeployError> {
        let url = self.url(segments);
        debug!("PUT {}", url);

        let response = self.send(self.client.put(url).json(body)).await?;
        let body = response.json().await?;
        Ok(body)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, DeployError> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let body = match serde_json::from_str::<ErrorResponse>(&text) {
                Ok(rejection) => rejection.message,
                Err(_) => text,
            };
            error!("HTTP request failed: {} - {}", status, body);
            return Err(DeployError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}
