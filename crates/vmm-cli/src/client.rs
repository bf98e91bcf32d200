//! HTTP client for `vmm-daemon`'s REST surface: thin request/get/post/delete
//! wrappers that unwrap `ErrorResponse` into the `anyhow` message, speaking
//! plain HTTP over TCP via `reqwest` since `vmm-daemon` binds a TCP listener
//! rather than a socket file.

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use vmm_models::ErrorResponse;

#[derive(Debug)]
pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None::<&()>).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::POST, path, None::<&()>).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .with_context(|| format!("cannot reach vmm-daemon at {}", self.base_url))?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(self.error_for(response).await)
    }

    /// For endpoints that respond `204 No Content` (pause/unpause): fire the
    /// request and check the status without attempting to parse a body.
    pub async fn post_no_content(&self, path: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .with_context(|| format!("cannot reach vmm-daemon at {}", self.base_url))?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(self.error_for(response).await)
    }

    async fn request<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("cannot reach vmm-daemon at {}", self.base_url))?;

        if !response.status().is_success() {
            return Err(self.error_for(response).await);
        }

        response
            .json::<T>()
            .await
            .context("failed to deserialize vmm-daemon response")
    }

    async fn error_for(&self, response: reqwest::Response) -> anyhow::Error {
        let status: StatusCode = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if let Ok(error) = serde_json::from_value::<ErrorResponse>(body.clone()) {
            anyhow::anyhow!("{} ({})", error.error.message, error.error.code)
        } else {
            anyhow::anyhow!("HTTP {status}: {body}")
        }
    }
}
