use crate::storage::protocol::{ENDPOINT_GET_MANY, ENDPOINT_PUT, KeyValue, PutRequest};

use anyhow::{Result, bail};
use reqwest::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    /// The key was already taken; the existing value is untouched.
    AlreadyExists,
}

#[derive(Debug, Clone)]
pub struct NamespaceClient {
    base_url: String,
    client: reqwest::Client,
}

impl NamespaceClient {
    /// `base_url` is the node's HTTP root, e.g. `http://127.0.0.1:8080`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<PutOutcome> {
        let url = format!("{}{}", self.base_url, ENDPOINT_PUT);
        let req = PutRequest {
            key: key.to_string(),
            value: value.to_string(),
        };

        let resp = self.client.post(url).json(&req).send().await?;

        match resp.status() {
            StatusCode::OK => Ok(PutOutcome::Stored),
            StatusCode::FORBIDDEN => Ok(PutOutcome::AlreadyExists),
            status => {
                let body = resp.text().await.unwrap_or_default();
                bail!("put {} failed with {}: {}", key, status, body)
            }
        }
    }

    pub async fn get_many(&self, prefix: &str) -> Result<Vec<KeyValue>> {
        let url = format!("{}{}", self.base_url, ENDPOINT_GET_MANY);

        let resp = self
            .client
            .get(url)
            .query(&[("prefix", prefix)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("getMany '{}' failed with {}: {}", prefix, status, body);
        }

        Ok(resp.json::<Vec<KeyValue>>().await?)
    }
}
