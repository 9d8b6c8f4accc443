//! WebHDFS upload backend
//!
//! Uploads use the two-step CREATE protocol: the name node answers the first
//! `PUT` with a redirect to a data node, and the file body goes to that
//! location. A failed data transfer deletes whatever partial file was left.

use crate::error::{RemoteError, Result};
use crate::RemoteStore;
use async_trait::async_trait;
use logrot_core::RemoteConfig;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Error body returned by WebHDFS
#[derive(Debug, Deserialize)]
struct RemoteExceptionBody {
    #[serde(rename = "RemoteException")]
    remote_exception: RemoteException,
}

#[derive(Debug, Deserialize)]
struct RemoteException {
    #[serde(default)]
    exception: String,
    #[serde(default)]
    message: String,
}

/// WebHDFS client
pub struct WebHdfsClient {
    base_url: String,
    user: Option<String>,
    client: reqwest::Client,
}

impl WebHdfsClient {
    /// Create a client for the name node in `config`
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(Policy::none())
            .build()?;
        Ok(Self::with_client(config, client))
    }

    /// Create with a custom HTTP client (it must not follow redirects)
    pub fn with_client(config: &RemoteConfig, client: reqwest::Client) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            client,
        }
    }

    /// Build the REST URL for an operation on `remote_path`.
    ///
    /// Each path component is pushed as its own percent-encoded segment, so
    /// `#`, `?` and `%` in file names stay part of the path.
    fn op_url(&self, remote_path: &str, op: &str, extra: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                RemoteError::InvalidUrl(format!("{}: cannot be a base", self.base_url))
            })?;
            segments.pop_if_empty().push("webhdfs").push("v1");
            segments.extend(remote_path.split('/').filter(|part| !part.is_empty()));
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", op);
            for (key, value) in extra {
                query.append_pair(key, value);
            }
            if let Some(user) = &self.user {
                query.append_pair("user.name", user);
            }
        }
        Ok(url)
    }

    /// Delete a remote file, used to clean up after a failed transfer
    async fn delete(&self, remote_path: &str) -> Result<()> {
        let url = self.op_url(remote_path, "DELETE", &[])?;
        let response = self.client.delete(url).send().await?;
        if !response.status().is_success() {
            return Err(rejected("DELETE", response).await);
        }
        Ok(())
    }
}

/// Turn an unsuccessful response into an error, reading the RemoteException body if any
async fn rejected(op: &'static str, response: reqwest::Response) -> RemoteError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<RemoteExceptionBody>(&text) {
        Ok(body) => format!(
            "{}: {}",
            body.remote_exception.exception, body.remote_exception.message
        ),
        Err(_) if text.is_empty() => status.to_string(),
        Err(_) => text,
    };
    RemoteError::Rejected {
        op,
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl RemoteStore for WebHdfsClient {
    async fn upload(&self, remote_path: &str, local_path: &Path, overwrite: bool) -> Result<()> {
        let body = tokio::fs::read(local_path).await?;
        let overwrite = if overwrite { "true" } else { "false" };
        let url = self.op_url(remote_path, "CREATE", &[("overwrite", overwrite)])?;

        debug!("WebHDFS CREATE {}", url);
        let response = self.client.put(url).send().await?;

        let data_url = match response.status() {
            StatusCode::TEMPORARY_REDIRECT | StatusCode::FOUND | StatusCode::SEE_OTHER => response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or(RemoteError::MissingRedirect)?,
            status if status.is_success() => return Err(RemoteError::MissingRedirect),
            _ => return Err(rejected("CREATE", response).await),
        };

        let response = self
            .client
            .put(&data_url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await;

        let failure = match response {
            Ok(r) if r.status().is_success() => None,
            Ok(r) => Some(rejected("CREATE", r).await),
            Err(e) => Some(RemoteError::from(e)),
        };

        if let Some(err) = failure {
            if let Err(cleanup) = self.delete(remote_path).await {
                warn!("Failed to remove partial upload {}: {}", remote_path, cleanup);
            }
            return Err(err);
        }

        info!("Uploaded {} to {}{}", local_path.display(), self.base_url, remote_path);
        Ok(())
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }
}
