use anyhow::{Context, Result, bail};
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, CONTENT_TYPE},
};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::multipart::{DICOM_MEDIA_TYPE, RELATED_MEDIA_TYPE};

const JSON_MEDIA_TYPE: &str = "application/json";

#[derive(Debug)]
pub struct StowResponse {
    pub status: StatusCode,
    pub body: Value,
}

#[derive(Debug)]
pub struct WadoResponse {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// One synchronous request per call, no retries.
pub struct DicomWebClient {
    client: Client,
}

impl Default for DicomWebClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DicomWebClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// POSTs a prepared `multipart/related` body to a STOW-RS endpoint.
    ///
    /// Any status is accepted as long as the server answered with JSON; STOW-RS
    /// reports partial failures (202, 409) in the response body.
    pub async fn store_instances(
        &self,
        url: Url,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<StowResponse> {
        debug!(%url, bytes = body.len(), "sending STOW-RS request");

        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .body(body)
            .send()
            .await
            .with_context(|| format!("STOW-RS request to {} failed", url))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read STOW-RS response")?;
        debug!(%status, bytes = text.len(), "received STOW-RS response");

        let body = serde_json::from_str(&text).with_context(|| {
            format!(
                "STOW-RS server answered {} with a body that is not JSON: {}",
                status,
                text.trim()
            )
        })?;

        Ok(StowResponse { status, body })
    }

    /// QIDO-RS search. An empty answer (204 No Content) is an empty result set.
    pub async fn search(&self, url: Url, query: &[(String, String)]) -> Result<Value> {
        debug!(%url, params = query.len(), "sending QIDO-RS request");

        let response = self
            .client
            .get(url.clone())
            .query(query)
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .send()
            .await
            .with_context(|| format!("QIDO-RS request to {} failed", url))?;

        if !response.status().is_success() {
            bail!(
                "QIDO-RS search failed: {} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            );
        }

        let text = response
            .text()
            .await
            .context("Failed to read QIDO-RS response")?;
        if text.trim().is_empty() {
            return Ok(Value::Array(Vec::new()));
        }

        serde_json::from_str(&text).context("QIDO-RS response is not JSON")
    }

    pub async fn retrieve(&self, url: Url) -> Result<WadoResponse> {
        debug!(%url, "sending WADO-RS request");

        let response = self
            .client
            .get(url.clone())
            .header(
                ACCEPT,
                format!("{}; type={}", RELATED_MEDIA_TYPE, DICOM_MEDIA_TYPE),
            )
            .send()
            .await
            .with_context(|| format!("WADO-RS request to {} failed", url))?;

        if !response.status().is_success() {
            bail!(
                "WADO-RS retrieve failed: {} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            );
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .bytes()
            .await
            .context("Failed to read WADO-RS response")?
            .to_vec();
        debug!(%content_type, bytes = body.len(), "received WADO-RS response");

        Ok(WadoResponse { content_type, body })
    }
}
