use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;

use crate::models::RenderRequest;
use crate::render::{Rasterizer, RenderError};

/// Talks to the rasterizer service over HTTP. The target URL, the cache
/// file name and every recognized option travel as request headers; the
/// image comes back as the response body.
pub struct HttpRasterizer {
    client: Client,
    endpoint: String,
}

impl HttpRasterizer {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Rasterizer for HttpRasterizer {
    async fn rasterize(
        &self,
        request: &RenderRequest,
        filename: &str,
    ) -> Result<Vec<u8>, RenderError> {
        let mut builder = self
            .client
            .get(&self.endpoint)
            .header("url", request.url.as_str())
            .header("filename", filename);
        for (name, value) in request.options.iter() {
            builder = builder.header(name, value);
        }

        debug!("Calling rasterizer at {} for {}", self.endpoint, request.url);
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let snippet: String = String::from_utf8_lossy(&body).chars().take(200).collect();
            error!("Rasterizer failed with status: {}. Body: {}", status, snippet.trim());
            return Err(RenderError::Status(status));
        }

        Ok(body.to_vec())
    }
}
