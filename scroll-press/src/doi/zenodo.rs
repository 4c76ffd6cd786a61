// SPDX-License-Identifier: AGPL-3.0-or-later

//! HTTP client for the Zenodo REST API.
//!
//! Scroll Press follows the publisher model: one organizational Zenodo account mints DOIs on
//! behalf of all users.
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};
use reqwest::{Method, Response, StatusCode};
use serde_json::{json, Value};

use crate::config::ZenodoConfiguration;
use crate::doi::registrar::{
    DepositRequest, DoiRegistrar, MintedDoi, RegistrarError, ReservedDeposit,
};

pub struct ZenodoRegistrar {
    client: reqwest::Client,
    config: ZenodoConfiguration,
}

impl ZenodoRegistrar {
    pub fn new(config: ZenodoConfiguration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Sends a request with exponential backoff on retryable failures (429 and 5xx).
    async fn request_with_retry<F>(&self, build: F) -> Result<Response, RegistrarError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;

        loop {
            let result = build(&self.client)
                .bearer_auth(&self.config.api_token)
                .send()
                .await;

            let error = match result {
                Ok(response) if response.status().is_success() => {
                    if let Some(remaining) = response
                        .headers()
                        .get("X-RateLimit-Remaining")
                        .and_then(|value| value.to_str().ok())
                        .and_then(|value| value.parse::<u64>().ok())
                    {
                        if remaining < 10 {
                            warn!("Zenodo rate limit low: {} requests remaining", remaining);
                        }
                    }

                    return Ok(response);
                }
                Ok(response) => self.classify_status(response).await,
                Err(err) => self.sanitize(RegistrarError::retryable(format!(
                    "Zenodo request failed: {}",
                    err
                ))),
            };

            attempt += 1;
            if !error.retryable || attempt >= self.config.max_retries {
                return Err(error);
            }

            // Exponential backoff: 1s, 2s, 4s ..
            let wait = Duration::from_secs(1u64 << (attempt - 1));
            warn!(
                "Zenodo API error, retrying in {:?} (attempt {}/{}): {}",
                wait, attempt, self.config.max_retries, error
            );
            tokio::time::sleep(wait).await;
        }
    }

    async fn classify_status(&self, response: Response) -> RegistrarError {
        let status = response.status();
        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| {
                body.get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("HTTP {}", status));

        let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();

        self.sanitize(RegistrarError {
            message: format!("Zenodo API error: {}", message),
            status_code: Some(status.as_u16()),
            retryable,
        })
    }

    /// Makes sure the API token never leaks through error text.
    fn sanitize(&self, mut error: RegistrarError) -> RegistrarError {
        if error.message.contains(&self.config.api_token) {
            error.message = error.message.replace(&self.config.api_token, "[REDACTED]");
        }
        error
    }

    async fn json_body(&self, response: Response) -> Result<Value, RegistrarError> {
        response
            .json::<Value>()
            .await
            .map_err(|err| RegistrarError::fatal(format!("Invalid Zenodo response: {}", err)))
    }

    fn parse_deposit(&self, body: &Value) -> Result<ReservedDeposit, RegistrarError> {
        let deposit_id = body
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| RegistrarError::fatal("Zenodo deposit without id"))?;

        let doi = body
            .pointer("/metadata/prereserve_doi/doi")
            .or_else(|| body.get("doi"))
            .and_then(Value::as_str)
            .ok_or_else(|| RegistrarError::fatal("Zenodo deposit without DOI"))?
            .to_string();

        let bucket_url = body
            .pointer("/links/bucket")
            .and_then(Value::as_str)
            .ok_or_else(|| RegistrarError::fatal("Zenodo deposit without bucket link"))?
            .to_string();

        Ok(ReservedDeposit {
            deposit_id,
            doi,
            bucket_url,
        })
    }
}

#[async_trait::async_trait]
impl DoiRegistrar for ZenodoRegistrar {
    async fn create_deposit(
        &self,
        request: &DepositRequest,
    ) -> Result<ReservedDeposit, RegistrarError> {
        let metadata = json!({
            "metadata": {
                "title": request.title,
                "upload_type": "publication",
                "publication_type": "preprint",
                "description": request.description,
                "creators": request
                    .creators
                    .iter()
                    .map(|name| json!({ "name": name }))
                    .collect::<Vec<_>>(),
                "publication_date": request.publication_date,
                "keywords": request.keywords,
                "access_right": "open",
                "license": request.license_id,
                "communities": [{ "identifier": "scrollpress" }],
                "prereserve_doi": true,
            }
        });

        let url = self.api_url("/api/deposit/depositions");
        let response = self
            .request_with_retry(|client| {
                client
                    .request(Method::POST, &url)
                    .json(&metadata)
            })
            .await?;

        let body = self.json_body(response).await?;
        let deposit = self.parse_deposit(&body)?;

        info!(
            "Created Zenodo deposit {} with DOI {}",
            deposit.deposit_id, deposit.doi
        );

        Ok(deposit)
    }

    async fn resume_deposit(&self, deposit_id: i64) -> Result<ReservedDeposit, RegistrarError> {
        let url = self.api_url(&format!("/api/deposit/depositions/{}", deposit_id));
        let response = self
            .request_with_retry(|client| client.request(Method::GET, &url))
            .await?;

        let body = self.json_body(response).await?;
        self.parse_deposit(&body)
    }

    async fn upload_file(
        &self,
        deposit: &ReservedDeposit,
        filename: &str,
        content: &[u8],
    ) -> Result<(), RegistrarError> {
        let url = format!("{}/{}", deposit.bucket_url, filename);
        let content = content.to_vec();

        self.request_with_retry(|client| {
            client
                .request(Method::PUT, &url)
                .header("Content-Type", "text/html")
                .body(content.clone())
        })
        .await?;

        info!("Uploaded file {} to Zenodo deposit", filename);

        Ok(())
    }

    async fn publish_deposit(&self, deposit_id: i64) -> Result<MintedDoi, RegistrarError> {
        let url = self.api_url(&format!(
            "/api/deposit/depositions/{}/actions/publish",
            deposit_id
        ));
        let response = self
            .request_with_retry(|client| client.request(Method::POST, &url))
            .await?;

        let body = self.json_body(response).await?;
        let doi = body
            .get("doi")
            .and_then(Value::as_str)
            .ok_or_else(|| RegistrarError::fatal("Published deposit without DOI"))?
            .to_string();

        info!("Published Zenodo deposit {}, DOI registered: {}", deposit_id, doi);

        Ok(MintedDoi { doi, deposit_id })
    }
}

impl std::fmt::Debug for ZenodoRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZenodoRegistrar")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}
