use std::time::Duration;

use anyhow::{Error, bail};
use reqwest::{Client, Method, header::ORIGIN};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::responses::{AnalyticsReport, CleanupReport, Listing, ProgressiveEntry, ResponseEntry};

pub use reqwest::{Response, StatusCode, header::HeaderMap};

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Thin client over a running collection API.
pub struct SurveyClient {
    http: Client,
    base_url: String,
}

impl SurveyClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn health(&self) -> Result<(StatusCode, String), Error> {
        let response = self.http.get(self.url("/")).send().await?;
        let status = response.status();

        Ok((status, response.text().await?))
    }

    /// Posts a submission and returns the status with the raw body, success or not.
    ///
    /// Takes any serializable body so malformed payloads can be sent on purpose.
    pub async fn collect<T: Serialize + ?Sized>(&self, body: &T) -> Result<(StatusCode, Value), Error> {
        let (status, _, body) = self.collect_from(body, None).await?;

        Ok((status, body))
    }

    /// Like [`collect`](Self::collect), sending `Origin` and keeping the response headers.
    pub async fn collect_from<T: Serialize + ?Sized>(
        &self,
        body: &T,
        origin: Option<&str>,
    ) -> Result<(StatusCode, HeaderMap, Value), Error> {
        let mut request = self.http.post(self.url("/collect")).json(body);
        if let Some(origin) = origin {
            request = request.header(ORIGIN, origin);
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();

        Ok((status, headers, response.json().await?))
    }

    pub async fn preflight(&self, origin: &str) -> Result<Response, Error> {
        let response = self
            .http
            .request(Method::OPTIONS, self.url("/collect"))
            .header(ORIGIN, origin)
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "Content-Type")
            .send()
            .await?;

        Ok(response)
    }

    pub async fn responses(&self) -> Result<Listing<ResponseEntry>, Error> {
        self.get_json("/responses").await
    }

    pub async fn progressive_responses(&self) -> Result<Listing<ProgressiveEntry>, Error> {
        self.get_json("/progressive-responses").await
    }

    pub async fn analytics(&self) -> Result<AnalyticsReport, Error> {
        self.get_json("/analytics").await
    }

    pub async fn cleanup_test_sessions(&self) -> Result<CleanupReport, Error> {
        let response = self
            .http
            .delete(self.url("/cleanup-test-sessions"))
            .send()
            .await?;

        decode(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let response = self.http.get(self.url(path)).send().await?;

        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("{status}: {body}");
    }

    Ok(response.json().await?)
}
