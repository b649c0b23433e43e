use crate::error::FeedError;
use price_feed::{Interval, PriceHistory, PriceSample};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use url::Url;

/// Response envelope shared by every REST endpoint: `{"success", "data"?, "error"?}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self, status: StatusCode) -> Result<T, FeedError> {
        match self {
            Envelope {
                success: true,
                data: Some(data),
                ..
            } => Ok(data),
            Envelope { error, .. } => Err(FeedError::Api(
                error.unwrap_or_else(|| format!("request failed with status {status}")),
            )),
        }
    }
}

/// REST client for the price endpoints.
#[derive(Debug, Clone)]
pub struct PriceApi {
    client: Client,
    base: Url,
}

impl PriceApi {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, FeedError> {
        self.base.join(path).map_err(|error| FeedError::InvalidUrl {
            url: format!("{}{}", self.base, path),
            reason: error.to_string(),
        })
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, FeedError> {
        Self::decode(request.send().await?).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, FeedError> {
        let status = response.status();
        response
            .json::<Envelope<T>>()
            .await
            .map_err(|error| {
                FeedError::Http(format!("unreadable response with status {status}: {error}"))
            })?
            .into_data(status)
    }

    /// `GET /api/prices/current`. `None` until the server has computed its first sample.
    pub async fn current(&self) -> Result<Option<PriceSample>, FeedError> {
        let response = self
            .client
            .get(self.endpoint("/api/prices/current")?)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Self::decode(response).await.map(Some)
    }

    /// `GET /api/prices/history/{interval}`
    pub async fn history(&self, interval: Interval) -> Result<PriceHistory, FeedError> {
        let url = self.endpoint(&format!("/api/prices/history/{interval}"))?;
        Self::send(self.client.get(url)).await
    }

    /// `POST /api/prices/update`, authenticated with `token` when one is given.
    pub async fn trigger_update(&self, token: Option<&str>) -> Result<PriceSample, FeedError> {
        let mut request = self.client.post(self.endpoint("/api/prices/update")?);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Self::send(request).await
    }
}
