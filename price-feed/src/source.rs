use crate::error::PriceError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Default timeout applied to every upstream HTTP read.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw, unvalidated valuations read from upstream.
///
/// Values are kept as JSON so numeric strings (common for on-chain amounts) and non-numeric
/// garbage both reach the [`PriceComputer`](crate::computer::PriceComputer), which decides
/// whether they are valid.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuote {
    pub base_valuation: Value,
    pub native_valuation: Value,
}

/// Upstream data a price is derived from.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self) -> Result<RawQuote, PriceError>;
}

/// Parse a JSON number or numeric string into an `f64`.
///
/// Non-numeric values are [`PriceError::InvalidData`]. Sign and finiteness are checked by the
/// caller.
pub fn parse_number(value: &Value, field: &str) -> Result<f64, PriceError> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| PriceError::InvalidData(format!("{field}: {number} is not an f64"))),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| PriceError::InvalidData(format!("{field}: {text:?} is not numeric"))),
        other => Err(PriceError::InvalidData(format!(
            "{field}: expected number, found {other}"
        ))),
    }
}

/// Resolve a JSON pointer (eg/ `/data/price`) inside `document`.
fn lookup<'a>(document: &'a Value, pointer: &str) -> Result<&'a Value, PriceError> {
    document
        .pointer(pointer)
        .ok_or_else(|| PriceError::InvalidData(format!("missing field at {pointer}")))
}

/// GET `url` and decode the body as JSON.
///
/// Transport failures, non-2xx statuses and bodies that are not JSON are all
/// [`PriceError::UpstreamUnavailable`].
async fn fetch_document(client: &reqwest::Client, url: &str) -> Result<Value, PriceError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|error| PriceError::UpstreamUnavailable(format!("{url}: {error}")))?;

    if let Err(status_error) = response.error_for_status_ref() {
        return Err(PriceError::UpstreamUnavailable(format!(
            "{url}: {status_error}"
        )));
    }

    response
        .json::<Value>()
        .await
        .map_err(|error| PriceError::UpstreamUnavailable(format!("{url}: {error}")))
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DEFAULT_SOURCE_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Reads both valuations directly from one JSON document.
#[derive(Debug, Clone)]
pub struct HttpPriceSource {
    client: reqwest::Client,
    url: String,
    base_pointer: String,
    native_pointer: String,
}

impl HttpPriceSource {
    pub fn new(
        url: impl Into<String>,
        base_pointer: impl Into<String>,
        native_pointer: impl Into<String>,
    ) -> Self {
        Self {
            client: build_client(),
            url: url.into(),
            base_pointer: base_pointer.into(),
            native_pointer: native_pointer.into(),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch(&self) -> Result<RawQuote, PriceError> {
        let document = fetch_document(&self.client, &self.url).await?;
        debug!(url = %self.url, "fetched price document");

        Ok(RawQuote {
            base_valuation: lookup(&document, &self.base_pointer)?.clone(),
            native_valuation: lookup(&document, &self.native_pointer)?.clone(),
        })
    }
}

/// Derives the price from bonding-curve reserves plus a native-to-quote conversion rate.
///
/// `native = virtual_native_reserves / virtual_token_reserves` and
/// `base = native * native_quote_price`.
#[derive(Debug, Clone)]
pub struct CurveReserveSource {
    client: reqwest::Client,
    curve_url: String,
    native_reserves_pointer: String,
    token_reserves_pointer: String,
    quote_url: String,
    quote_pointer: String,
}

impl CurveReserveSource {
    pub fn new(curve_url: impl Into<String>, quote_url: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            curve_url: curve_url.into(),
            native_reserves_pointer: "/virtualNativeReserves".to_string(),
            token_reserves_pointer: "/virtualTokenReserves".to_string(),
            quote_url: quote_url.into(),
            quote_pointer: "/price".to_string(),
        }
    }

    pub fn with_reserve_pointers(
        mut self,
        native_reserves: impl Into<String>,
        token_reserves: impl Into<String>,
    ) -> Self {
        self.native_reserves_pointer = native_reserves.into();
        self.token_reserves_pointer = token_reserves.into();
        self
    }

    pub fn with_quote_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.quote_pointer = pointer.into();
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl PriceSource for CurveReserveSource {
    async fn fetch(&self) -> Result<RawQuote, PriceError> {
        let (curve, quote) = futures::try_join!(
            fetch_document(&self.client, &self.curve_url),
            fetch_document(&self.client, &self.quote_url),
        )?;

        let native_reserves = parse_number(
            lookup(&curve, &self.native_reserves_pointer)?,
            "virtualNativeReserves",
        )?;
        let token_reserves = parse_number(
            lookup(&curve, &self.token_reserves_pointer)?,
            "virtualTokenReserves",
        )?;
        let native_quote = parse_number(lookup(&quote, &self.quote_pointer)?, "nativeQuotePrice")?;

        if token_reserves <= 0.0 {
            return Err(PriceError::InvalidData(format!(
                "virtualTokenReserves must be positive, found {token_reserves}"
            )));
        }

        let native_valuation = native_reserves / token_reserves;
        let base_valuation = native_valuation * native_quote;

        Ok(RawQuote {
            base_valuation: Value::from(base_valuation),
            native_valuation: Value::from(native_valuation),
        })
    }
}
