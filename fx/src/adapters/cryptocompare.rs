//! CryptoCompare single-price adapter.

use async_trait::async_trait;
use coinrate_common::{CurrencyPair, RateRecord};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::http::{decode, HttpFetcher};
use crate::error::{FailureCause, FxError, FxResult};
use crate::provider::RateSource;

const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com";
const PATH: &str = "/data/price?fsym=BTC&tsyms=CAD";

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(rename = "CAD", default)]
    cad: Option<Decimal>,
    /// Set on API-level errors, which are returned with status 200.
    #[serde(rename = "Message", default)]
    message: Option<String>,
}

pub struct CryptoCompareSource {
    http: HttpFetcher,
    url: String,
}

impl CryptoCompareSource {
    pub const NAME: &'static str = "CryptoCompare";

    pub fn new(http: HttpFetcher) -> Self {
        Self {
            http,
            url: format!("{DEFAULT_BASE_URL}{PATH}"),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.url = format!("{}{PATH}", base_url.trim_end_matches('/'));
        self
    }

    pub fn parse(body: &str) -> FxResult<RateRecord> {
        let response: PriceResponse = decode(Self::NAME, body)?;
        let price = match (response.cad, response.message) {
            (Some(price), _) => price,
            (None, Some(message)) => {
                return Err(FxError::provider(Self::NAME, FailureCause::Decode(message)))
            }
            (None, None) => return Err(FxError::provider(Self::NAME, FailureCause::MissingPrice)),
        };

        RateRecord::new(CurrencyPair::btc_cad(), price, Self::NAME)
            .and_then(RateRecord::with_derived_range)
            .map_err(|e| FxError::provider(Self::NAME, FailureCause::InvalidPrice(e.to_string())))
    }
}

#[async_trait]
impl RateSource for CryptoCompareSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self) -> FxResult<RateRecord> {
        let body = self.http.get_text(Self::NAME, &self.url).await?;
        Self::parse(&body)
    }
}
