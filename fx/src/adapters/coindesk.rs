//! CoinDesk BPI adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use coinrate_common::{CurrencyPair, RateRecord};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::http::{decode, HttpFetcher};
use crate::error::{FailureCause, FxError, FxResult};
use crate::provider::RateSource;

const DEFAULT_BASE_URL: &str = "https://api.coindesk.com";
const PATH: &str = "/v1/bpi/currentprice/CAD.json";

#[derive(Debug, Deserialize)]
struct CurrentPriceResponse {
    #[serde(default)]
    bpi: HashMap<String, BpiEntry>,
}

#[derive(Debug, Deserialize)]
struct BpiEntry {
    #[serde(default)]
    rate_float: Option<Decimal>,
}

pub struct CoinDeskSource {
    http: HttpFetcher,
    url: String,
}

impl CoinDeskSource {
    pub const NAME: &'static str = "CoinDesk";

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

    /// Map a response body to a record. The index also carries USD; only
    /// the CAD entry is read.
    pub fn parse(body: &str) -> FxResult<RateRecord> {
        let response: CurrentPriceResponse = decode(Self::NAME, body)?;
        let price = response
            .bpi
            .get("CAD")
            .and_then(|entry| entry.rate_float)
            .ok_or_else(|| FxError::provider(Self::NAME, FailureCause::MissingPrice))?;

        RateRecord::new(CurrencyPair::btc_cad(), price, Self::NAME)
            .and_then(RateRecord::with_derived_range)
            .map_err(|e| FxError::provider(Self::NAME, FailureCause::InvalidPrice(e.to_string())))
    }
}

#[async_trait]
impl RateSource for CoinDeskSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self) -> FxResult<RateRecord> {
        let body = self.http.get_text(Self::NAME, &self.url).await?;
        Self::parse(&body)
    }
}
