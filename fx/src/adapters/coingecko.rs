//! CoinGecko simple-price adapter. The only source reporting 24h change and volume.

use async_trait::async_trait;
use coinrate_common::{CurrencyPair, RateRecord};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::http::{decode, HttpFetcher};
use crate::error::{FailureCause, FxError, FxResult};
use crate::provider::RateSource;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com";
const PATH: &str = "/api/v3/simple/price?ids=bitcoin&vs_currencies=cad&include_24hr_change=true&include_24hr_vol=true";

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    #[serde(default)]
    bitcoin: Option<CoinQuote>,
}

#[derive(Debug, Deserialize)]
struct CoinQuote {
    #[serde(default)]
    cad: Option<Decimal>,
    #[serde(default)]
    cad_24h_change: Option<Decimal>,
    #[serde(default)]
    cad_24h_vol: Option<Decimal>,
}

pub struct CoinGeckoSource {
    http: HttpFetcher,
    url: String,
}

impl CoinGeckoSource {
    pub const NAME: &'static str = "CoinGecko";

    pub fn new(http: HttpFetcher) -> Self {
        Self {
            http,
            url: format!("{DEFAULT_BASE_URL}{PATH}"),
        }
    }

    /// Point the adapter at another host serving the same API.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.url = format!("{}{PATH}", base_url.trim_end_matches('/'));
        self
    }

    /// Map a response body to a record.
    pub fn parse(body: &str) -> FxResult<RateRecord> {
        let response: SimplePriceResponse = decode(Self::NAME, body)?;
        let quote = response
            .bitcoin
            .ok_or_else(|| FxError::provider(Self::NAME, FailureCause::MissingPrice))?;
        let price = quote
            .cad
            .ok_or_else(|| FxError::provider(Self::NAME, FailureCause::MissingPrice))?;

        RateRecord::new(CurrencyPair::btc_cad(), price, Self::NAME)
            .and_then(|record| {
                record
                    .with_change_24h(quote.cad_24h_change.map(|c| c.round_dp(2)))
                    .with_volume_24h(quote.cad_24h_vol.filter(|v| *v >= Decimal::ZERO))
                    .with_derived_range()
            })
            .map_err(|e| FxError::provider(Self::NAME, FailureCause::InvalidPrice(e.to_string())))
    }
}

#[async_trait]
impl RateSource for CoinGeckoSource {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self) -> FxResult<RateRecord> {
        let body = self.http.get_text(Self::NAME, &self.url).await?;
        Self::parse(&body)
    }
}
