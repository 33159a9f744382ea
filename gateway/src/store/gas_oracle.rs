//! HTTP adapter for an external gas-price oracle, implementing the
//! [`GasOracle`] port.
//!
//! The oracle's wire format follows the common "GasNow"/"EthGasStation"
//! style: a JSON object carrying `average` and `safeLow`, each a Gwei
//! value scaled by 10 (so `200` means `20.0` Gwei). This adapter is where
//! that convention gets translated into the plain wei amounts the rest of
//! the gateway works with.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use crate::error::{InfraError, Result};
use crate::ports::{GasOracle, GasPriceReading};
use crate::types::primitives::WeiAmount;

/// A Gwei value scaled by 10, as the oracle reports it. One Gwei.
const GWEI: u128 = 1_000_000_000;
/// Wei-per-unit for the oracle's `x10` scale: `Gwei / 10`.
const WEI_PER_ORACLE_UNIT: u128 = GWEI / 10;

#[derive(Debug, Deserialize)]
struct OracleResponse {
    average: f64,
    #[serde(rename = "safeLow")]
    safe_low: f64,
}

fn units_to_wei(units: f64) -> WeiAmount {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let units = units.max(0.0).round() as u128;
    WeiAmount::from(units.saturating_mul(WEI_PER_ORACLE_UNIT))
}

/// Polls an HTTP gas-price oracle and converts its reading to wei.
#[derive(Debug, Clone)]
pub struct HttpGasOracle {
    client: Client,
    url: String,
}

impl HttpGasOracle {
    /// Create a new adapter against `url`, with `timeout` applied per
    /// request.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InfraError::Transport(Box::new(e)))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl GasOracle for HttpGasOracle {
    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<GasPriceReading> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| InfraError::Transport(Box::new(e)))?
            .error_for_status()
            .map_err(|e| InfraError::Transport(Box::new(e)))?
            .json::<OracleResponse>()
            .await
            .map_err(|e| InfraError::Transport(Box::new(e)))?;

        let safe_low = units_to_wei(response.safe_low);
        let mut average = units_to_wei(response.average);
        if safe_low > average {
            average = safe_low.saturating_add(&WeiAmount::from(u128::try_from(GWEI).unwrap_or(u128::MAX)));
        }

        Ok(GasPriceReading { average, safe_low })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_units_convert_to_wei() {
        // 200 units = 20.0 Gwei = 20_000_000_000 wei
        assert_eq!(units_to_wei(200.0), WeiAmount::from(20_000_000_000_u64));
    }

    #[test]
    fn oracle_units_round_fractional_values() {
        assert_eq!(units_to_wei(1.0), WeiAmount::from(100_000_000_u64));
    }

    fn bump_standard(average_units: f64, safe_low_units: f64) -> GasPriceReading {
        let safe_low = units_to_wei(safe_low_units);
        let mut average = units_to_wei(average_units);
        if safe_low > average {
            average = safe_low.saturating_add(&WeiAmount::from(GWEI as u64));
        }
        GasPriceReading { average, safe_low }
    }

    #[test]
    fn standard_is_bumped_above_safe_low_when_inverted() {
        let reading = bump_standard(50.0, 300.0);
        let expected_safe_low = units_to_wei(300.0);
        assert_eq!(reading.safe_low, expected_safe_low);
        assert_eq!(reading.average, expected_safe_low.saturating_add(&WeiAmount::from(GWEI as u64)));
    }

    #[test]
    fn standard_is_untouched_when_already_above_safe_low() {
        let reading = bump_standard(300.0, 50.0);
        assert_eq!(reading.average, units_to_wei(300.0));
        assert_eq!(reading.safe_low, units_to_wei(50.0));
    }
}
