//! Port for the external gas-price oracle the Housekeeper polls.
//!
//! The wire format of the oracle's HTTP response is an infrastructure
//! concern; this port only describes the reading the Housekeeper needs
//! once that response has been parsed.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::primitives::WeiAmount;

/// A single gas-price reading, already converted to wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPriceReading {
    /// "Standard" price — the value skeletons default to.
    pub average: WeiAmount,
    /// The floor below which the Queue Processor holds transactions in
    /// `queued` rather than submitting them.
    pub safe_low: WeiAmount,
}

/// Port over an external gas-price oracle HTTPS endpoint.
#[async_trait]
pub trait GasOracle: Send + Sync {
    /// Fetch the current reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is unreachable or returns an
    /// unparseable response.
    async fn fetch(&self) -> Result<GasPriceReading>;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks {
    //! Mock implementations for testing.

    use super::{GasOracle, GasPriceReading};
    use crate::error::Result;

    /// Returns a fixed reading, or a configured error, every call.
    #[derive(Debug, Clone)]
    pub struct FixedGasOracle {
        /// The reading to return.
        pub reading: GasPriceReading,
    }

    impl FixedGasOracle {
        /// Create a mock oracle that always returns `reading`.
        #[must_use]
        pub const fn new(reading: GasPriceReading) -> Self {
            Self { reading }
        }
    }

    #[async_trait::async_trait]
    impl GasOracle for FixedGasOracle {
        async fn fetch(&self) -> Result<GasPriceReading> {
            Ok(self.reading)
        }
    }
}
