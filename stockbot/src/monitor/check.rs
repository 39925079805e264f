//! A single look at the storefront.

use std::sync::Arc;

use storefront::StorefrontApi;
use tracing::debug;

use super::CheckError;
use super::state::Observation;

/// Length of the cycle the debug simulation walks through.
const SIMULATION_CYCLE: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftMuteReason {
    /// The product page could not be fetched at all.
    PageUnreachable(String),
    /// The product list came back with no entries.
    NoProducts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Observed(Observation),
    /// Nothing usable yet; back off for a minute without counting a failure.
    SoftMuted(SoftMuteReason),
}

pub struct StockChecker {
    api: Arc<dyn StorefrontApi>,
    product: String,
    block_status: String,
    debug_mode: bool,
}

impl StockChecker {
    pub fn new(
        api: Arc<dyn StorefrontApi>,
        product: impl Into<String>,
        block_status: impl Into<String>,
        debug_mode: bool,
    ) -> Self {
        Self {
            api,
            product: product.into(),
            block_status: block_status.into(),
            debug_mode,
        }
    }

    pub fn product_url(&self) -> &str {
        self.api.product_url()
    }

    /// Look at the page and the listing. `checks` drives the debug simulation.
    pub async fn check(&self, checks: u64) -> Result<CheckOutcome, CheckError> {
        debug!(checks, "Checking storefront");

        let would_enqueue = match self.api.would_enqueue().await {
            Ok(redirected) => redirected,
            Err(e) => {
                debug!(error = %e, "Product page unreachable");
                return Ok(CheckOutcome::SoftMuted(SoftMuteReason::PageUnreachable(
                    e.to_string(),
                )));
            }
        };

        let listing = self.api.product_list(&self.product).await?;
        let Some(product) = listing.first() else {
            return Ok(CheckOutcome::SoftMuted(SoftMuteReason::NoProducts));
        };
        let stock_status = product.stock_level_status().to_string();
        debug!(stock_status = %stock_status, would_enqueue, "Stock level");

        let observation = if self.debug_mode {
            let (would_enqueue, out_of_stock) = simulate(checks);
            Observation {
                would_enqueue,
                out_of_stock,
                stock_status,
            }
        } else {
            Observation {
                would_enqueue,
                out_of_stock: stock_status == self.block_status,
                stock_status,
            }
        };
        Ok(CheckOutcome::Observed(observation))
    }
}

/// Synthesized `(would_enqueue, out_of_stock)` for check number `checks`.
fn simulate(checks: u64) -> (bool, bool) {
    let n = checks % SIMULATION_CYCLE;
    let out_of_stock = !(10..=15).contains(&n);
    let would_enqueue = n > 5 && n < 20;
    (would_enqueue, out_of_stock)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn checker(fake: FakeStorefront, debug_mode: bool) -> StockChecker {
        StockChecker::new(Arc::new(fake), "3005816", "outOfStock", debug_mode)
    }

    #[tokio::test]
    async fn test_blocked_status_without_redirect() {
        let fake = FakeStorefront::default();
        fake.push_page(Ok(false)).push_listing(Ok(listing("outOfStock")));

        let outcome = checker(fake, false).check(0).await.unwrap();
        assert_eq!(
            outcome,
            CheckOutcome::Observed(Observation {
                would_enqueue: false,
                out_of_stock: true,
                stock_status: "outOfStock".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_restock_with_redirect() {
        let fake = FakeStorefront::default();
        fake.push_page(Ok(true)).push_listing(Ok(listing("inStock")));

        let CheckOutcome::Observed(observation) = checker(fake, false).check(3).await.unwrap()
        else {
            panic!("expected an observation");
        };
        assert!(observation.would_enqueue);
        assert!(!observation.out_of_stock);
    }

    #[tokio::test]
    async fn test_unreachable_page_soft_mutes() {
        let fake = FakeStorefront::default();
        fake.push_page(Err(parse_error()));

        let outcome = checker(fake, false).check(0).await.unwrap();
        assert!(matches!(
            outcome,
            CheckOutcome::SoftMuted(SoftMuteReason::PageUnreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_listing_soft_mutes() {
        let fake = FakeStorefront::default();
        fake.push_listing(Ok(empty_listing()));

        let outcome = checker(fake, false).check(0).await.unwrap();
        assert_eq!(outcome, CheckOutcome::SoftMuted(SoftMuteReason::NoProducts));
    }

    #[tokio::test]
    async fn test_listing_failure_is_an_error() {
        let fake = FakeStorefront::default();
        fake.push_listing(Err(parse_error()));

        let err = checker(fake, false).check(0).await.unwrap_err();
        assert!(matches!(err, CheckError::Storefront(_)));
    }

    #[tokio::test]
    async fn test_debug_mode_ignores_real_status() {
        let fake = FakeStorefront::default();
        fake.push_listing(Ok(listing("outOfStock")));

        let CheckOutcome::Observed(observation) = checker(fake, true).check(12).await.unwrap()
        else {
            panic!("expected an observation");
        };
        assert!(observation.would_enqueue);
        assert!(!observation.out_of_stock);
        assert_eq!(observation.stock_status, "outOfStock");
    }

    #[test]
    fn test_simulation_cycle() {
        assert_eq!(simulate(0), (false, true));
        assert_eq!(simulate(6), (true, true));
        assert_eq!(simulate(10), (true, false));
        assert_eq!(simulate(15), (true, false));
        assert_eq!(simulate(16), (true, true));
        assert_eq!(simulate(20), (false, true));
        assert_eq!(simulate(40), simulate(10));
    }
}
