//! Ordered strategy selection with fall-through.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use casegen_core::defaults::PROBE_TIMEOUT_SECS;
use casegen_core::AnalysisResult;

use crate::strategies::static_fallback::{static_result, STATIC_FALLBACK};
use crate::strategies::{AnalysisContext, VideoAnalyzer};

/// Tries each strategy in order and returns the first success.
///
/// Unavailable strategies are skipped; errors and timeouts fall through to
/// the next one. When every strategy fails the static placeholder is
/// returned, so [`AnalyzerChain::run`] never fails.
#[derive(Clone)]
pub struct AnalyzerChain {
    analyzers: Vec<Arc<dyn VideoAnalyzer>>,
    strategy_timeout: Duration,
}

impl AnalyzerChain {
    pub fn new(analyzers: Vec<Arc<dyn VideoAnalyzer>>, strategy_timeout: Duration) -> Self {
        Self {
            analyzers,
            strategy_timeout,
        }
    }

    /// Strategy names in attempt order.
    pub fn names(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }

    /// Run the chain. Returns the result and the name of the strategy that
    /// produced it.
    pub async fn run(&self, ctx: &AnalysisContext) -> (AnalysisResult, String) {
        let probe_timeout = Duration::from_secs(PROBE_TIMEOUT_SECS);

        for analyzer in &self.analyzers {
            let name = analyzer.name();

            let available = tokio::time::timeout(probe_timeout, analyzer.available(ctx))
                .await
                .unwrap_or(false);
            if !available {
                debug!(strategy = name, "Strategy unavailable, skipping");
                continue;
            }

            let start = Instant::now();
            match tokio::time::timeout(self.strategy_timeout, analyzer.analyze(ctx)).await {
                Ok(Ok(result)) => {
                    info!(
                        strategy = name,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Strategy succeeded"
                    );
                    return (result, name.to_string());
                }
                Ok(Err(e)) => {
                    warn!(strategy = name, error = %e, "Strategy failed, falling through");
                }
                Err(_) => {
                    warn!(
                        strategy = name,
                        timeout_secs = self.strategy_timeout.as_secs(),
                        "Strategy timed out, falling through"
                    );
                }
            }
        }

        warn!("All strategies failed, using static fallback");
        (static_result(&ctx.source), STATIC_FALLBACK.to_string())
    }
}
