use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::{Engine, EngineError};
use crate::observability::WAL_COMPACTIONS_TOTAL;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that rewrites a tenant's WAL once it has grown past
/// `threshold` appends since the last compaction.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_needed(&engine, threshold).await {
            // Retried on the next tick.
            warn!("WAL compaction failed: {e}");
        }
    }
}

/// One compactor step. Returns whether a compaction ran.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> Result<bool, EngineError> {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return Ok(false);
    }
    let result = engine.compact_wal().await;
    let status = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(WAL_COMPACTIONS_TOTAL, "status" => status).increment(1);
    result?;
    debug!("compaction triggered after {appends} appends");
    Ok(true)
}
