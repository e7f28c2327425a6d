//! Chain import metrics.

use metrics::{Counter, Gauge, Histogram};
use metrics_derive::Metrics;

/// Metrics for the import path.
#[derive(Metrics)]
#[metrics(scope = "chain")]
pub struct ImportMetrics {
    /// Blocks that became the canonical tip
    pub imported_best: Counter,
    /// Blocks stored on a side branch
    pub imported_not_best: Counter,
    /// Blocks rejected as invalid
    pub invalid_blocks: Counter,
    /// Blocks dropped for lack of a parent
    pub no_parent: Counter,
    /// Re-imports of already known blocks
    pub known_blocks: Counter,
    /// Times a side branch overtook the canonical chain
    pub rebranches: Counter,
    /// Height of the canonical tip
    pub canonical_height: Gauge,
    /// Wall time spent executing a block, in seconds
    pub block_execution_duration: Histogram,
}
