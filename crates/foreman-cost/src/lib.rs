//! Token accounting, budget enforcement, and context-health gating.
//!
//! One [`CostTracker`] exists per agent session. The runner feeds it every
//! streamed message; the workflow engine consults it before each turn to
//! decide whether work may continue:
//!
//! - **Budget**: estimated cost accumulates per step; a final result
//!   message overwrites it with the authoritative figure.
//! - **Context health**: a four-level classification of token utilization.
//!   In the `Critical`/`Saturated` band the tracker refuses further
//!   implementation work until a compacted plan exists (the Dumb-Zone
//!   guard).

pub mod error;
pub mod pricing;
pub mod tracker;

pub use error::{CostError, Result};
pub use pricing::ModelPricing;
pub use tracker::{
    ContextHealth, CostSummary, CostTracker, SharedCostTracker, StepUsage, shared_tracker,
};
