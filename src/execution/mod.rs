// Trade lifecycle core
pub mod closure;
pub mod controller;
pub mod retry;

pub use closure::{ClosureReason, ClosureReport, ClosureSupervisor};
pub use controller::TradeController;
pub use retry::retry;

use thiserror::Error;

use crate::broker::OrderRequest;

/// Faults the lifecycle core can surface to the scheduler.
///
/// All of them are non-fatal: the scheduler skips the interval and keeps
/// running.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("broker session is not available")]
    SessionDown,

    #[error("symbol {0} is not visible and could not be enabled")]
    SymbolUnavailable(String),

    /// Rejection echoes the full request so the operator can diagnose it
    #[error("order rejected with retcode {retcode}: {comment}")]
    OrderRejected {
        retcode: u32,
        comment: String,
        request: OrderRequest,
    },

    #[error("broker call failed: {0}")]
    Gateway(#[from] Box<dyn std::error::Error + Send + Sync>),
}
