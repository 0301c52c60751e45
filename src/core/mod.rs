/*!
 * Core Module
 * Shared foundations: types, limits, errors, logging
 */

pub mod errors;
pub mod limits;
pub mod logging;
pub mod types;

pub use errors::AgentError;
pub use logging::init_tracing;
pub use types::{AgentResult, CorrelationId, SlotId};
