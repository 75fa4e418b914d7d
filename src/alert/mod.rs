//! Exposure alert edges.
//!
//! An edge is a directed, per-infection channel from the person whose
//! results are watched (sender) to the person notified (recipient), both
//! identified by exposure pseudonyms.
//!
//! Edges come from two places:
//!
//! - an explicit request by the recipient, answered by the sender
//! - a connection entering Friend or above, which rebuilds the pair's edges
//!
//! A positive result fires the sender's active edges and marks each
//! recipient exposed. Edges are retired through their status and never
//! deleted.

mod engine;
mod storage;
pub mod types;

pub use engine::ExposureAlertEngine;
pub use types::{AlertDecision, AlertStatus, ExposureAlert};
