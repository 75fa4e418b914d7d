//! Connections between users.
//!
//! A connection links two standard pseudonyms at a trust level. Raising the
//! level is a request the other participant must accept; lowering it takes
//! effect at once. Entering Friend or above rebuilds the pair's alert edges.

mod lifecycle;
pub(crate) mod storage;
pub mod types;

pub use lifecycle::ConnectionLifecycle;
pub use types::{Connection, ConnectionLevel, ConnectionStatus};
