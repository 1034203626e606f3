//! Session configuration.

use serde::{Deserialize, Serialize};

/// Configuration for [`Session`](crate::Session) behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Qualify columns with their table name in find queries.
    pub prefix_table_names: bool,
    /// Fail a cascading delete that reaches the same object twice. When off, the
    /// object is skipped the second time instead.
    pub detect_cascade_cycles: bool,
    /// Reject object states carrying properties the definition does not map.
    pub strict_state: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefix_table_names: true,
            detect_cascade_cycles: true,
            strict_state: false,
        }
    }
}
