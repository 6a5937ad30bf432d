//! Configuration for the ListUsers query.

/// Configuration for the ListUsers query.
#[derive(Debug, Clone)]
pub struct ListUsersConfig {
    /// Maximum concurrent sub-expansions per fan-out node.
    pub resolve_node_breadth_limit: usize,
}

impl Default for ListUsersConfig {
    fn default() -> Self {
        Self {
            resolve_node_breadth_limit: 20,
        }
    }
}
