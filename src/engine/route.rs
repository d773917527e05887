//! Jump-distance lookups for proximity clauses.
//!
//! The tracker has no map of its own. Proximity clauses ask a
//! [`RouteOracle`] for the number of jumps between two solar systems; the
//! oracle is supplied by whoever owns the map data.

use std::collections::HashMap;
use std::fmt::Debug;

/// Source of jump distances between solar systems.
pub trait RouteOracle: Send + Sync + Debug {
    /// Returns the number of jumps on the shortest route, or `None` when no
    /// route is known.
    fn jumps(&self, from_system_id: i64, to_system_id: i64) -> Option<u32>;
}

/// Oracle that only knows that a system is zero jumps from itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRoutes;

impl RouteOracle for NoRoutes {
    fn jumps(&self, from_system_id: i64, to_system_id: i64) -> Option<u32> {
        (from_system_id == to_system_id).then_some(0)
    }
}

/// Oracle backed by a precomputed distance table.
///
/// Distances are symmetric: inserting `(a, b)` also answers `(b, a)`.
#[derive(Debug, Default, Clone)]
pub struct StaticRoutes {
    distances: HashMap<(i64, i64), u32>,
}

impl StaticRoutes {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the jump count between two systems.
    #[must_use]
    pub fn with_distance(mut self, a: i64, b: i64, jumps: u32) -> Self {
        self.distances.insert(ordered(a, b), jumps);
        self
    }
}

impl RouteOracle for StaticRoutes {
    fn jumps(&self, from_system_id: i64, to_system_id: i64) -> Option<u32> {
        if from_system_id == to_system_id {
            return Some(0);
        }
        self.distances
            .get(&ordered(from_system_id, to_system_id))
            .copied()
    }
}

fn ordered(a: i64, b: i64) -> (i64, i64) {
    if a <= b { (a, b) } else { (b, a) }
}
