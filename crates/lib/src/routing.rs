//! Destination-number routing: immutable map from an inbound `To` number to a
//! recipient-group route.
//!
//! Built once at startup from config and read-only afterwards. A lookup miss is
//! a hard rejection at the HTTP layer, not a silent drop.

use crate::config::RouteConfig;
use std::collections::HashMap;

/// One resolved route (display name, destination number, recipient group).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub name: String,
    pub phone_number: String,
    pub group_id: i64,
}

impl From<RouteConfig> for RouteEntry {
    fn from(r: RouteConfig) -> Self {
        Self {
            name: r.name,
            phone_number: r.phone_number,
            group_id: r.group_id,
        }
    }
}

/// A duplicate destination number in the configured routes.
#[derive(Debug, thiserror::Error)]
#[error("duplicate route for destination number {0}")]
pub struct DuplicateRoute(pub String);

/// Immutable destination number → route table.
#[derive(Debug)]
pub struct RoutingTable {
    entries: HashMap<String, RouteEntry>,
}

impl RoutingTable {
    /// Build the table from config. Duplicate destination numbers are rejected
    /// so a misconfigured table fails at startup instead of picking a winner
    /// at request time.
    pub fn from_routes(routes: Vec<RouteConfig>) -> Result<Self, DuplicateRoute> {
        let mut entries = HashMap::with_capacity(routes.len());
        for route in routes {
            let entry = RouteEntry::from(route);
            let number = entry.phone_number.clone();
            if entries.insert(number.clone(), entry).is_some() {
                return Err(DuplicateRoute(number));
            }
        }
        Ok(Self { entries })
    }

    /// Look up the route for a destination number.
    pub fn lookup(&self, destination_number: &str) -> Option<&RouteEntry> {
        self.entries.get(destination_number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(number: &str, group_id: i64) -> RouteConfig {
        RouteConfig {
            name: format!("group-{}", group_id),
            phone_number: number.to_string(),
            group_id,
        }
    }

    #[test]
    fn lookup_returns_matching_entry() {
        let table = RoutingTable::from_routes(vec![
            route("+15550001000", 7),
            route("+15550002000", 8),
        ])
        .expect("build");
        let entry = table.lookup("+15550001000").expect("hit");
        assert_eq!(entry.group_id, 7);
        assert_eq!(entry.name, "group-7");
    }

    #[test]
    fn lookup_miss_returns_none() {
        let table = RoutingTable::from_routes(vec![route("+15550001000", 7)]).expect("build");
        assert!(table.lookup("+19999999999").is_none());
        assert!(table.lookup("").is_none());
    }

    #[test]
    fn duplicate_destination_rejected() {
        let err = RoutingTable::from_routes(vec![
            route("+15550001000", 7),
            route("+15550001000", 8),
        ])
        .expect_err("duplicate");
        assert_eq!(err.0, "+15550001000");
    }

    #[test]
    fn empty_table_is_empty() {
        let table = RoutingTable::from_routes(Vec::new()).expect("build");
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }
}
