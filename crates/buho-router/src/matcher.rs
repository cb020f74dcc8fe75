//! Resolving a request to a route.
//!
//! Two steps:
//!
//! 1. Exact lookup of the literal path in the table's index. A literal
//!    route always beats a parametrized one, so `/restaurants/featured`
//!    is never captured by `/restaurants/:id`.
//! 2. Otherwise, scan the method's routes in registration order and take
//!    the first whose segments line up with the request.

use std::collections::HashMap;

use buho_protocol::Method;

use crate::pattern::{join_path, split_path, strip_query};
use crate::table::{Route, RouteTable};

/// A resolved route with its bound parameters.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: HashMap<String, String>,
}

impl RouteTable {
    /// Finds the route for `method` and `path`.
    ///
    /// The query string is ignored. Returns `None` when nothing matches;
    /// there is no fallback route.
    pub fn match_route(&self, method: Method, path: &str) -> Option<RouteMatch<'_>> {
        let parts = split_path(strip_query(path));

        if let Some(&index) = self.exact.get(&(method, join_path(&parts))) {
            return Some(RouteMatch {
                route: &self.routes[index],
                params: HashMap::new(),
            });
        }

        self.routes
            .iter()
            .filter(|route| route.method == method)
            .find_map(|route| {
                route
                    .pattern
                    .match_segments(&parts)
                    .map(|params| RouteMatch { route, params })
            })
    }
}
