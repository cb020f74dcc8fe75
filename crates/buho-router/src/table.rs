//! The route table: every `method + pattern` the API serves.
//!
//! Built once at startup and read-only afterwards, so concurrent requests
//! share it without locking.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use buho_protocol::{Method, Role};

use crate::pattern::PathPattern;
use crate::{Handler, RouterError};

/// Who may call a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Anyone, with or without a credential.
    Public,
    /// Any caller with a valid credential.
    Authenticated,
    /// A valid credential whose role is in the list.
    Roles(Vec<Role>),
}

impl Access {
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Self::Public)
    }

    /// Whether a verified caller in `role` may proceed.
    pub fn permits(&self, role: Role) -> bool {
        match self {
            Self::Public | Self::Authenticated => true,
            Self::Roles(roles) => roles.contains(&role),
        }
    }
}

/// A registered route.
pub struct Route {
    pub method: Method,
    pub pattern: PathPattern,
    pub access: Access,
    pub(crate) handler: Arc<dyn Handler>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

/// One line of [`RouteTable::routes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: Method,
    pub pattern: String,
    pub requires_auth: bool,
}

/// All routes, plus an index of the fully literal ones.
///
/// Registration order is kept: when two parametrized patterns could both
/// match a request, the one registered first wins.
pub struct RouteTable {
    pub(crate) routes: Vec<Route>,
    /// `(method, normalized path)` → index into `routes`, literal patterns
    /// only.
    pub(crate) exact: HashMap<(Method, String), usize>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::new()
    }

    /// Lists every route in registration order.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.routes
            .iter()
            .map(|route| RouteInfo {
                method: route.method,
                pattern: route.pattern.as_str().to_string(),
                requires_auth: route.access.requires_auth(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.routes).finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects routes in three groups and merges them into one table.
///
/// ```rust,ignore
/// let table = RouteTable::builder()
///     .public(Method::Get, "/api/restaurants/:id", get_restaurant)
///     .authenticated(Method::Post, "/api/reviews", create_review)
///     .restricted(Method::Post, "/api/admin/users/:id/roles", &[Role::Admin], assign_role)
///     .build()?;
/// ```
///
/// Patterns are parsed in [`build`](Self::build), which reports the first
/// bad or duplicated one.
pub struct RouteTableBuilder {
    pending: Vec<(Method, String, Access, Arc<dyn Handler>)>,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Adds a route anyone may call.
    pub fn public(self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.route(method, pattern, Access::Public, handler)
    }

    /// Adds a route that needs a valid credential.
    pub fn authenticated(
        self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
    ) -> Self {
        self.route(method, pattern, Access::Authenticated, handler)
    }

    /// Adds a route that needs a valid credential in one of `roles`.
    pub fn restricted(
        self,
        method: Method,
        pattern: &str,
        roles: &[Role],
        handler: impl Handler,
    ) -> Self {
        self.route(method, pattern, Access::Roles(roles.to_vec()), handler)
    }

    /// Adds a route with explicit access rules.
    pub fn route(
        mut self,
        method: Method,
        pattern: &str,
        access: Access,
        handler: impl Handler,
    ) -> Self {
        let handler: Arc<dyn Handler> = Arc::new(handler);
        self.pending
            .push((method, pattern.to_string(), access, handler));
        self
    }

    /// Parses every pattern and builds the lookup structures.
    ///
    /// # Errors
    /// - [`RouterError::InvalidPattern`] for an unparsable pattern
    /// - [`RouterError::DuplicateRoute`] when a method already has a
    ///   pattern of the same shape (`/a/:id` and `/a/:slug` count as the
    ///   same)
    pub fn build(self) -> Result<RouteTable, RouterError> {
        let mut routes = Vec::with_capacity(self.pending.len());
        let mut exact = HashMap::new();
        let mut shapes = HashSet::new();

        for (method, raw, access, handler) in self.pending {
            let pattern = PathPattern::parse(&raw)?;
            if !shapes.insert((method, pattern.shape())) {
                return Err(RouterError::DuplicateRoute {
                    method,
                    pattern: raw,
                });
            }
            if pattern.is_literal() {
                exact.insert((method, pattern.shape()), routes.len());
            }
            routes.push(Route {
                method,
                pattern,
                access,
                handler,
            });
        }

        tracing::debug!(routes = routes.len(), literal = exact.len(), "route table built");
        Ok(RouteTable { routes, exact })
    }
}

impl Default for RouteTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}
