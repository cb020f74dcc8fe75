//! Where the client goes when a session starts, ends, or lacks a role.

use buho_protocol::Role;

/// A destination the session layer can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Landing {
    /// The public entry page, for visitors without a session.
    Anonymous,
    AdminDashboard,
    OwnerDashboard,
    UserDashboard,
}

impl Landing {
    /// The page path for this destination.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Anonymous => "/index.html",
            Self::AdminDashboard => "/pages/dashboard-admin.html",
            Self::OwnerDashboard => "/pages/dashboard-owner.html",
            Self::UserDashboard => "/pages/dashboard-user.html",
        }
    }
}

/// The home page for a role. Unknown roles get the least-privileged one.
pub fn landing_for(role: Role) -> Landing {
    match role {
        Role::Admin => Landing::AdminDashboard,
        Role::Owner => Landing::OwnerDashboard,
        Role::User | Role::Unknown => Landing::UserDashboard,
    }
}

/// Receives redirects issued by the session layer.
///
/// A browser client would change `location`; a native client switches
/// screens. Redirects are fire-and-forget.
pub trait Navigator: Send + Sync + 'static {
    fn redirect(&self, to: Landing);
}

/// A [`Navigator`] that only logs. Used when nothing is listening.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn redirect(&self, to: Landing) {
        tracing::info!(to = to.path(), "redirect");
    }
}
