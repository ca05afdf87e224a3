//! Previous-state navigation.
//!
//! After a successful login (or an explicit skip) the user is returned to
//! wherever they were before being sent to the login screen, falling back to
//! the default landing route when no prior state exists.

/// Route used when there is no state to return to.
pub const DEFAULT_LANDING_ROUTE: &str = "workloads";

/// Route name of the login screen itself; never recorded as a return target.
pub const LOGIN_ROUTE: &str = "login";

/// Navigation collaborator consumed by the login orchestrator.
pub trait Navigator: Send {
    /// Returns the route navigated to: the state prior to arriving at
    /// login, or `default_route` if no such state exists.
    fn go_to_previous_state(&mut self, default_route: &str) -> String;
}

/// Route history recorded as the user moves through the application.
#[derive(Debug, Default)]
pub struct History {
    routes: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a visited route. The login route is not a return target.
    pub fn record(&mut self, route: &str) {
        if route != LOGIN_ROUTE {
            self.routes.push(route.to_string());
        }
    }
}

impl Navigator for History {
    fn go_to_previous_state(&mut self, default_route: &str) -> String {
        self.routes
            .pop()
            .unwrap_or_else(|| default_route.to_string())
    }
}
