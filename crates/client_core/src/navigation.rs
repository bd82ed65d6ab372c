use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Signup,
    Dashboard,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Signup => "/signup",
            Route::Dashboard => "/dashboard",
        }
    }

    pub fn requirement(self) -> AccessRequirement {
        match self {
            Route::Login | Route::Signup => AccessRequirement::ForbidAuth,
            Route::Dashboard => AccessRequirement::RequireAuth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRequirement {
    RequireAuth,
    /// Pages only meant for signed-out users (login, signup).
    ForbidAuth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// In-app history replacement, used by the route guard.
    Replace,
    /// Full page load; in-memory state of the previous page is discarded.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub route: Route,
    pub kind: NavigationKind,
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route, kind: NavigationKind);
    fn current(&self) -> Option<Route>;
}

/// Keeps every navigation in order and fans them out to subscribers.
pub struct HistoryNavigator {
    history: Mutex<Vec<Navigation>>,
    events: broadcast::Sender<Navigation>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            history: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn starting_at(route: Route) -> Self {
        let navigator = Self::new();
        navigator
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Navigation {
                route,
                kind: NavigationKind::Replace,
            });
        navigator
    }

    pub fn history(&self) -> Vec<Navigation> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Navigation> {
        self.events.subscribe()
    }
}

impl Default for HistoryNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator for HistoryNavigator {
    fn navigate(&self, route: Route, kind: NavigationKind) {
        let navigation = Navigation { route, kind };
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(navigation);
        info!(route = route.path(), ?kind, "navigate");
        let _ = self.events.send(navigation);
    }

    fn current(&self) -> Option<Route> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|navigation| navigation.route)
    }
}
