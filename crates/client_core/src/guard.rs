//! Keeps signed-out users off protected pages and signed-in users off the
//! login/signup pages.

use tracing::{debug, info};

use crate::{
    navigation::{AccessRequirement, NavigationKind, Navigator, Route},
    storage::{stored_token, SessionStorage},
    store::Store,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    Redirect(Route),
}

pub fn decide(credential_present: bool, requirement: AccessRequirement) -> GuardDecision {
    match (requirement, credential_present) {
        (AccessRequirement::RequireAuth, false) => GuardDecision::Redirect(Route::Login),
        (AccessRequirement::ForbidAuth, true) => GuardDecision::Redirect(Route::Dashboard),
        _ => GuardDecision::Render,
    }
}

/// Either the store or the side channel holding a credential is enough.
pub fn credential_present(store: &Store, storage: &dyn SessionStorage) -> bool {
    store.read(|state| state.session.is_authenticated()) || stored_token(storage).is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPhase {
    Checking,
    Redirecting(Route),
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardView {
    Loading,
    Children,
}

/// One guard per page mount. `Checking` is left exactly once.
#[derive(Debug)]
pub struct RouteGuard {
    requirement: AccessRequirement,
    phase: GuardPhase,
}

impl RouteGuard {
    pub fn new(requirement: AccessRequirement) -> Self {
        Self {
            requirement,
            phase: GuardPhase::Checking,
        }
    }

    pub fn for_route(route: Route) -> Self {
        Self::new(route.requirement())
    }

    pub fn phase(&self) -> GuardPhase {
        self.phase
    }

    pub fn view(&self) -> GuardView {
        match self.phase {
            GuardPhase::Settled => GuardView::Children,
            GuardPhase::Checking | GuardPhase::Redirecting(_) => GuardView::Loading,
        }
    }

    /// Runs the check on the first call and issues at most one redirect.
    /// Later calls report the phase already reached.
    pub fn evaluate(
        &mut self,
        store: &Store,
        storage: &dyn SessionStorage,
        navigator: &dyn Navigator,
    ) -> GuardView {
        if self.phase != GuardPhase::Checking {
            return self.view();
        }

        let present = credential_present(store, storage);
        self.phase = match decide(present, self.requirement) {
            GuardDecision::Redirect(route) => {
                info!(route = route.path(), "guard redirect");
                navigator.navigate(route, NavigationKind::Replace);
                GuardPhase::Redirecting(route)
            }
            GuardDecision::Render => {
                debug!(requirement = ?self.requirement, "guard settled");
                GuardPhase::Settled
            }
        };
        self.view()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use shared::{domain::UserId, protocol::User};

    use super::*;
    use crate::{
        navigation::HistoryNavigator,
        storage::{MemorySessionStorage, TOKEN_KEY},
        store::SessionAction,
    };

    fn signed_in_store() -> Store {
        let store = Store::new();
        let now = Utc::now();
        store
            .dispatch(SessionAction::LoginSucceeded {
                user: User {
                    id: UserId(1),
                    email: "admin@example.com".into(),
                    first_name: "Ada".into(),
                    last_name: "Admin".into(),
                    created_at: now,
                    updated_at: now,
                },
                token: "valid-token".into(),
            })
            .expect("seed");
        store
    }

    #[test]
    fn decision_table() {
        use AccessRequirement::*;
        assert_eq!(decide(false, RequireAuth), GuardDecision::Redirect(Route::Login));
        assert_eq!(decide(true, RequireAuth), GuardDecision::Render);
        assert_eq!(decide(true, ForbidAuth), GuardDecision::Redirect(Route::Dashboard));
        assert_eq!(decide(false, ForbidAuth), GuardDecision::Render);
    }

    #[test]
    fn protected_page_without_credential_redirects_and_never_renders() {
        let store = Store::new();
        let storage = MemorySessionStorage::new();
        let navigator = HistoryNavigator::starting_at(Route::Dashboard);
        let mut guard = RouteGuard::for_route(Route::Dashboard);
        assert_eq!(guard.view(), GuardView::Loading);

        assert_eq!(guard.evaluate(&store, &storage, &navigator), GuardView::Loading);
        assert_eq!(guard.phase(), GuardPhase::Redirecting(Route::Login));
        let last = navigator.history().pop().expect("navigation");
        assert_eq!(last.route, Route::Login);
        assert_eq!(last.kind, NavigationKind::Replace);
    }

    #[test]
    fn side_channel_token_alone_unlocks_protected_page() {
        let store = Store::new();
        let storage = MemorySessionStorage::new();
        storage.set(TOKEN_KEY, "local-storage-token").expect("set");
        let navigator = HistoryNavigator::starting_at(Route::Dashboard);

        let mut guard = RouteGuard::for_route(Route::Dashboard);
        assert_eq!(guard.evaluate(&store, &storage, &navigator), GuardView::Children);
        assert_eq!(navigator.history().len(), 1);
    }

    #[test]
    fn auth_pages_bounce_signed_in_users() {
        let store = signed_in_store();
        let storage = MemorySessionStorage::new();
        for route in [Route::Login, Route::Signup] {
            let navigator = HistoryNavigator::starting_at(route);
            let mut guard = RouteGuard::for_route(route);
            assert_eq!(guard.evaluate(&store, &storage, &navigator), GuardView::Loading);
            assert_eq!(navigator.current(), Some(Route::Dashboard));
        }
    }

    #[test]
    fn settled_guard_does_not_recheck() {
        let store = signed_in_store();
        let storage = MemorySessionStorage::new();
        let navigator = HistoryNavigator::starting_at(Route::Dashboard);
        let mut guard = RouteGuard::for_route(Route::Dashboard);
        assert_eq!(guard.evaluate(&store, &storage, &navigator), GuardView::Children);

        store.dispatch(SessionAction::Logout).expect("logout");
        assert_eq!(guard.evaluate(&store, &storage, &navigator), GuardView::Children);
        assert_eq!(guard.phase(), GuardPhase::Settled);
        assert_eq!(navigator.history().len(), 1);
    }
}
