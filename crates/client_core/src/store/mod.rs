//! Application state container: session, orders and feature-flag slices behind
//! one lock, mutated only through [`Action`]s.

pub mod feature_flags;
pub mod orders;
pub mod session;

use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::StoreError;
pub use feature_flags::{FeatureFlagsAction, FeatureFlagsState, AI_SUGGESTIONS_FLAG};
pub use orders::{OrderFilters, OrderStats, OrdersAction, OrdersState, SortDirection, SortField};
pub use session::{SessionAction, SessionState};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub session: SessionState,
    pub orders: OrdersState,
    pub feature_flags: FeatureFlagsState,
}

#[derive(Debug, Clone)]
pub enum Action {
    Session(SessionAction),
    Orders(OrdersAction),
    FeatureFlags(FeatureFlagsAction),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Session(action) => action.name(),
            Action::Orders(action) => action.name(),
            Action::FeatureFlags(action) => action.name(),
        }
    }
}

impl From<SessionAction> for Action {
    fn from(action: SessionAction) -> Self {
        Action::Session(action)
    }
}

impl From<OrdersAction> for Action {
    fn from(action: OrdersAction) -> Self {
        Action::Orders(action)
    }
}

impl From<FeatureFlagsAction> for Action {
    fn from(action: FeatureFlagsAction) -> Self {
        Action::FeatureFlags(action)
    }
}

/// Sent to subscribers after every applied action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChange {
    pub action: &'static str,
    pub revision: u64,
}

struct Versioned {
    state: AppState,
    revision: u64,
}

pub struct Store {
    inner: RwLock<Versioned>,
    changes: broadcast::Sender<StoreChange>,
}

impl Store {
    pub fn new() -> Self {
        Self::with_state(AppState::default())
    }

    pub fn with_state(state: AppState) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            inner: RwLock::new(Versioned { state, revision: 0 }),
            changes,
        }
    }

    /// Applies `action` synchronously. The lock is never held across an await.
    pub fn dispatch(&self, action: impl Into<Action>) -> Result<(), StoreError> {
        let action = action.into();
        let name = action.name();
        let (result, revision) = {
            let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let result = match action {
                Action::Session(action) => {
                    session::reduce(&mut guard.state.session, action);
                    Ok(())
                }
                Action::Orders(action) => orders::reduce(&mut guard.state.orders, action),
                Action::FeatureFlags(action) => {
                    feature_flags::reduce(&mut guard.state.feature_flags, action);
                    Ok(())
                }
            };
            guard.revision += 1;
            (result, guard.revision)
        };

        match &result {
            Ok(()) => debug!(action = name, revision, "applied action"),
            Err(err) => warn!(action = name, revision, "action applied with error: {err}"),
        }
        let _ = self.changes.send(StoreChange {
            action: name,
            revision,
        });
        result
    }

    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard.state)
    }

    pub fn snapshot(&self) -> AppState {
        self.read(Clone::clone)
    }

    pub fn revision(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .revision
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
