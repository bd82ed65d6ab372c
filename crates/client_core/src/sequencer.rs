//! Runs the side effects behind trigger actions: one listener task per
//! family, newest intent wins.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::protocol::{LoginResponse, UpdateOrderRequest};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    api::PharmacyApi,
    config::Settings,
    error::{ApiClientError, StoreError},
    navigation::{NavigationKind, Navigator, Route},
    storage::{clear_session, persist_session, SessionStorage},
    store::{Action, FeatureFlagsAction, OrdersAction, SessionAction, Store},
};

const FAMILY_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Login,
    Signup,
    Logout,
    FetchOrders,
    Suggestions,
    CreateOrder,
    UpdateOrder,
    FeatureFlags,
}

impl Family {
    pub const ALL: [Family; FAMILY_COUNT] = [
        Family::Login,
        Family::Signup,
        Family::Logout,
        Family::FetchOrders,
        Family::Suggestions,
        Family::CreateOrder,
        Family::UpdateOrder,
        Family::FeatureFlags,
    ];

    /// The family an action triggers, if it triggers one at all.
    pub fn of(action: &Action) -> Option<Family> {
        match action {
            Action::Session(SessionAction::LoginRequested(_)) => Some(Family::Login),
            Action::Session(SessionAction::SignupRequested(_)) => Some(Family::Signup),
            Action::Session(SessionAction::Logout) => Some(Family::Logout),
            Action::Orders(OrdersAction::FetchRequested(_)) => Some(Family::FetchOrders),
            Action::Orders(OrdersAction::SuggestionsRequested(_)) => Some(Family::Suggestions),
            Action::Orders(OrdersAction::CreateRequested(_)) => Some(Family::CreateOrder),
            Action::Orders(OrdersAction::UpdateRequested { .. }) => Some(Family::UpdateOrder),
            Action::FeatureFlags(FeatureFlagsAction::FetchRequested) => Some(Family::FeatureFlags),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Family::Login => "login",
            Family::Signup => "signup",
            Family::Logout => "logout",
            Family::FetchOrders => "fetch_orders",
            Family::Suggestions => "suggestions",
            Family::CreateOrder => "create_order",
            Family::UpdateOrder => "update_order",
            Family::FeatureFlags => "feature_flags",
        }
    }

    /// Banner text used when the API gives no structured message.
    pub fn fallback_message(self) -> &'static str {
        match self {
            Family::Login => "Login failed. Please try again.",
            Family::Signup => "Signup failed. Please try again.",
            Family::Logout => "Logout failed",
            Family::FetchOrders => "Failed to fetch orders",
            Family::Suggestions => "Failed to get AI suggestions",
            Family::CreateOrder => "Failed to create order",
            Family::UpdateOrder => "Failed to update order",
            Family::FeatureFlags => "Failed to fetch feature flags",
        }
    }

    fn sends_credential(self) -> bool {
        !matches!(self, Family::Login | Family::Signup | Family::Logout)
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerOptions {
    /// Drop results of calls that a newer intent of the same family superseded.
    pub discard_stale_results: bool,
    pub signup_redirect_delay: Duration,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl SequencerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            discard_stale_results: settings.discard_stale_results,
            signup_redirect_delay: Duration::from_millis(settings.signup_redirect_delay_ms),
        }
    }
}

struct Ticket {
    seq: u64,
    action: Action,
}

struct Shared {
    store: Arc<Store>,
    api: Arc<dyn PharmacyApi>,
    storage: Arc<dyn SessionStorage>,
    navigator: Arc<dyn Navigator>,
    options: SequencerOptions,
    latest: [AtomicU64; FAMILY_COUNT],
    pending: watch::Sender<usize>,
}

/// Decrements the in-flight counter however the effect task ends.
struct PendingGuard(Arc<Shared>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.pending.send_modify(|n| *n = n.saturating_sub(1));
    }
}

pub struct EffectSequencer {
    shared: Arc<Shared>,
    senders: Vec<mpsc::UnboundedSender<Ticket>>,
    listeners: Vec<JoinHandle<()>>,
}

impl EffectSequencer {
    /// Spawns one listener per family; must be called inside a tokio runtime.
    pub fn new(
        store: Arc<Store>,
        api: Arc<dyn PharmacyApi>,
        storage: Arc<dyn SessionStorage>,
        navigator: Arc<dyn Navigator>,
        options: SequencerOptions,
    ) -> Self {
        let (pending, _) = watch::channel(0usize);
        let shared = Arc::new(Shared {
            store,
            api,
            storage,
            navigator,
            options,
            latest: Default::default(),
            pending,
        });

        let mut senders = Vec::with_capacity(FAMILY_COUNT);
        let mut listeners = Vec::with_capacity(FAMILY_COUNT);
        for family in Family::ALL {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            listeners.push(tokio::spawn(listen(shared.clone(), family, rx)));
        }

        Self {
            shared,
            senders,
            listeners,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.shared.store
    }

    /// Applies the action to the store, then hands trigger actions to their
    /// family listener.
    pub fn dispatch(&self, action: impl Into<Action>) -> Result<(), StoreError> {
        let action = action.into();
        let family = Family::of(&action);
        let effect = family.map(|family| (family, action.clone()));
        let result = self.shared.store.dispatch(action);
        if let Some((family, action)) = effect {
            self.enqueue(family, action);
        }
        result
    }

    /// Number of effects started but not yet finished.
    pub fn in_flight(&self) -> usize {
        *self.shared.pending.borrow()
    }

    /// Resolves once every family has drained its in-flight work.
    pub async fn idle(&self) {
        let mut rx = self.shared.pending.subscribe();
        let _ = rx.wait_for(|pending| *pending == 0).await;
    }

    fn enqueue(&self, family: Family, action: Action) {
        let seq = self.shared.latest[family.index()].fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.pending.send_modify(|n| *n += 1);
        debug!(family = family.name(), seq, "queued intent");
        if self.senders[family.index()]
            .send(Ticket { seq, action })
            .is_err()
        {
            warn!(family = family.name(), seq, "listener stopped, dropping intent");
            self.shared.pending.send_modify(|n| *n = n.saturating_sub(1));
        }
    }
}

impl Drop for EffectSequencer {
    fn drop(&mut self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}

async fn listen(shared: Arc<Shared>, family: Family, mut rx: mpsc::UnboundedReceiver<Ticket>) {
    while let Some(ticket) = rx.recv().await {
        debug!(family = family.name(), seq = ticket.seq, "starting effect");
        // Earlier calls keep running; `admit` decides whether their result lands.
        tokio::spawn(run_effect(shared.clone(), family, ticket));
    }
}

async fn run_effect(shared: Arc<Shared>, family: Family, ticket: Ticket) {
    let _pending = PendingGuard(shared.clone());
    let Ticket { seq, action } = ticket;

    match action {
        Action::Session(SessionAction::LoginRequested(request)) => {
            let outcome = shared.api.login(&request).await;
            if shared.admit(family, seq, &outcome) {
                match outcome {
                    Ok(response) => shared.login_succeeded(response),
                    Err(err) => shared.fail(family, &err, SessionAction::LoginFailed),
                }
            }
        }
        Action::Session(SessionAction::SignupRequested(request)) => {
            let outcome = shared.api.signup(&request).await;
            if shared.admit(family, seq, &outcome) {
                match outcome {
                    Ok(user) => {
                        info!(user_id = user.id.0, "signup succeeded");
                        shared.apply(family, SessionAction::SignupSucceeded);
                        tokio::time::sleep(shared.options.signup_redirect_delay).await;
                        // A newer signup during the delay owns the page now.
                        if shared.still_current(family, seq) {
                            shared.navigator.navigate(Route::Login, NavigationKind::Full);
                        } else {
                            debug!(seq, "signup superseded during redirect delay");
                        }
                    }
                    Err(err) => shared.fail(family, &err, SessionAction::SignupFailed),
                }
            }
        }
        Action::Session(SessionAction::Logout) => shared.logout(),
        Action::Orders(OrdersAction::FetchRequested(query)) => {
            let outcome = shared.api.get_orders(&query).await;
            if shared.admit(family, seq, &outcome) {
                match outcome {
                    Ok(response) => {
                        debug!(count = response.count, "fetched orders");
                        shared.apply(family, OrdersAction::FetchSucceeded(response.orders));
                        shared.apply(family, OrdersAction::RecomputeStats);
                    }
                    Err(err) => shared.fail(family, &err, OrdersAction::FetchFailed),
                }
            }
        }
        Action::Orders(OrdersAction::SuggestionsRequested(request)) => {
            let outcome = shared.api.get_ai_suggestions(&request).await;
            if shared.admit(family, seq, &outcome) {
                match outcome {
                    Ok(response) => shared.apply(
                        family,
                        OrdersAction::SuggestionsSucceeded(response.suggestions),
                    ),
                    Err(err) => shared.fail(family, &err, OrdersAction::SuggestionsFailed),
                }
            }
        }
        Action::Orders(OrdersAction::CreateRequested(request)) => {
            let outcome = shared.api.create_order(&request).await;
            if shared.admit(family, seq, &outcome) {
                match outcome {
                    Ok(order) => {
                        info!(order_id = order.id.0, "order created");
                        shared.apply(family, OrdersAction::CreateSucceeded(order));
                        shared.apply(family, OrdersAction::RecomputeStats);
                    }
                    Err(err) => shared.fail(family, &err, OrdersAction::CreateFailed),
                }
            }
        }
        Action::Orders(OrdersAction::UpdateRequested { id, status }) => {
            let request = UpdateOrderRequest {
                status: Some(status),
            };
            let outcome = shared.api.update_order(id, &request).await;
            if shared.admit(family, seq, &outcome) {
                match outcome {
                    Ok(order) => {
                        info!(
                            order_id = order.id.0,
                            status = %order.status.as_str(),
                            "order updated"
                        );
                        shared.apply(family, OrdersAction::UpdateSucceeded(order));
                        shared.apply(family, OrdersAction::RecomputeStats);
                    }
                    Err(err) => shared.fail(family, &err, OrdersAction::UpdateFailed),
                }
            }
        }
        Action::FeatureFlags(FeatureFlagsAction::FetchRequested) => {
            let outcome = shared.api.get_feature_flags().await;
            if shared.admit(family, seq, &outcome) {
                match outcome {
                    Ok(response) => shared.apply(
                        family,
                        FeatureFlagsAction::FetchSucceeded {
                            flags: response.flags,
                            details: response.details,
                        },
                    ),
                    Err(err) => shared.fail(family, &err, FeatureFlagsAction::FetchFailed),
                }
            }
        }
        other => debug!(action = other.name(), "no effect registered"),
    }
}

impl Shared {
    fn is_latest(&self, family: Family, seq: u64) -> bool {
        self.latest[family.index()].load(Ordering::SeqCst) == seq
    }

    fn still_current(&self, family: Family, seq: u64) -> bool {
        !self.options.discard_stale_results || self.is_latest(family, seq)
    }

    /// Decides whether a finished call may touch the store. A rejected
    /// credential always ends the session, even for a superseded call.
    fn admit<T>(&self, family: Family, seq: u64, outcome: &Result<T, ApiClientError>) -> bool {
        if let Err(err) = outcome {
            if err.is_unauthorized() && family.sends_credential() {
                warn!(family = family.name(), seq, "credential rejected, ending session");
                self.apply(family, SessionAction::Expired);
            }
        }
        if self.still_current(family, seq) {
            return true;
        }
        debug!(family = family.name(), seq, "dropping superseded result");
        false
    }

    fn apply(&self, family: Family, action: impl Into<Action>) {
        let action = action.into();
        let name = action.name();
        if let Err(err) = self.store.dispatch(action) {
            match err {
                StoreError::OrderNotFound(id) => warn!(
                    family = family.name(),
                    action = name,
                    order_id = id.0,
                    "result refers to an order that is not loaded"
                ),
            }
        }
    }

    fn fail<A: Into<Action>>(
        &self,
        family: Family,
        err: &ApiClientError,
        failed: impl FnOnce(String) -> A,
    ) {
        let message = err.user_message(family.fallback_message());
        warn!(family = family.name(), code = ?err.code(), "effect failed: {err}");
        self.apply(family, failed(message));
    }

    fn login_succeeded(&self, response: LoginResponse) {
        let LoginResponse { token, user } = response;
        if let Err(err) = persist_session(self.storage.as_ref(), &user, &token) {
            warn!("failed to persist session: {err}");
        }
        self.api.set_credential(Some(token.clone()));
        info!(user_id = user.id.0, "login succeeded");
        self.apply(Family::Login, SessionAction::LoginSucceeded { user, token });
        self.navigator.navigate(Route::Dashboard, NavigationKind::Full);
    }

    fn logout(&self) {
        if let Err(err) = clear_session(self.storage.as_ref()) {
            warn!("failed to clear session storage: {err}");
        }
        self.api.set_credential(None);
        info!("logged out");
        self.navigator.navigate(Route::Login, NavigationKind::Full);
    }
}

#[cfg(test)]
#[path = "tests/sequencer_tests.rs"]
mod tests;
