use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use shared::{
    domain::OrderId,
    protocol::{Order, User},
};
use tracing::{debug, info, warn};

use crate::{
    api::{HttpPharmacyApi, PharmacyApi},
    config::Settings,
    error::{ApiClientError, StoreError},
    guard::RouteGuard,
    navigation::{HistoryNavigator, Navigator, Route},
    sequencer::{EffectSequencer, SequencerOptions},
    storage::{
        load_session, persist_session, stored_token, FileSessionStorage, PersistedSession,
        SessionStorage,
    },
    store::{Action, AppState, FeatureFlagsAction, OrdersAction, SessionAction, Store},
};

/// Everything one running client needs, wired together.
pub struct ClientApp {
    settings: Settings,
    store: Arc<Store>,
    api: Arc<dyn PharmacyApi>,
    storage: Arc<dyn SessionStorage>,
    navigator: Arc<dyn Navigator>,
    sequencer: EffectSequencer,
}

impl ClientApp {
    pub fn new(
        settings: Settings,
        api: Arc<dyn PharmacyApi>,
        storage: Arc<dyn SessionStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let store = Arc::new(Store::new());
        let sequencer = EffectSequencer::new(
            store.clone(),
            api.clone(),
            storage.clone(),
            navigator.clone(),
            SequencerOptions::from_settings(&settings),
        );
        Self {
            settings,
            store,
            api,
            storage,
            navigator,
            sequencer,
        }
    }

    /// File-backed side channel and the HTTP API, as configured.
    pub fn from_settings(settings: Settings, navigator: Arc<HistoryNavigator>) -> Result<Self> {
        let base_url = settings
            .api_base_url()
            .context("invalid api_url in client settings")?;
        let storage: Arc<dyn SessionStorage> =
            Arc::new(FileSessionStorage::open(&settings.storage_path));
        let api = HttpPharmacyApi::new(
            &base_url,
            Duration::from_secs(settings.request_timeout_secs),
            storage.clone(),
            navigator.clone(),
        )
        .context("failed to build http client")?;
        info!(api_url = %base_url, storage = %settings.storage_path.display(), "client configured");
        Ok(Self::new(settings, Arc::new(api), storage, navigator))
    }

    /// Restores a persisted session, then asks for feature flags once.
    pub fn start(&self) -> Result<(), StoreError> {
        match load_session(self.storage.as_ref()) {
            Some(session) => {
                info!(user_id = session.user.id.0, "restored session");
                self.api.set_credential(Some(session.token.clone()));
                self.sequencer.dispatch(SessionAction::Restore(Some(session)))?;
            }
            None => debug!("no persisted session"),
        }
        self.sequencer.dispatch(FeatureFlagsAction::FetchRequested)
    }

    /// Asks the API who the current credential belongs to and stores the
    /// answer, repairing a side channel that kept the token but lost the user.
    pub async fn refresh_identity(&self) -> Result<User, ApiClientError> {
        let user = match self.api.current_user().await {
            Ok(user) => user,
            Err(err) => return Err(self.direct_call_failed(err)),
        };
        let token = self
            .store
            .read(|state| state.session.token.clone())
            .or_else(|| stored_token(self.storage.as_ref()));
        let Some(token) = token else {
            return Ok(user);
        };
        if let Err(err) = persist_session(self.storage.as_ref(), &user, &token) {
            warn!("failed to persist refreshed identity: {err}");
        }
        let restored = PersistedSession {
            user: user.clone(),
            token,
        };
        if let Err(err) = self.sequencer.dispatch(SessionAction::Restore(Some(restored))) {
            warn!("failed to store refreshed identity: {err}");
        }
        Ok(user)
    }

    /// Loads one order for the detail view and selects it when it is part of
    /// the loaded collection.
    pub async fn view_order(&self, id: OrderId) -> Result<Order, ApiClientError> {
        let order = match self.api.get_order(id).await {
            Ok(order) => order,
            Err(err) => return Err(self.direct_call_failed(err)),
        };
        if let Err(err) = self.sequencer.dispatch(OrdersAction::SelectOrder(id)) {
            debug!("showing order without selecting it: {err}");
        }
        Ok(order)
    }

    fn direct_call_failed(&self, err: ApiClientError) -> ApiClientError {
        if err.is_unauthorized() {
            warn!("credential rejected, ending session");
            if let Err(store_err) = self.sequencer.dispatch(SessionAction::Expired) {
                warn!("failed to end session: {store_err}");
            }
        }
        err
    }

    pub fn dispatch(&self, action: impl Into<Action>) -> Result<(), StoreError> {
        self.sequencer.dispatch(action)
    }

    pub async fn idle(&self) {
        self.sequencer.idle().await
    }

    /// A guard for `route`, already evaluated against the current session.
    pub fn guard(&self, route: Route) -> RouteGuard {
        let mut guard = RouteGuard::for_route(route);
        guard.evaluate(&self.store, self.storage.as_ref(), self.navigator.as_ref());
        guard
    }

    pub fn state(&self) -> AppState {
        self.store.snapshot()
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeMap,
        sync::{Mutex, PoisonError},
    };

    use async_trait::async_trait;
    use chrono::Utc;
    use shared::{
        domain::{DeliveryPreference, OrderStatus, UserId},
        error::ApiError,
        protocol::{
            AiSuggestionsRequest, AiSuggestionsResponse, CreateOrderRequest, FeatureFlagsResponse,
            LoginRequest, LoginResponse, Order, OrderQuery, OrdersResponse, SignupRequest,
            UpdateOrderRequest, User,
        },
    };

    use super::*;
    use crate::{
        error::ApiClientError,
        guard::GuardView,
        storage::{persist_session, MemorySessionStorage, TOKEN_KEY, USER_KEY},
        store::AI_SUGGESTIONS_FLAG,
    };

    /// Serves feature flags, `/me` and single orders, and records the
    /// credential; everything else fails.
    #[derive(Default)]
    struct FakeApi {
        credential: Mutex<Option<String>>,
        me: Mutex<Option<User>>,
        orders: Mutex<Vec<Order>>,
    }

    fn unsupported<T>() -> Result<T, ApiClientError> {
        Err(ApiClientError::Api(ApiError::new(501, None)))
    }

    #[async_trait]
    impl PharmacyApi for FakeApi {
        fn set_credential(&self, token: Option<String>) {
            *self.credential.lock().unwrap_or_else(PoisonError::into_inner) = token;
        }
        async fn login(&self, _: &LoginRequest) -> Result<LoginResponse, ApiClientError> {
            unsupported()
        }
        async fn signup(&self, _: &SignupRequest) -> Result<User, ApiClientError> {
            unsupported()
        }
        async fn current_user(&self) -> Result<User, ApiClientError> {
            self.me
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .ok_or(ApiClientError::Unauthorized { message: None })
        }
        async fn get_orders(&self, _: &OrderQuery) -> Result<OrdersResponse, ApiClientError> {
            let orders = self.orders.lock().unwrap_or_else(PoisonError::into_inner).clone();
            Ok(OrdersResponse {
                count: orders.len(),
                orders,
            })
        }
        async fn get_order(&self, id: OrderId) -> Result<Order, ApiClientError> {
            self.orders
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .find(|order| order.id == id)
                .cloned()
                .ok_or_else(|| {
                    ApiClientError::Api(ApiError::new(404, Some("order not found".into())))
                })
        }
        async fn get_ai_suggestions(
            &self,
            _: &AiSuggestionsRequest,
        ) -> Result<AiSuggestionsResponse, ApiClientError> {
            unsupported()
        }
        async fn create_order(&self, _: &CreateOrderRequest) -> Result<Order, ApiClientError> {
            unsupported()
        }
        async fn update_order(
            &self,
            _: OrderId,
            _: &UpdateOrderRequest,
        ) -> Result<Order, ApiClientError> {
            unsupported()
        }
        async fn get_feature_flags(&self) -> Result<FeatureFlagsResponse, ApiClientError> {
            Ok(FeatureFlagsResponse {
                flags: BTreeMap::from([(AI_SUGGESTIONS_FLAG.to_string(), true)]),
                details: Vec::new(),
            })
        }
    }

    fn app_with(storage: Arc<MemorySessionStorage>, start: Route) -> (ClientApp, Arc<FakeApi>) {
        let api = Arc::new(FakeApi::default());
        let app = ClientApp::new(
            Settings::default(),
            api.clone(),
            storage,
            Arc::new(HistoryNavigator::starting_at(start)),
        );
        (app, api)
    }

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: UserId(4),
            email: "admin@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Admin".into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn sample_order(id: i64) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId(id),
            user_id: UserId(4),
            summary: "Headache and fever medicine".into(),
            delivery_preference: DeliveryPreference::InStore,
            delivery_address: None,
            postal_code: None,
            ai_suggested_products: Some(
                r#"[{"name":"Ibuprofen","quantity":2,"price":5.99,"reason":"fever"}]"#.into(),
            ),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn start_restores_persisted_session_and_loads_flags() {
        let storage = Arc::new(MemorySessionStorage::new());
        let user = sample_user();
        persist_session(storage.as_ref(), &user, "tok-restored").expect("persist");
        let (app, api) = app_with(storage, Route::Dashboard);

        app.start().expect("start");
        app.idle().await;

        let state = app.state();
        assert_eq!(state.session.user, Some(user));
        assert_eq!(state.session.token.as_deref(), Some("tok-restored"));
        assert!(state.feature_flags.is_enabled(AI_SUGGESTIONS_FLAG));
        assert_eq!(
            api.credential
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_deref(),
            Some("tok-restored")
        );
        assert_eq!(app.guard(Route::Dashboard).view(), GuardView::Children);
    }

    #[tokio::test]
    async fn malformed_identity_is_ignored_on_start() {
        let storage = Arc::new(MemorySessionStorage::new());
        storage.set(TOKEN_KEY, "tok").expect("set");
        storage.set(USER_KEY, "{not json").expect("set");
        let (app, _api) = app_with(storage, Route::Login);

        app.start().expect("start");
        app.idle().await;

        assert_eq!(app.state().session.user, None);
        // The bare token still counts for the guard.
        assert_eq!(app.guard(Route::Login).view(), GuardView::Loading);
        assert_eq!(app.navigator().current(), Some(Route::Dashboard));
    }

    #[tokio::test]
    async fn refresh_identity_repairs_token_only_side_channel() {
        let storage = Arc::new(MemorySessionStorage::new());
        storage.set(TOKEN_KEY, "tok-bare").expect("set");
        let (app, api) = app_with(storage.clone(), Route::Dashboard);
        *api.me.lock().unwrap_or_else(PoisonError::into_inner) = Some(sample_user());

        let user = app.refresh_identity().await.expect("me");

        assert_eq!(user.email, "admin@example.com");
        let state = app.state();
        assert_eq!(state.session.user.as_ref().map(|u| u.id), Some(UserId(4)));
        assert_eq!(state.session.token.as_deref(), Some("tok-bare"));
        let restored = load_session(storage.as_ref()).expect("persisted pair");
        assert_eq!(restored.user.id, UserId(4));
    }

    #[tokio::test]
    async fn refresh_identity_rejection_ends_session() {
        let storage = Arc::new(MemorySessionStorage::new());
        persist_session(storage.as_ref(), &sample_user(), "tok-old").expect("persist");
        let (app, _api) = app_with(storage, Route::Dashboard);
        app.start().expect("start");
        app.idle().await;

        let err = app.refresh_identity().await.expect_err("401");

        assert!(err.is_unauthorized());
        assert!(!app.state().session.is_authenticated());
    }

    #[tokio::test]
    async fn view_order_selects_loaded_order() {
        let (app, api) = app_with(Arc::new(MemorySessionStorage::new()), Route::Dashboard);
        *api.orders.lock().unwrap_or_else(PoisonError::into_inner) =
            vec![sample_order(1), sample_order(2)];
        app.dispatch(OrdersAction::FetchRequested(OrderQuery::default()))
            .expect("fetch");
        app.idle().await;

        let order = app.view_order(OrderId(2)).await.expect("order");

        let products = order.suggested_products();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].line_total(), rust_decimal::Decimal::new(1198, 2));
        let selected = app.state().orders.selected_order.map(|o| o.id);
        assert_eq!(selected, Some(OrderId(2)));

        app.dispatch(OrdersAction::ClearSelectedOrder).expect("clear");
        assert_eq!(app.state().orders.selected_order, None);
    }

    #[tokio::test]
    async fn view_order_reports_missing_order() {
        let (app, _api) = app_with(Arc::new(MemorySessionStorage::new()), Route::Dashboard);

        let err = app.view_order(OrderId(42)).await.expect_err("404");

        assert!(err.is_not_found());
        assert_eq!(err.user_message("Failed to load order"), "order not found");
        assert_eq!(app.state().orders.selected_order, None);
    }
}
