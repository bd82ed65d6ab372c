use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::OrderId,
    error::ApiError,
    protocol::{
        AiSuggestionsRequest, AiSuggestionsResponse, CreateOrderRequest, FeatureFlagsResponse,
        LoginRequest, LoginResponse, Order, OrderQuery, OrdersResponse, SignupRequest,
        UpdateOrderRequest, User,
    },
};
use tracing::{debug, error, warn};
use url::Url;

use crate::{
    error::ApiClientError,
    navigation::{NavigationKind, Navigator, Route},
    storage::{clear_session, stored_token, SessionStorage},
};

/// Remote pharmacy API as seen by the effect handlers.
#[async_trait]
pub trait PharmacyApi: Send + Sync {
    /// Credential sent on authenticated calls when the side channel has none.
    fn set_credential(&self, token: Option<String>);

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiClientError>;
    async fn signup(&self, request: &SignupRequest) -> Result<User, ApiClientError>;
    async fn current_user(&self) -> Result<User, ApiClientError>;
    async fn get_orders(&self, query: &OrderQuery) -> Result<OrdersResponse, ApiClientError>;
    async fn get_order(&self, id: OrderId) -> Result<Order, ApiClientError>;
    async fn get_ai_suggestions(
        &self,
        request: &AiSuggestionsRequest,
    ) -> Result<AiSuggestionsResponse, ApiClientError>;
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, ApiClientError>;
    async fn update_order(
        &self,
        id: OrderId,
        request: &UpdateOrderRequest,
    ) -> Result<Order, ApiClientError>;
    async fn get_feature_flags(&self) -> Result<FeatureFlagsResponse, ApiClientError>;
}

pub struct HttpPharmacyApi {
    http: Client,
    base_url: String,
    credential: RwLock<Option<String>>,
    storage: Arc<dyn SessionStorage>,
    navigator: Arc<dyn Navigator>,
}

impl HttpPharmacyApi {
    pub fn new(
        base_url: &Url,
        request_timeout: Duration,
        storage: Arc<dyn SessionStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiClientError> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            credential: RwLock::new(None),
            storage,
            navigator,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn bearer_token(&self) -> Option<String> {
        stored_token(self.storage.as_ref()).or_else(|| {
            self.credential
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        context: &'static str,
        request: RequestBuilder,
        authenticated: bool,
    ) -> Result<T, ApiClientError> {
        let request = match self.bearer_token().filter(|_| authenticated) {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body)
                .map_err(|source| ApiClientError::Decode { context, source });
        }

        let api_error = ApiError::from_body(status.as_u16(), &body);
        error!(
            context,
            status = status.as_u16(),
            message = api_error.message.as_deref().unwrap_or(""),
            "api error"
        );

        if status == StatusCode::UNAUTHORIZED {
            self.expire_session();
            return Err(ApiClientError::Unauthorized {
                message: api_error.message,
            });
        }
        Err(ApiClientError::Api(api_error))
    }

    /// Drops the stored credential and sends the user back to login, unless
    /// they are already there.
    fn expire_session(&self) {
        if let Err(err) = clear_session(self.storage.as_ref()) {
            warn!("failed to clear session storage after 401: {err}");
        }
        self.set_credential(None);
        if self.navigator.current() != Some(Route::Login) {
            self.navigator.navigate(Route::Login, NavigationKind::Full);
        }
    }
}

#[async_trait]
impl PharmacyApi for HttpPharmacyApi {
    fn set_credential(&self, token: Option<String>) {
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiClientError> {
        debug!(email = %request.email, "login");
        let builder = self.http.post(self.endpoint("/auth/login")).json(request);
        self.execute("login", builder, false).await
    }

    async fn signup(&self, request: &SignupRequest) -> Result<User, ApiClientError> {
        debug!(email = %request.email, "signup");
        let builder = self.http.post(self.endpoint("/users")).json(request);
        self.execute("signup", builder, false).await
    }

    async fn current_user(&self) -> Result<User, ApiClientError> {
        let builder = self.http.get(self.endpoint("/me"));
        self.execute("current user", builder, true).await
    }

    async fn get_orders(&self, query: &OrderQuery) -> Result<OrdersResponse, ApiClientError> {
        let builder = self
            .http
            .get(self.endpoint("/orders"))
            .query(&query.to_pairs());
        self.execute("orders", builder, true).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Order, ApiClientError> {
        let builder = self.http.get(self.endpoint(&format!("/orders/{id}")));
        self.execute("order", builder, true).await
    }

    async fn get_ai_suggestions(
        &self,
        request: &AiSuggestionsRequest,
    ) -> Result<AiSuggestionsResponse, ApiClientError> {
        let builder = self
            .http
            .post(self.endpoint("/orders/suggestions"))
            .json(request);
        self.execute("ai suggestions", builder, true).await
    }

    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, ApiClientError> {
        let builder = self.http.post(self.endpoint("/orders")).json(request);
        self.execute("create order", builder, true).await
    }

    async fn update_order(
        &self,
        id: OrderId,
        request: &UpdateOrderRequest,
    ) -> Result<Order, ApiClientError> {
        let builder = self
            .http
            .put(self.endpoint(&format!("/orders/{id}")))
            .json(request);
        self.execute("update order", builder, true).await
    }

    async fn get_feature_flags(&self) -> Result<FeatureFlagsResponse, ApiClientError> {
        let builder = self.http.get(self.endpoint("/feature-flags"));
        self.execute("feature flags", builder, true).await
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
