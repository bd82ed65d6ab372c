use std::{cmp::Ordering, fmt};

use shared::{
    domain::{DeliveryPreference, OrderId, OrderStatus},
    protocol::{AiSuggestedProduct, AiSuggestionsRequest, CreateOrderRequest, Order, OrderQuery},
};

use crate::error::StoreError;

/// Counts derived from the order collection. Never edited directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub in_store: usize,
    pub delivery: usize,
    pub curbside: usize,
}

impl OrderStats {
    pub fn from_orders(orders: &[Order]) -> Self {
        let mut stats = OrderStats {
            total: orders.len(),
            ..OrderStats::default()
        };
        for order in orders {
            match order.status {
                OrderStatus::Pending => stats.pending += 1,
                OrderStatus::Processing => stats.processing += 1,
                OrderStatus::Completed => stats.completed += 1,
                OrderStatus::Cancelled => stats.cancelled += 1,
            }
            match order.delivery_preference {
                DeliveryPreference::InStore => stats.in_store += 1,
                DeliveryPreference::Delivery => stats.delivery += 1,
                DeliveryPreference::Curbside => stats.curbside += 1,
            }
        }
        stats
    }

    pub fn by_status(&self, status: OrderStatus) -> usize {
        match status {
            OrderStatus::Pending => self.pending,
            OrderStatus::Processing => self.processing,
            OrderStatus::Completed => self.completed,
            OrderStatus::Cancelled => self.cancelled,
        }
    }

    pub fn by_delivery(&self, preference: DeliveryPreference) -> usize {
        match preference {
            DeliveryPreference::InStore => self.in_store,
            DeliveryPreference::Delivery => self.delivery,
            DeliveryPreference::Curbside => self.curbside,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilters {
    pub status: Option<OrderStatus>,
    pub delivery_preference: Option<DeliveryPreference>,
    pub search: Option<String>,
}

impl OrderFilters {
    fn matches(&self, order: &Order) -> bool {
        if self.status.is_some_and(|status| order.status != status) {
            return false;
        }
        if self
            .delivery_preference
            .is_some_and(|preference| order.delivery_preference != preference)
        {
            return false;
        }
        match self.search.as_deref().filter(|needle| !needle.is_empty()) {
            Some(needle) => {
                let needle = needle.to_lowercase();
                order.summary.to_lowercase().contains(&needle)
                    || order.id.to_string().contains(&needle)
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Status,
    DeliveryPreference,
    /// Any name the view does not know; keeps storage order.
    Unrecognized,
}

impl SortField {
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "created_at" => SortField::CreatedAt,
            "status" => SortField::Status,
            "delivery_preference" => SortField::DeliveryPreference,
            _ => SortField::Unrecognized,
        }
    }

    pub fn as_str(self) -> Option<&'static str> {
        match self {
            SortField::CreatedAt => Some("created_at"),
            SortField::Status => Some("status"),
            SortField::DeliveryPreference => Some("delivery_preference"),
            SortField::Unrecognized => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrdersState {
    pub orders: Vec<Order>,
    pub selected_order: Option<Order>,
    pub ai_suggestions: Vec<AiSuggestedProduct>,
    pub stats: OrderStats,
    pub loading: bool,
    pub error: Option<String>,
    pub filters: OrderFilters,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
}

impl Default for OrdersState {
    fn default() -> Self {
        Self {
            orders: Vec::new(),
            selected_order: None,
            ai_suggestions: Vec::new(),
            stats: OrderStats::default(),
            loading: false,
            error: None,
            filters: OrderFilters::default(),
            sort_field: SortField::CreatedAt,
            sort_direction: SortDirection::Desc,
        }
    }
}

impl OrdersState {
    /// Filtered and sorted view of the collection. Storage order is untouched.
    pub fn visible_orders(&self) -> Vec<&Order> {
        let mut visible: Vec<&Order> = self
            .orders
            .iter()
            .filter(|order| self.filters.matches(order))
            .collect();
        let compare: fn(&Order, &Order) -> Ordering = match self.sort_field {
            SortField::CreatedAt => by_created_at,
            SortField::Status => by_status,
            SortField::DeliveryPreference => by_delivery_preference,
            SortField::Unrecognized => return visible,
        };
        let direction = self.sort_direction;
        visible.sort_by(|a, b| match direction {
            SortDirection::Asc => compare(a, b),
            SortDirection::Desc => compare(b, a),
        });
        visible
    }

    pub fn find(&self, id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|order| order.id == id)
    }

    fn recompute_stats(&mut self) {
        self.stats = OrderStats::from_orders(&self.orders);
    }
}

#[derive(Debug, Clone)]
pub enum OrdersAction {
    FetchRequested(OrderQuery),
    FetchSucceeded(Vec<Order>),
    FetchFailed(String),
    SuggestionsRequested(AiSuggestionsRequest),
    SuggestionsSucceeded(Vec<AiSuggestedProduct>),
    SuggestionsFailed(String),
    ClearSuggestions,
    CreateRequested(CreateOrderRequest),
    CreateSucceeded(Order),
    CreateFailed(String),
    UpdateRequested { id: OrderId, status: OrderStatus },
    UpdateSucceeded(Order),
    UpdateFailed(String),
    SetFilters(OrderFilters),
    SetSorting {
        field: SortField,
        direction: SortDirection,
    },
    RecomputeStats,
    SelectOrder(OrderId),
    ClearSelectedOrder,
}

impl OrdersAction {
    pub fn name(&self) -> &'static str {
        match self {
            OrdersAction::FetchRequested(_) => "orders/fetch_requested",
            OrdersAction::FetchSucceeded(_) => "orders/fetch_succeeded",
            OrdersAction::FetchFailed(_) => "orders/fetch_failed",
            OrdersAction::SuggestionsRequested(_) => "orders/suggestions_requested",
            OrdersAction::SuggestionsSucceeded(_) => "orders/suggestions_succeeded",
            OrdersAction::SuggestionsFailed(_) => "orders/suggestions_failed",
            OrdersAction::ClearSuggestions => "orders/clear_suggestions",
            OrdersAction::CreateRequested(_) => "orders/create_requested",
            OrdersAction::CreateSucceeded(_) => "orders/create_succeeded",
            OrdersAction::CreateFailed(_) => "orders/create_failed",
            OrdersAction::UpdateRequested { .. } => "orders/update_requested",
            OrdersAction::UpdateSucceeded(_) => "orders/update_succeeded",
            OrdersAction::UpdateFailed(_) => "orders/update_failed",
            OrdersAction::SetFilters(_) => "orders/set_filters",
            OrdersAction::SetSorting { .. } => "orders/set_sorting",
            OrdersAction::RecomputeStats => "orders/recompute_stats",
            OrdersAction::SelectOrder(_) => "orders/select_order",
            OrdersAction::ClearSelectedOrder => "orders/clear_selected_order",
        }
    }
}

fn by_created_at(a: &Order, b: &Order) -> Ordering {
    a.created_at.cmp(&b.created_at)
}

fn by_status(a: &Order, b: &Order) -> Ordering {
    a.status.as_str().cmp(b.status.as_str())
}

fn by_delivery_preference(a: &Order, b: &Order) -> Ordering {
    a.delivery_preference
        .as_str()
        .cmp(b.delivery_preference.as_str())
}

fn begin(state: &mut OrdersState) {
    state.loading = true;
    state.error = None;
}

fn fail(state: &mut OrdersState, message: String) {
    state.loading = false;
    state.error = Some(message);
}

fn settle(state: &mut OrdersState) {
    state.loading = false;
    state.error = None;
}

/// Applies one transition. Every path that changes `orders` refreshes `stats`.
pub fn reduce(state: &mut OrdersState, action: OrdersAction) -> Result<(), StoreError> {
    match action {
        OrdersAction::FetchRequested(_)
        | OrdersAction::SuggestionsRequested(_)
        | OrdersAction::CreateRequested(_)
        | OrdersAction::UpdateRequested { .. } => begin(state),
        OrdersAction::FetchSucceeded(orders) => {
            state.orders = orders;
            state.recompute_stats();
            settle(state);
        }
        OrdersAction::SuggestionsSucceeded(products) => {
            state.ai_suggestions = products;
            settle(state);
        }
        OrdersAction::ClearSuggestions => state.ai_suggestions.clear(),
        OrdersAction::CreateSucceeded(order) => {
            state.orders.insert(0, order);
            state.ai_suggestions.clear();
            state.recompute_stats();
            settle(state);
        }
        OrdersAction::UpdateSucceeded(order) => {
            settle(state);
            let id = order.id;
            let Some(slot) = state.orders.iter_mut().find(|existing| existing.id == id) else {
                return Err(StoreError::OrderNotFound(id));
            };
            *slot = order.clone();
            if state
                .selected_order
                .as_ref()
                .is_some_and(|selected| selected.id == id)
            {
                state.selected_order = Some(order);
            }
            state.recompute_stats();
        }
        OrdersAction::FetchFailed(message)
        | OrdersAction::SuggestionsFailed(message)
        | OrdersAction::CreateFailed(message)
        | OrdersAction::UpdateFailed(message) => fail(state, message),
        OrdersAction::SetFilters(filters) => state.filters = filters,
        OrdersAction::SetSorting { field, direction } => {
            state.sort_field = field;
            state.sort_direction = direction;
        }
        OrdersAction::RecomputeStats => state.recompute_stats(),
        OrdersAction::SelectOrder(id) => {
            let order = state.find(id).cloned().ok_or(StoreError::OrderNotFound(id))?;
            state.selected_order = Some(order);
        }
        OrdersAction::ClearSelectedOrder => state.selected_order = None,
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/orders_tests.rs"]
mod tests;
