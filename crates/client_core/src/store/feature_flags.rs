use std::collections::BTreeMap;

use shared::protocol::FeatureFlag;

/// Gates the AI suggestion step of the create-order flow.
pub const AI_SUGGESTIONS_FLAG: &str = "ai_suggestions";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFlagsState {
    pub flags: BTreeMap<String, bool>,
    pub details: Vec<FeatureFlag>,
    pub loading: bool,
    pub error: Option<String>,
}

impl FeatureFlagsState {
    pub fn is_enabled(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub enum FeatureFlagsAction {
    FetchRequested,
    FetchSucceeded {
        flags: BTreeMap<String, bool>,
        details: Vec<FeatureFlag>,
    },
    FetchFailed(String),
}

impl FeatureFlagsAction {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureFlagsAction::FetchRequested => "feature_flags/fetch_requested",
            FeatureFlagsAction::FetchSucceeded { .. } => "feature_flags/fetch_succeeded",
            FeatureFlagsAction::FetchFailed(_) => "feature_flags/fetch_failed",
        }
    }
}

pub fn reduce(state: &mut FeatureFlagsState, action: FeatureFlagsAction) {
    match action {
        FeatureFlagsAction::FetchRequested => {
            state.loading = true;
            state.error = None;
        }
        FeatureFlagsAction::FetchSucceeded { flags, details } => {
            state.flags = flags;
            state.details = details;
            state.loading = false;
            state.error = None;
        }
        FeatureFlagsAction::FetchFailed(message) => {
            state.loading = false;
            state.error = Some(message);
        }
    }
}
