//! State and effect orchestration for the pharmacy ordering client.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod guard;
pub mod navigation;
pub mod sequencer;
pub mod storage;
pub mod store;
pub mod validation;

pub use api::{HttpPharmacyApi, PharmacyApi};
pub use app::ClientApp;
pub use config::{load_settings, Settings};
pub use error::{ApiClientError, StoreError, ValidationError};
pub use guard::{GuardPhase, GuardView, RouteGuard};
pub use navigation::{HistoryNavigator, Navigator, Route};
pub use sequencer::{EffectSequencer, Family, SequencerOptions};
pub use store::{Action, AppState, Store};
