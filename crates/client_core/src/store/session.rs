use shared::protocol::{LoginRequest, SignupRequest, User};

use crate::storage::PersistedSession;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

#[derive(Clone)]
pub enum SessionAction {
    LoginRequested(LoginRequest),
    LoginSucceeded { user: User, token: String },
    LoginFailed(String),
    SignupRequested(SignupRequest),
    SignupSucceeded,
    SignupFailed(String),
    Logout,
    /// The API rejected the stored credential.
    Expired,
    Restore(Option<PersistedSession>),
}

impl SessionAction {
    pub fn name(&self) -> &'static str {
        match self {
            SessionAction::LoginRequested(_) => "session/login_requested",
            SessionAction::LoginSucceeded { .. } => "session/login_succeeded",
            SessionAction::LoginFailed(_) => "session/login_failed",
            SessionAction::SignupRequested(_) => "session/signup_requested",
            SessionAction::SignupSucceeded => "session/signup_succeeded",
            SessionAction::SignupFailed(_) => "session/signup_failed",
            SessionAction::Logout => "session/logout",
            SessionAction::Expired => "session/expired",
            SessionAction::Restore(_) => "session/restore",
        }
    }
}

// Credentials stay out of Debug output.
impl std::fmt::Debug for SessionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub fn reduce(state: &mut SessionState, action: SessionAction) {
    match action {
        SessionAction::LoginRequested(_) | SessionAction::SignupRequested(_) => {
            state.loading = true;
            state.error = None;
        }
        SessionAction::LoginSucceeded { user, token } => {
            state.user = Some(user);
            state.token = Some(token);
            state.loading = false;
            state.error = None;
        }
        SessionAction::LoginFailed(message) => {
            state.loading = false;
            state.error = Some(message);
            state.user = None;
            state.token = None;
        }
        SessionAction::SignupSucceeded => {
            state.loading = false;
            state.error = None;
        }
        SessionAction::SignupFailed(message) => {
            state.loading = false;
            state.error = Some(message);
        }
        SessionAction::Logout | SessionAction::Expired => {
            *state = SessionState::default();
        }
        SessionAction::Restore(Some(persisted)) => {
            state.user = Some(persisted.user);
            state.token = Some(persisted.token);
        }
        SessionAction::Restore(None) => {}
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use shared::domain::UserId;

    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: UserId(1),
            email: "admin@example.com".into(),
            first_name: "Ada".into(),
            last_name: "Admin".into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn login_request() -> LoginRequest {
        LoginRequest {
            email: "admin@example.com".into(),
            password: "password123".into(),
        }
    }

    #[test]
    fn login_failure_leaves_clean_resubmittable_state() {
        let mut state = SessionState::default();
        reduce(&mut state, SessionAction::LoginRequested(login_request()));
        assert!(state.loading);

        reduce(&mut state, SessionAction::LoginFailed("invalid credentials".into()));
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("invalid credentials"));
        assert_eq!(state.user, None);
        assert_eq!(state.token, None);

        reduce(&mut state, SessionAction::LoginRequested(login_request()));
        assert_eq!(state.error, None);
    }

    #[test]
    fn signup_success_does_not_populate_identity() {
        let mut state = SessionState::default();
        reduce(
            &mut state,
            SessionAction::SignupRequested(SignupRequest {
                email: "new@example.com".into(),
                password: "secret1".into(),
                first_name: "New".into(),
                last_name: "User".into(),
            }),
        );
        reduce(&mut state, SessionAction::SignupSucceeded);
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn logout_clears_everything_unconditionally() {
        let mut state = SessionState::default();
        reduce(
            &mut state,
            SessionAction::LoginSucceeded {
                user: user(),
                token: "tok".into(),
            },
        );
        state.loading = true;
        state.error = Some("stale".into());

        reduce(&mut state, SessionAction::Logout);
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn restore_without_payload_is_a_no_op() {
        let mut state = SessionState::default();
        reduce(&mut state, SessionAction::Restore(None));
        assert_eq!(state, SessionState::default());

        reduce(
            &mut state,
            SessionAction::Restore(Some(PersistedSession {
                user: user(),
                token: "tok".into(),
            })),
        );
        assert!(state.is_authenticated());
        assert!(state.user.is_some());
    }

    #[test]
    fn debug_output_hides_credentials() {
        let rendered = format!("{:?}", SessionAction::LoginRequested(login_request()));
        assert!(!rendered.contains("password123"));
    }
}
