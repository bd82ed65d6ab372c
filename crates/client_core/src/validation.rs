//! Client-side form rules for login, signup and order creation.

use rust_decimal::Decimal;
use shared::{
    domain::DeliveryPreference,
    protocol::{
        AiSuggestedProduct, AiSuggestionsRequest, CreateOrderRequest, LoginRequest, SignupRequest,
    },
};

use crate::error::{FieldError, ValidationError};

pub const MIN_SUMMARY_CHARS: usize = 10;
pub const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Default)]
struct Checks(Vec<FieldError>);

impl Checks {
    fn require(&mut self, ok: bool, field: &'static str, message: &'static str) -> bool {
        if !ok {
            self.0.push(FieldError { field, message });
        }
        ok
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { errors: self.0 })
        }
    }
}

/// Structural check only: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

fn check_email(checks: &mut Checks, email: &str) {
    if checks.require(!email.is_empty(), "email", "Email is required") {
        checks.require(is_valid_email(email), "email", "Invalid email address");
    }
}

fn check_password(checks: &mut Checks, password: &str) {
    if checks.require(!password.is_empty(), "password", "Password is required") {
        checks.require(
            password.chars().count() >= MIN_PASSWORD_CHARS,
            "password",
            "Password must be at least 6 characters",
        );
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut checks = Checks::default();
        check_email(&mut checks, &self.email);
        check_password(&mut checks, &self.password);
        checks.finish()
    }

    pub fn into_request(self) -> Result<LoginRequest, ValidationError> {
        self.validate()?;
        Ok(LoginRequest {
            email: self.email,
            password: self.password,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut checks = Checks::default();
        checks.require(
            !self.first_name.is_empty(),
            "first_name",
            "First name is required",
        );
        checks.require(
            !self.last_name.is_empty(),
            "last_name",
            "Last name is required",
        );
        check_email(&mut checks, &self.email);
        check_password(&mut checks, &self.password);
        if checks.require(
            !self.confirm_password.is_empty(),
            "confirm_password",
            "Please confirm your password",
        ) {
            checks.require(
                self.confirm_password == self.password,
                "confirm_password",
                "Passwords must match",
            );
        }
        checks.finish()
    }

    /// The confirmation field stays on the client.
    pub fn into_request(self) -> Result<SignupRequest, ValidationError> {
        self.validate()?;
        Ok(SignupRequest {
            email: self.email,
            password: self.password,
            first_name: self.first_name,
            last_name: self.last_name,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderForm {
    pub summary: String,
    pub delivery_preference: Option<DeliveryPreference>,
    pub delivery_address: String,
    pub postal_code: String,
}

impl OrderForm {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    /// Switching preference keeps everything already typed.
    pub fn set_delivery_preference(&mut self, preference: DeliveryPreference) {
        self.delivery_preference = Some(preference);
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut checks = Checks::default();
        if checks.require(!self.summary.is_empty(), "summary", "Summary is required") {
            checks.require(
                self.summary.chars().count() >= MIN_SUMMARY_CHARS,
                "summary",
                "Summary must be at least 10 characters",
            );
        }
        let preference = self.delivery_preference;
        checks.require(
            preference.is_some(),
            "delivery_preference",
            "Delivery preference is required",
        );
        if preference.is_some_and(DeliveryPreference::requires_address) {
            checks.require(
                !self.delivery_address.is_empty(),
                "delivery_address",
                "Address is required for delivery",
            );
        }
        checks.finish()
    }

    pub fn can_submit(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn suggestions_request(&self) -> Result<AiSuggestionsRequest, ValidationError> {
        self.validate()?;
        Ok(AiSuggestionsRequest {
            summary: self.summary.clone(),
            delivery_address: non_empty(&self.delivery_address),
        })
    }

    /// Builds the create payload. An empty selection is sent as absent.
    pub fn into_create_request(
        self,
        selected: Vec<AiSuggestedProduct>,
    ) -> Result<CreateOrderRequest, ValidationError> {
        self.validate()?;
        let Some(delivery_preference) = self.delivery_preference else {
            return Err(ValidationError {
                errors: vec![FieldError {
                    field: "delivery_preference",
                    message: "Delivery preference is required",
                }],
            });
        };
        Ok(CreateOrderRequest {
            delivery_address: non_empty(&self.delivery_address),
            postal_code: non_empty(&self.postal_code),
            summary: self.summary,
            delivery_preference,
            selected_products: (!selected.is_empty()).then_some(selected),
        })
    }
}

/// Suggested products the user ticked, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSelection {
    products: Vec<AiSuggestedProduct>,
}

impl ProductSelection {
    pub fn toggle(&mut self, product: &AiSuggestedProduct) {
        if let Some(index) = self.products.iter().position(|p| p.name == product.name) {
            self.products.remove(index);
        } else {
            self.products.push(product.clone());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.products.iter().any(|p| p.name == name)
    }

    pub fn total(&self) -> Decimal {
        self.products.iter().map(AiSuggestedProduct::line_total).sum()
    }

    pub fn into_products(self) -> Vec<AiSuggestedProduct> {
        self.products
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn product(name: &str, quantity: i32, price: &str) -> AiSuggestedProduct {
        AiSuggestedProduct {
            name: name.into(),
            quantity,
            price: Decimal::from_str(price).expect("decimal"),
            reason: None,
        }
    }

    #[test]
    fn summary_length_gates_submission() {
        let mut form = OrderForm::new("too short");
        form.set_delivery_preference(DeliveryPreference::InStore);
        assert!(!form.can_submit());
        assert_eq!(
            form.validate().expect_err("short").message_for("summary"),
            Some("Summary must be at least 10 characters")
        );

        form.summary = "exactly 10".into();
        assert!(form.can_submit());
    }

    #[test]
    fn address_required_only_for_delivery_and_curbside() {
        let mut form = OrderForm::new("Headache and fever medicine");
        for preference in [DeliveryPreference::Delivery, DeliveryPreference::Curbside] {
            form.set_delivery_preference(preference);
            assert_eq!(
                form.validate().expect_err("address").message_for("delivery_address"),
                Some("Address is required for delivery")
            );
        }
        form.set_delivery_preference(DeliveryPreference::InStore);
        assert!(form.can_submit());

        form.delivery_address = "123 Main St".into();
        form.set_delivery_preference(DeliveryPreference::Curbside);
        assert!(form.can_submit());
    }

    #[test]
    fn preference_is_required() {
        let form = OrderForm::new("Headache and fever medicine");
        assert_eq!(
            form.validate().expect_err("preference").message_for("delivery_preference"),
            Some("Delivery preference is required")
        );
    }

    #[test]
    fn toggling_preference_keeps_summary() {
        let typed = "Allergy relief for the spring season";
        let mut form = OrderForm::new(typed);
        for preference in [
            DeliveryPreference::InStore,
            DeliveryPreference::Delivery,
            DeliveryPreference::Curbside,
            DeliveryPreference::InStore,
        ] {
            form.set_delivery_preference(preference);
            assert_eq!(form.summary, typed);
        }
    }

    #[test]
    fn create_request_maps_empty_strings_to_absent() {
        let mut form = OrderForm::new("Cold and flu supplies");
        form.set_delivery_preference(DeliveryPreference::InStore);
        let request = form.into_create_request(Vec::new()).expect("request");
        assert_eq!(request.delivery_address, None);
        assert_eq!(request.postal_code, None);
        assert_eq!(request.selected_products, None);
    }

    #[test]
    fn selection_toggles_by_name_and_totals() {
        let ibuprofen = product("Ibuprofen", 2, "5.99");
        let mut selection = ProductSelection::default();
        selection.toggle(&ibuprofen);
        selection.toggle(&product("Thermometer", 1, "12.50"));
        assert_eq!(selection.total(), Decimal::from_str("24.48").expect("decimal"));

        selection.toggle(&ibuprofen);
        assert!(!selection.contains("Ibuprofen"));
        assert_eq!(selection.into_products().len(), 1);
    }

    #[test]
    fn login_rules() {
        let form = LoginForm {
            email: "admin@example".into(),
            password: "12345".into(),
        };
        let err = form.validate().expect_err("invalid");
        assert_eq!(err.message_for("email"), Some("Invalid email address"));
        assert_eq!(
            err.message_for("password"),
            Some("Password must be at least 6 characters")
        );

        let ok = LoginForm {
            email: "admin@example.com".into(),
            password: "password123".into(),
        };
        assert!(ok.into_request().is_ok());
    }

    #[test]
    fn signup_requires_matching_passwords() {
        let form = SignupForm {
            first_name: "New".into(),
            last_name: String::new(),
            email: "new@example.com".into(),
            password: "secret1".into(),
            confirm_password: "secret2".into(),
        };
        let err = form.validate().expect_err("invalid");
        assert_eq!(err.message_for("last_name"), Some("Last name is required"));
        assert_eq!(err.message_for("confirm_password"), Some("Passwords must match"));
        assert_eq!(err.errors.len(), 2);
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@@b.co"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a b@c.de"));
        assert!(!is_valid_email("a@.com"));
    }
}
