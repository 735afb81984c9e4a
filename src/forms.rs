//! Typed form inputs and their validation.
//!
//! Raw form bodies deserialize into the `*Form` structs; the `validate_*`
//! functions turn them into checked values or an [`AppError::Validation`]
//! carrying per-field messages.

use serde::Deserialize;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

use crate::{
    error::{AppError, AppResult, FormErrors},
    store::ContactDetails,
};

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// `+999999999`, up to 15 digits.
fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if phone.len() <= 15 && all_digits(digits) && (9..=15).contains(&digits.len()) {
        Ok(())
    } else {
        Err(field_error(
            "phone",
            "Phone number must be entered in the format: +999999999. Up to 15 digits allowed.",
        ))
    }
}

/// `1234 5678 9012 3456`
fn validate_card_number(number: &str) -> Result<(), ValidationError> {
    let groups: Vec<&str> = number.split(' ').collect();
    if groups.len() == 4 && groups.iter().all(|g| g.len() == 4 && all_digits(g)) {
        Ok(())
    } else {
        Err(field_error("card_number", "Card number must be in format: 1234 5678 9012 3456"))
    }
}

/// `MM/YY`
fn validate_expiry(expiry: &str) -> Result<(), ValidationError> {
    match expiry.split_once('/') {
        Some((mm, yy)) if mm.len() == 2 && yy.len() == 2 && all_digits(mm) && all_digits(yy) => Ok(()),
        _ => Err(field_error("expiry_date", "Expiry date must be in format: MM/YY")),
    }
}

fn validate_cvv(cvv: &str) -> Result<(), ValidationError> {
    if all_digits(cvv) && (3..=4).contains(&cvv.len()) {
        Ok(())
    } else {
        Err(field_error("cvv", "CVV must be 3 or 4 digits"))
    }
}

fn validate_payment_method(method: &str) -> Result<(), ValidationError> {
    match PaymentMethod::parse(method) {
        Some(_) => Ok(()),
        None => Err(field_error("payment_method", "Select a valid payment method.")),
    }
}

/// HTML checkboxes post `on` (or nothing at all).
fn checked(value: &Option<String>) -> bool {
    matches!(value.as_deref(), Some("on" | "true" | "1" | "yes"))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Paypal,
}

impl PaymentMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "credit_card" => Some(PaymentMethod::CreditCard),
            "debit_card" => Some(PaymentMethod::DebitCard),
            "paypal" => Some(PaymentMethod::Paypal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Paypal => "paypal",
        }
    }

    pub fn is_card(&self) -> bool {
        matches!(self, PaymentMethod::CreditCard | PaymentMethod::DebitCard)
    }
}

/* ---------- checkout ---------- */

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CheckoutForm {
    #[serde(default)]
    pub checkout_token: String,

    #[validate(length(min = 1, max = 100, message = "Full name is required (max 100 characters)."))]
    #[serde(default)]
    pub full_name: String,

    #[validate(email(message = "Enter a valid email address."))]
    #[serde(default)]
    pub email: String,

    #[validate(custom(function = "validate_phone"))]
    #[serde(default)]
    pub phone: String,

    #[validate(custom(function = "validate_payment_method"))]
    #[serde(default)]
    pub payment_method: String,

    #[validate(custom(function = "validate_card_number"))]
    pub card_number: Option<String>,

    #[validate(length(max = 100, message = "Card holder name is too long."))]
    pub card_holder_name: Option<String>,

    #[validate(custom(function = "validate_expiry"))]
    pub expiry_date: Option<String>,

    #[validate(custom(function = "validate_cvv"))]
    pub cvv: Option<String>,

    pub terms_accepted: Option<String>,

    /// Stripe.js PaymentMethod id, required when Stripe captures the payment.
    pub stripe_payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDetails {
    pub number: String,
    pub holder_name: String,
    pub expiry_date: String,
    pub cvv: String,
}

impl CardDetails {
    pub fn last4(&self) -> &str {
        let len = self.number.len();
        self.number.get(len.saturating_sub(4)..).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    pub method: PaymentMethod,
    pub card: Option<CardDetails>,
    pub stripe_payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCheckout {
    pub contact: ContactDetails,
    pub payment: PaymentDetails,
}

/// Contact details, payment fields, and the cross-field rules: card fields
/// are required for card payments and the terms must be accepted.
pub fn validate_checkout_form(form: &CheckoutForm) -> AppResult<ValidatedCheckout> {
    // Drop blank optional inputs so format validators only see real values
    let mut form = form.clone();
    for field in [
        &mut form.card_number,
        &mut form.card_holder_name,
        &mut form.expiry_date,
        &mut form.cvv,
    ] {
        if field.as_deref().map(str::trim).unwrap_or_default().is_empty() {
            *field = None;
        }
    }

    let mut errors = match form.validate() {
        Ok(()) => FormErrors::default(),
        Err(e) => FormErrors::from(e),
    };

    if !checked(&form.terms_accepted) {
        errors.add("terms_accepted", "You must accept the terms and conditions.");
    }

    let method = PaymentMethod::parse(&form.payment_method);
    let mut card = None;
    if let Some(method) = method.filter(PaymentMethod::is_card) {
        let fields = [
            ("card_number", non_empty(&form.card_number)),
            ("card_holder_name", non_empty(&form.card_holder_name)),
            ("expiry_date", non_empty(&form.expiry_date)),
            ("cvv", non_empty(&form.cvv)),
        ];
        for (name, value) in fields.iter() {
            if value.is_none() {
                let label = name.replace('_', " ");
                errors.add(
                    FormErrors::NON_FIELD,
                    format!("{} is required for card payments.", title_case(&label)),
                );
            }
        }
        if let [(_, Some(number)), (_, Some(holder)), (_, Some(expiry)), (_, Some(cvv))] = fields {
            card = Some(CardDetails {
                number: number.to_string(),
                holder_name: holder.to_string(),
                expiry_date: expiry.to_string(),
                cvv: cvv.to_string(),
            });
        }
        tracing::trace!("card payment via {}", method.as_str());
    }

    match method {
        Some(method) if errors.is_empty() => Ok(ValidatedCheckout {
            contact: ContactDetails {
                full_name: form.full_name.trim().to_string(),
                email: form.email.trim().to_string(),
                phone: form.phone.trim().to_string(),
            },
            payment: PaymentDetails {
                method,
                card,
                stripe_payment_method: non_empty(&form.stripe_payment_method).map(str::to_string),
            },
        }),
        _ => Err(AppError::Validation(errors)),
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/* ---------- coupon ---------- */

#[derive(Debug, Clone, Deserialize)]
pub struct CouponForm {
    #[serde(default)]
    pub coupon_code: String,
    #[serde(default)]
    pub checkout_token: String,
}

/* ---------- accounts ---------- */

/// The unified auth page posts both login and signup through one form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthForm {
    pub action: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Legacy field name for the password.
    pub pass: Option<String>,
    pub email: Option<String>,
    pub password1: Option<String>,
    pub password2: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct SignupInput {
    #[validate(length(min = 1, max = 150, message = "Username and password are required."))]
    pub username: String,
    /// Optional; checked only when given.
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    pub password: String,
}

impl AuthForm {
    pub fn login_input(&self) -> LoginInput {
        LoginInput {
            username: self.username.as_deref().unwrap_or_default().trim().to_string(),
            password: self
                .password
                .clone()
                .or_else(|| self.pass.clone())
                .unwrap_or_default(),
        }
    }

    pub fn signup_input(&self) -> AppResult<SignupInput> {
        let username = self.username.as_deref().unwrap_or_default().trim().to_string();
        let email = non_empty(&self.email).map(str::to_string);
        let password1 = self.password1.clone().unwrap_or_default();
        let password2 = self.password2.clone().unwrap_or_default();

        if username.is_empty() || password1.is_empty() {
            return Err(AppError::validation(
                FormErrors::NON_FIELD,
                "Username and password are required.",
            ));
        }
        if password1 != password2 {
            return Err(AppError::validation("password2", "Passwords do not match."));
        }

        let input = SignupInput { username, email, password: password1 };
        input.validate().map_err(|e| AppError::Validation(e.into()))?;
        Ok(input)
    }

    /// Only local paths are honoured as post-login redirects.
    pub fn safe_next(&self) -> Option<String> {
        self.next
            .as_deref()
            // Browsers read `/\host` as `//host`
            .filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForgetPasswordForm {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResetPasswordForm {
    pub password1: Option<String>,
    pub password2: Option<String>,
}

impl ResetPasswordForm {
    pub fn new_password(&self) -> AppResult<String> {
        match (non_empty(&self.password1), non_empty(&self.password2)) {
            (Some(p1), Some(p2)) if p1 == p2 => Ok(p1.to_string()),
            _ => Err(AppError::validation("password2", "Passwords do not match.")),
        }
    }
}

/* ---------- contact ---------- */

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ContactForm {
    #[validate(length(min = 1, max = 100, message = "Enter your full name."))]
    #[serde(default)]
    pub name: String,
    #[validate(email(message = "Enter a valid email address."))]
    #[serde(default)]
    pub email: String,
    #[validate(length(min = 1, max = 200, message = "Enter a subject."))]
    #[serde(default)]
    pub subject: String,
    #[validate(length(min = 1, message = "Enter your message."))]
    #[serde(default)]
    pub message: String,
}

pub fn validate_contact_form(form: &ContactForm) -> AppResult<ContactForm> {
    let trimmed = ContactForm {
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        subject: form.subject.trim().to_string(),
        message: form.message.trim().to_string(),
    };
    trimmed.validate().map_err(|e| AppError::Validation(e.into()))?;
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::internet::en::SafeEmail;
    use fake::faker::name::en::Name;
    use fake::Fake;

    fn card_form() -> CheckoutForm {
        CheckoutForm {
            checkout_token: "token".into(),
            full_name: Name().fake(),
            email: SafeEmail().fake(),
            phone: "+123456789012".into(),
            payment_method: "credit_card".into(),
            card_number: Some("4242 4242 4242 4242".into()),
            card_holder_name: Some("Jane Doe".into()),
            expiry_date: Some("12/30".into()),
            cvv: Some("123".into()),
            terms_accepted: Some("on".into()),
            stripe_payment_method: None,
        }
    }

    fn errors_of(result: AppResult<ValidatedCheckout>) -> FormErrors {
        match result {
            Err(AppError::Validation(errors)) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_card_checkout() {
        let form = card_form();
        let checked = validate_checkout_form(&form).unwrap();
        assert_eq!(checked.contact.email, form.email);
        assert_eq!(checked.payment.method, PaymentMethod::CreditCard);
        assert_eq!(checked.payment.card.unwrap().last4(), "4242");
    }

    #[test]
    fn paypal_needs_no_card_fields() {
        let form = CheckoutForm {
            payment_method: "paypal".into(),
            card_number: None,
            card_holder_name: None,
            expiry_date: Some(String::new()),
            cvv: None,
            ..card_form()
        };
        let checked = validate_checkout_form(&form).unwrap();
        assert_eq!(checked.payment.method, PaymentMethod::Paypal);
        assert!(checked.payment.card.is_none());
    }

    #[test]
    fn card_payment_requires_card_fields() {
        let form = CheckoutForm { cvv: None, ..card_form() };
        let errors = errors_of(validate_checkout_form(&form));
        assert_eq!(
            errors.0.get(FormErrors::NON_FIELD).unwrap(),
            &vec!["Cvv is required for card payments.".to_string()]
        );
    }

    #[test]
    fn malformed_fields_are_reported_per_field() {
        let form = CheckoutForm {
            email: "not-an-email".into(),
            phone: "12ab".into(),
            card_number: Some("4242424242424242".into()),
            expiry_date: Some("1230".into()),
            ..card_form()
        };
        let errors = errors_of(validate_checkout_form(&form));
        for field in ["email", "phone", "card_number", "expiry_date"] {
            assert!(errors.0.contains_key(field), "missing error for {field}");
        }
    }

    #[test]
    fn terms_must_be_accepted() {
        let form = CheckoutForm { terms_accepted: None, ..card_form() };
        let errors = errors_of(validate_checkout_form(&form));
        assert!(errors.0.contains_key("terms_accepted"));
    }

    #[test]
    fn unknown_payment_method() {
        let form = CheckoutForm { payment_method: "bitcoin".into(), ..card_form() };
        let errors = errors_of(validate_checkout_form(&form));
        assert!(errors.0.contains_key("payment_method"));
    }

    #[test]
    fn phone_formats() {
        assert!(validate_phone("+999999999").is_ok());
        assert!(validate_phone("123456789012345").is_ok());
        assert!(validate_phone("12345678").is_err());
        assert!(validate_phone("+1234567890123456").is_err());
    }

    #[test]
    fn signup_rules() {
        let form = AuthForm {
            action: Some("signup".into()),
            username: Some("alice".into()),
            email: Some("alice@example.com".into()),
            password1: Some("secret".into()),
            password2: Some("other".into()),
            ..Default::default()
        };
        assert!(matches!(form.signup_input(), Err(AppError::Validation(_))));

        let ok = AuthForm { password2: Some("secret".into()), ..form };
        assert_eq!(ok.signup_input().unwrap().username, "alice");

        let bad_email = AuthForm { email: Some("not-an-email".into()), ..ok };
        assert!(matches!(bad_email.signup_input(), Err(AppError::Validation(_))));
    }

    #[test]
    fn signup_without_email() {
        for email in [None, Some(String::new()), Some("   ".to_string())] {
            let form = AuthForm {
                action: Some("signup".into()),
                username: Some("alice".into()),
                email,
                password1: Some("secret".into()),
                password2: Some("secret".into()),
                ..Default::default()
            };
            let input = form.signup_input().unwrap();
            assert_eq!(input.email, None);
            assert_eq!(input.username, "alice");
        }
    }

    #[test]
    fn login_accepts_legacy_password_field() {
        let form = AuthForm {
            username: Some(" bob ".into()),
            pass: Some("pw".into()),
            ..Default::default()
        };
        assert_eq!(
            form.login_input(),
            LoginInput { username: "bob".into(), password: "pw".into() }
        );
    }

    #[test]
    fn next_must_be_local() {
        let mut form = AuthForm { next: Some("/checkout/4/".into()), ..Default::default() };
        assert_eq!(form.safe_next().as_deref(), Some("/checkout/4/"));
        form.next = Some("//evil.example".into());
        assert_eq!(form.safe_next(), None);
        form.next = Some("https://evil.example".into());
        assert_eq!(form.safe_next(), None);
        form.next = Some("/\\evil.example".into());
        assert_eq!(form.safe_next(), None);
        form.next = Some("/events/\\x".into());
        assert_eq!(form.safe_next(), None);
    }

    #[test]
    fn contact_form_is_trimmed_and_checked() {
        let form = ContactForm {
            name: "  Sam ".into(),
            email: SafeEmail().fake(),
            subject: "Refund?".into(),
            message: "Hello".into(),
        };
        assert_eq!(validate_contact_form(&form).unwrap().name, "Sam");

        let blank = ContactForm { message: "   ".into(), ..form };
        assert!(validate_contact_form(&blank).is_err());
    }

    #[test]
    fn reset_passwords_must_match() {
        let form = ResetPasswordForm {
            password1: Some("a".into()),
            password2: Some("b".into()),
        };
        assert!(form.new_password().is_err());
    }
}
