//! Form validation.
//!
//! Validators are plain functions that push into a [`ValidationErrors`]
//! collector, so a handler reports every problem with a form at once.

use emporium_core::{Email, Price};

/// Minimum password length for signup and reset.
pub const MIN_PASSWORD_LENGTH: usize = 5;

/// Minimum product title length.
pub const MIN_TITLE_LENGTH: usize = 3;

/// Allowed product description length range.
pub const DESCRIPTION_LENGTH: std::ops::RangeInclusive<usize> = 5..=400;

/// A form field that can fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Email,
    Password,
    ConfirmPassword,
    Title,
    Price,
    Description,
    Image,
}

impl Field {
    /// The form field name as it appears in HTML.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Password => "password",
            Self::ConfirmPassword => "confirmPassword",
            Self::Title => "title",
            Self::Price => "price",
            Self::Description => "description",
            Self::Image => "image",
        }
    }
}

/// One failed field and a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// All validation failures for one form submission, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`.
    pub fn push(&mut self, field: Field, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `field` failed.
    #[must_use]
    pub fn has(&self, field: Field) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// Field names that failed, for highlighting inputs in templates.
    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        self.0.iter().map(|e| e.field.name()).collect()
    }

    /// The first message, shown as the form's error banner.
    #[must_use]
    pub fn first_message(&self) -> Option<&str> {
        self.0.first().map(|e| e.message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// `Ok(value)` if nothing failed, otherwise the collected errors.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field failed.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Parse an email, recording `message` on failure.
pub fn check_email(errors: &mut ValidationErrors, raw: &str, message: &str) -> Option<Email> {
    match Email::parse(raw) {
        Ok(email) => Some(email),
        Err(_) => {
            errors.push(Field::Email, message);
            None
        }
    }
}

/// Whether a password meets the signup rule: at least
/// [`MIN_PASSWORD_LENGTH`] ASCII letters or digits once trimmed.
#[must_use]
pub fn is_acceptable_password(password: &str) -> bool {
    let password = password.trim();
    password.len() >= MIN_PASSWORD_LENGTH && password.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Check a new password against the signup rule.
pub fn check_new_password(errors: &mut ValidationErrors, password: &str) {
    if !is_acceptable_password(password) {
        errors.push(
            Field::Password,
            "Please enter a password with only numbers and text and at least 5 characters.",
        );
    }
}

/// Check that the confirmation matches the password.
pub fn check_confirmation(errors: &mut ValidationErrors, password: &str, confirm: &str) {
    if password.trim() != confirm.trim() {
        errors.push(Field::ConfirmPassword, "Passwords have to match!");
    }
}

/// Check a product title.
pub fn check_title(errors: &mut ValidationErrors, title: &str) {
    if title.trim().chars().count() < MIN_TITLE_LENGTH {
        errors.push(Field::Title, "Title must be at least 3 characters long.");
    }
}

/// Parse a product price.
pub fn check_price(errors: &mut ValidationErrors, raw: &str) -> Option<Price> {
    match Price::parse(raw) {
        Ok(price) => Some(price),
        Err(e) => {
            errors.push(Field::Price, format!("Invalid price: {e}."));
            None
        }
    }
}

/// Check a product description.
pub fn check_description(errors: &mut ValidationErrors, description: &str) {
    if !DESCRIPTION_LENGTH.contains(&description.trim().chars().count()) {
        errors.push(
            Field::Description,
            "Description must be between 5 and 400 characters long.",
        );
    }
}
