//! Field validation for signup and login bodies.

use crate::error::AppError;

pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 20;

#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: Vec<(&'static str, &'static str)>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: &'static str) {
        self.errors.push((field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let details = self
            .errors
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect::<Vec<_>>()
            .join(", ");
        Err(AppError::ValidationError(format!(
            "Validation of request failed: {}",
            details
        )))
    }
}

pub fn check_name(errors: &mut FieldErrors, name: &str) {
    if name.trim().is_empty() {
        errors.add("name", "Name cannot be blank");
    }
}

pub fn check_email(errors: &mut FieldErrors, email: &str) {
    if email.trim().is_empty() {
        errors.add("email", "Email cannot be blank");
    } else if !is_valid_email(email) {
        errors.add("email", "Invalid email format");
    }
}

pub fn check_password(errors: &mut FieldErrors, password: &str) {
    let len = password.chars().count();
    if password.trim().is_empty() {
        errors.add("password", "Password cannot be blank");
    } else if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        errors.add("password", "Password must be between 6 and 20 characters");
    }
}

/// One `@`, a non-empty local part without stray dots, and a dotted domain
/// of alphanumerics and hyphens.
pub fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if domain.contains('@') || value.chars().any(char::is_whitespace) {
        return false;
    }

    if local.is_empty() || local.len() > 64 {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }

    if domain.len() > 255 || !domain.contains('.') {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
