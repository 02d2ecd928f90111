use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, UpdateUserRequest},
    model::UserChanges,
    repo::UserStore,
};
use crate::error::{AppError, FieldErrors};

pub const MAX_LENGTH: usize = 255;
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Validated create payload; the password is still plaintext here.
#[derive(Debug, Clone)]
pub struct NewUserInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub async fn validate_create(
    store: &dyn UserStore,
    req: CreateUserRequest,
) -> Result<NewUserInput, AppError> {
    let mut errors = FieldErrors::default();
    let (name, email) = check_profile(req.name, req.email, &mut errors);
    let password = req.password.unwrap_or_default();
    check_password(&password, req.password_confirmation.as_deref(), &mut errors);

    if !errors.has("email") && store.email_taken(&email, None).await? {
        errors.add("email", "The email has already been taken.");
    }
    errors.into_result()?;

    Ok(NewUserInput {
        name,
        email,
        password,
    })
}

/// Same rules as create for the profile fields; the target's own email
/// does not count as taken.
pub async fn validate_update(
    store: &dyn UserStore,
    target: Uuid,
    req: UpdateUserRequest,
) -> Result<UserChanges, AppError> {
    let mut errors = FieldErrors::default();
    let (name, email) = check_profile(req.name, req.email, &mut errors);

    if !errors.has("email") && store.email_taken(&email, Some(target)).await? {
        errors.add("email", "The email has already been taken.");
    }
    errors.into_result()?;

    Ok(UserChanges { name, email })
}

fn check_profile(
    name: Option<String>,
    email: Option<String>,
    errors: &mut FieldErrors,
) -> (String, String) {
    let name = name.map(|s| s.trim().to_string()).unwrap_or_default();
    let email = email.map(|s| s.trim().to_string()).unwrap_or_default();

    if name.is_empty() {
        errors.add("name", "The name field is required.");
    } else if name.chars().count() > MAX_LENGTH {
        errors.add(
            "name",
            format!("The name field must not be greater than {MAX_LENGTH} characters."),
        );
    }

    if email.is_empty() {
        errors.add("email", "The email field is required.");
    } else {
        if email.chars().count() > MAX_LENGTH {
            errors.add(
                "email",
                format!("The email field must not be greater than {MAX_LENGTH} characters."),
            );
        }
        if !is_valid_email(&email) {
            errors.add("email", "The email field must be a valid email address.");
        }
    }

    (name, email)
}

fn check_password(password: &str, confirmation: Option<&str>, errors: &mut FieldErrors) {
    if password.is_empty() {
        errors.add("password", "The password field is required.");
        return;
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add(
            "password",
            format!("The password field must be at least {MIN_PASSWORD_LENGTH} characters."),
        );
    }
    if confirmation != Some(password) {
        errors.add("password", "The password field confirmation does not match.");
    }
}
