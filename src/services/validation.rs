// Field checks for request bodies; they run before any storage call

use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};
use crate::models::{Film, User};

pub const MAX_DESCRIPTION_LENGTH: usize = 200;

/// First public film screening
pub static EARLIEST_RELEASE_DATE: Lazy<NaiveDate> = Lazy::new(|| {
    NaiveDate::from_ymd_opt(1895, 12, 28).expect("1895-12-28 is a valid date")
});

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*$")
        .expect("email pattern compiles")
});

fn invalid(message: impl Into<String>) -> AppError {
    let message = message.into();
    tracing::warn!("Validation failed: {}", message);
    AppError::Validation(message)
}

/// Checks a user body and fills in a blank name with the login
pub fn validate_user(user: &mut User) -> AppResult<()> {
    if user.login.trim().is_empty() {
        return Err(invalid("Login must not be blank"));
    }
    if user.login.chars().any(char::is_whitespace) {
        return Err(invalid("Login must not contain whitespace"));
    }
    if user.email.trim().is_empty() {
        return Err(invalid("Email must not be blank"));
    }
    if !EMAIL_PATTERN.is_match(&user.email) {
        return Err(invalid(format!("Invalid email format: {}", user.email)));
    }
    if user.birthday > Local::now().date_naive() {
        return Err(invalid("Birthday must not be in the future"));
    }
    if user.id != 0 && user.friends.contains_key(&user.id) {
        return Err(invalid("User cannot be their own friend"));
    }

    let name_is_blank = user.name.as_deref().map_or(true, |name| name.trim().is_empty());
    if name_is_blank {
        user.name = Some(user.login.clone());
    }
    Ok(())
}

pub fn validate_film(film: &Film) -> AppResult<()> {
    if film.name.trim().is_empty() {
        return Err(invalid("Film name must not be blank"));
    }
    if let Some(description) = &film.description {
        if description.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(invalid(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_LENGTH
            )));
        }
    }
    if film.release_date < *EARLIEST_RELEASE_DATE {
        return Err(invalid(format!(
            "Release date must not be before {}",
            *EARLIEST_RELEASE_DATE
        )));
    }
    if film.duration <= 0 {
        return Err(invalid("Duration must be positive"));
    }
    Ok(())
}
