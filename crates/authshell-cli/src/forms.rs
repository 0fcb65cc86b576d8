//! Form checks run before anything is sent to the server.

use authshell_core::models::{Credentials, PasswordChange, Registration};

/// Shortest password the sign-up and password forms accept
pub const MIN_PASSWORD_LENGTH: usize = 6;

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn login(email: String, password: String) -> Result<Credentials, &'static str> {
    if is_blank(&email) || password.is_empty() {
        return Err("Please fill in all fields");
    }
    Ok(Credentials {
        email: email.trim().to_string(),
        password,
    })
}

pub fn register(
    username: String,
    email: String,
    password: String,
    confirm: String,
) -> Result<Registration, &'static str> {
    if is_blank(&username) || is_blank(&email) || password.is_empty() {
        return Err("Please fill in all required fields");
    }
    if password != confirm {
        return Err("Passwords do not match");
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err("Password must be at least 6 characters");
    }
    Ok(Registration {
        username: username.trim().to_string(),
        email: email.trim().to_string(),
        password,
    })
}

pub fn password_change(
    current: String,
    new: String,
    confirm: String,
) -> Result<PasswordChange, &'static str> {
    if current.is_empty() || new.is_empty() || confirm.is_empty() {
        return Err("All fields are required");
    }
    if new != confirm {
        return Err("New passwords do not match");
    }
    if new.chars().count() < MIN_PASSWORD_LENGTH {
        return Err("Password must be at least 6 characters");
    }
    Ok(PasswordChange {
        current_password: current,
        new_password: new,
    })
}
