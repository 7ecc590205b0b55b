use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::*;
use crate::models::{Field, FieldErrors};

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegistrationForm {
    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Username => &self.username,
            Field::Email => &self.email,
            Field::Password => &self.password,
            Field::Title | Field::Content => "",
        }
    }
}

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("Regex should compile"))
}

/// Message for a single field, or `None` when the value is acceptable.
/// Empty values are left alone here; they are caught as required fields
/// on submit.
pub fn validate_field(field: Field, value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    match field {
        Field::Username if value.chars().count() < MIN_USERNAME_LENGTH => {
            Some(format!("Username must be at least {MIN_USERNAME_LENGTH} characters"))
        }
        Field::Email if !email_regex().is_match(value) => {
            Some("Please enter a valid email address".to_string())
        }
        Field::Password if value.chars().count() < MIN_PASSWORD_LENGTH => {
            Some(format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"))
        }
        _ => None,
    }
}

/// Full check run before a registration is submitted.
pub fn validate_registration(form: &RegistrationForm) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    for field in [Field::Username, Field::Email, Field::Password] {
        let value = form.value(field);
        if value.is_empty() {
            errors.set(field, format!("{} is required", capitalize(field.name())));
        } else if let Some(message) = validate_field(field, value) {
            errors.set(field, message);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Routes a registration failure message to the field it talks about.
pub fn registration_errors_from_detail(detail: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    for (needle, field) in [
        ("Username", Field::Username),
        ("Email", Field::Email),
        ("Password", Field::Password),
    ] {
        if detail.contains(needle) {
            errors.set(field, detail);
            break;
        }
    }
    errors
}

/// Routes a login failure message; anything unrecognised lands on the
/// username field.
pub fn login_errors_from_detail(detail: &str) -> FieldErrors {
    let lower = detail.to_lowercase();
    let field = if lower.contains("username") {
        Field::Username
    } else if lower.contains("password") {
        Field::Password
    } else {
        Field::Username
    };
    let mut errors = FieldErrors::new();
    errors.set(field, detail);
    errors
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Re-validates each field a fixed delay after its last edit.
///
/// Scheduling a field aborts the check still pending for that field, so
/// only the final value of a burst of keystrokes is validated. Results are
/// published as a whole `FieldErrors` snapshot. Must be used from within a
/// Tokio runtime.
pub struct DebouncedValidator {
    delay: Duration,
    pending: Mutex<HashMap<Field, JoinHandle<()>>>,
    errors: Arc<watch::Sender<FieldErrors>>,
}

impl DebouncedValidator {
    pub fn new(delay: Duration) -> Self {
        let (errors, _) = watch::channel(FieldErrors::new());
        Self {
            delay,
            pending: Mutex::new(HashMap::new()),
            errors: Arc::new(errors),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FieldErrors> {
        self.errors.subscribe()
    }

    pub fn errors(&self) -> FieldErrors {
        self.errors.borrow().clone()
    }

    pub fn schedule(&self, field: Field, value: impl Into<String>) {
        let value = value.into();
        let delay = self.delay;
        let errors = Arc::clone(&self.errors);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let message = validate_field(field, &value);
            debug!(field = field.name(), valid = message.is_none(), "debounced validation ran");
            errors.send_if_modified(|current| {
                let changed = current.get(field) != message.as_deref();
                match message {
                    Some(message) => current.set(field, message),
                    None => current.clear(field),
                }
                changed
            });
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.insert(field, task) {
            previous.abort();
        }
    }

    pub fn cancel_all(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, task) in pending.drain() {
            task.abort();
        }
    }
}

impl Default for DebouncedValidator {
    fn default() -> Self {
        Self::new(VALIDATION_DEBOUNCE)
    }
}

impl Drop for DebouncedValidator {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
