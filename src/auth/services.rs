use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Optional fields accepted alongside email and password.
#[derive(Debug, Default, Clone)]
pub struct NewUserFields {
    pub name: Option<String>,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Database(db)) if db.is_unique_violation()
    )
}

async fn insert_user(
    st: &AppState,
    email: &str,
    password: &str,
    fields: NewUserFields,
    privileged: bool,
) -> AppResult<User> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::validation("Email is required"));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::validation(format!(
            "{email} is not a valid e-mail address"
        )));
    }

    if st.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = st.hasher.hash(password)?;
    let new = NewUser {
        email,
        name: fields.name.map(|n| n.trim().to_string()).unwrap_or_default(),
        password_hash,
        is_staff: privileged,
        is_superuser: privileged,
    };

    match st.users.insert(new).await {
        Ok(user) => Ok(user),
        Err(e) if is_unique_violation(&e) => {
            Err(AppError::Conflict("Email already registered".into()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Creates an active, unprivileged user.
pub async fn create_user(
    st: &AppState,
    email: &str,
    password: &str,
    fields: NewUserFields,
) -> AppResult<User> {
    let user = insert_user(st, email, password, fields, false).await?;
    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(user)
}

/// Creates a user with staff and superuser flags set.
pub async fn create_superuser(st: &AppState, email: &str, password: &str) -> AppResult<User> {
    let user = insert_user(st, email, password, NewUserFields::default(), true).await?;
    info!(user_id = %user.id, email = %user.email, "superuser created");
    Ok(user)
}

/// Creates the configured superuser unless the email is already taken.
pub async fn ensure_superuser(st: &AppState, email: &str, password: &str) -> AppResult<()> {
    if st.users.find_by_email(&normalize_email(email)).await?.is_some() {
        info!(email = %email, "bootstrap superuser already present");
        return Ok(());
    }
    create_superuser(st, email, password).await.map(|_| ())
}

pub async fn authenticate(st: &AppState, email: &str, password: &str) -> AppResult<User> {
    let email = normalize_email(email);
    let invalid = || AppError::unauthorized("Invalid credentials");

    let Some(user) = st.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(invalid());
    };
    if !st.hasher.verify(password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(invalid());
    }
    if !user.is_active {
        warn!(user_id = %user.id, "login inactive user");
        return Err(invalid());
    }
    Ok(user)
}

pub async fn update_profile(
    st: &AppState,
    user_id: Uuid,
    name: Option<String>,
    password: Option<String>,
) -> AppResult<User> {
    let password_hash = match password {
        Some(p) => Some(st.hasher.hash(&p)?),
        None => None,
    };
    let name = name.map(|n| n.trim().to_string());
    st.users
        .update_profile(user_id, name, password_hash)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}
