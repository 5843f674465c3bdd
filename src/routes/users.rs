use axum::{extract::State, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{NewUser, Role, User},
    schema::users,
    state::AppState,
};

const CREDENTIALS_PROVIDER: &str = "credentials";

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Public shape of an account, used both for auth responses and for the
/// owner summaries attached to job listings.
#[derive(Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl UserSummary {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct AccountView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub provider: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub ok: bool,
    pub user: AccountView,
    pub token: String,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub ok: bool,
    pub user: AuthenticatedUser,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    let name = required_trimmed(payload.name.as_deref())?;
    let email = required_trimmed(payload.email.as_deref())?;
    let password = payload
        .password
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::validation("name, email, password and role are required"))?;
    let role = payload
        .role
        .as_deref()
        .and_then(Role::parse)
        .ok_or_else(|| AppError::validation("role must be 'client' or 'freelancer'"))?;

    let password_hash = password::hash_password(password)?;
    let new_user = NewUser {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        password_hash,
        role: role.as_str().to_string(),
        provider: CREDENTIALS_PROVIDER.to_string(),
    };

    let mut conn = state.db()?;
    match diesel::insert_into(users::table)
        .values(&new_user)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::conflict("user already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let user: User = users::table.find(new_user.id).first(&mut conn)?;
    let token = state.jwt.generate_token(user.id, &user.name, &user.role)?;

    Ok(Json(AuthResponse {
        ok: true,
        user: account_view(&user),
        token,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::validation("email and password are required"))?;
    let password = payload
        .password
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::validation("email and password are required"))?;

    let mut conn = state.db()?;
    let user: User = users::table
        .filter(users::email.eq(email))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    if user.provider != CREDENTIALS_PROVIDER {
        return Err(AppError::validation(
            "use your social login for this account",
        ));
    }

    let valid = password::verify_password(password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        return Err(AppError::unauthorized());
    }

    let token = state.jwt.generate_token(user.id, &user.name, &user.role)?;

    Ok(Json(AuthResponse {
        ok: true,
        user: account_view(&user),
        token,
    }))
}

pub async fn me(user: AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse { ok: true, user })
}

fn account_view(user: &User) -> AccountView {
    AccountView {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
        provider: user.provider.clone(),
    }
}

fn required_trimmed(value: Option<&str>) -> AppResult<&str> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .ok_or_else(|| AppError::validation("name, email, password and role are required"))
}
