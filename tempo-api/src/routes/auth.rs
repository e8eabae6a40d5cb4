/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST  /api/auth/register` - Register, optionally gated by a registration code
/// - `POST  /api/auth/login`    - Login and get a bearer token
/// - `GET   /api/auth/me`       - Current user profile
/// - `PATCH /api/auth/me`       - Update profile (allow-listed fields only)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use tempo_shared::{
    auth::{jwt, middleware::AuthContext, password},
    models::user::{CreateUser, SchedulePreferences, UpdateUser, User},
};
use uuid::Uuid;
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Display/login name
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,

    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Single-use code minted by the billing webhook
    pub registration_code: Option<String>,
}

/// Register/login response
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserSummary,
}

/// Public projection of a user
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    pub password: String,
}

/// Profile update request; only these fields may be patched
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub schedule_preferences: Option<SchedulePreferences>,
}

/// Fields a PATCH /me body may contain
const ALLOWED_UPDATES: &[&str] = &["username", "email", "password", "schedulePreferences"];

fn map_validation_errors(e: validator::ValidationErrors) -> ApiError {
    let errors: Vec<ValidationErrorDetail> = e
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| ValidationErrorDetail {
                field: field.to_string(),
                message: error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string()),
            })
        })
        .collect();
    ApiError::ValidationError(errors)
}

/// Register a new user
///
/// When a registration code is supplied it must match an unconsumed code
/// minted by the billing webhook; consumption clears the code, so a second
/// registration attempt with the same code fails. Without a code the account
/// starts with an inactive subscription.
///
/// # Errors
///
/// - `400 Bad Request`: invalid registration code
/// - `409 Conflict`: email or username already exists
/// - `422 Unprocessable Entity`: validation failed
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate().map_err(map_validation_errors)?;

    let password_hash = password::hash_password(&req.password)?;

    let user = match req.registration_code.as_deref() {
        Some(code) => {
            let holder = User::find_by_registration_code(&state.db, code)
                .await?
                .ok_or_else(|| ApiError::BadRequest("Invalid registration code".to_string()))?;

            if !holder.email.eq_ignore_ascii_case(&req.email) {
                return Err(ApiError::BadRequest(
                    "Registration code was issued for a different email".to_string(),
                ));
            }

            // Atomic on the code: a concurrent duplicate attempt matches no row
            User::consume_registration_code(&state.db, code, &req.username, &password_hash)
                .await?
                .ok_or_else(|| ApiError::BadRequest("Invalid registration code".to_string()))?
        }
        None => {
            User::create(
                &state.db,
                CreateUser {
                    username: req.username.clone(),
                    email: req.email.clone(),
                    password_hash,
                },
            )
            .await?
        }
    };

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");

    let token = jwt::create_token(&jwt::Claims::new(user.id), state.jwt_secret())?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserSummary::from(&user),
        }),
    ))
}

/// Login endpoint
///
/// The same opaque message is returned for an unknown email and a wrong
/// password.
///
/// # Errors
///
/// - `401 Unauthorized`: invalid credentials
/// - `422 Unprocessable Entity`: validation failed
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate().map_err(map_validation_errors)?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    // Rows the billing webhook created ahead of registration have no
    // credentials yet and cannot log in.
    if user.password_hash.is_empty() {
        return Err(ApiError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    let valid = password::verify_password(&req.password, &user.password_hash)?;
    if !valid {
        return Err(ApiError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    let token = jwt::create_token(&jwt::Claims::new(user.id), state.jwt_secret())?;

    Ok(Json(AuthResponse {
        token,
        user: UserSummary::from(&user),
    }))
}

/// Returns the authenticated user's profile
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<User>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

    Ok(Json(user))
}

/// Updates the authenticated user's profile
///
/// Only `username`, `email`, `password`, and `schedulePreferences` may be
/// patched; any other key in the body fails the request. A new password is
/// re-hashed before storage.
///
/// # Errors
///
/// - `400 Bad Request`: body contains a non-allow-listed field
/// - `409 Conflict`: new email or username already taken
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<User>> {
    let object = body
        .as_object()
        .ok_or_else(|| ApiError::BadRequest("Expected a JSON object".to_string()))?;

    if let Some(unknown) = object.keys().find(|k| !ALLOWED_UPDATES.contains(&k.as_str())) {
        return Err(ApiError::BadRequest(format!(
            "Invalid update field: {}",
            unknown
        )));
    }

    let req: UpdateMeRequest = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::BadRequest(format!("Malformed update: {}", e)))?;

    let password_hash = match req.password.as_deref() {
        Some(plaintext) => Some(password::hash_password(plaintext)?),
        None => None,
    };

    let user = User::update(
        &state.db,
        auth.user_id,
        UpdateUser {
            username: req.username,
            email: req.email,
            password_hash,
            schedule_preferences: req.schedule_preferences,
        },
    )
    .await?
    .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

    tracing::info!(user_id = %user.id, "Profile updated");

    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let req = RegisterRequest {
            username: "sam".to_string(),
            email: "sam@example.com".to_string(),
            password: "long-enough-password".to_string(),
            registration_code: None,
        };
        assert!(req.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            ..sample_request()
        };
        assert!(bad_email.validate().is_err());

        let short_password = RegisterRequest {
            password: "short".to_string(),
            ..sample_request()
        };
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn test_register_request_accepts_camel_case_code() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{
                "username": "sam",
                "email": "sam@example.com",
                "password": "long-enough-password",
                "registrationCode": "abc123"
            }"#,
        )
        .unwrap();

        assert_eq!(req.registration_code.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_allowed_updates_reject_unknown_field() {
        let body: serde_json::Value =
            serde_json::from_str(r#"{"username":"x","subscriptionStatus":"active"}"#).unwrap();
        let object = body.as_object().unwrap();

        let unknown = object
            .keys()
            .find(|k| !ALLOWED_UPDATES.contains(&k.as_str()));
        assert_eq!(unknown.map(String::as_str), Some("subscriptionStatus"));
    }

    fn sample_request() -> RegisterRequest {
        RegisterRequest {
            username: "sam".to_string(),
            email: "sam@example.com".to_string(),
            password: "long-enough-password".to_string(),
            registration_code: None,
        }
    }
}
