use axum::{
    extract::{FromRef, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use coldcall_api::{
    crypto, db, service, LoginRequest, LoginResponse, OkResponse, ResetPasswordRequest, Role,
    SessionResponse, UserSummary,
};

use crate::error::ApiErr;
use crate::rate_limit::{client_ip, LOGIN_LIMIT, LOGIN_WINDOW};
use crate::storage::{sq_execute, sq_query_row, user_summary_from_row, Db};
use crate::{AppConfig, AppState};

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Auth extractor
// ---------------------------------------------------------------------------

/// Authenticated user, extracted from the session cookie and re-read from
/// the database so role changes take effect immediately.
pub struct AuthUser {
    pub user: UserSummary,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Db: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        let token = parts
            .headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|cookies| service::cookie_value(cookies, service::AUTH_COOKIE))
            .ok_or_else(|| ApiErr::unauthorized("not authenticated"))?
            .to_string();

        let user_id = crypto::verify_jwt(&token, &config.jwt_secret, now_unix())
            .map_err(|_| ApiErr::unauthorized("invalid or expired session"))?;

        let db = Db::from_ref(state);
        let conn = db.conn();
        let user = sq_query_row(&conn, db::users::get_session_user(&user_id), |row| {
            user_summary_from_row(row)
        })
        .map_err(|_| ApiErr::unauthorized("unknown user"))?;

        Ok(AuthUser { user })
    }
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// POST /api/auth/login — verify credentials, set the session cookie.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiErr> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(ApiErr::bad_request("username and password are required"));
    }

    let ip = client_ip(&headers);
    let decision = state.limiter.check(&ip, LOGIN_LIMIT, LOGIN_WINDOW);
    if !decision.allowed {
        let retry_secs = decision.reset_in.as_secs();
        tracing::warn!("login rate limit hit for {ip} (resets in {retry_secs}s)");
        return Err(ApiErr::too_many_requests(format!(
            "too many login attempts; try again in {retry_secs} seconds"
        )));
    }
    tracing::debug!("login attempt from {ip} ({} attempts left)", decision.remaining);

    let conn = state.db.conn();
    let row = sq_query_row(&conn, db::users::get_for_login(&req.username), |row| {
        let user = user_summary_from_row(row)?;
        let hash: String = row.get(6)?;
        let salt: String = row.get(7)?;
        Ok((user, hash, salt))
    });

    let (user, hash, salt) = match row {
        Ok(found) => found,
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            return Err(ApiErr::unauthorized("invalid credentials"))
        }
        Err(e) => return Err(ApiErr::from_db("login lookup")(e)),
    };

    if !crypto::verify_password(&req.password, &hash, &salt) {
        return Err(ApiErr::unauthorized("invalid credentials"));
    }

    let token = crypto::sign_jwt(&user.id, &state.config.jwt_secret, now_unix());
    let cookie = service::auth_cookie(&token);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse { ok: true, user }),
    ))
}

// ---------------------------------------------------------------------------
// Logout
// ---------------------------------------------------------------------------

/// POST /api/auth/logout — clear the session cookie.
pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, service::clear_auth_cookie())],
        Json(OkResponse { ok: true }),
    )
}

// ---------------------------------------------------------------------------
// Session check
// ---------------------------------------------------------------------------

/// GET /api/auth/session — 401 without a valid session, user summary with one.
pub async fn session(user: Result<AuthUser, ApiErr>) -> impl IntoResponse {
    match user {
        Ok(auth) => (
            StatusCode::OK,
            Json(SessionResponse {
                authenticated: true,
                user: Some(auth.user),
            }),
        ),
        Err(_) => (
            StatusCode::UNAUTHORIZED,
            Json(SessionResponse {
                authenticated: false,
                user: None,
            }),
        ),
    }
}

// ---------------------------------------------------------------------------
// Reset password
// ---------------------------------------------------------------------------

/// POST /api/auth/reset-password — change own password, clear the forced-
/// reset flag.
pub async fn reset_password(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    if req.new_password != req.confirm_password {
        return Err(ApiErr::bad_request("passwords do not match"));
    }
    service::validate_password(&req.new_password).map_err(ApiErr::from)?;

    let (hash, salt) = crypto::hash_password(&req.new_password).map_err(ApiErr::from)?;

    let conn = db.conn();
    sq_execute(
        &conn,
        db::users::update_password(user.user_id(), &hash, &salt),
    )
    .map_err(ApiErr::from_db("reset password"))?;

    Ok(Json(OkResponse { ok: true }))
}
