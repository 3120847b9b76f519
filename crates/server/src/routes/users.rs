use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use coldcall_api::{
    crypto, db, service, AffectedResponse, CreateUserRequest, ListUsersResponse, OkResponse,
    TransferRequest, UpdateUserRequest, UserInfo,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{sq_execute, sq_query_map, sq_query_row, user_info_from_row, Db};

fn require_admin(user: &AuthUser) -> Result<(), ApiErr> {
    if !user.is_admin() {
        return Err(ApiErr::forbidden("admin only"));
    }
    Ok(())
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ---------------------------------------------------------------------------
// List users
// ---------------------------------------------------------------------------

/// GET /api/users — all users without credential fields (admin only).
pub async fn list_users(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<ListUsersResponse>, ApiErr> {
    require_admin(&user)?;

    let conn = db.conn();
    let users = sq_query_map(&conn, db::users::list(), user_info_from_row)
        .map_err(ApiErr::from_db("list users"))?;

    Ok(Json(ListUsersResponse { users }))
}

// ---------------------------------------------------------------------------
// Create user
// ---------------------------------------------------------------------------

/// POST /api/users — create a caller or admin account (admin only).
pub async fn create_user(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserInfo>), ApiErr> {
    require_admin(&user)?;

    let username = service::validate_username(&req.username).map_err(ApiErr::from)?;
    service::validate_password(&req.password).map_err(ApiErr::from)?;
    let role = req.role.unwrap_or(coldcall_api::Role::Caller);
    let daily_target = req.daily_target.unwrap_or(50);
    service::validate_daily_target(daily_target).map_err(ApiErr::from)?;
    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(&username)
        .to_string();

    let (hash, salt) = crypto::hash_password(&req.password).map_err(ApiErr::from)?;
    let id = Uuid::new_v4().to_string();

    let conn = db.conn();

    let taken: bool = sq_query_row(&conn, db::users::username_exists(&username), |row| {
        row.get(0)
    })
    .unwrap_or(false);
    if taken {
        return Err(ApiErr::conflict("username already exists"));
    }

    let result = sq_execute(
        &conn,
        db::users::insert(
            &id,
            &username,
            &display_name,
            &hash,
            &salt,
            role.as_str(),
            daily_target,
        ),
    );

    match result {
        Ok(_) => {}
        Err(ref e) if is_constraint_violation(e) => {
            return Err(ApiErr::conflict("username already exists"));
        }
        Err(e) => return Err(ApiErr::from_db("create user")(e)),
    }

    let created_at: String = conn
        .query_row("SELECT created_at FROM users WHERE id = ?1", [&id], |row| {
            row.get(0)
        })
        .unwrap_or_default();

    Ok((
        StatusCode::CREATED,
        Json(UserInfo {
            id,
            username,
            display_name: Some(display_name),
            role,
            daily_target,
            created_at,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Update user
// ---------------------------------------------------------------------------

/// PATCH /api/users/:id — partial update (admin only).
pub async fn update_user(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    require_admin(&user)?;

    if req.is_empty() {
        return Err(ApiErr::bad_request("no updates provided"));
    }

    let username = match req.username.as_deref() {
        Some(raw) => Some(service::validate_username(raw).map_err(ApiErr::from)?),
        None => None,
    };
    if let Some(target) = req.daily_target {
        service::validate_daily_target(target).map_err(ApiErr::from)?;
    }
    let hashed = match req.password.as_deref() {
        Some(pw) => {
            service::validate_password(pw).map_err(ApiErr::from)?;
            Some(crypto::hash_password(pw).map_err(ApiErr::from)?)
        }
        None => None,
    };

    let fields = db::users::UpdateFields {
        username: username.as_deref(),
        display_name: req.display_name.as_deref(),
        role: req.role.map(|r| r.as_str()),
        daily_target: req.daily_target,
        password: hashed.as_ref().map(|(h, s)| (h.as_str(), s.as_str())),
    };

    let Some(built) = db::users::update(&id, &fields) else {
        return Err(ApiErr::bad_request("no updates provided"));
    };

    let conn = db.conn();
    let affected = match sq_execute(&conn, built) {
        Ok(n) => n,
        Err(ref e) if is_constraint_violation(e) => {
            return Err(ApiErr::conflict("username already exists"));
        }
        Err(e) => return Err(ApiErr::from_db("update user")(e)),
    };

    if affected == 0 {
        return Err(ApiErr::not_found("user not found"));
    }

    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Delete user
// ---------------------------------------------------------------------------

/// DELETE /api/users/:id — remove an account (admin only). Accounts with
/// call history cannot be deleted; deactivate them instead.
pub async fn delete_user(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    require_admin(&user)?;

    if id == user.user_id() {
        return Err(ApiErr::bad_request("cannot delete your own account"));
    }

    let mut conn = db.conn();
    let tx = conn
        .transaction()
        .map_err(ApiErr::from_db("begin delete user"))?;

    sq_execute(&tx, db::practices::clear_preferred(&id))
        .map_err(ApiErr::from_db("clear preferred caller"))?;
    // Their workload goes back into the pool.
    sq_execute(&tx, db::assignments::delete_all_for(&id))
        .map_err(ApiErr::from_db("delete assignments"))?;

    let affected = match sq_execute(&tx, db::users::delete(&id)) {
        Ok(n) => n,
        Err(ref e) if is_constraint_violation(e) => {
            return Err(ApiErr::conflict(
                "user has call history; deactivate instead",
            ));
        }
        Err(e) => return Err(ApiErr::from_db("delete user")(e)),
    };

    if affected == 0 {
        return Err(ApiErr::not_found("user not found"));
    }

    tx.commit().map_err(ApiErr::from_db("commit delete user"))?;
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Deactivate user
// ---------------------------------------------------------------------------

/// POST /api/users/:id/deactivate — scramble credentials, zero the daily
/// target, drop future assignments and preferred links (admin only).
pub async fn deactivate_user(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    require_admin(&user)?;

    if id == user.user_id() {
        return Err(ApiErr::bad_request("cannot deactivate yourself"));
    }

    let mut conn = db.conn();

    let (username, display_name): (String, Option<String>) = sq_query_row(
        &conn,
        db::users::get_session_user(&id),
        |row| Ok((row.get(1)?, row.get(2)?)),
    )
    .map_err(|_| ApiErr::not_found("user not found"))?;

    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
    let scrambled_username = format!("inactive_{stamp}_{username}");
    let scrambled_display = format!("(Inactive) {}", display_name.as_deref().unwrap_or(&username));
    let random_password = crypto::generate_token().map_err(ApiErr::from)?;
    let (hash, salt) = crypto::hash_password(&random_password).map_err(ApiErr::from)?;

    let tx = conn
        .transaction()
        .map_err(ApiErr::from_db("begin deactivate"))?;

    sq_execute(
        &tx,
        db::users::deactivate(&id, &scrambled_username, &scrambled_display, &hash, &salt),
    )
    .map_err(ApiErr::from_db("deactivate user"))?;
    sq_execute(&tx, db::assignments::delete_future_for(&id))
        .map_err(ApiErr::from_db("drop future assignments"))?;
    sq_execute(&tx, db::practices::clear_preferred(&id))
        .map_err(ApiErr::from_db("clear preferred caller"))?;

    tx.commit().map_err(ApiErr::from_db("commit deactivate"))?;
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Transfer practices between callers
// ---------------------------------------------------------------------------

/// POST /api/users/transfer — move every preferred practice from one caller
/// to another (admin only). Returns the affected-row count.
pub async fn transfer_practices(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<TransferRequest>,
) -> Result<Json<AffectedResponse>, ApiErr> {
    require_admin(&user)?;

    if req.from_user_id.is_empty() || req.to_user_id.is_empty() {
        return Err(ApiErr::bad_request("both user ids are required"));
    }
    if req.from_user_id == req.to_user_id {
        return Err(ApiErr::bad_request("cannot transfer to the same user"));
    }

    let conn = db.conn();

    let target_exists: bool = sq_query_row(&conn, db::users::exists(&req.to_user_id), |row| {
        row.get(0)
    })
    .unwrap_or(false);
    if !target_exists {
        return Err(ApiErr::not_found("target user not found"));
    }

    let affected = sq_execute(
        &conn,
        db::practices::transfer_preferred(&req.from_user_id, &req.to_user_id),
    )
    .map_err(ApiErr::from_db("transfer practices"))?;

    Ok(Json(AffectedResponse {
        ok: true,
        affected: affected as u64,
    }))
}
