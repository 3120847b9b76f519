use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use coldcall_api::{
    db, CallListQuery, CallListResponse, CallOutcome, LogCallRequest, LogCallResponse, OkResponse,
    UpdateCallRequest,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{call_from_row, sq_execute, sq_query_map, sq_query_row, Db};

fn parse_outcome(raw: &str) -> Result<CallOutcome, ApiErr> {
    CallOutcome::parse(raw).ok_or_else(|| ApiErr::bad_request("invalid outcome"))
}

// ---------------------------------------------------------------------------
// List calls
// ---------------------------------------------------------------------------

/// GET /api/calls — filtered call history.
pub async fn list_calls(
    State(db): State<Db>,
    _user: AuthUser,
    Query(q): Query<CallListQuery>,
) -> Result<Json<CallListResponse>, ApiErr> {
    let conn = db.conn();
    let calls = sq_query_map(&conn, db::calls::list(&q), call_from_row)
        .map_err(ApiErr::from_db("list calls"))?;
    Ok(Json(CallListResponse { calls }))
}

// ---------------------------------------------------------------------------
// Log call
// ---------------------------------------------------------------------------

/// POST /api/calls — log a call. Also completes the practice's pending
/// assignments and carries the note onto them.
pub async fn log_call(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<LogCallRequest>,
) -> Result<(StatusCode, Json<LogCallResponse>), ApiErr> {
    if req.practice_id.is_empty() {
        return Err(ApiErr::bad_request("practice_id is required"));
    }
    let outcome = parse_outcome(&req.outcome)?;
    let notes = req.notes.as_deref().filter(|s| !s.is_empty());

    let mut conn = db.conn();

    let exists: bool = sq_query_row(&conn, db::practices::get_exists(&req.practice_id), |row| {
        row.get(0)
    })
    .unwrap_or(false);
    if !exists {
        return Err(ApiErr::not_found("practice not found"));
    }

    let id = Uuid::new_v4().to_string();
    // Stats bucket calls by the caller's calendar day.
    let called_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let tx = conn.transaction().map_err(ApiErr::from_db("begin log call"))?;
    sq_execute(
        &tx,
        db::calls::insert(
            &id,
            &req.practice_id,
            user.user_id(),
            outcome.as_str(),
            notes,
            &called_at,
        ),
    )
    .map_err(ApiErr::from_db("insert call"))?;

    sq_execute(&tx, db::calls::sync_pending_notes(&req.practice_id, notes))
        .map_err(ApiErr::from_db("sync assignment notes"))?;
    sq_execute(
        &tx,
        db::calls::complete_pending_assignments(&req.practice_id),
    )
    .map_err(ApiErr::from_db("complete assignments"))?;

    tx.commit().map_err(ApiErr::from_db("commit log call"))?;

    Ok((StatusCode::CREATED, Json(LogCallResponse { ok: true, id })))
}

// ---------------------------------------------------------------------------
// Update call
// ---------------------------------------------------------------------------

/// PATCH /api/calls/:id — edit outcome/notes. Callers may only edit their
/// own calls; admins may edit any.
pub async fn update_call(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateCallRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    let outcome = match req.outcome.as_deref() {
        Some(raw) => Some(parse_outcome(raw)?),
        None => None,
    };

    let conn = db.conn();

    let caller_id: String = sq_query_row(&conn, db::calls::get_caller(&id), |row| row.get(0))
        .map_err(|_| ApiErr::not_found("call not found"))?;

    if !user.is_admin() && caller_id != user.user_id() {
        return Err(ApiErr::forbidden("cannot edit other users' calls"));
    }

    let Some(built) = db::calls::update(
        &id,
        outcome.map(|o| o.as_str()),
        req.notes.as_deref(),
    ) else {
        return Err(ApiErr::bad_request("no updates provided"));
    };

    sq_execute(&conn, built).map_err(ApiErr::from_db("update call"))?;
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Delete call
// ---------------------------------------------------------------------------

/// DELETE /api/calls/:id — admin only.
pub async fn delete_call(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    if !user.is_admin() {
        return Err(ApiErr::forbidden("admin only"));
    }

    let conn = db.conn();
    let affected =
        sq_execute(&conn, db::calls::delete(&id)).map_err(ApiErr::from_db("delete call"))?;
    if affected == 0 {
        return Err(ApiErr::not_found("call not found"));
    }

    Ok(Json(OkResponse { ok: true }))
}
