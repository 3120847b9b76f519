use axum::{
    extract::{Query, State},
    Json,
};

use coldcall_api::{BackupResponse, PurgeKind, PurgeQuery, PurgeResponse};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{self, Db};

/// POST /api/admin/backup — copy the live database into the rotated backup
/// directory (admin only).
pub async fn backup(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<BackupResponse>, ApiErr> {
    if !user.is_admin() {
        return Err(ApiErr::forbidden("admin only"));
    }

    let filename = storage::backup_database(&db).map_err(|e| {
        tracing::error!("backup: {e:#}");
        ApiErr::internal("backup failed")
    })?;

    Ok(Json(BackupResponse { ok: true, filename }))
}

/// DELETE /api/admin/data — purge call history and/or assignments
/// (admin only).
pub async fn purge_data(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<PurgeQuery>,
) -> Result<Json<PurgeResponse>, ApiErr> {
    if !user.is_admin() {
        return Err(ApiErr::forbidden("admin only"));
    }

    let conn = db.conn();
    let mut calls_deleted = 0u64;
    let mut assignments_deleted = 0u64;

    if matches!(q.kind, PurgeKind::Calls | PurgeKind::All) {
        calls_deleted = conn
            .execute("DELETE FROM calls", [])
            .map_err(ApiErr::from_db("purge calls"))? as u64;
    }
    if matches!(q.kind, PurgeKind::Assignments | PurgeKind::All) {
        assignments_deleted = conn
            .execute("DELETE FROM assignments", [])
            .map_err(ApiErr::from_db("purge assignments"))? as u64;
    }

    tracing::info!("purged {calls_deleted} calls, {assignments_deleted} assignments");

    Ok(Json(PurgeResponse {
        ok: true,
        calls_deleted,
        assignments_deleted,
    }))
}
