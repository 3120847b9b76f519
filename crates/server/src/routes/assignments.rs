use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use coldcall_api::{
    db::{self, assignments::ListFilter},
    service, AssignmentListQuery, AssignmentListResponse, AssignmentRow, CallerDayStats,
    DayStats, DeleteAssignmentsQuery, DeletedResponse, GenerateScheduleRequest,
    GenerateScheduleResponse,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{assignment_from_row, sq_execute, sq_query_map, Db};

// ---------------------------------------------------------------------------
// List assignments
// ---------------------------------------------------------------------------

fn build_filter(q: &AssignmentListQuery, user: &AuthUser) -> Result<ListFilter, ApiErr> {
    let mut filter = ListFilter::default();

    if let Some(ref date) = q.date {
        service::validate_date(date).map_err(ApiErr::from)?;
        filter.date = Some(date.clone());
    } else if let Some(ref week) = q.week {
        let days = q.days.clamp(1, 31);
        let (start, end) = service::date_window(week, days).map_err(ApiErr::from)?;
        filter.range = Some((start, end));
    }

    // Non-admins only ever see their own assignments.
    if !user.is_admin() {
        filter.caller_id = Some(user.user_id().to_string());
    } else if let Some(ref caller_id) = q.caller_id {
        filter.caller_id = Some(caller_id.clone());
    }

    Ok(filter)
}

/// Fold the grouped day-stats rows into date → region/caller breakdowns.
fn fold_day_stats(
    rows: Vec<(String, String, String, String, CallerDayStats)>,
) -> BTreeMap<String, DayStats> {
    let mut by_date: BTreeMap<String, DayStats> = BTreeMap::new();

    for (date, region, caller_name, caller_id, slice) in rows {
        let day = by_date.entry(date).or_default();
        *day.regions.entry(region).or_default() += slice.total;

        let caller = day.callers.entry(caller_id).or_default();
        caller.name = caller_name;
        caller.total += slice.total;
        caller.completed += slice.completed;
        caller.interested += slice.interested;
        caller.not_interested += slice.not_interested;
        caller.no_answer += slice.no_answer;
        caller.callback += slice.callback;
        caller.other += slice.other;
    }

    by_date
}

/// GET /api/assignments — filtered list; `stats=true` adds the per-day
/// breakdown for admins.
pub async fn list_assignments(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<AssignmentListQuery>,
) -> Result<Json<AssignmentListResponse>, ApiErr> {
    let filter = build_filter(&q, &user)?;
    let conn = db.conn();

    let assignments: Vec<AssignmentRow> =
        sq_query_map(&conn, db::assignments::list(&filter), assignment_from_row)
            .map_err(ApiErr::from_db("list assignments"))?;

    let day_stats = if q.stats && user.is_admin() {
        let rows = sq_query_map(
            &conn,
            db::stats::assignment_day_stats(&filter),
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    CallerDayStats {
                        name: String::new(),
                        total: row.get(4)?,
                        completed: row.get(5)?,
                        interested: row.get(6)?,
                        not_interested: row.get(7)?,
                        no_answer: row.get(8)?,
                        callback: row.get(9)?,
                        other: row.get(10)?,
                    },
                ))
            },
        )
        .map_err(ApiErr::from_db("assignment day stats"))?;
        Some(fold_day_stats(rows))
    } else {
        None
    };

    Ok(Json(AssignmentListResponse {
        assignments,
        day_stats,
    }))
}

// ---------------------------------------------------------------------------
// Generate schedule
// ---------------------------------------------------------------------------

struct Caller {
    id: String,
    username: String,
    daily_target: i64,
}

struct Candidate {
    id: String,
    region: String,
}

/// POST /api/assignments/generate — fill a call window (admin only).
///
/// Round-robins each caller's daily target over the prioritized candidate
/// pool; a practice is assigned at most once per run.
pub async fn generate_schedule(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<GenerateScheduleRequest>,
) -> Result<(StatusCode, Json<GenerateScheduleResponse>), ApiErr> {
    if !user.is_admin() {
        return Err(ApiErr::forbidden("admin only"));
    }

    let days = req.days.clamp(1, 31);
    let (start, end) = service::date_window(&req.start_date, days).map_err(ApiErr::from)?;

    let mut conn = db.conn();

    let callers: Vec<Caller> = sq_query_map(
        &conn,
        db::users::callers_with_targets(req.caller_ids.as_deref()),
        |row| {
            Ok(Caller {
                id: row.get(0)?,
                username: row.get(1)?,
                daily_target: row.get(2)?,
            })
        },
    )
    .map_err(ApiErr::from_db("load callers"))?;

    if callers.is_empty() {
        return Err(ApiErr::bad_request(
            "no callers with daily targets configured",
        ));
    }

    let candidates: Vec<Candidate> = sq_query_map(
        &conn,
        db::assignments::candidates(req.regions.as_deref(), req.cities.as_deref()),
        |row| {
            Ok(Candidate {
                id: row.get(0)?,
                region: row.get(1)?,
            })
        },
    )
    .map_err(ApiErr::from_db("load candidates"))?;

    if candidates.is_empty() {
        return Err(ApiErr::bad_request(
            "no available practices in the selected area",
        ));
    }

    let tx = conn
        .transaction()
        .map_err(ApiErr::from_db("begin schedule"))?;

    if !req.append {
        sq_execute(&tx, db::assignments::clear_window(&start, &end))
            .map_err(ApiErr::from_db("clear window"))?;
    }

    let start_date = chrono::NaiveDate::parse_from_str(&req.start_date, "%Y-%m-%d")
        .map_err(|_| ApiErr::bad_request("invalid date format (YYYY-MM-DD)"))?;

    let mut used: HashSet<String> = HashSet::new();
    let mut next = 0usize;
    let mut total: u64 = 0;
    let mut region_breakdown: BTreeMap<String, i64> = BTreeMap::new();

    'fill: for day in 0..days {
        let date = (start_date + chrono::Duration::days(day as i64))
            .format("%Y-%m-%d")
            .to_string();

        for caller in &callers {
            for _ in 0..caller.daily_target {
                while next < candidates.len() && used.contains(&candidates[next].id) {
                    next += 1;
                }
                let Some(candidate) = candidates.get(next) else {
                    // Candidate pool exhausted.
                    break 'fill;
                };
                used.insert(candidate.id.clone());
                next += 1;

                let id = Uuid::new_v4().to_string();
                sq_execute(
                    &tx,
                    db::assignments::insert(&id, &date, &candidate.id, &caller.id),
                )
                .map_err(ApiErr::from_db("insert assignment"))?;

                total += 1;
                *region_breakdown.entry(candidate.region.clone()).or_default() += 1;
            }
        }
    }

    tx.commit().map_err(ApiErr::from_db("commit schedule"))?;

    tracing::info!("generated {total} assignments over {days} days");

    Ok((
        StatusCode::CREATED,
        Json(GenerateScheduleResponse {
            ok: true,
            total_assignments: total,
            available_practices: candidates.len() as u64,
            region_breakdown,
            callers_assigned: callers.into_iter().map(|c| c.username).collect(),
        }),
    ))
}

// ---------------------------------------------------------------------------
// Delete assignments
// ---------------------------------------------------------------------------

/// DELETE /api/assignments — by day, by range, optionally per region
/// (admin only).
pub async fn delete_assignments(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<DeleteAssignmentsQuery>,
) -> Result<Json<DeletedResponse>, ApiErr> {
    if !user.is_admin() {
        return Err(ApiErr::forbidden("admin only"));
    }

    let range = match (q.start_date.as_deref(), q.end_date.as_deref()) {
        (Some(start), Some(end)) => Some((start, end)),
        _ => None,
    };

    let conn = db.conn();
    let deleted = sq_execute(
        &conn,
        db::assignments::delete_filtered(q.date.as_deref(), range, q.region.as_deref()),
    )
    .map_err(ApiErr::from_db("delete assignments"))?;

    Ok(Json(DeletedResponse {
        ok: true,
        deleted: deleted as u64,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_stats_fold_merges_regions_and_callers() {
        let rows = vec![
            (
                "2025-04-01".to_string(),
                "Sofia".to_string(),
                "dani".to_string(),
                "u1".to_string(),
                CallerDayStats {
                    name: String::new(),
                    total: 10,
                    completed: 4,
                    interested: 1,
                    not_interested: 2,
                    no_answer: 1,
                    callback: 0,
                    other: 0,
                },
            ),
            (
                "2025-04-01".to_string(),
                "Plovdiv".to_string(),
                "dani".to_string(),
                "u1".to_string(),
                CallerDayStats {
                    name: String::new(),
                    total: 5,
                    completed: 5,
                    interested: 2,
                    not_interested: 0,
                    no_answer: 3,
                    callback: 0,
                    other: 0,
                },
            ),
        ];

        let folded = fold_day_stats(rows);
        assert_eq!(folded.len(), 1);
        let day = &folded["2025-04-01"];
        assert_eq!(day.regions["Sofia"], 10);
        assert_eq!(day.regions["Plovdiv"], 5);
        let caller = &day.callers["u1"];
        assert_eq!(caller.name, "dani");
        assert_eq!(caller.total, 15);
        assert_eq!(caller.completed, 9);
        assert_eq!(caller.interested, 3);
    }
}
