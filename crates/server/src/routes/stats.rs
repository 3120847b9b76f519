use axum::{
    extract::{Query, State},
    Json,
};
use std::collections::BTreeMap;

use coldcall_api::{
    db, CallerDashboard, DailyStats, DashboardResponse, OutcomeStatsResponse, OutcomeTotals,
    Overview, PlannerQuery, PlannerRegion, PlannerResponse, RecentCall, RegionDashboard,
    RegionProgress, RegionStatsQuery, RegionStatsResponse, TopPerformer, TopRegion,
    WeeklyComparison,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{sq_query_map, sq_query_row, Db};

fn require_admin(user: &AuthUser) -> Result<(), ApiErr> {
    if !user.is_admin() {
        return Err(ApiErr::forbidden("admin only"));
    }
    Ok(())
}

fn percent(part: i64, whole: i64) -> i64 {
    if whole > 0 {
        (part as f64 / whole as f64 * 100.0).round() as i64
    } else {
        0
    }
}

// ---------------------------------------------------------------------------
// Outcomes per day
// ---------------------------------------------------------------------------

/// GET /api/stats/outcomes — per-day per-outcome call counts (admin only).
pub async fn outcomes(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<OutcomeStatsResponse>, ApiErr> {
    require_admin(&user)?;

    let conn = db.conn();
    let rows: Vec<(String, String, i64)> =
        sq_query_map(&conn, db::stats::outcomes_by_day(), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .map_err(ApiErr::from_db("outcome stats"))?;

    let mut stats: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
    for (date, outcome, count) in rows {
        stats.entry(date).or_default().insert(outcome, count);
    }

    Ok(Json(OutcomeStatsResponse { stats }))
}

// ---------------------------------------------------------------------------
// Region progress
// ---------------------------------------------------------------------------

/// GET /api/stats/regions — per-region coverage and interest (admin only).
pub async fn regions(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<RegionStatsQuery>,
) -> Result<Json<RegionStatsResponse>, ApiErr> {
    require_admin(&user)?;

    let conn = db.conn();
    let stats: Vec<RegionProgress> = sq_query_map(
        &conn,
        db::stats::region_progress(q.region.as_deref()),
        |row| {
            let total: i64 = row.get(1)?;
            let called: i64 = row.get(2)?;
            let interested: i64 = row.get(3)?;
            Ok(RegionProgress {
                region: row.get(0)?,
                total_practices: total,
                called_practices: called,
                interested_practices: interested,
                not_interested_practices: row.get(4)?,
                callback_practices: row.get(5)?,
                no_answer_practices: row.get(6)?,
                uncalled_practices: total - called,
                coverage_percent: percent(called, total),
                interest_rate: percent(interested, called),
            })
        },
    )
    .map_err(ApiErr::from_db("region stats"))?;

    Ok(Json(RegionStatsResponse { stats }))
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// Zero-fill the last `window` days of a sparse daily series ending `today`.
fn zero_fill_daily(
    rows: Vec<DailyStats>,
    today: chrono::NaiveDate,
    window: i64,
) -> Vec<DailyStats> {
    let by_date: BTreeMap<String, DailyStats> =
        rows.into_iter().map(|r| (r.date.clone(), r)).collect();

    (0..window)
        .rev()
        .map(|back| {
            let date = (today - chrono::Duration::days(back))
                .format("%Y-%m-%d")
                .to_string();
            by_date
                .get(&date)
                .cloned()
                .unwrap_or_else(|| DailyStats::empty(date))
        })
        .collect()
}

fn daily_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyStats> {
    Ok(DailyStats {
        date: row.get(0)?,
        total: row.get(1)?,
        interested: row.get(2)?,
        not_interested: row.get(3)?,
        no_answer: row.get(4)?,
        callback: row.get(5)?,
        order_taken: row.get(6)?,
        other: row.get(7)?,
    })
}

/// GET /api/stats/dashboard — the full admin dashboard payload.
pub async fn dashboard(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<DashboardResponse>, ApiErr> {
    require_admin(&user)?;

    let conn = db.conn();
    let count = |built| sq_query_row(&conn, built, |row| row.get::<_, i64>(0));

    // 1. Overview
    let total_practices = count(db::stats::count_practices()).map_err(ApiErr::from_db("counts"))?;
    let total_calls = count(db::stats::count_calls()).map_err(ApiErr::from_db("counts"))?;
    let outcomes: OutcomeTotals = sq_query_row(&conn, db::stats::outcome_totals(), |row| {
        Ok(OutcomeTotals {
            interested: row.get(0)?,
            not_interested: row.get(1)?,
            no_answer: row.get(2)?,
            callback: row.get(3)?,
            order_taken: row.get(4)?,
        })
    })
    .map_err(ApiErr::from_db("outcome totals"))?;
    let active_callers =
        count(db::stats::active_callers_30d()).map_err(ApiErr::from_db("counts"))?;
    let today_calls = count(db::stats::today_calls()).map_err(ApiErr::from_db("counts"))?;
    let today_capacity = count(db::stats::today_capacity()).map_err(ApiErr::from_db("counts"))?;
    let called_practices =
        count(db::stats::called_practices()).map_err(ApiErr::from_db("counts"))?;
    let pending_callbacks =
        count(db::stats::pending_callbacks()).map_err(ApiErr::from_db("counts"))?;

    let overview = Overview {
        total_practices,
        total_calls,
        interested_rate: percent(outcomes.interested, total_calls),
        active_callers,
        today_calls,
        today_capacity,
        overall_coverage: percent(called_practices, total_practices),
        pending_callbacks,
    };

    // 2. Regions
    let regions: Vec<RegionDashboard> = sq_query_map(&conn, db::stats::region_rollup(), |row| {
        let total: i64 = row.get(1)?;
        let called: i64 = row.get(2)?;
        let interested: i64 = row.get(3)?;
        let not_interested: i64 = row.get(4)?;
        let no_answer: i64 = row.get(5)?;
        let callback: i64 = row.get(6)?;
        let outcome_sum = interested + not_interested + no_answer + callback;
        Ok(RegionDashboard {
            region: row.get(0)?,
            total,
            called,
            interested,
            not_interested,
            no_answer,
            callback,
            order_taken: row.get(7)?,
            coverage_percent: percent(called, total),
            interest_rate: percent(interested, outcome_sum),
        })
    })
    .map_err(ApiErr::from_db("region rollup"))?;

    // 3. Callers
    let callers: Vec<CallerDashboard> = sq_query_map(&conn, db::stats::caller_rollup(), |row| {
        let total_calls: i64 = row.get(3)?;
        let days_active: i64 = row.get(10)?;
        let avg_per_day = if days_active > 0 {
            (total_calls as f64 / days_active as f64).round() as i64
        } else {
            0
        };
        Ok(CallerDashboard {
            id: row.get(0)?,
            username: row.get(1)?,
            daily_target: row.get(2)?,
            total_calls,
            today_calls: row.get(4)?,
            interested: row.get(5)?,
            not_interested: row.get(6)?,
            no_answer: row.get(7)?,
            callback: row.get(8)?,
            order_taken: row.get(9)?,
            days_active,
            avg_per_day,
        })
    })
    .map_err(ApiErr::from_db("caller rollup"))?;

    // 4. Daily series, zero-filled over the last 30 days
    let sparse = sq_query_map(&conn, db::stats::daily_series_30d(), daily_from_row)
        .map_err(ApiErr::from_db("daily series"))?;
    let daily_stats = zero_fill_daily(sparse, chrono::Local::now().date_naive(), 30);

    // 5. Recent calls
    let recent_calls: Vec<RecentCall> = sq_query_map(&conn, db::stats::recent_calls(20), |row| {
        Ok(RecentCall {
            id: row.get(0)?,
            called_at: row.get(1)?,
            caller_name: row.get(2)?,
            practice_name: row.get(3)?,
            region: row.get(4)?,
            outcome: row.get(5)?,
            notes: row.get(6)?,
        })
    })
    .map_err(ApiErr::from_db("recent calls"))?;

    // 6. Week-over-week
    let this_week = count(db::stats::this_week_calls()).map_err(ApiErr::from_db("weekly"))?;
    let last_week = count(db::stats::last_week_calls()).map_err(ApiErr::from_db("weekly"))?;
    let change_percent = if last_week > 0 {
        percent(this_week - last_week, last_week)
    } else if this_week > 0 {
        100
    } else {
        0
    };

    // 7. Top performers / regions
    let mut top_performers: Vec<TopPerformer> = callers
        .iter()
        .filter(|c| c.total_calls > 0)
        .map(|c| TopPerformer {
            username: c.username.clone(),
            interested: c.interested,
        })
        .collect();
    top_performers.sort_by(|a, b| b.interested.cmp(&a.interested));
    top_performers.truncate(3);

    let mut top_regions: Vec<TopRegion> = regions
        .iter()
        .filter(|r| r.interested + r.not_interested + r.no_answer + r.callback >= 10)
        .map(|r| TopRegion {
            region: r.region.clone(),
            interest_rate: r.interest_rate,
        })
        .collect();
    top_regions.sort_by(|a, b| b.interest_rate.cmp(&a.interest_rate));
    top_regions.truncate(3);

    Ok(Json(DashboardResponse {
        overview,
        regions,
        callers,
        daily_stats,
        outcomes,
        recent_calls,
        weekly: WeeklyComparison {
            this_week,
            last_week,
            change_percent,
        },
        top_performers,
        top_regions,
    }))
}

// ---------------------------------------------------------------------------
// Schedule planner
// ---------------------------------------------------------------------------

fn days_since(date: &str, today: chrono::NaiveDate) -> Option<i64> {
    let day = chrono::NaiveDate::parse_from_str(&date[..10.min(date.len())], "%Y-%m-%d").ok()?;
    Some((today - day).num_days())
}

/// GET /api/stats/planner — per-region availability for planning the next
/// call window (admin only).
pub async fn planner(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<PlannerQuery>,
) -> Result<Json<PlannerResponse>, ApiErr> {
    require_admin(&user)?;

    let today = chrono::Local::now().date_naive();
    let conn = db.conn();
    let regions: Vec<PlannerRegion> = sq_query_map(
        &conn,
        db::stats::planner(q.exclude_days.min(365)),
        |row| {
            let total: i64 = row.get(1)?;
            let called: i64 = row.get(2)?;
            let interested: i64 = row.get(3)?;
            let last_called: Option<String> = row.get(7)?;
            Ok(PlannerRegion {
                region: row.get(0)?,
                total_practices: total,
                called_practices: called,
                coverage_percent: percent(called, total),
                interested,
                not_interested: row.get(4)?,
                no_answer: row.get(5)?,
                callbacks_pending: row.get(6)?,
                interest_rate: percent(interested, called),
                days_since_last: last_called.as_deref().and_then(|d| days_since(d, today)),
                last_called,
                available_practices: row.get(8)?,
                preferred_available: row.get(9)?,
            })
        },
    )
    .map_err(ApiErr::from_db("planner"))?;

    Ok(Json(PlannerResponse { regions }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_and_handles_zero() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(5, 0), 0);
    }

    #[test]
    fn zero_fill_pads_missing_days() {
        let today = chrono::NaiveDate::from_ymd_opt(2025, 4, 10).unwrap();
        let mut row = DailyStats::empty("2025-04-09".to_string());
        row.total = 7;
        let filled = zero_fill_daily(vec![row], today, 5);

        assert_eq!(filled.len(), 5);
        assert_eq!(filled[0].date, "2025-04-06");
        assert_eq!(filled[4].date, "2025-04-10");
        assert_eq!(filled[3].total, 7);
        assert!(filled.iter().filter(|d| d.total == 0).count() == 4);
    }

    #[test]
    fn days_since_parses_datetime_prefix() {
        let today = chrono::NaiveDate::from_ymd_opt(2025, 4, 10).unwrap();
        assert_eq!(days_since("2025-04-01 09:30:00", today), Some(9));
        assert_eq!(days_since("2025-04-10", today), Some(0));
        assert_eq!(days_since("garbage", today), None);
    }
}
