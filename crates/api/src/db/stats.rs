//! Reporting queries.
//!
//! These are aggregation-heavy (grouped CASE sums, correlated subqueries),
//! so they stay as raw SQL rather than fighting the query builder.

use sea_query::{Value, Values};

use super::assignments::{where_fragment, ListFilter};
use super::Built;

// ── Calendar outcomes ──────────────────────────────────────────────────────

/// Per-day per-outcome call counts, newest day first.
pub fn outcomes_by_day() -> Built {
    let sql = "SELECT DATE(called_at) AS date, outcome, COUNT(*) AS count \
               FROM calls \
               GROUP BY DATE(called_at), outcome \
               ORDER BY DATE(called_at) DESC \
               LIMIT 500"
        .to_string();
    (sql, Values(Vec::new()))
}

// ── Region progress ────────────────────────────────────────────────────────

/// Per-region coverage: distinct practices reached per outcome.
pub fn region_progress(region: Option<&str>) -> Built {
    let mut params: Vec<Value> = Vec::new();
    let clause = if let Some(region) = region {
        params.push(region.into());
        "WHERE p.region = ?"
    } else {
        ""
    };

    let sql = format!(
        "SELECT p.region, \
                COUNT(DISTINCT p.id) AS total_practices, \
                COUNT(DISTINCT CASE WHEN c.id IS NOT NULL THEN p.id END) AS called_practices, \
                COUNT(DISTINCT CASE WHEN c.outcome = 'INTERESTED' THEN p.id END) AS interested_practices, \
                COUNT(DISTINCT CASE WHEN c.outcome = 'NOT_INTERESTED' THEN p.id END) AS not_interested_practices, \
                COUNT(DISTINCT CASE WHEN c.outcome = 'CALLBACK' THEN p.id END) AS callback_practices, \
                COUNT(DISTINCT CASE WHEN c.outcome = 'NO_ANSWER' THEN p.id END) AS no_answer_practices \
         FROM practices p \
         LEFT JOIN calls c ON p.id = c.practice_id \
         {clause} \
         GROUP BY p.region \
         ORDER BY p.region"
    );
    (sql, Values(params))
}

// ── Dashboard scalars ──────────────────────────────────────────────────────

pub fn count_practices() -> Built {
    ("SELECT COUNT(*) FROM practices".to_string(), Values(vec![]))
}

pub fn count_calls() -> Built {
    ("SELECT COUNT(*) FROM calls".to_string(), Values(vec![]))
}

/// One row: totals per outcome across all calls.
pub fn outcome_totals() -> Built {
    let sql = "SELECT \
                 COALESCE(SUM(CASE WHEN outcome = 'INTERESTED' THEN 1 ELSE 0 END), 0), \
                 COALESCE(SUM(CASE WHEN outcome = 'NOT_INTERESTED' THEN 1 ELSE 0 END), 0), \
                 COALESCE(SUM(CASE WHEN outcome = 'NO_ANSWER' THEN 1 ELSE 0 END), 0), \
                 COALESCE(SUM(CASE WHEN outcome = 'CALLBACK' THEN 1 ELSE 0 END), 0), \
                 COALESCE(SUM(CASE WHEN outcome = 'ORDER_TAKEN' THEN 1 ELSE 0 END), 0) \
               FROM calls"
        .to_string();
    (sql, Values(Vec::new()))
}

/// Distinct callers with any call in the last 30 days.
pub fn active_callers_30d() -> Built {
    let sql = "SELECT COUNT(DISTINCT caller_id) FROM calls \
               WHERE DATE(called_at) >= DATE('now', '-30 days')"
        .to_string();
    (sql, Values(Vec::new()))
}

pub fn today_calls() -> Built {
    let sql = "SELECT COUNT(*) FROM calls WHERE DATE(called_at) = DATE('now')".to_string();
    (sql, Values(Vec::new()))
}

/// Sum of caller daily targets (today's theoretical capacity).
pub fn today_capacity() -> Built {
    let sql = "SELECT COALESCE(SUM(daily_target), 0) FROM users WHERE role = 'CALLER'".to_string();
    (sql, Values(Vec::new()))
}

pub fn called_practices() -> Built {
    let sql = "SELECT COUNT(DISTINCT practice_id) FROM calls".to_string();
    (sql, Values(Vec::new()))
}

/// Practices whose latest terminal state is a callback: a CALLBACK call with
/// no later interested/rejected call.
pub fn pending_callbacks() -> Built {
    let sql = "SELECT COUNT(DISTINCT practice_id) FROM calls c1 \
               WHERE outcome = 'CALLBACK' \
               AND NOT EXISTS ( \
                   SELECT 1 FROM calls c2 \
                   WHERE c2.practice_id = c1.practice_id \
                   AND c2.called_at > c1.called_at \
                   AND c2.outcome IN ('INTERESTED', 'NOT_INTERESTED') \
               )"
        .to_string();
    (sql, Values(Vec::new()))
}

// ── Dashboard rollups ──────────────────────────────────────────────────────

/// Per-region call totals for the dashboard.
pub fn region_rollup() -> Built {
    let sql = "SELECT p.region, \
                      COUNT(DISTINCT p.id) AS total, \
                      COUNT(DISTINCT c.practice_id) AS called, \
                      COALESCE(SUM(CASE WHEN c.outcome = 'INTERESTED' THEN 1 ELSE 0 END), 0) AS interested, \
                      COALESCE(SUM(CASE WHEN c.outcome = 'NOT_INTERESTED' THEN 1 ELSE 0 END), 0) AS not_interested, \
                      COALESCE(SUM(CASE WHEN c.outcome = 'NO_ANSWER' THEN 1 ELSE 0 END), 0) AS no_answer, \
                      COALESCE(SUM(CASE WHEN c.outcome = 'CALLBACK' THEN 1 ELSE 0 END), 0) AS callback, \
                      COALESCE(SUM(CASE WHEN c.outcome = 'ORDER_TAKEN' THEN 1 ELSE 0 END), 0) AS order_taken \
               FROM practices p \
               LEFT JOIN calls c ON p.id = c.practice_id \
               GROUP BY p.region \
               ORDER BY p.region"
        .to_string();
    (sql, Values(Vec::new()))
}

/// Per-caller call totals for the dashboard, busiest first.
pub fn caller_rollup() -> Built {
    let sql = "SELECT u.id, u.username, u.daily_target, \
                      COUNT(c.id) AS total_calls, \
                      COALESCE(SUM(CASE WHEN DATE(c.called_at) = DATE('now') THEN 1 ELSE 0 END), 0) AS today_calls, \
                      COALESCE(SUM(CASE WHEN c.outcome = 'INTERESTED' THEN 1 ELSE 0 END), 0) AS interested, \
                      COALESCE(SUM(CASE WHEN c.outcome = 'NOT_INTERESTED' THEN 1 ELSE 0 END), 0) AS not_interested, \
                      COALESCE(SUM(CASE WHEN c.outcome = 'NO_ANSWER' THEN 1 ELSE 0 END), 0) AS no_answer, \
                      COALESCE(SUM(CASE WHEN c.outcome = 'CALLBACK' THEN 1 ELSE 0 END), 0) AS callback, \
                      COALESCE(SUM(CASE WHEN c.outcome = 'ORDER_TAKEN' THEN 1 ELSE 0 END), 0) AS order_taken, \
                      COUNT(DISTINCT DATE(c.called_at)) AS days_active \
               FROM users u \
               LEFT JOIN calls c ON u.id = c.caller_id \
               WHERE u.role = 'CALLER' \
               GROUP BY u.id \
               ORDER BY COUNT(c.id) DESC"
        .to_string();
    (sql, Values(Vec::new()))
}

/// Daily call series over the last 30 days, oldest first. Days without
/// calls are absent; the server zero-fills them.
pub fn daily_series_30d() -> Built {
    let sql = "SELECT DATE(called_at) AS date, \
                      COUNT(*) AS total, \
                      COALESCE(SUM(CASE WHEN outcome = 'INTERESTED' THEN 1 ELSE 0 END), 0) AS interested, \
                      COALESCE(SUM(CASE WHEN outcome = 'NOT_INTERESTED' THEN 1 ELSE 0 END), 0) AS not_interested, \
                      COALESCE(SUM(CASE WHEN outcome = 'NO_ANSWER' THEN 1 ELSE 0 END), 0) AS no_answer, \
                      COALESCE(SUM(CASE WHEN outcome = 'CALLBACK' THEN 1 ELSE 0 END), 0) AS callback, \
                      COALESCE(SUM(CASE WHEN outcome = 'ORDER_TAKEN' THEN 1 ELSE 0 END), 0) AS order_taken, \
                      COALESCE(SUM(CASE WHEN outcome NOT IN ('INTERESTED', 'NOT_INTERESTED', 'NO_ANSWER', 'CALLBACK', 'ORDER_TAKEN') THEN 1 ELSE 0 END), 0) AS other \
               FROM calls \
               WHERE DATE(called_at) >= DATE('now', '-30 days') \
               GROUP BY DATE(called_at) \
               ORDER BY DATE(called_at) ASC"
        .to_string();
    (sql, Values(Vec::new()))
}

/// Most recent calls joined with caller and practice columns.
pub fn recent_calls(limit: u32) -> Built {
    let sql = "SELECT c.id, c.called_at, u.username, p.name, p.region, c.outcome, c.notes \
               FROM calls c \
               JOIN users u ON c.caller_id = u.id \
               JOIN practices p ON c.practice_id = p.id \
               ORDER BY c.called_at DESC \
               LIMIT ?"
        .to_string();
    (sql, Values(vec![(limit as i64).into()]))
}

/// Calls since the start of the current week (Sunday).
pub fn this_week_calls() -> Built {
    let sql = "SELECT COUNT(*) FROM calls \
               WHERE DATE(called_at) >= DATE('now', 'weekday 0', '-7 days')"
        .to_string();
    (sql, Values(Vec::new()))
}

/// Calls in the week before the current one.
pub fn last_week_calls() -> Built {
    let sql = "SELECT COUNT(*) FROM calls \
               WHERE DATE(called_at) >= DATE('now', 'weekday 0', '-14 days') \
               AND DATE(called_at) < DATE('now', 'weekday 0', '-7 days')"
        .to_string();
    (sql, Values(Vec::new()))
}

// ── Assignment day stats ───────────────────────────────────────────────────

/// Per-day, per-region, per-caller assignment completion breakdown, with the
/// latest call outcome per practice folded in. Shares its WHERE fragment
/// with [`super::assignments::list`].
pub fn assignment_day_stats(filter: &ListFilter) -> Built {
    let (clause, params) = where_fragment(filter);
    let sql = format!(
        "SELECT DATE(a.date) AS date, \
                p.region, \
                u.username AS caller_name, \
                a.caller_id, \
                COUNT(*) AS total, \
                COALESCE(SUM(CASE WHEN a.completed = 1 THEN 1 ELSE 0 END), 0) AS completed, \
                COALESCE(SUM(CASE WHEN a.completed = 1 AND c.outcome = 'INTERESTED' THEN 1 ELSE 0 END), 0) AS interested, \
                COALESCE(SUM(CASE WHEN a.completed = 1 AND c.outcome = 'NOT_INTERESTED' THEN 1 ELSE 0 END), 0) AS not_interested, \
                COALESCE(SUM(CASE WHEN a.completed = 1 AND c.outcome = 'NO_ANSWER' THEN 1 ELSE 0 END), 0) AS no_answer, \
                COALESCE(SUM(CASE WHEN a.completed = 1 AND c.outcome = 'CALLBACK' THEN 1 ELSE 0 END), 0) AS callback, \
                COALESCE(SUM(CASE WHEN a.completed = 1 AND (c.outcome IS NULL OR c.outcome NOT IN ('INTERESTED', 'NOT_INTERESTED', 'NO_ANSWER', 'CALLBACK')) THEN 1 ELSE 0 END), 0) AS other \
         FROM assignments a \
         JOIN practices p ON a.practice_id = p.id \
         JOIN users u ON a.caller_id = u.id \
         LEFT JOIN ( \
             SELECT practice_id, outcome \
             FROM calls c1 \
             WHERE called_at = ( \
                 SELECT MAX(called_at) FROM calls c2 WHERE c2.practice_id = c1.practice_id \
             ) \
         ) c ON a.practice_id = c.practice_id \
         WHERE {clause} \
         GROUP BY DATE(a.date), p.region, a.caller_id \
         ORDER BY DATE(a.date), p.region"
    );
    (sql, Values(params))
}

// ── Schedule planner ───────────────────────────────────────────────────────

/// Per-region availability for planning a call window. `exclude_days > 0`
/// additionally treats recently-called practices as unavailable.
pub fn planner(exclude_days: u32) -> Built {
    let mut params: Vec<Value> = Vec::new();
    let cooldown = if exclude_days > 0 {
        let modifier = format!("-{exclude_days} days");
        params.push(Value::from(modifier.clone()));
        params.push(Value::from(modifier));
        "AND p2.id NOT IN ( \
             SELECT practice_id FROM calls WHERE DATE(called_at) > DATE('now', ?) \
         )"
    } else {
        ""
    };
    // Two subqueries consume the cooldown in the same position, so the
    // parameter is pushed twice above when active.
    let cooldown_preferred = if exclude_days > 0 {
        "AND p3.id NOT IN ( \
             SELECT practice_id FROM calls WHERE DATE(called_at) > DATE('now', ?) \
         )"
    } else {
        ""
    };

    let sql = format!(
        "WITH latest_calls AS ( \
             SELECT practice_id, outcome, called_at \
             FROM calls c1 \
             WHERE called_at = ( \
                 SELECT MAX(called_at) FROM calls c2 WHERE c2.practice_id = c1.practice_id \
             ) \
         ), \
         region_summary AS ( \
             SELECT p.region, \
                    COUNT(DISTINCT p.id) AS total_practices, \
                    COUNT(DISTINCT lc.practice_id) AS called_practices, \
                    COALESCE(SUM(CASE WHEN lc.outcome = 'INTERESTED' THEN 1 ELSE 0 END), 0) AS interested, \
                    COALESCE(SUM(CASE WHEN lc.outcome = 'NOT_INTERESTED' THEN 1 ELSE 0 END), 0) AS not_interested, \
                    COALESCE(SUM(CASE WHEN lc.outcome = 'NO_ANSWER' THEN 1 ELSE 0 END), 0) AS no_answer, \
                    COALESCE(SUM(CASE WHEN lc.outcome = 'CALLBACK' THEN 1 ELSE 0 END), 0) AS callbacks_pending, \
                    MAX(lc.called_at) AS last_called \
             FROM practices p \
             LEFT JOIN latest_calls lc ON p.id = lc.practice_id \
             GROUP BY p.region \
         ) \
         SELECT rs.region, rs.total_practices, rs.called_practices, \
                rs.interested, rs.not_interested, rs.no_answer, rs.callbacks_pending, \
                rs.last_called, \
                (SELECT COUNT(*) FROM practices p2 \
                 WHERE p2.region = rs.region \
                 AND p2.id NOT IN ( \
                     SELECT practice_id FROM calls \
                     WHERE outcome IN ('INTERESTED', 'NOT_INTERESTED') \
                 ) \
                 {cooldown} \
                ) AS available_practices, \
                (SELECT COUNT(*) FROM practices p3 \
                 WHERE p3.region = rs.region \
                 AND p3.preferred_caller_id IS NOT NULL \
                 AND p3.id NOT IN ( \
                     SELECT practice_id FROM calls \
                     WHERE outcome IN ('INTERESTED', 'NOT_INTERESTED') \
                 ) \
                 {cooldown_preferred} \
                ) AS preferred_available \
         FROM region_summary rs \
         ORDER BY rs.region"
    );
    (sql, Values(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planner_binds_cooldown_twice_when_active() {
        let (sql, values) = planner(7);
        assert_eq!(values.0.len(), 2);
        assert_eq!(sql.matches("DATE('now', ?)").count(), 2);

        let (sql, values) = planner(0);
        assert!(values.0.is_empty());
        assert!(!sql.contains("DATE('now', ?)"));
    }

    #[test]
    fn region_progress_filter_is_optional() {
        let (sql, values) = region_progress(Some("Sofia"));
        assert!(sql.contains("WHERE p.region = ?"));
        assert_eq!(values.0.len(), 1);

        let (sql, values) = region_progress(None);
        assert!(!sql.contains("WHERE p.region"));
        assert!(values.0.is_empty());
    }
}
