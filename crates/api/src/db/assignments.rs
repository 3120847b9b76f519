//! Assignment query builders.
//!
//! The list and day-stats queries share one dynamically assembled WHERE
//! fragment so both views always agree on which rows are in scope.

use sea_query::{Expr, Query, SqliteQueryBuilder, Value, Values};

use super::tables::{Assignments, Practices};
use super::Built;

/// Row scope for assignment listings and their day-stats rollup.
#[derive(Debug, Default)]
pub struct ListFilter {
    /// Exact day (YYYY-MM-DD).
    pub date: Option<String>,
    /// Inclusive date range; ignored when `date` is set.
    pub range: Option<(String, String)>,
    pub caller_id: Option<String>,
}

/// `(fragment, params)` for `WHERE {fragment}` over the aliased tables
/// `a` (assignments), `p` (practices), `u` (users).
pub fn where_fragment(f: &ListFilter) -> (String, Vec<Value>) {
    let mut clause = String::from("1=1");
    let mut params: Vec<Value> = Vec::new();

    if let Some(ref date) = f.date {
        clause.push_str(" AND DATE(a.date) = ?");
        params.push(date.as_str().into());
    } else if let Some((ref start, ref end)) = f.range {
        clause.push_str(" AND DATE(a.date) >= ? AND DATE(a.date) <= ?");
        params.push(start.as_str().into());
        params.push(end.as_str().into());
    }

    if let Some(ref caller_id) = f.caller_id {
        clause.push_str(" AND a.caller_id = ?");
        params.push(caller_id.as_str().into());
    }

    (clause, params)
}

/// Filtered assignment list joined with practice and caller columns.
pub fn list(f: &ListFilter) -> Built {
    let (clause, params) = where_fragment(f);
    let sql = format!(
        "SELECT a.id, a.date, a.practice_id, a.caller_id, a.completed, a.notes, a.created_at, \
                p.name, p.region, p.phones, p.manager, p.cities_served, \
                u.username \
         FROM assignments a \
         JOIN practices p ON a.practice_id = p.id \
         JOIN users u ON a.caller_id = u.id \
         WHERE {clause} \
         ORDER BY a.date, p.region, p.name"
    );
    (sql, Values(params))
}

// ── Inserts / deletes ──────────────────────────────────────────────────────

pub fn insert(id: &str, date: &str, practice_id: &str, caller_id: &str) -> Built {
    Query::insert()
        .into_table(Assignments::Table)
        .columns([
            Assignments::Id,
            Assignments::Date,
            Assignments::PracticeId,
            Assignments::CallerId,
        ])
        .values_panic([
            id.into(),
            date.into(),
            practice_id.into(),
            caller_id.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Clear an inclusive date window before regeneration.
pub fn clear_window(start: &str, end: &str) -> Built {
    let sql = "DELETE FROM assignments WHERE DATE(date) >= ? AND DATE(date) <= ?".to_string();
    (sql, Values(vec![start.into(), end.into()]))
}

/// Targeted deletion: by day, by range, optionally restricted to a region.
pub fn delete_filtered(
    date: Option<&str>,
    range: Option<(&str, &str)>,
    region: Option<&str>,
) -> Built {
    let mut clause = String::from("1=1");
    let mut params: Vec<Value> = Vec::new();

    if let Some(date) = date {
        clause.push_str(" AND DATE(date) = ?");
        params.push(date.into());
    } else if let Some((start, end)) = range {
        clause.push_str(" AND DATE(date) >= ? AND DATE(date) <= ?");
        params.push(start.into());
        params.push(end.into());
    }

    if let Some(region) = region {
        clause.push_str(" AND practice_id IN (SELECT id FROM practices WHERE region = ?)");
        params.push(region.into());
    }

    (
        format!("DELETE FROM assignments WHERE {clause}"),
        Values(params),
    )
}

/// Drop every assignment held by a caller (account deletion).
pub fn delete_all_for(caller_id: &str) -> Built {
    Query::delete()
        .from_table(Assignments::Table)
        .and_where(Expr::col(Assignments::CallerId).eq(caller_id))
        .build(SqliteQueryBuilder)
}

/// Drop a deactivated caller's remaining workload.
pub fn delete_future_for(caller_id: &str) -> Built {
    Query::delete()
        .from_table(Assignments::Table)
        .and_where(Expr::col(Assignments::CallerId).eq(caller_id))
        .and_where(Expr::cust("date >= DATE('now')"))
        .build(SqliteQueryBuilder)
}

// ── Schedule generation ────────────────────────────────────────────────────

/// Candidate practices for a call window, excluding anything already closed
/// out, prioritized: pending callbacks first, then never-called, then
/// least-recently-called.
pub fn candidates(regions: Option<&[String]>, cities: Option<&[String]>) -> Built {
    let mut clause = String::from("1=1");
    let mut params: Vec<Value> = Vec::new();

    if let Some(regions) = regions.filter(|r| !r.is_empty()) {
        let placeholders = regions.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        clause.push_str(&format!(" AND p.region IN ({placeholders})"));
        params.extend(regions.iter().map(|r| Value::from(r.as_str())));
    }

    if let Some(cities) = cities.filter(|c| !c.is_empty()) {
        let likes = cities
            .iter()
            .map(|_| "p.cities_served LIKE ?")
            .collect::<Vec<_>>()
            .join(" OR ");
        clause.push_str(&format!(" AND ({likes})"));
        params.extend(cities.iter().map(|c| Value::from(format!("%{c}%"))));
    }

    let sql = format!(
        "SELECT p.id, p.region, \
                MAX(c.called_at) AS last_called, \
                MAX(CASE WHEN c.outcome = 'CALLBACK' THEN 1 ELSE 0 END) AS has_callback, \
                MAX(CASE WHEN c.outcome = 'INTERESTED' THEN 1 ELSE 0 END) AS already_interested, \
                MAX(CASE WHEN c.outcome = 'NOT_INTERESTED' THEN 1 ELSE 0 END) AS already_rejected \
         FROM practices p \
         LEFT JOIN calls c ON c.practice_id = p.id \
         WHERE {clause} \
         GROUP BY p.id \
         HAVING already_interested = 0 AND already_rejected = 0 \
         ORDER BY has_callback DESC, last_called IS NULL DESC, last_called ASC"
    );
    (sql, Values(params))
}

// ── Campaign derivation ────────────────────────────────────────────────────

/// Per-day assignment totals with the regions touched, oldest first. The
/// campaign grouping over these rows happens in Rust.
pub fn campaign_dates() -> Built {
    let sql = "SELECT DATE(a.date) AS date, \
                      COUNT(*) AS total, \
                      SUM(CASE WHEN a.completed = 1 THEN 1 ELSE 0 END) AS completed, \
                      GROUP_CONCAT(DISTINCT p.region) AS regions \
               FROM assignments a \
               JOIN practices p ON a.practice_id = p.id \
               GROUP BY DATE(a.date) \
               ORDER BY DATE(a.date) ASC"
        .to_string();
    (sql, Values(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_fragment_prefers_exact_date_over_range() {
        let f = ListFilter {
            date: Some("2025-04-01".into()),
            range: Some(("2025-04-01".into(), "2025-04-07".into())),
            caller_id: None,
        };
        let (clause, params) = where_fragment(&f);
        assert_eq!(clause, "1=1 AND DATE(a.date) = ?");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn where_fragment_combines_range_and_caller() {
        let f = ListFilter {
            date: None,
            range: Some(("2025-04-01".into(), "2025-04-07".into())),
            caller_id: Some("u1".into()),
        };
        let (clause, params) = where_fragment(&f);
        assert_eq!(
            clause,
            "1=1 AND DATE(a.date) >= ? AND DATE(a.date) <= ? AND a.caller_id = ?"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn candidates_builds_region_and_city_filters() {
        let regions = vec!["Sofia".to_string(), "Plovdiv".to_string()];
        let cities = vec!["Bansko".to_string()];
        let (sql, values) = candidates(Some(&regions), Some(&cities));
        assert!(sql.contains("p.region IN (?,?)"));
        assert!(sql.contains("p.cities_served LIKE ?"));
        assert_eq!(values.0.len(), 3);

        let (sql, values) = candidates(None, None);
        assert!(!sql.contains("IN ("));
        assert!(values.0.is_empty());
    }
}
