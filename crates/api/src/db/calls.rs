//! Call-log query builders.

use sea_query::{Expr, JoinType, Order, Query, SqliteQueryBuilder, Values};

use super::tables::{Assignments, Calls, Practices, Users};
use super::Built;
use crate::CallListQuery;

// ── Listing ────────────────────────────────────────────────────────────────

/// Filtered call list joined with practice name/phones and caller name.
pub fn list(q: &CallListQuery) -> Built {
    let limit = q.limit.clamp(1, 1000);

    let mut select = Query::select()
        .column((Calls::Table, Calls::Id))
        .column((Calls::Table, Calls::PracticeId))
        .column((Calls::Table, Calls::CallerId))
        .column((Calls::Table, Calls::Outcome))
        .column((Calls::Table, Calls::Notes))
        .column((Calls::Table, Calls::CalledAt))
        .column((Practices::Table, Practices::Name))
        .column((Practices::Table, Practices::Phones))
        .column((Users::Table, Users::Username))
        .from(Calls::Table)
        .join(
            JoinType::InnerJoin,
            Practices::Table,
            Expr::col((Practices::Table, Practices::Id))
                .equals((Calls::Table, Calls::PracticeId)),
        )
        .join(
            JoinType::InnerJoin,
            Users::Table,
            Expr::col((Users::Table, Users::Id)).equals((Calls::Table, Calls::CallerId)),
        )
        .to_owned();

    if let Some(ref practice_id) = q.practice_id {
        select.and_where(Expr::col((Calls::Table, Calls::PracticeId)).eq(practice_id.as_str()));
    }
    if let Some(ref caller_id) = q.caller_id {
        select.and_where(Expr::col((Calls::Table, Calls::CallerId)).eq(caller_id.as_str()));
    }
    if let Some(ref date) = q.date {
        select.and_where(Expr::cust_with_values(
            "DATE(calls.called_at) = ?",
            [date.as_str()],
        ));
    }

    select
        .order_by((Calls::Table, Calls::CalledAt), Order::Desc)
        .limit(limit as u64);

    select.build(SqliteQueryBuilder)
}

// ── CRUD ───────────────────────────────────────────────────────────────────

pub fn insert(
    id: &str,
    practice_id: &str,
    caller_id: &str,
    outcome: &str,
    notes: Option<&str>,
    called_at: &str,
) -> Built {
    Query::insert()
        .into_table(Calls::Table)
        .columns([
            Calls::Id,
            Calls::PracticeId,
            Calls::CallerId,
            Calls::Outcome,
            Calls::Notes,
            Calls::CalledAt,
        ])
        .values_panic([
            id.into(),
            practice_id.into(),
            caller_id.into(),
            outcome.into(),
            notes.map(|s| s.to_string()).into(),
            called_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Caller id of a call (ownership check for edits).
pub fn get_caller(id: &str) -> Built {
    Query::select()
        .column(Calls::CallerId)
        .from(Calls::Table)
        .and_where(Expr::col(Calls::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Build a partial UPDATE of outcome/notes. Returns `None` when neither is set.
pub fn update(id: &str, outcome: Option<&str>, notes: Option<&str>) -> Option<Built> {
    let mut q = Query::update().table(Calls::Table).to_owned();
    let mut any = false;

    if let Some(outcome) = outcome {
        q.value(Calls::Outcome, outcome);
        any = true;
    }
    if let Some(notes) = notes {
        q.value(Calls::Notes, notes);
        any = true;
    }

    if !any {
        return None;
    }
    q.and_where(Expr::col(Calls::Id).eq(id));
    Some(q.build(SqliteQueryBuilder))
}

pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Calls::Table)
        .and_where(Expr::col(Calls::Id).eq(id))
        .build(SqliteQueryBuilder)
}

// ── Assignment sync on logged call ─────────────────────────────────────────

/// Mark every pending assignment for the practice completed. A logged call
/// settles the assignment regardless of date or assigned caller.
pub fn complete_pending_assignments(practice_id: &str) -> Built {
    Query::update()
        .table(Assignments::Table)
        .value(Assignments::Completed, 1)
        .and_where(Expr::col(Assignments::PracticeId).eq(practice_id))
        .and_where(Expr::col(Assignments::Completed).eq(0))
        .build(SqliteQueryBuilder)
}

/// Keep the pending assignments' sticky note in sync with the latest call.
pub fn sync_pending_notes(practice_id: &str, notes: Option<&str>) -> Built {
    Query::update()
        .table(Assignments::Table)
        .value(Assignments::Notes, notes.map(|s| s.to_string()))
        .and_where(Expr::col(Assignments::PracticeId).eq(practice_id))
        .and_where(Expr::col(Assignments::Completed).eq(0))
        .build(SqliteQueryBuilder)
}

// ── Availability ───────────────────────────────────────────────────────────

/// Practices that are closed out: a call already landed on a terminal
/// outcome (interested or rejected).
pub fn unavailable_practices() -> Built {
    Query::select()
        .distinct()
        .column(Calls::PracticeId)
        .from(Calls::Table)
        .and_where(Expr::col(Calls::Outcome).is_in(["INTERESTED", "NOT_INTERESTED"]))
        .build(SqliteQueryBuilder)
}

/// Per-outcome call counts over an inclusive date range.
pub fn outcome_counts_between(start: &str, end: &str) -> Built {
    let sql = "SELECT outcome, COUNT(*) AS count \
               FROM calls \
               WHERE DATE(called_at) >= ? AND DATE(called_at) <= ? \
               GROUP BY outcome"
        .to_string();
    (sql, Values(vec![start.into(), end.into()]))
}
