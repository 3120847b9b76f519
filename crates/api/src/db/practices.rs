//! Practice query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder, Values};

use super::tables::Practices;
use super::Built;
use crate::PracticeListQuery;

/// Result of building a paginated practice list query.
pub struct BuiltPracticeListQuery {
    pub count_query: Built,
    pub select_query: Built,
    pub page: u32,
    pub limit: u32,
}

/// Standard practice columns. Column order must match the positional row
/// mapper on the server side.
fn practice_columns(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.columns([
        Practices::Id,
        Practices::Name,
        Practices::Region,
        Practices::Manager,
        Practices::Phones,
        Practices::CitiesServed,
        Practices::PreferredCallerId,
        Practices::CreatedAt,
    ])
}

// ── Listing ────────────────────────────────────────────────────────────────

/// Build paginated practice list queries with dynamic filters.
pub fn list(q: &PracticeListQuery) -> BuiltPracticeListQuery {
    let limit = q.limit.clamp(1, 200);
    let offset = q.page.saturating_sub(1) * limit;

    let mut count_q = Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Practices::Table)
        .to_owned();

    let mut select_q = Query::select().to_owned();
    practice_columns(&mut select_q);
    select_q.from(Practices::Table);

    if let Some(ref region) = q.region {
        let cond = Expr::col(Practices::Region).eq(region.as_str());
        count_q.and_where(cond.clone());
        select_q.and_where(cond);
    }

    if let Some(ref city) = q.city {
        let like = format!("%{city}%");
        let cond = Expr::col(Practices::CitiesServed).like(&like);
        count_q.and_where(cond.clone());
        select_q.and_where(cond);
    }

    if let Some(ref search) = q.search {
        let like = format!("%{search}%");
        let cond = Expr::col(Practices::Name)
            .like(&like)
            .or(Expr::col(Practices::Manager).like(&like))
            .or(Expr::col(Practices::Phones).like(&like));
        count_q.and_where(cond.clone());
        select_q.and_where(cond);
    }

    select_q
        .order_by(Practices::Region, Order::Asc)
        .order_by(Practices::Name, Order::Asc)
        .limit(limit as u64)
        .offset(offset as u64);

    BuiltPracticeListQuery {
        count_query: count_q.build(SqliteQueryBuilder),
        select_query: select_q.build(SqliteQueryBuilder),
        page: q.page,
        limit,
    }
}

/// Most recent call per practice, restricted to the given ids.
/// Raw SQL: the correlated MAX subquery has no clean builder form.
pub fn last_calls(practice_ids: &[String]) -> Built {
    let placeholders = practice_ids
        .iter()
        .map(|_| "?")
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!(
        "SELECT practice_id, outcome, called_at, notes \
         FROM calls \
         WHERE practice_id IN ({placeholders}) \
         AND called_at = (SELECT MAX(called_at) FROM calls c2 WHERE c2.practice_id = calls.practice_id)"
    );
    let values = practice_ids.iter().map(|id| id.as_str().into()).collect();
    (sql, Values(values))
}

// ── CRUD ───────────────────────────────────────────────────────────────────

pub fn get_exists(id: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Practices::Table)
        .and_where(Expr::col(Practices::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn get_by_id(id: &str) -> Built {
    practice_columns(&mut Query::select())
        .from(Practices::Table)
        .and_where(Expr::col(Practices::Id).eq(id))
        .build(SqliteQueryBuilder)
}

pub fn insert(
    id: &str,
    name: &str,
    region: &str,
    manager: Option<&str>,
    phones_json: &str,
    cities_served: Option<&str>,
    preferred_caller_id: Option<&str>,
) -> Built {
    Query::insert()
        .into_table(Practices::Table)
        .columns([
            Practices::Id,
            Practices::Name,
            Practices::Region,
            Practices::Manager,
            Practices::Phones,
            Practices::CitiesServed,
            Practices::PreferredCallerId,
        ])
        .values_panic([
            id.into(),
            name.into(),
            region.into(),
            manager.map(|s| s.to_string()).into(),
            phones_json.into(),
            cities_served.map(|s| s.to_string()).into(),
            preferred_caller_id.map(|s| s.to_string()).into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Validated field set for a partial practice update.
#[derive(Default)]
pub struct UpdateFields<'a> {
    pub name: Option<&'a str>,
    pub region: Option<&'a str>,
    pub cities_served: Option<&'a str>,
    pub manager: Option<&'a str>,
    pub phones_json: Option<&'a str>,
    /// Outer `Some` means "set"; inner `None` clears the column.
    pub preferred_caller_id: Option<Option<&'a str>>,
}

/// Build a partial UPDATE. Returns `None` when no field is set.
pub fn update(id: &str, f: &UpdateFields<'_>) -> Option<Built> {
    let mut q = Query::update().table(Practices::Table).to_owned();
    let mut any = false;

    if let Some(name) = f.name {
        q.value(Practices::Name, name);
        any = true;
    }
    if let Some(region) = f.region {
        q.value(Practices::Region, region);
        any = true;
    }
    if let Some(cities) = f.cities_served {
        q.value(Practices::CitiesServed, cities);
        any = true;
    }
    if let Some(manager) = f.manager {
        q.value(Practices::Manager, manager);
        any = true;
    }
    if let Some(phones) = f.phones_json {
        q.value(Practices::Phones, phones);
        any = true;
    }
    if let Some(preferred) = f.preferred_caller_id {
        q.value(
            Practices::PreferredCallerId,
            preferred.map(|s| s.to_string()),
        );
        any = true;
    }

    if !any {
        return None;
    }
    q.and_where(Expr::col(Practices::Id).eq(id));
    Some(q.build(SqliteQueryBuilder))
}

/// Set (or clear) the preferred caller for exactly the given practice ids.
pub fn bulk_assign(practice_ids: &[String], caller_id: Option<&str>) -> Built {
    Query::update()
        .table(Practices::Table)
        .value(
            Practices::PreferredCallerId,
            caller_id.map(|s| s.to_string()),
        )
        .and_where(Expr::col(Practices::Id).is_in(practice_ids.iter().map(String::as_str)))
        .build(SqliteQueryBuilder)
}

/// Move every practice preferred by `from` to `to`.
pub fn transfer_preferred(from: &str, to: &str) -> Built {
    Query::update()
        .table(Practices::Table)
        .value(Practices::PreferredCallerId, to)
        .and_where(Expr::col(Practices::PreferredCallerId).eq(from))
        .build(SqliteQueryBuilder)
}

/// Clear the preferred caller wherever it points at `user_id`.
pub fn clear_preferred(user_id: &str) -> Built {
    Query::update()
        .table(Practices::Table)
        .value(Practices::PreferredCallerId, Option::<String>::None)
        .and_where(Expr::col(Practices::PreferredCallerId).eq(user_id))
        .build(SqliteQueryBuilder)
}

// ── Regions & cities ───────────────────────────────────────────────────────

/// Distinct region list.
pub fn regions() -> Built {
    Query::select()
        .distinct()
        .column(Practices::Region)
        .from(Practices::Table)
        .order_by(Practices::Region, Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Per-region practice and distinct-city counts.
pub fn region_counts() -> Built {
    Query::select()
        .column(Practices::Region)
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("practice_count"))
        .expr_as(
            Expr::cust("COUNT(DISTINCT cities_served)"),
            Alias::new("city_count"),
        )
        .from(Practices::Table)
        .group_by_col(Practices::Region)
        .order_by(Practices::Region, Order::Asc)
        .build(SqliteQueryBuilder)
}

/// `(id, cities_served)` pairs for one region, feeding the city rollup.
pub fn cities_in_region(region: &str) -> Built {
    Query::select()
        .columns([Practices::Id, Practices::CitiesServed])
        .from(Practices::Table)
        .and_where(Expr::col(Practices::Region).eq(region))
        .build(SqliteQueryBuilder)
}
