//! User / auth query builders.

use sea_query::{Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder};

use super::tables::Users;
use super::Built;

// ── Lookups ────────────────────────────────────────────────────────────────

/// Columns backing a `UserSummary`.
fn summary_columns(q: &mut sea_query::SelectStatement) -> &mut sea_query::SelectStatement {
    q.columns([
        Users::Id,
        Users::Username,
        Users::DisplayName,
        Users::Role,
        Users::DailyTarget,
        Users::MustResetPassword,
    ])
}

/// Find a user by id (session check).
pub fn get_session_user(user_id: &str) -> Built {
    summary_columns(&mut Query::select())
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Find a user by username for login. Adds the credential columns after
/// the summary columns.
pub fn get_for_login(username: &str) -> Built {
    summary_columns(&mut Query::select())
        .column(Users::PasswordHash)
        .column(Users::PasswordSalt)
        .from(Users::Table)
        .and_where(Expr::col(Users::Username).eq(username))
        .build(SqliteQueryBuilder)
}

/// Check username existence.
pub fn username_exists(username: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Users::Table)
        .and_where(Expr::col(Users::Username).eq(username))
        .build(SqliteQueryBuilder)
}

/// Check user-id existence.
pub fn exists(user_id: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// List all users without credential fields, newest first.
pub fn list() -> Built {
    Query::select()
        .columns([
            Users::Id,
            Users::Username,
            Users::DisplayName,
            Users::Role,
            Users::DailyTarget,
            Users::CreatedAt,
        ])
        .from(Users::Table)
        .order_by(Users::CreatedAt, Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Callers eligible for schedule generation: role CALLER, daily_target > 0,
/// optionally restricted to specific ids.
pub fn callers_with_targets(caller_ids: Option<&[String]>) -> Built {
    let mut q = Query::select()
        .columns([Users::Id, Users::Username, Users::DailyTarget])
        .from(Users::Table)
        .and_where(Expr::col(Users::Role).eq("CALLER"))
        .and_where(Expr::col(Users::DailyTarget).gt(0))
        .to_owned();
    if let Some(ids) = caller_ids {
        q.and_where(Expr::col(Users::Id).is_in(ids.iter().map(String::as_str)));
    }
    q.build(SqliteQueryBuilder)
}

// ── Inserts ────────────────────────────────────────────────────────────────

/// Insert a user. `must_reset_password` comes from the column default (on),
/// so freshly created accounts are forced through a password reset.
pub fn insert(
    id: &str,
    username: &str,
    display_name: &str,
    password_hash: &str,
    password_salt: &str,
    role: &str,
    daily_target: i64,
) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([
            Users::Id,
            Users::Username,
            Users::DisplayName,
            Users::PasswordHash,
            Users::PasswordSalt,
            Users::Role,
            Users::DailyTarget,
        ])
        .values_panic([
            id.into(),
            username.into(),
            display_name.into(),
            password_hash.into(),
            password_salt.into(),
            role.into(),
            daily_target.into(),
        ])
        .build(SqliteQueryBuilder)
}

// ── Updates ────────────────────────────────────────────────────────────────

/// Validated field set for a partial user update.
#[derive(Default)]
pub struct UpdateFields<'a> {
    pub username: Option<&'a str>,
    pub display_name: Option<&'a str>,
    pub role: Option<&'a str>,
    pub daily_target: Option<i64>,
    /// `(password_hash, password_salt)`.
    pub password: Option<(&'a str, &'a str)>,
}

/// Build a partial UPDATE. Returns `None` when no field is set.
pub fn update(user_id: &str, f: &UpdateFields<'_>) -> Option<Built> {
    let mut q = Query::update().table(Users::Table).to_owned();
    let mut any = false;

    if let Some(username) = f.username {
        q.value(Users::Username, username);
        any = true;
    }
    if let Some(display_name) = f.display_name {
        q.value(Users::DisplayName, display_name);
        any = true;
    }
    if let Some(role) = f.role {
        q.value(Users::Role, role);
        any = true;
    }
    if let Some(target) = f.daily_target {
        q.value(Users::DailyTarget, target);
        any = true;
    }
    if let Some((hash, salt)) = f.password {
        q.value(Users::PasswordHash, hash);
        q.value(Users::PasswordSalt, salt);
        q.value(Users::MustResetPassword, 1);
        any = true;
    }

    if !any {
        return None;
    }
    q.and_where(Expr::col(Users::Id).eq(user_id));
    Some(q.build(SqliteQueryBuilder))
}

/// Update a user's own password, clearing the forced-reset flag.
pub fn update_password(user_id: &str, password_hash: &str, password_salt: &str) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::PasswordHash, password_hash)
        .value(Users::PasswordSalt, password_salt)
        .value(Users::MustResetPassword, 0)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Admin-side password reset: sets new credentials and forces a reset on
/// next login.
pub fn reset_password(username: &str, password_hash: &str, password_salt: &str) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::PasswordHash, password_hash)
        .value(Users::PasswordSalt, password_salt)
        .value(Users::MustResetPassword, 1)
        .and_where(Expr::col(Users::Username).eq(username))
        .build(SqliteQueryBuilder)
}

/// Scramble an account: replace credentials, zero the daily target.
pub fn deactivate(
    user_id: &str,
    username: &str,
    display_name: &str,
    password_hash: &str,
    password_salt: &str,
) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::Username, username)
        .value(Users::DisplayName, display_name)
        .value(Users::PasswordHash, password_hash)
        .value(Users::PasswordSalt, password_salt)
        .value(Users::DailyTarget, 0)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Delete a user row.
pub fn delete(user_id: &str) -> Built {
    Query::delete()
        .from_table(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}
