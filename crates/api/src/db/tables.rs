//! Compile-time–checked column identifiers for all tables.

use sea_query::Iden;

#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Username,
    DisplayName,
    PasswordHash,
    PasswordSalt,
    Role,
    DailyTarget,
    MustResetPassword,
    CreatedAt,
}

#[derive(Iden)]
pub enum Practices {
    Table,
    Id,
    Name,
    Region,
    Manager,
    Phones,
    CitiesServed,
    PreferredCallerId,
    CreatedAt,
}

#[derive(Iden)]
pub enum Calls {
    Table,
    Id,
    PracticeId,
    CallerId,
    Outcome,
    Notes,
    CalledAt,
}

#[derive(Iden)]
pub enum Assignments {
    Table,
    Id,
    Date,
    PracticeId,
    CallerId,
    Completed,
    Notes,
    CreatedAt,
}
