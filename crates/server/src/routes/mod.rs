pub mod admin;
pub mod assignments;
pub mod auth;
pub mod calls;
pub mod campaigns;
pub mod health;
pub mod practices;
pub mod stats;
pub mod users;
