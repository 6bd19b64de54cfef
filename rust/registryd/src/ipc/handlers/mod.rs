pub mod auth;
pub mod core;
pub mod map;
pub mod parents;
pub mod reports;
pub mod schools;
pub mod students;
