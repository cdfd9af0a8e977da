//! API handlers module

pub mod dashboard;
pub mod health;
pub mod lists;
pub mod params;
pub mod support;
pub mod users;
