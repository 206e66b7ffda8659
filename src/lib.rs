#[macro_use]
extern crate diesel;

pub mod actions;
pub mod auth;
pub mod availability;
pub mod booking;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod routes;
pub mod schema;
pub mod search;
pub mod validation;
