//! Vendor marketplace HTTP backend: users, vendors, full-text vendor search,
//! saved vendors, bookings, unavailability windows, deals and push
//! notifications over Postgres.

#[macro_use]
extern crate diesel;

pub mod actions;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod push;
pub mod routes;
pub mod schema;
pub mod search;
