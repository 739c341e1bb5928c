//! DD-bot - family education backend
//!
//! REST API behind the parent, librarian and admin dashboards, and the
//! recommendation chat children use to find books and videos.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
