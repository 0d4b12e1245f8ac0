//! Newsdesk - a content management system for a student newsroom
//!
//! Public news site, admin console, and the JSON API behind both. Accounts
//! and media storage live on a hosted platform; everything else is in the
//! local database.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod platform;
pub mod services;
pub mod theme;
