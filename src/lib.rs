//! Hakgyo - Korean learning platform backend
//!
//! Courses, articles, vocabulary, tryouts, live classes and push
//! notifications for learners of Korean, served as a JSON API.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod integrations;
pub mod models;
pub mod services;
