//! QA tracker server library.
//!
//! Test case definitions, run sessions and the execution tracker that records
//! step progress and verdicts, exposed over an actix-web API.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
pub mod tracker;
