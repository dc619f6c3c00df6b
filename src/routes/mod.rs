//! Router Module Index
//!
//! Routes grouped by the access class the guard assigns to their paths. Every router
//! here is mounted behind the route guard; the grouping documents the requirement,
//! the guard enforces it.

/// Allowlisted paths reachable without a session.
pub mod public;

/// Default-protected paths: any session will do.
pub mod authenticated;

/// Paths under `/user`: role `user` or `admin`.
pub mod user;

/// Paths under `/admin`: role `admin` only.
pub mod admin;
