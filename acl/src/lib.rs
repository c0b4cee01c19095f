//! Guard-scoped roles and permissions.
//!
//! Decides whether a subject may perform a named action, based on
//! permissions it holds directly or through its roles, scoped by
//! authentication guard.

pub mod config;
pub mod db;
pub mod permissions;
