//! StaffHub Backend Library
//!
//! Exposes the auth core and HTTP middleware for the server binary and the
//! integration tests.

pub mod auth;
pub mod middleware;
