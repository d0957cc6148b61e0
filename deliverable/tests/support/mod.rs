//! Shared helpers for the integration tests
//!
//! Each test binary only pulls in what it uses.

pub mod mock_auth_server;
