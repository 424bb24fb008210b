//! Integration tests module
//!
//! This module provides end-to-end integration tests for the travel monitor,
//! including:
//! - Record files → import pipeline → worker store
//! - Framed packets over real and in-memory streams
//! - Worker handshake and command handling
//! - Coordinator startup, queries and shutdown with real worker processes

pub mod coordinator_test;
pub mod fixtures;
pub mod import_test;
pub mod protocol_test;
pub mod worker_test;
