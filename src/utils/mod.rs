//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod retry;

pub use retry::{with_retry_if, RetryConfig};

/// Format a byte count for log output
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
