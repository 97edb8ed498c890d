//! Shared CLI/logging/performance wiring for the `gridmaker-*` binaries.

pub mod common;
