//! Property-based tests for redis-watchdog.
//!
//! Run with: cargo test --test property_tests
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for the backoff policies and the reconnect loop.
