//! Integration tests for `EventFlow`
//!
//! This crate contains integration tests that verify the interaction between
//! the core pipeline, the in-memory store and the banking example domain.

// This is a test-only crate
#![cfg(test)]
