//! Shared test utilities for jobgate integration tests.
//!
//! This module provides:
//! - `FakeBackend`, a scripted in-memory `JobBackend`
//! - Builders for snapshots, drafts and wired-up controllers

#![allow(dead_code)]

pub mod builders;
pub mod fake_backend;

pub use builders::*;
pub use fake_backend::FakeBackend;
