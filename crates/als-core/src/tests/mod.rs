//! Test module for als-core
//!
//! This module contains tests for:
//! - Configuration loading, defaults and anchor parsing
//! - Sample region invariants across all rotations
//! - The capture engine: rotation handling, fallback and timeouts

mod engine_tests;
