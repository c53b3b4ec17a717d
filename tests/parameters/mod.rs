//! Integration tests for the parameter system
//!
//! These tests exercise the host-side parameter types without an engine.

// Tests for the Parameter record
mod parameter_tests;

// Tests for the Parameters snapshot collection
mod parameters_tests;
