// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Entry Point
//!
//! This test suite uses proptest to drive the engine with randomized
//! operation sequences and check the invariants that must hold after any
//! of them.

mod property;
