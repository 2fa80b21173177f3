// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Randomized operation sequences against a live engine, checked with a
//! full-recount audit and a journal replay.

mod random_operations;
