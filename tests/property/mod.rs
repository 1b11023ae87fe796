// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Properties of identity derivation and idempotent projection that must
//! hold for all inputs.

mod idempotence;
