//! Unit tests for CLI configuration and command wiring.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;

mod serve_unit;
