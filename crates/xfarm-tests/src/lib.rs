//! Scenario and adversarial test suite for XFarm.
//!
//! This crate contains integration tests that drive the farm facade end to
//! end and try to break its accounting invariants under randomized inputs.

pub mod helpers;
