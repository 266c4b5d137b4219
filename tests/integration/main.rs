//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock or host-simulation adapters. All tests run on the host
//! (x86_64) with no real hardware required.

mod bootstrap_tests;
mod mock_device;
mod runtime_tests;
mod web_tests;
