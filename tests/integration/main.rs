//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters. All tests run on the host with no radio or
//! flash required.

mod mock_hw;
mod provisioning_flow_tests;
mod service_tests;
