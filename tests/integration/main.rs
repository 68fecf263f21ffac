//! Integration test driver for `tests/integration/`.
//!
//! Each `mod` below exercises one part of the transceiver against the mock
//! radio, which stands in for both the driver and its interrupt context.
//! Everything runs on the host with no hardware.

mod lifecycle_tests;
mod mock_radio;
