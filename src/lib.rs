//! IEEE 802.15.4 transceiver for the ESP32-C6/H2 radio.
//!
//! Bridges the radio's interrupt-driven driver and application tasks:
//!
//! ```text
//!  radio ISR ─▶ relay ─▶ RxQueue (8) ─▶ dispatch task ─▶ decode ─▶ rx callback
//!                                                                     │
//!  completion ISR ◀── radio ◀── transmit ◀────────────────────────────┘
//!        │
//!        └─▶ TxComplete ─▶ wait_transmit_done ─▶ set_channel / resume_listening
//! ```
//!
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`;
//! on the host the same core runs against mock radios for testing.
//!
//! Target builds need the `espidf` feature, which pulls in the ESP-IDF
//! bindings and the `critical-section` implementation:
//!
//! ```text
//! cargo build --release --features espidf --target riscv32imac-esp-espidf
//! ```

#![deny(unused_must_use)]

#[cfg(all(target_os = "espidf", not(feature = "espidf")))]
compile_error!("building for ESP-IDF requires the `espidf` feature");

pub mod adapters;
pub mod config;
pub mod drivers;
pub mod frame;
pub mod radio;
pub mod transceiver;

mod error;

pub use config::TransceiverConfig;
pub use error::{Error, Result};
pub use transceiver::{Handle, State, Transceiver};
