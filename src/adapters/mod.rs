//! Adapters: concrete implementations of the platform ports.
//!
//! | Adapter     | Implements    | Connects to                  |
//! |-------------|---------------|------------------------------|
//! | `esp_radio` | RadioDriver   | `esp_ieee802154` driver + ISR callbacks |
//! | `time`      | —             | `esp_timer` / host monotonic clock |

#[cfg(target_os = "espidf")]
pub mod esp_radio;
pub mod time;
