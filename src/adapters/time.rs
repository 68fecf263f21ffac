//! Monotonic microsecond clock.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()`, which is
//!   safe to call from interrupt context.
//! - **`not(target_os = "espidf")`**: uses a process-wide
//!   `std::time::Instant` epoch for host-side testing and simulation.

/// Microseconds since boot (monotonic).
#[cfg(target_os = "espidf")]
pub fn uptime_us() -> u64 {
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
}

/// Microseconds since first use (monotonic).
#[cfg(not(target_os = "espidf"))]
pub fn uptime_us() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64
}
