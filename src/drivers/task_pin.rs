//! Core-pinned thread spawning for the receive dispatch task.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::Builder::spawn`
//! creates a FreeRTOS task pinned to a specific CPU core with explicit
//! priority and stack size. On non-ESP targets, falls back to plain thread
//! spawn.
//!
//! # ESP-IDF Threading Model
//!
//! ESP-IDF implements `std::thread` via pthreads, which are thin wrappers
//! around FreeRTOS tasks. `esp_pthread_set_cfg()` sets thread-local
//! configuration that applies to the *next* `pthread_create()` call from
//! the calling thread. This means the config→spawn pair must not be
//! interleaved with other thread creation on the same thread.

use crate::error::{Error, Result};

/// CPU core selection. Single-core parts (ESP32-H2) only have `Pro`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Core {
    /// Let the scheduler pick.
    Any,
    /// Core 0 (PRO_CPU).
    Pro,
}

impl Core {
    #[cfg(target_os = "espidf")]
    fn affinity(self) -> i32 {
        match self {
            Self::Any => esp_idf_sys::tskNO_AFFINITY as i32,
            Self::Pro => 0,
        }
    }
}

/// Spawn a thread pinned to `core` with explicit priority and stack.
///
/// `name` must be a null-terminated string (e.g. `"rx\0"`). Failure to
/// configure or create the task is reported as
/// [`Error::ResourceExhausted`].
#[cfg(target_os = "espidf")]
pub fn spawn_on_core(
    core: Core,
    priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> Result<std::thread::JoinHandle<()>> {
    // SAFETY: the config struct is fully initialised by the IDF helper and
    // `name` is a 'static null-terminated string, as the API requires.
    unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = core.affinity();
        cfg.prio = priority as i32;
        cfg.stack_size = (stack_kb * 1024) as _;
        cfg.thread_name = name.as_ptr() as *const _;
        let ret = esp_idf_sys::esp_pthread_set_cfg(&cfg);
        if ret != esp_idf_sys::ESP_OK as i32 {
            log::error!("task_pin: esp_pthread_set_cfg failed (rc={})", ret);
            return Err(Error::ResourceExhausted("task configuration"));
        }
    }

    let display_name = name.trim_end_matches('\0');
    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        display_name,
        core,
        priority,
        stack_kb
    );

    std::thread::Builder::new()
        .name(display_name.into())
        .spawn(f)
        .map_err(|e| {
            log::error!("task_pin: '{}' creation failed: {}", display_name, e);
            Error::ResourceExhausted("task creation")
        })
}

/// Host threads run unoptimised test code; FreeRTOS-sized stacks are too
/// small for that.
#[cfg(not(target_os = "espidf"))]
const SIM_MIN_STACK: usize = 64 * 1024;

/// Simulation fallback: ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core(
    _core: Core,
    _priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> Result<std::thread::JoinHandle<()>> {
    let display_name = name.trim_end_matches('\0');
    log::info!(
        "Spawning '{}' (sim, no core pinning, stack={}KB)",
        display_name,
        stack_kb
    );

    std::thread::Builder::new()
        .name(display_name.into())
        .stack_size((stack_kb * 1024).max(SIM_MIN_STACK))
        .spawn(f)
        .map_err(|e| {
            log::error!("task_pin: '{}' creation failed: {}", display_name, e);
            Error::ResourceExhausted("task creation")
        })
}
