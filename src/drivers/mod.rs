//! Task placement helpers.

pub mod task_pin;
