//! Device registry aggregate
//!
//! Tracks which boards exist, where they are installed, their per-switch
//! rated power (input for duration-based estimates) and when they were
//! last heard from.

pub mod model;
pub mod repository;

pub use model::{Device, DeviceStatus};
pub use repository::DeviceRepository;
