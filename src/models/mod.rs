//! Data models for the clinic roster.
//!
//! One canonical shape; each backend dialect maps it to its own wire rows.

mod employee;

pub use employee::*;
