//! Clinic roster
//!
//! Keeps a physical-therapy clinic's employee list in sync with a spreadsheet
//! reachable over HTTP (Apps Script webhook or Sheety), plus a local stub of
//! that spreadsheet for development and tests.

pub mod config;
pub mod errors;
pub mod models;
pub mod roster;
pub mod sheet;
pub mod sync;
