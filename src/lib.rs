#![cfg_attr(not(test), no_std)]

//! Battery module firmware core.
//!
//! The board support code owns the TWI peripheral, the EEPROM and the watchdog. It builds a
//! [`BatteryMonitor`] from [`config::BOARD`], calls [`schedule::Ticks::tick`] from the watchdog
//! interrupt and [`BatteryMonitor::service`] after every wakeup.

#[macro_use]
extern crate logger;

pub mod config;
pub mod monitor;
pub mod schedule;

pub use monitor::{BatteryMonitor, PollError, PollReport, SetupError};
