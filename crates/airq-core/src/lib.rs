//! Hardware-independent core library for airq
//!
//! This crate contains all platform-agnostic logic for the airq air-quality
//! monitor: I2C bus discovery, the ENS160/AHT2x sensor drivers, the monitor
//! orchestration, and the OLED panel rendering.
//!
//! It is `#![no_std]` so it compiles on both embedded targets (ESP32-S3) and
//! desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

pub mod app_state;
pub mod async_i2c_bus;
pub mod bus_scan;
pub mod config;
pub mod display;
pub mod metrics;
pub mod sensors;
