//! ESP32-S3 firmware-specific modules for airq
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: ESP32 peripheral initialization and the static bus storage the
//! sensor handles borrow from.

#![no_std]

pub mod hardware;
