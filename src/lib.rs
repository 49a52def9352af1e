//! Protocol bridge between a legacy e-bike display and an open-source
//! mid-drive motor controller.
//!
//! The library is hardware independent. The firmware binary owns the UARTs,
//! the USB console and the flash chip, and drives a [`bridge::SharedBridge`].

#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod battery;
pub mod bridge;
pub mod config;
pub mod crc;
pub mod energy;
pub mod filter;
pub mod protocol;
pub mod riding;
pub mod state;
pub mod thermal;
