#![cfg_attr(feature = "no-std", no_std)]

#[macro_use]
mod fmt;

pub mod changed;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod device;
pub mod dome;
pub mod heartbeat;
pub mod io;
pub mod rpc;
pub mod safety;
pub mod shutter;
pub mod transport;
pub mod weather;

pub use controller::{Controller, ControllerConfig, IoFrame};
pub use device::{ClientPresence, Device, DeviceKind};
