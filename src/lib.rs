//! CANopen master side over raw CAN frames.
//!
//! The crate turns raw 8-byte CAN payloads into structured CANopen frames
//! ([`frame`]), builds NMT control frames ([`nmt`]) and runs SDO transfers
//! against a device's object dictionary ([`sdo_client`]). The physical bus is
//! reached through the [`transport::Transport`] trait; adapters for
//! `embedded-can` drivers live in [`transport`].

#![cfg_attr(all(target_arch = "arm", target_os = "none"), no_std)]

extern crate alloc;

pub mod cmd_header;
pub mod constant;
pub mod dump;
pub mod error;
pub mod frame;
pub mod nmt;
pub mod sdo_client;
pub mod sdo_frame;
pub mod transport;
pub mod util;

mod prelude;

pub use error::{AbortCode, ErrorCode, NmtError, SdoError};
pub use frame::{Addressing, CanopenFrame, FunctionCode, Payload, RawFrame, SdoPayload};
pub use sdo_client::{Identity, SdoClient, SdoClientConfig, SdoResult};
pub use nmt::{NmtCommand, NmtState};
pub use transport::{BlockingCanTransport, NbCanTransport, Transport};

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        let value_str = alloc::format!($($arg)*);
        #[cfg(not(all(target_arch = "arm", target_os = "none")))]
        {
            log::info!("[canopen] {}", value_str);
        }
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        {
            defmt::info!("[canopen] {}", defmt::Debug2Format(&value_str));
        }
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        let value_str = alloc::format!($($arg)*);
        #[cfg(not(all(target_arch = "arm", target_os = "none")))]
        {
            log::debug!("[canopen] {}", value_str);
        }
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        {
            defmt::debug!("[canopen] {}", defmt::Debug2Format(&value_str));
        }
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        let value_str = alloc::format!($($arg)*);
        #[cfg(not(all(target_arch = "arm", target_os = "none")))]
        {
            log::warn!("[canopen] {}", value_str);
        }
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        {
            defmt::warn!("[canopen] {}", defmt::Debug2Format(&value_str));
        }
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        let value_str = alloc::format!($($arg)*);
        #[cfg(not(all(target_arch = "arm", target_os = "none")))]
        {
            log::error!("[canopen] {}", value_str);
        }
        #[cfg(all(target_arch = "arm", target_os = "none"))]
        {
            defmt::error!("[canopen] {}", defmt::Debug2Format(&value_str));
        }
    };
}
