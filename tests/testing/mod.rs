#![allow(dead_code)]

pub mod sim_server;

use canopen_master::frame::{parse, CanopenFrame};
use canopen_master::RawFrame;
use embedded_can::{Frame, StandardId};

/// Builds a standard raw frame, the way a bus driver would hand it over.
pub fn genf(cob_id: u16, data: &[u8]) -> RawFrame {
    RawFrame::new(StandardId::new(cob_id).unwrap(), data).unwrap()
}

pub fn parse_raw(cob_id: u16, data: &[u8]) -> CanopenFrame {
    parse(&genf(cob_id, data)).unwrap()
}
