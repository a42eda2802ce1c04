//! Human readable one-line and multi-line renderings of CANopen frames.
//!
//! Rendering never feeds back into wire behaviour. Block download segments
//! on SDO-Rx cannot be told apart from other commands by their first byte,
//! so the short form keeps a per-node block mode in a caller owned
//! [`DumpSession`].

use core::fmt::Write;

use crate::cmd_header::{ClientCommand, SdoBlockSegmentHeader, SdoSegmentCmd, ServerCommand};
use crate::constant::*;
use crate::error::lookup;
use crate::frame::{Addressing, CanopenFrame, FunctionCode, Payload, SdoPayload};
use crate::nmt::{NmtCommand, NmtState};
use crate::prelude::*;

/// Per-node block download tracking for [`dump_short`].
#[derive(Debug, Clone)]
pub struct DumpSession {
    block_mode: [bool; MAX_NODE_ID as usize + 1],
}

impl Default for DumpSession {
    fn default() -> Self {
        DumpSession { block_mode: [false; MAX_NODE_ID as usize + 1] }
    }
}

impl DumpSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_block_mode(&self, node: u8) -> bool {
        self.block_mode.get(node as usize).copied().unwrap_or(false)
    }

    fn set_block_mode(&mut self, node: u32, on: bool) {
        if let Some(slot) = self.block_mode.get_mut(node as usize) {
            *slot = on;
        }
    }
}

fn hex_bytes(out: &mut String, bytes: &[u8]) {
    for b in bytes {
        let _ = write!(out, "0x{:02X} ", b);
    }
}

fn sdo_address(out: &mut String, sdo: &SdoPayload) {
    let _ = write!(out, "Index=0x{:04X} SubIndex=0x{:02X} ", sdo.index, sdo.subindex);
}

fn segment_flags(out: &mut String, cmd: SdoSegmentCmd) {
    let _ = write!(
        out,
        "[{}] [T {}] [SI: {}] ",
        if cmd.c() { "LAST" } else { "CONT" },
        cmd.t() as u8,
        cmd.n()
    );
}

fn dump_sdo_tx(out: &mut String, node: u32, sdo: &SdoPayload, session: &mut DumpSession) {
    match ServerCommand::decode(sdo.command) {
        ServerCommand::InitiateDownloadAck => {
            out.push_str("[Initiate Domain Download] ");
            sdo_address(out, sdo);
            hex_bytes(out, &sdo.data);
        }
        ServerCommand::DownloadSegmentAck(cmd) => {
            let _ = write!(out, "[Download Domain Segment] [T {}] ", cmd.t() as u8);
        }
        ServerCommand::InitiateUpload(cmd) => {
            out.push_str("[Initiate Domain Upload] ");
            if cmd.e() {
                out.push_str("[EXP] ");
                if cmd.s() {
                    let _ = write!(out, "[SI: {}] ", cmd.n());
                }
                sdo_address(out, sdo);
                hex_bytes(out, &sdo.data);
            } else {
                let _ = write!(out, "[SEG] [SIZE {}] ", u32::from_le_bytes(sdo.data));
            }
        }
        ServerCommand::UploadSegment(cmd) => {
            out.push_str("[Upload Domain Segment] ");
            segment_flags(out, cmd);
        }
        ServerCommand::Abort => {
            let _ = write!(out, "[Abort Domain Transfer] [{}] ", lookup(Some(sdo)));
            session.set_block_mode(node, false);
        }
        ServerCommand::BlockDownload(cmd) => {
            let _ = write!(out, "[Block Download] [SS {}] ", cmd.ss());
            match cmd.ss() {
                SDO_BLOCK_SS_INITIATE => {
                    let _ = write!(out, "[S-CRC {}] ", cmd.sc() as u8);
                    sdo_address(out, sdo);
                    let _ = write!(out, "BlkSize={} ", sdo.data[0]);
                    session.set_block_mode(node, true);
                }
                SDO_BLOCK_SS_END => session.set_block_mode(node, false),
                SDO_BLOCK_SS_ACK => {
                    let bytes = sdo.to_bytes();
                    let _ = write!(out, "AckSeq={} BlkSize={} ", bytes[1], bytes[2]);
                }
                _ => {}
            }
        }
        ServerCommand::BlockUpload(_) | ServerCommand::Unknown(_) => out.push_str("[unknown cs] "),
    }
}

fn dump_sdo_rx(out: &mut String, node: u32, sdo: &SdoPayload, session: &mut DumpSession) {
    if session.block_mode.get(node as usize).copied().unwrap_or(false) {
        let header = SdoBlockSegmentHeader::from(sdo.command);
        let _ = write!(out, "[Block Download] [C {}] [SeqNo = {}] ", header.c() as u8, header.seqno());
        hex_bytes(out, &sdo.to_bytes()[1..]);
        if header.c() {
            session.set_block_mode(node, false);
        }
        return;
    }
    match ClientCommand::decode(sdo.command) {
        ClientCommand::InitiateDownload(cmd) => {
            out.push_str("[Initiate Domain Download] ");
            if cmd.e() {
                out.push_str("[EXP] ");
                if cmd.s() {
                    let _ = write!(out, "[SI: {}] ", cmd.n());
                }
            } else {
                out.push_str("[SEG] ");
            }
            sdo_address(out, sdo);
            hex_bytes(out, &sdo.data);
        }
        ClientCommand::DownloadSegment(cmd) => {
            out.push_str("[Download Domain Segment] ");
            segment_flags(out, cmd);
        }
        ClientCommand::InitiateUpload => {
            out.push_str("[Initiate Domain Upload] ");
            sdo_address(out, sdo);
            hex_bytes(out, &sdo.data);
        }
        ClientCommand::UploadSegment(cmd) => {
            let _ = write!(out, "[Upload Domain Segment] [T {}] ", cmd.t() as u8);
        }
        ClientCommand::Abort => {
            let _ = write!(out, "[Abort Domain Transfer] [{}] ", lookup(Some(sdo)));
            session.set_block_mode(node, false);
        }
        ClientCommand::BlockDownloadInitiate(cmd) => {
            let _ = write!(out, "[Block Download] [CS 0] [C-CRC {}] [S {}] ", cmd.cc() as u8, cmd.s() as u8);
            sdo_address(out, sdo);
            let _ = write!(out, "Size={} ", u32::from_le_bytes(sdo.data));
        }
        ClientCommand::EndBlockDownload(cmd) => {
            let bytes = sdo.to_bytes();
            let _ = write!(
                out,
                "[Block Download] [CS 1] [EXCESS {}] CRC=0x{:04X} ",
                cmd.n(),
                u16::from_le_bytes([bytes[1], bytes[2]])
            );
            session.set_block_mode(node, false);
        }
        ClientCommand::BlockUpload(_) | ClientCommand::Unknown(_) => out.push_str("[unknown cs] "),
    }
}

/// Compact one-line rendering, tracking block mode in `session`.
pub fn dump_short(frame: &CanopenFrame, session: &mut DumpSession) -> String {
    let mut out = String::new();
    let bytes = frame.bytes();
    let data = &bytes[..frame.data_len as usize];

    match frame.addressing {
        Addressing::Extended => {
            let _ = write!(out, "EXTENDED Node ID=0x{:07X} ", frame.node_id);
        }
        Addressing::Standard => {
            let fc = frame.function_code.map_or(0, |fc| fc.code());
            let _ = write!(out, "STANDARD [0x{:03X}] FC=0x{:X} ID=0x{:02X} ", frame.cob_id(), fc, frame.node_id);
        }
    }
    if frame.rtr {
        out.push_str("RTR ");
    }
    let _ = write!(out, "[{}] ", frame.data_len);
    hex_bytes(&mut out, data);
    out.push_str(" => ");

    let node = frame.node_id;
    match (frame.function_code, &frame.payload) {
        (None, _) => out.push_str("Extended frame"),
        (Some(FunctionCode::NmtControl), Payload::NmtControl { cs, node }) => {
            let _ = write!(out, "NMT [Module Control] Node=0x{:02X} ", node);
            match NmtCommand::from_cs(*cs) {
                Some(cmd) => {
                    let _ = write!(out, "Command='{}'", cmd.description());
                }
                None => out.push_str("Command=Unknown"),
            }
        }
        (Some(FunctionCode::NodeGuard), Payload::NodeGuard { state }) => {
            let (state, _) = NmtState::from_guard_byte(*state);
            let _ = write!(out, "NMT [Node Guarding] Node=0x{:02X} ", node);
            match state {
                NmtState::Unknown(code) => {
                    let _ = write!(out, "State=Unknown [{:02X}]", code);
                }
                known => {
                    let _ = write!(out, "State='{}'", known.description());
                }
            }
        }
        (Some(FunctionCode::NodeGuard), _) if frame.rtr => {
            let _ = write!(out, "NMT [Node Guarding] Node=0x{:02X} Pull", node);
        }
        (Some(FunctionCode::SyncEmergency), _) => {
            if node == 0 {
                let _ = write!(out, "SYNC [counter = 0x{:x}] ", bytes[0]);
            } else {
                let _ = write!(out, "EMERGENCY Node=0x{:x} ", node);
            }
        }
        (Some(FunctionCode::Timestamp), _) => {
            let _ = write!(out, "TIMESTAMP Node=0x{:x} ", node);
        }
        (Some(FunctionCode::SdoTx), Payload::Sdo(sdo)) => {
            let _ = write!(out, "SDO TX Node=0x{:02X} Command=0x{:02X} ", node, sdo.command);
            dump_sdo_tx(&mut out, node, sdo, session);
        }
        (Some(FunctionCode::SdoRx), Payload::Sdo(sdo)) => {
            let _ = write!(out, "SDO RX Node=0x{:02X} Command=0x{:02X} ", node, sdo.command);
            dump_sdo_rx(&mut out, node, sdo, session);
        }
        (Some(fc), _) => match pdo_name(fc) {
            Some(name) => {
                let _ = write!(out, "{} Node=0x{:x} ", name, node);
                hex_bytes(&mut out, data);
            }
            None => out.push_str("Unknown frame"),
        },
    }
    out
}

fn pdo_name(fc: FunctionCode) -> Option<&'static str> {
    match fc {
        FunctionCode::Pdo1Tx => Some("PDO1 TX"),
        FunctionCode::Pdo1Rx => Some("PDO1 RX"),
        FunctionCode::Pdo2Tx => Some("PDO2 TX"),
        FunctionCode::Pdo2Rx => Some("PDO2 RX"),
        FunctionCode::Pdo3Tx => Some("PDO3 TX"),
        FunctionCode::Pdo3Rx => Some("PDO3 RX"),
        FunctionCode::Pdo4Tx => Some("PDO4 TX"),
        FunctionCode::Pdo4Rx => Some("PDO4 RX"),
        _ => None,
    }
}

/// Multi-line rendering of the frame header and raw data.
pub fn dump_verbose(frame: &CanopenFrame) -> String {
    let mut out = String::from("CANopen frame:\n");
    match frame.addressing {
        Addressing::Extended => {
            out.push_str("    - Frame format EXTENDED\n");
            let _ = writeln!(out, "    - Node ID       = 0x{:07x}", frame.node_id);
        }
        Addressing::Standard => {
            out.push_str("    - Frame format STANDARD\n");
            let fc = frame.function_code.map_or(0, |fc| fc.code());
            let _ = writeln!(out, "    - Function code = 0x{:x}", fc);
            let _ = writeln!(out, "    - Node ID       = 0x{:03x}", frame.node_id);
        }
    }
    if frame.rtr {
        out.push_str("    - Remote request\n");
    }
    let _ = writeln!(out, "    - Data length   = {}", frame.data_len);
    out.push_str("    - Data          =");
    for b in &frame.bytes()[..frame.data_len as usize] {
        let _ = write!(out, " 0x{:02x}", b);
    }
    out.push('\n');
    out
}

impl fmt::Display for CanopenFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&dump_short(self, &mut DumpSession::new()))
    }
}
