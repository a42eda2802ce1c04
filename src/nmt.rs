//! NMT module control, node guarding, SYNC and PDO request frames.

use crate::constant::*;
use crate::error::{ErrorCode, NmtError};
use crate::frame::{CanopenFrame, FunctionCode};
use crate::transport::Transport;
use crate::{info, warn};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NmtCommand {
    Start,
    Stop,
    EnterPreOperational,
    ResetApplication,
    ResetCommunication,
}

impl NmtCommand {
    pub fn cs(&self) -> u8 {
        match *self {
            NmtCommand::Start => NMT_CS_START,
            NmtCommand::Stop => NMT_CS_STOP,
            NmtCommand::EnterPreOperational => NMT_CS_ENTER_PRE_OPERATIONAL,
            NmtCommand::ResetApplication => NMT_CS_RESET_APPLICATION,
            NmtCommand::ResetCommunication => NMT_CS_RESET_COMMUNICATION,
        }
    }

    pub fn from_cs(cs: u8) -> Option<Self> {
        match cs {
            NMT_CS_START => Some(NmtCommand::Start),
            NMT_CS_STOP => Some(NmtCommand::Stop),
            NMT_CS_ENTER_PRE_OPERATIONAL => Some(NmtCommand::EnterPreOperational),
            NMT_CS_RESET_APPLICATION => Some(NmtCommand::ResetApplication),
            NMT_CS_RESET_COMMUNICATION => Some(NmtCommand::ResetCommunication),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match *self {
            NmtCommand::Start => "Start",
            NmtCommand::Stop => "Stop",
            NmtCommand::EnterPreOperational => "Enter pre-operational",
            NmtCommand::ResetApplication => "Reset application",
            NmtCommand::ResetCommunication => "Reset communication",
        }
    }
}

/// Device state reported in a node guard reply.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NmtState {
    BootUp,
    Disconnected,
    Connecting,
    Preparing,
    Stopped,
    Operational,
    PreOperational,
    Unknown(u8),
}

impl NmtState {
    pub fn from_code(code: u8) -> Self {
        match code & NMT_NG_STATE_MASK {
            0x00 => NmtState::BootUp,
            0x01 => NmtState::Disconnected,
            0x02 => NmtState::Connecting,
            0x03 => NmtState::Preparing,
            0x04 => NmtState::Stopped,
            0x05 => NmtState::Operational,
            0x7F => NmtState::PreOperational,
            other => NmtState::Unknown(other),
        }
    }

    /// Splits a node guard byte into the state and the toggle bit.
    pub fn from_guard_byte(byte: u8) -> (Self, bool) {
        (NmtState::from_code(byte), byte & NMT_NG_TOGGLE_FLAG != 0)
    }

    pub fn description(&self) -> &'static str {
        match *self {
            NmtState::BootUp => "Boot-up",
            NmtState::Disconnected => "Disconnected",
            NmtState::Connecting => "Connecting",
            NmtState::Preparing => "Preparing",
            NmtState::Stopped => "Stopped",
            NmtState::Operational => "Operational",
            NmtState::PreOperational => "Pre-operational",
            NmtState::Unknown(_) => "Unknown state",
        }
    }
}

/// NMT frame on COB-ID 0x000; the target node (0 for all) travels in the payload.
pub fn module_control(command: NmtCommand, node: u8) -> Result<CanopenFrame, ErrorCode> {
    if node > MAX_NODE_ID {
        return Err(ErrorCode::InvalidNodeId { node });
    }
    CanopenFrame::new(FunctionCode::NmtControl, 0, false, &[command.cs(), node])
}

pub fn node_guard_request(node: u8) -> Result<CanopenFrame, ErrorCode> {
    CanopenFrame::new(FunctionCode::NodeGuard, node, true, &[])
}

/// Remote request for the first transmit PDO of `node`.
pub fn pdo_request(node: u8) -> Result<CanopenFrame, ErrorCode> {
    CanopenFrame::new(FunctionCode::Pdo1Tx, node, true, &[])
}

pub fn sync() -> Result<CanopenFrame, ErrorCode> {
    CanopenFrame::new(FunctionCode::SyncEmergency, 0, false, &[])
}

pub fn send_module_control<T: Transport>(transport: &mut T, command: NmtCommand, node: u8)
    -> Result<(), NmtError<T::Error>> {
    let frame = module_control(command, node)?;
    info!("NMT {} -> node {}", command.description(), node);
    transport.send(&frame).map_err(NmtError::Transport)
}

/// Sends a node guard request and waits up to `rounds` received frames for the reply.
pub fn poll_node_state<T: Transport>(transport: &mut T, node: u8, rounds: usize)
    -> Result<(NmtState, bool), NmtError<T::Error>> {
    if let Err(err) = transport.set_node_filter(node) {
        warn!("failed to set node filter for node {}: {:?}", node, err);
    }
    transport.send(&node_guard_request(node)?).map_err(NmtError::Transport)?;
    for _ in 0..rounds {
        let frame = transport.receive().map_err(NmtError::Transport)?;
        if !frame.is_from(FunctionCode::NodeGuard, node) || frame.rtr {
            continue;
        }
        if let Ok(state) = frame.node_guard_state() {
            return Ok(NmtState::from_guard_byte(state));
        }
    }
    Err(NmtError::Timeout)
}
