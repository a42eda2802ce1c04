//! The bus seen by the SDO client and the NMT helpers.
//!
//! A [`Transport`] moves parsed CANopen frames. The adapters here wrap
//! `embedded-can` drivers (blocking or `nb`) and pack/parse on the way.

use embedded_can::{blocking, nb as nb_can, Frame};

use crate::constant::COB_NODE_MASK;
use crate::error::ErrorCode;
use crate::frame::{pack, parse, CanopenFrame};
use crate::prelude::*;
use crate::util::get_cob_id;

pub trait Transport {
    type Error: Debug;

    fn send(&mut self, frame: &CanopenFrame) -> Result<(), Self::Error>;

    /// Blocks until a frame arrives or the transport's own timeout fires.
    fn receive(&mut self) -> Result<CanopenFrame, Self::Error>;

    /// Restricts reception to frames from `node`. Best effort.
    fn set_node_filter(&mut self, node: u8) -> Result<(), Self::Error>;

    fn clear_node_filter(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Error of the `embedded-can` adapters.
#[derive(Debug)]
pub enum CanTransportError<E> {
    Bus(E),
    Codec(ErrorCode),
}

impl<E> From<ErrorCode> for CanTransportError<E> {
    fn from(ec: ErrorCode) -> Self {
        CanTransportError::Codec(ec)
    }
}

/// Software node filter: standard frames must carry `node` in the low 7
/// identifier bits, extended frames pass.
#[derive(Debug, Default, Copy, Clone)]
struct NodeFilter(Option<u8>);

impl NodeFilter {
    fn accepts<F: Frame>(&self, raw: &F) -> bool {
        match (self.0, get_cob_id(raw)) {
            (Some(node), Some(cob_id)) => (cob_id & COB_NODE_MASK) == node as u16,
            _ => true,
        }
    }
}

pub struct BlockingCanTransport<C: blocking::Can> {
    can: C,
    filter: NodeFilter,
}

impl<C: blocking::Can> BlockingCanTransport<C> {
    pub fn new(can: C) -> Self {
        BlockingCanTransport { can, filter: NodeFilter::default() }
    }

    pub fn into_inner(self) -> C {
        self.can
    }
}

impl<C: blocking::Can> Transport for BlockingCanTransport<C> {
    type Error = CanTransportError<C::Error>;

    fn send(&mut self, frame: &CanopenFrame) -> Result<(), Self::Error> {
        let raw: C::Frame = pack(frame)?;
        self.can.transmit(&raw).map_err(CanTransportError::Bus)
    }

    fn receive(&mut self) -> Result<CanopenFrame, Self::Error> {
        loop {
            let raw = self.can.receive().map_err(CanTransportError::Bus)?;
            if self.filter.accepts(&raw) {
                return Ok(parse(&raw)?);
            }
        }
    }

    fn set_node_filter(&mut self, node: u8) -> Result<(), Self::Error> {
        self.filter = NodeFilter(Some(node));
        Ok(())
    }

    fn clear_node_filter(&mut self) -> Result<(), Self::Error> {
        self.filter = NodeFilter(None);
        Ok(())
    }
}

/// Adapter for non-blocking HAL drivers; every call spins with `nb::block!`.
pub struct NbCanTransport<C: nb_can::Can> {
    can: C,
    filter: NodeFilter,
}

impl<C: nb_can::Can> NbCanTransport<C> {
    pub fn new(can: C) -> Self {
        NbCanTransport { can, filter: NodeFilter::default() }
    }

    pub fn into_inner(self) -> C {
        self.can
    }
}

impl<C: nb_can::Can> Transport for NbCanTransport<C> {
    type Error = CanTransportError<C::Error>;

    fn send(&mut self, frame: &CanopenFrame) -> Result<(), Self::Error> {
        let raw: C::Frame = pack(frame)?;
        // A replaced lower priority frame is dropped.
        nb::block!(self.can.transmit(&raw)).map(|_| ()).map_err(CanTransportError::Bus)
    }

    fn receive(&mut self) -> Result<CanopenFrame, Self::Error> {
        loop {
            let raw = nb::block!(self.can.receive()).map_err(CanTransportError::Bus)?;
            if self.filter.accepts(&raw) {
                return Ok(parse(&raw)?);
            }
        }
    }

    fn set_node_filter(&mut self, node: u8) -> Result<(), Self::Error> {
        self.filter = NodeFilter(Some(node));
        Ok(())
    }

    fn clear_node_filter(&mut self) -> Result<(), Self::Error> {
        self.filter = NodeFilter(None);
        Ok(())
    }
}
