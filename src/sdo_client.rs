//! SDO client: expedited, segmented and block transfers against one node.
//!
//! Every call is synchronous. It installs a node filter on the transport,
//! exchanges frames until the transfer completes, and gives up after a
//! budget of received frames without progress. Frames that are not SDO-Tx
//! replies from the addressed node use up budget but are otherwise ignored.

use core::cmp::min;

use crate::cmd_header::ServerCommand;
use crate::constant::*;
use crate::dump::{dump_short, DumpSession};
use crate::error::{lookup, AbortCode, SdoError};
use crate::frame::{CanopenFrame, FunctionCode, SdoPayload};
use crate::sdo_frame;
use crate::transport::Transport;
use crate::util::{crc16_canopen_with_lut, decode_uint};
use crate::{debug, error, warn};

pub type SdoResult<T, E> = Result<T, SdoError<E>>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SdoClientConfig {
    /// Frames to wait for the reply of an expedited upload.
    pub expedited_upload_rounds: usize,
    /// Frames to wait without progress in every other transfer.
    pub transfer_rounds: usize,
    /// Offer CRC in the block download initiate.
    pub block_crc: bool,
    /// Log every frame sent and received at debug level.
    pub trace_frames: bool,
}

impl Default for SdoClientConfig {
    fn default() -> Self {
        SdoClientConfig {
            expedited_upload_rounds: EXPEDITED_UPLOAD_ROUNDS,
            transfer_rounds: TRANSFER_ROUNDS,
            block_crc: false,
            trace_frames: false,
        }
    }
}

impl SdoClientConfig {
    pub fn with_expedited_upload_rounds(mut self, rounds: usize) -> Self {
        self.expedited_upload_rounds = rounds;
        self
    }

    pub fn with_transfer_rounds(mut self, rounds: usize) -> Self {
        self.transfer_rounds = rounds;
        self
    }

    pub fn with_block_crc(mut self, block_crc: bool) -> Self {
        self.block_crc = block_crc;
        self
    }

    pub fn with_trace_frames(mut self, trace_frames: bool) -> Self {
        self.trace_frames = trace_frames;
        self
    }
}

/// Identity object 0x1018, sub-indices 1 to 3.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Identity {
    pub vendor_id: u32,
    pub product_code: u32,
    pub revision: u32,
}

/// Position inside the data of a block download.
struct BlockCursor {
    offset: usize,
    block_start: usize,
    block_size: u8,
    sent: u8,
    excess: u8,
}

pub struct SdoClient {
    config: SdoClientConfig,
    dump_session: DumpSession,
}

impl Default for SdoClient {
    fn default() -> Self {
        SdoClient::new(SdoClientConfig::default())
    }
}

impl SdoClient {
    pub fn new(config: SdoClientConfig) -> Self {
        SdoClient { config, dump_session: DumpSession::new() }
    }

    pub fn config(&self) -> &SdoClientConfig {
        &self.config
    }

    fn install_filter<T: Transport>(&self, transport: &mut T, node: u8) {
        if let Err(err) = transport.set_node_filter(node) {
            warn!("failed to set CAN filter for node {}: {:?}", node, err);
        }
    }

    fn send<T: Transport>(&mut self, transport: &mut T, frame: &CanopenFrame) -> SdoResult<(), T::Error> {
        if self.config.trace_frames {
            let line = dump_short(frame, &mut self.dump_session);
            debug!("tx {}", line);
        }
        transport.send(frame).map_err(SdoError::Transport)
    }

    /// Reads one frame; yields the SDO payload only for an SDO-Tx reply from `node`.
    fn receive_reply<T: Transport>(&mut self, transport: &mut T, node: u8)
        -> SdoResult<Option<SdoPayload>, T::Error> {
        let frame = transport.receive().map_err(SdoError::Transport)?;
        if self.config.trace_frames {
            let line = dump_short(&frame, &mut self.dump_session);
            debug!("rx {}", line);
        }
        if !frame.is_from(FunctionCode::SdoTx, node) {
            return Ok(None);
        }
        match frame.sdo() {
            Ok(sdo) => Ok(Some(*sdo)),
            Err(_) => {
                debug!("short SDO frame from node {} ({} bytes), ignored", node, frame.data_len);
                Ok(None)
            }
        }
    }

    fn abort_error<E>(&self, node: u8, sdo: &SdoPayload) -> SdoError<E> {
        let code = u32::from_le_bytes(sdo.data);
        let description = lookup(Some(sdo));
        error!("node {} aborted transfer of {:#06x}:{:#04x}: {:#010x} {}",
            node, sdo.index, sdo.subindex, code, description);
        SdoError::Abort { code, description }
    }

    /// Reads an object of up to 4 bytes, decoded as a little-endian integer.
    pub fn expedited_upload<T: Transport>(&mut self, transport: &mut T, node: u8, index: u16, subindex: u8)
        -> SdoResult<u32, T::Error> {
        self.install_filter(transport, node);
        self.send(transport, &sdo_frame::initiate_upload(node, index, subindex)?)?;

        for _ in 0..self.config.expedited_upload_rounds {
            let Some(sdo) = self.receive_reply(transport, node)? else {
                continue;
            };
            match ServerCommand::decode(sdo.command) {
                ServerCommand::InitiateUpload(cmd) => {
                    if !cmd.e() {
                        return Err(SdoError::Unsupported { operation: "segmented reply to an expedited upload" });
                    }
                    return Ok(decode_uint(&sdo.data[..sdo.expedited_size()])?);
                }
                ServerCommand::Abort => return Err(self.abort_error(node, &sdo)),
                _ => {
                    debug!("expedited upload: ignoring command {:#04x}", sdo.command);
                }
            }
        }
        Err(SdoError::Timeout)
    }

    /// Writes 1 to 4 bytes in one initiate download frame.
    ///
    /// Any SDO-Tx frame from the node counts as the acknowledgment, an abort included.
    pub fn expedited_download<T: Transport>(&mut self, transport: &mut T, node: u8, index: u16, subindex: u8,
                                            data: &[u8]) -> SdoResult<(), T::Error> {
        let request = sdo_frame::expedited_download(node, index, subindex, data)?;
        self.install_filter(transport, node);
        self.send(transport, &request)?;

        for _ in 0..self.config.transfer_rounds {
            if let Some(sdo) = self.receive_reply(transport, node)? {
                if let ServerCommand::Abort = ServerCommand::decode(sdo.command) {
                    warn!("expedited download to node {}: reply is an abort ({})", node, lookup(Some(&sdo)));
                }
                return Ok(());
            }
        }
        Err(SdoError::Timeout)
    }

    /// Reads an object into `buf` and returns the number of bytes copied.
    /// Bytes beyond the capacity of `buf` are dropped.
    pub fn segmented_upload<T: Transport>(&mut self, transport: &mut T, node: u8, index: u16, subindex: u8,
                                          buf: &mut [u8]) -> SdoResult<usize, T::Error> {
        self.install_filter(transport, node);
        self.send(transport, &sdo_frame::initiate_upload(node, index, subindex)?)?;

        let mut started = false;
        let mut toggle = false;
        let mut copied = 0;
        let mut rounds = 0;
        while rounds < self.config.transfer_rounds {
            rounds += 1;
            let Some(sdo) = self.receive_reply(transport, node)? else {
                continue;
            };
            match ServerCommand::decode(sdo.command) {
                ServerCommand::Abort => return Err(self.abort_error(node, &sdo)),
                ServerCommand::InitiateUpload(cmd) if !started => {
                    if cmd.e() {
                        let len = min(sdo.expedited_size(), buf.len());
                        buf[..len].copy_from_slice(&sdo.data[..len]);
                        return Ok(len);
                    }
                    let declared = if cmd.s() { u32::from_le_bytes(sdo.data) } else { 0 };
                    debug!("segmented upload of {:#06x}:{:#04x} from node {}, {} bytes declared",
                        index, subindex, node, declared);
                    started = true;
                    rounds = 0;
                    self.send(transport, &sdo_frame::upload_segment_request(node, toggle)?)?;
                }
                ServerCommand::UploadSegment(cmd) if started && cmd.t() == toggle => {
                    let bytes = sdo.to_bytes();
                    let n = sdo.segment_size();
                    let take = min(n, buf.len() - copied);
                    buf[copied..copied + take].copy_from_slice(&bytes[1..1 + take]);
                    copied += take;
                    if cmd.c() {
                        return Ok(copied);
                    }
                    toggle = !toggle;
                    rounds = 0;
                    self.send(transport, &sdo_frame::upload_segment_request(node, toggle)?)?;
                }
                _ => {
                    debug!("segmented upload: ignoring command {:#04x}", sdo.command);
                }
            }
        }
        Err(SdoError::Timeout)
    }

    /// Writes `data` in 7 byte segments with alternating toggle bit.
    pub fn segmented_download<T: Transport>(&mut self, transport: &mut T, node: u8, index: u16, subindex: u8,
                                            data: &[u8]) -> SdoResult<(), T::Error> {
        let request = sdo_frame::initiate_segmented_download(node, index, subindex, data.len())?;
        self.install_filter(transport, node);
        self.send(transport, &request)?;

        let mut started = false;
        let mut toggle = false;
        let mut offset = 0;
        let mut rounds = 0;
        while rounds < self.config.transfer_rounds {
            rounds += 1;
            let Some(sdo) = self.receive_reply(transport, node)? else {
                continue;
            };
            match ServerCommand::decode(sdo.command) {
                ServerCommand::Abort => return Err(self.abort_error(node, &sdo)),
                ServerCommand::InitiateDownloadAck if !started => {
                    started = true;
                    toggle = false;
                }
                // Acks carry the toggle of the segment they confirm.
                ServerCommand::DownloadSegmentAck(cmd) if started && offset > 0 && cmd.t() != toggle => {}
                _ => {
                    debug!("segmented download: ignoring command {:#04x}", sdo.command);
                    continue;
                }
            }
            rounds = 0;
            if offset >= data.len() {
                return Ok(());
            }
            let len = min(SDO_SEGMENT_DATA_LEN, data.len() - offset);
            let last = offset + len == data.len();
            self.send(transport, &sdo_frame::download_segment(node, toggle, &data[offset..offset + len], last)?)?;
            offset += len;
            toggle = !toggle;
        }
        Err(SdoError::Timeout)
    }

    fn send_block<T: Transport>(&mut self, transport: &mut T, node: u8, data: &[u8], cursor: &mut BlockCursor)
        -> SdoResult<(), T::Error> {
        cursor.block_start = cursor.offset;
        cursor.sent = 0;
        for seqno in 1..=cursor.block_size {
            let len = min(SDO_SEGMENT_DATA_LEN, data.len() - cursor.offset);
            let last = cursor.offset + len == data.len();
            let chunk = &data[cursor.offset..cursor.offset + len];
            self.send(transport, &sdo_frame::block_segment(node, seqno, chunk, last)?)?;
            cursor.offset += len;
            cursor.sent = seqno;
            if last {
                cursor.excess = if len == 0 { 0 } else { (SDO_SEGMENT_DATA_LEN - len) as u8 };
                break;
            }
        }
        Ok(())
    }

    fn check_block_size<T: Transport>(&mut self, transport: &mut T, node: u8, index: u16, subindex: u8,
                                      block_size: u8) -> SdoResult<(), T::Error> {
        if block_size > 0 && block_size <= SDO_MAX_BLOCK_SIZE {
            return Ok(());
        }
        let code = AbortCode::InvalidBlockSize;
        error!("node {} requested invalid block size {}", node, block_size);
        self.send(transport, &sdo_frame::abort_transfer(node, index, subindex, code.code())?)?;
        Err(SdoError::Abort { code: code.code(), description: code.description() })
    }

    /// Writes `data` with SDO block download.
    ///
    /// Unacknowledged segments of a block are sent again as the start of the next block.
    pub fn block_download<T: Transport>(&mut self, transport: &mut T, node: u8, index: u16, subindex: u8,
                                        data: &[u8]) -> SdoResult<(), T::Error> {
        let request = sdo_frame::block_download_initiate(node, index, subindex, data.len(), self.config.block_crc)?;
        self.install_filter(transport, node);
        self.send(transport, &request)?;

        let mut use_crc = false;
        let mut started = false;
        let mut ended = false;
        let mut cursor = BlockCursor { offset: 0, block_start: 0, block_size: 0, sent: 0, excess: 0 };
        let mut rounds = 0;
        while rounds < self.config.transfer_rounds {
            rounds += 1;
            let Some(sdo) = self.receive_reply(transport, node)? else {
                continue;
            };
            let cmd = match ServerCommand::decode(sdo.command) {
                ServerCommand::BlockDownload(cmd) => cmd,
                ServerCommand::Abort => return Err(self.abort_error(node, &sdo)),
                _ => {
                    debug!("block download: ignoring command {:#04x}", sdo.command);
                    continue;
                }
            };
            match cmd.ss() {
                SDO_BLOCK_SS_INITIATE if !started => {
                    rounds = 0;
                    started = true;
                    use_crc = cmd.sc();
                    cursor.block_size = sdo.data[0];
                    debug!("block download to node {}: crc {}, block size {}", node, use_crc, cursor.block_size);
                    self.check_block_size(transport, node, index, subindex, cursor.block_size)?;
                    self.send_block(transport, node, data, &mut cursor)?;
                }
                SDO_BLOCK_SS_ACK if started && !ended => {
                    rounds = 0;
                    let bytes = sdo.to_bytes();
                    let ack_seq = min(bytes[1], cursor.sent);
                    if ack_seq < cursor.sent {
                        let resume = min(cursor.block_start + SDO_SEGMENT_DATA_LEN * ack_seq as usize, cursor.offset);
                        warn!("block download to node {}: {} of {} segments acknowledged, resending {} bytes",
                            node, ack_seq, cursor.sent, cursor.offset - resume);
                        cursor.offset = resume;
                    }
                    cursor.block_size = bytes[2];
                    if cursor.offset >= data.len() && ack_seq == cursor.sent {
                        let crc = if use_crc { crc16_canopen_with_lut(data) } else { 0 };
                        self.send(transport, &sdo_frame::end_block_download(node, cursor.excess, crc)?)?;
                        ended = true;
                    } else {
                        self.check_block_size(transport, node, index, subindex, cursor.block_size)?;
                        self.send_block(transport, node, data, &mut cursor)?;
                    }
                }
                SDO_BLOCK_SS_END if ended => return Ok(()),
                _ => {
                    debug!("block download: ignoring stale sub-command in {:#04x}", sdo.command);
                }
            }
        }
        Err(SdoError::Timeout)
    }

    /// Block upload is not implemented.
    pub fn block_upload<T: Transport>(&mut self, _transport: &mut T, _node: u8, _index: u16, _subindex: u8,
                                      _buf: &mut [u8]) -> SdoResult<usize, T::Error> {
        Err(SdoError::Unsupported { operation: "block upload" })
    }

    /// Reads vendor id, product code and revision from the identity object.
    pub fn identity<T: Transport>(&mut self, transport: &mut T, node: u8) -> SdoResult<Identity, T::Error> {
        Ok(Identity {
            vendor_id: self.expedited_upload(transport, node, REG_IDENTITY, REG_IDENTITY_VENDOR_ID)?,
            product_code: self.expedited_upload(transport, node, REG_IDENTITY, REG_IDENTITY_PRODUCT_CODE)?,
            revision: self.expedited_upload(transport, node, REG_IDENTITY, REG_IDENTITY_REVISION)?,
        })
    }
}
