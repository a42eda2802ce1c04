//! Builders for the frames an SDO client puts on the bus (COB-ID 0x600 + node).
//!
//! Every builder yields a full 8 byte SDO-Rx frame; unused bytes stay zero.

use crate::cmd_header::{
    SdoBlockDownloadInitiateCmd, SdoBlockSegmentHeader, SdoEndBlockDownloadCmd, SdoInitiateCmd,
    SdoSegmentCmd,
};
use crate::constant::*;
use crate::error::ErrorCode;
use crate::frame::{CanopenFrame, FunctionCode, SdoPayload};
use crate::prelude::*;
use crate::util::flatten;

fn request(node: u8, sdo: SdoPayload) -> Result<CanopenFrame, ErrorCode> {
    CanopenFrame::sdo_frame(FunctionCode::SdoRx, node, sdo)
}

fn segment_request(node: u8, command: u8, chunk: &[u8]) -> Result<CanopenFrame, ErrorCode> {
    if chunk.len() > SDO_SEGMENT_DATA_LEN {
        return Err(ErrorCode::ByteLengthExceedsLimit { len: chunk.len(), limit: SDO_SEGMENT_DATA_LEN });
    }
    CanopenFrame::new(FunctionCode::SdoRx, node, false, &flatten(&[&[command], chunk]))
}

fn declared_size(size: usize) -> Result<[u8; 4], ErrorCode> {
    let size = u32::try_from(size)
        .map_err(|_| ErrorCode::ByteLengthExceedsLimit { len: size, limit: u32::MAX as usize })?;
    Ok(size.to_le_bytes())
}

pub fn initiate_upload(node: u8, index: u16, subindex: u8) -> Result<CanopenFrame, ErrorCode> {
    let cmd = SdoInitiateCmd::new().with_cs(SDO_CCS_INITIATE_UPLOAD);
    request(node, SdoPayload::new(cmd.into(), index, subindex, [0; 4]))
}

/// Initiate download carrying 1 to 4 bytes, with `n = 4 - len`.
pub fn expedited_download(node: u8, index: u16, subindex: u8, data: &[u8]) -> Result<CanopenFrame, ErrorCode> {
    if data.is_empty() || data.len() > SDO_EXPEDITED_DATA_LEN {
        return Err(ErrorCode::ByteLengthExceedsLimit { len: data.len(), limit: SDO_EXPEDITED_DATA_LEN });
    }
    let cmd = SdoInitiateCmd::new()
        .with_cs(SDO_CCS_INITIATE_DOWNLOAD)
        .with_n((SDO_EXPEDITED_DATA_LEN - data.len()) as u8)
        .with_e(true)
        .with_s(true);
    let mut buf = [0u8; 4];
    buf[..data.len()].copy_from_slice(data);
    request(node, SdoPayload::new(cmd.into(), index, subindex, buf))
}

/// Initiate a segmented download; a `size` of 0 leaves the size undeclared.
pub fn initiate_segmented_download(node: u8, index: u16, subindex: u8, size: usize)
    -> Result<CanopenFrame, ErrorCode> {
    let cmd = SdoInitiateCmd::new().with_cs(SDO_CCS_INITIATE_DOWNLOAD).with_s(size != 0);
    request(node, SdoPayload::new(cmd.into(), index, subindex, declared_size(size)?))
}

pub fn upload_segment_request(node: u8, toggle: bool) -> Result<CanopenFrame, ErrorCode> {
    let cmd = SdoSegmentCmd::new().with_cs(SDO_CCS_UPLOAD_SEGMENT).with_t(toggle);
    segment_request(node, cmd.into(), &[])
}

/// Download segment with up to 7 bytes at offset 1; `n = 7 - len`.
pub fn download_segment(node: u8, toggle: bool, chunk: &[u8], last: bool) -> Result<CanopenFrame, ErrorCode> {
    let n = SDO_SEGMENT_DATA_LEN.saturating_sub(chunk.len()) as u8;
    let cmd = SdoSegmentCmd::new()
        .with_cs(SDO_CCS_DOWNLOAD_SEGMENT)
        .with_t(toggle)
        .with_n(n)
        .with_c(last);
    segment_request(node, cmd.into(), chunk)
}

pub fn block_download_initiate(node: u8, index: u16, subindex: u8, size: usize, crc: bool)
    -> Result<CanopenFrame, ErrorCode> {
    let cmd = SdoBlockDownloadInitiateCmd::new()
        .with_ccs(SDO_CCS_BLOCK_DOWNLOAD)
        .with_cc(crc)
        .with_s(true);
    request(node, SdoPayload::new(cmd.into(), index, subindex, declared_size(size)?))
}

/// One segment of a block: byte 0 holds the sequence number and the last flag.
pub fn block_segment(node: u8, seqno: u8, chunk: &[u8], last: bool) -> Result<CanopenFrame, ErrorCode> {
    if seqno == 0 || seqno > SDO_MAX_BLOCK_SIZE {
        return Err(ErrorCode::Malformed { more_info: format!("block sequence number {} out of range", seqno) });
    }
    let header = SdoBlockSegmentHeader::new().with_c(last).with_seqno(seqno);
    segment_request(node, header.into(), chunk)
}

/// End block download carrying the unused byte count of the last segment and the CRC.
pub fn end_block_download(node: u8, excess: u8, crc: u16) -> Result<CanopenFrame, ErrorCode> {
    if excess as usize >= SDO_SEGMENT_DATA_LEN {
        return Err(ErrorCode::Malformed { more_info: format!("excess byte count {} out of range", excess) });
    }
    let cmd = SdoEndBlockDownloadCmd::new()
        .with_ccs(SDO_CCS_BLOCK_DOWNLOAD)
        .with_n(excess)
        .with_cs(true);
    segment_request(node, cmd.into(), &crc.to_le_bytes())
}

/// Client side abort of a transfer.
pub fn abort_transfer(node: u8, index: u16, subindex: u8, code: u32) -> Result<CanopenFrame, ErrorCode> {
    request(node, SdoPayload::new(SDO_CS_ABORT << 5, index, subindex, code.to_le_bytes()))
}
