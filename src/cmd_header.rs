use bitfield_struct::bitfield;

use crate::constant::*;

/// Represents the SDO (Service Data Object) Initiate Upload / Initiate Download command.
/// The bitfield representation is based on an `u8` (8-bit unsigned integer), with the most significant bit (MSB) ordering.
#[bitfield(u8, order = Msb)]
pub struct SdoInitiateCmd {
    /// Command Specifier.
    /// 0x1 for a client initiate download, 0x2 for initiate upload (both directions).
    #[bits(3)]
    pub cs: u8,

    /// Reserved bit.
    #[bits(1)]
    _reserved_0: u8,

    /// Number of data bytes that do not contain data, ranging from 0 to 3.
    /// Only valid when both `e` and `s` are set.
    #[bits(2)]
    pub n: u8,

    /// Expedited Transfer flag.
    /// Indicates whether the SDO transfer is expedited (`true`) or segmented (`false`).
    #[bits(1)]
    pub e: bool,

    /// Size indicator.
    /// For expedited frames the `n` field is valid, for segmented frames the
    /// data field carries the total byte count.
    #[bits(1)]
    pub s: bool,
}

/// Represents the SDO Upload Segment / Download Segment command.
#[bitfield(u8, order = Msb)]
pub struct SdoSegmentCmd {
    /// Command Specifier.
    #[bits(3)]
    pub cs: u8,

    /// Toggle bit.
    /// Alternates for each subsequent segment during a segmented SDO transfer.
    #[bits(1)]
    pub t: bool,

    /// Number of data bytes that do not contain data, ranging from 0 to 7.
    #[bits(3)]
    pub n: u8,

    /// Set on the last segment of the transfer.
    #[bits(1)]
    pub c: bool,
}

/// Represents the SDO Block Download Initiate command, client side.
#[bitfield(u8, order = Msb)]
pub struct SdoBlockDownloadInitiateCmd {
    /// Command Specifier.
    #[bits(3)]
    pub ccs: u8,

    /// Reserved bits.
    #[bits(2)]
    _reserved_0: u8,

    /// CRC support flag.
    #[bits(1)]
    pub cc: bool,

    /// Size indicator.
    #[bits(1)]
    pub s: bool,

    /// Client subcommand, `false` for initiate.
    #[bits(1)]
    pub cs: bool,
}

/// Server replies during a block download: initiate ack, block ack and end ack.
#[bitfield(u8, order = Msb)]
pub struct SdoBlockDownloadReplyCmd {
    /// Server Command Specifier, 0x5 for block download.
    #[bits(3)]
    pub scs: u8,

    #[bits(2)]
    _reserved_0: u8,

    /// CRC support flag echoed by the server (initiate ack only).
    #[bits(1)]
    pub sc: bool,

    /// Server subcommand: 0 initiate, 1 end, 2 block ack.
    #[bits(2)]
    pub ss: u8,
}

/// Represents the SDO End Block Download command.
#[bitfield(u8, order = Msb)]
pub struct SdoEndBlockDownloadCmd {
    /// Command Specifier.
    #[bits(3)]
    pub ccs: u8,

    /// Number of bytes in the last segment of the last block that do not contain data.
    #[bits(3)]
    pub n: u8,

    #[bits(1)]
    _reserved_0: u8,

    /// Client subcommand, `true` for end block download.
    #[bits(1)]
    pub cs: bool,
}

/// First byte of a block segment: "last segment" flag and sequence number.
#[bitfield(u8, order = Msb)]
pub struct SdoBlockSegmentHeader {
    /// No more segments to be downloaded.
    #[bits(1)]
    pub c: bool,

    /// Sequence number inside the block, 1..=127.
    #[bits(7)]
    pub seqno: u8,
}

pub fn command_specifier(cmd: u8) -> u8 {
    (cmd & SDO_CS_MASK) >> 5
}

/// A command byte sent by an SDO server, decoded per its command specifier.
#[derive(Debug, Clone, Copy)]
pub enum ServerCommand {
    UploadSegment(SdoSegmentCmd),
    DownloadSegmentAck(SdoSegmentCmd),
    InitiateUpload(SdoInitiateCmd),
    InitiateDownloadAck,
    Abort,
    BlockDownload(SdoBlockDownloadReplyCmd),
    BlockUpload(u8),
    Unknown(u8),
}

impl ServerCommand {
    pub fn decode(cmd: u8) -> Self {
        match command_specifier(cmd) {
            SDO_SCS_UPLOAD_SEGMENT => ServerCommand::UploadSegment(SdoSegmentCmd::from(cmd)),
            SDO_SCS_DOWNLOAD_SEGMENT => ServerCommand::DownloadSegmentAck(SdoSegmentCmd::from(cmd)),
            SDO_SCS_INITIATE_UPLOAD => ServerCommand::InitiateUpload(SdoInitiateCmd::from(cmd)),
            SDO_SCS_INITIATE_DOWNLOAD => ServerCommand::InitiateDownloadAck,
            SDO_CS_ABORT => ServerCommand::Abort,
            SDO_SCS_BLOCK_DOWNLOAD => ServerCommand::BlockDownload(SdoBlockDownloadReplyCmd::from(cmd)),
            SDO_SCS_BLOCK_UPLOAD => ServerCommand::BlockUpload(cmd),
            _ => ServerCommand::Unknown(cmd),
        }
    }
}

/// A command byte sent by an SDO client, decoded per its command specifier.
#[derive(Debug, Clone, Copy)]
pub enum ClientCommand {
    DownloadSegment(SdoSegmentCmd),
    InitiateDownload(SdoInitiateCmd),
    InitiateUpload,
    UploadSegment(SdoSegmentCmd),
    Abort,
    BlockUpload(u8),
    BlockDownloadInitiate(SdoBlockDownloadInitiateCmd),
    EndBlockDownload(SdoEndBlockDownloadCmd),
    Unknown(u8),
}

impl ClientCommand {
    pub fn decode(cmd: u8) -> Self {
        match command_specifier(cmd) {
            SDO_CCS_DOWNLOAD_SEGMENT => ClientCommand::DownloadSegment(SdoSegmentCmd::from(cmd)),
            SDO_CCS_INITIATE_DOWNLOAD => ClientCommand::InitiateDownload(SdoInitiateCmd::from(cmd)),
            SDO_CCS_INITIATE_UPLOAD => ClientCommand::InitiateUpload,
            SDO_CCS_UPLOAD_SEGMENT => ClientCommand::UploadSegment(SdoSegmentCmd::from(cmd)),
            SDO_CS_ABORT => ClientCommand::Abort,
            SDO_CCS_BLOCK_UPLOAD => ClientCommand::BlockUpload(cmd),
            SDO_CCS_BLOCK_DOWNLOAD => {
                if cmd & 0x01 == 0 {
                    ClientCommand::BlockDownloadInitiate(SdoBlockDownloadInitiateCmd::from(cmd))
                } else {
                    ClientCommand::EndBlockDownload(SdoEndBlockDownloadCmd::from(cmd))
                }
            }
            _ => ClientCommand::Unknown(cmd),
        }
    }
}
