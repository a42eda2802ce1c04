/// Masks and flags of the CAN identifier.
pub const CAN_EFF_MASK: u32 = 0x1FFF_FFFF;
pub const COB_FUNC_MASK: u16 = 0x0780;
pub const COB_FUNC_SHIFT: u16 = 7;
pub const COB_NODE_MASK: u16 = 0x007F;
pub const MAX_DATA_LEN: usize = 8;
pub const MAX_NODE_ID: u8 = 0x7F;

/// Canopen function codes (bits 7-10 of the standard COB-ID).
pub const FC_NMT_CONTROL: u8 = 0x0;
pub const FC_SYNC_EMERGENCY: u8 = 0x1;
pub const FC_TIMESTAMP: u8 = 0x2;
pub const FC_PDO1_TX: u8 = 0x3;
pub const FC_PDO1_RX: u8 = 0x4;
pub const FC_PDO2_TX: u8 = 0x5;
pub const FC_PDO2_RX: u8 = 0x6;
pub const FC_PDO3_TX: u8 = 0x7;
pub const FC_PDO3_RX: u8 = 0x8;
pub const FC_PDO4_TX: u8 = 0x9;
pub const FC_PDO4_RX: u8 = 0xA;
pub const FC_SDO_TX: u8 = 0xB;
pub const FC_SDO_RX: u8 = 0xC;
pub const FC_NODE_GUARD: u8 = 0xE;

/// NMT module control command specifiers.
pub const NMT_CS_START: u8 = 0x01;
pub const NMT_CS_STOP: u8 = 0x02;
pub const NMT_CS_ENTER_PRE_OPERATIONAL: u8 = 0x80;
pub const NMT_CS_RESET_APPLICATION: u8 = 0x81;
pub const NMT_CS_RESET_COMMUNICATION: u8 = 0x82;

/// Node guarding reply: state in the low 7 bits, toggle in the top bit.
pub const NMT_NG_STATE_MASK: u8 = 0x7F;
pub const NMT_NG_TOGGLE_FLAG: u8 = 0x80;

/// SDO command specifiers, top 3 bits of the command byte.
pub const SDO_CS_MASK: u8 = 0xE0;

// client -> server
pub const SDO_CCS_DOWNLOAD_SEGMENT: u8 = 0x0;
pub const SDO_CCS_INITIATE_DOWNLOAD: u8 = 0x1;
pub const SDO_CCS_INITIATE_UPLOAD: u8 = 0x2;
pub const SDO_CCS_UPLOAD_SEGMENT: u8 = 0x3;
pub const SDO_CCS_BLOCK_UPLOAD: u8 = 0x5;
pub const SDO_CCS_BLOCK_DOWNLOAD: u8 = 0x6;

// server -> client
pub const SDO_SCS_UPLOAD_SEGMENT: u8 = 0x0;
pub const SDO_SCS_DOWNLOAD_SEGMENT: u8 = 0x1;
pub const SDO_SCS_INITIATE_UPLOAD: u8 = 0x2;
pub const SDO_SCS_INITIATE_DOWNLOAD: u8 = 0x3;
pub const SDO_SCS_BLOCK_DOWNLOAD: u8 = 0x5;
pub const SDO_SCS_BLOCK_UPLOAD: u8 = 0x6;

// either direction
pub const SDO_CS_ABORT: u8 = 0x4;

/// Block download sub-commands (bits 1-0 of a server block reply).
pub const SDO_BLOCK_SS_INITIATE: u8 = 0x0;
pub const SDO_BLOCK_SS_END: u8 = 0x1;
pub const SDO_BLOCK_SS_ACK: u8 = 0x2;

/// Data bytes carried by one segment, and by one expedited frame.
pub const SDO_SEGMENT_DATA_LEN: usize = 7;
pub const SDO_EXPEDITED_DATA_LEN: usize = 4;
pub const SDO_MAX_BLOCK_SIZE: u8 = 0x7F;

/// Retry budgets, counted in received frames.
pub const EXPEDITED_UPLOAD_ROUNDS: usize = 10;
pub const TRANSFER_ROUNDS: usize = 1000;

/// Identity object (0x1018) sub-indices.
pub const REG_IDENTITY: u16 = 0x1018;
pub const REG_IDENTITY_VENDOR_ID: u8 = 0x01;
pub const REG_IDENTITY_PRODUCT_CODE: u8 = 0x02;
pub const REG_IDENTITY_REVISION: u8 = 0x03;
