//! Conversion between raw CAN frames and structured CANopen frames.
//!
//! Any type implementing [`embedded_can::Frame`] can be parsed or produced;
//! [`RawFrame`] is the crate's own plain implementation.

use embedded_can::{ExtendedId, Frame, Id, StandardId};

use crate::cmd_header::{command_specifier, SdoInitiateCmd, SdoSegmentCmd};
use crate::constant::*;
use crate::error::ErrorCode;
use crate::prelude::*;

/// A classic CAN frame: 11 or 29 bit identifier, RTR flag and up to 8 bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RawFrame {
    id: Id,
    rtr: bool,
    dlc: u8,
    data: [u8; MAX_DATA_LEN],
}

impl RawFrame {
    /// Linux SocketCAN style identifier: id bits plus EFF (bit 31) and RTR (bit 30) flags.
    pub fn can_id(&self) -> u32 {
        let mut can_id = match self.id {
            Id::Standard(sid) => sid.as_raw() as u32,
            Id::Extended(eid) => eid.as_raw() | 0x8000_0000,
        };
        if self.rtr {
            can_id |= 0x4000_0000;
        }
        can_id
    }
}

impl Frame for RawFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_DATA_LEN {
            return None;
        }
        let mut buf = [0u8; MAX_DATA_LEN];
        buf[..data.len()].copy_from_slice(data);
        Some(RawFrame { id: id.into(), rtr: false, dlc: data.len() as u8, data: buf })
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > MAX_DATA_LEN {
            return None;
        }
        Some(RawFrame { id: id.into(), rtr: true, dlc: dlc as u8, data: [0; MAX_DATA_LEN] })
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.rtr
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    fn data(&self) -> &[u8] {
        if self.rtr {
            &[]
        } else {
            &self.data[..self.dlc as usize]
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Addressing {
    Standard,
    Extended,
}

/// The 4-bit function code of a standard COB-ID.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FunctionCode {
    NmtControl,
    SyncEmergency,
    Timestamp,
    Pdo1Tx,
    Pdo1Rx,
    Pdo2Tx,
    Pdo2Rx,
    Pdo3Tx,
    Pdo3Rx,
    Pdo4Tx,
    Pdo4Rx,
    SdoTx,
    SdoRx,
    NodeGuard,
    /// Function codes outside the modelled set (0xD, 0xF).
    Unknown(u8),
}

impl FunctionCode {
    pub fn code(&self) -> u8 {
        match *self {
            FunctionCode::NmtControl => FC_NMT_CONTROL,
            FunctionCode::SyncEmergency => FC_SYNC_EMERGENCY,
            FunctionCode::Timestamp => FC_TIMESTAMP,
            FunctionCode::Pdo1Tx => FC_PDO1_TX,
            FunctionCode::Pdo1Rx => FC_PDO1_RX,
            FunctionCode::Pdo2Tx => FC_PDO2_TX,
            FunctionCode::Pdo2Rx => FC_PDO2_RX,
            FunctionCode::Pdo3Tx => FC_PDO3_TX,
            FunctionCode::Pdo3Rx => FC_PDO3_RX,
            FunctionCode::Pdo4Tx => FC_PDO4_TX,
            FunctionCode::Pdo4Rx => FC_PDO4_RX,
            FunctionCode::SdoTx => FC_SDO_TX,
            FunctionCode::SdoRx => FC_SDO_RX,
            FunctionCode::NodeGuard => FC_NODE_GUARD,
            FunctionCode::Unknown(code) => code & 0x0F,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code & 0x0F {
            FC_NMT_CONTROL => FunctionCode::NmtControl,
            FC_SYNC_EMERGENCY => FunctionCode::SyncEmergency,
            FC_TIMESTAMP => FunctionCode::Timestamp,
            FC_PDO1_TX => FunctionCode::Pdo1Tx,
            FC_PDO1_RX => FunctionCode::Pdo1Rx,
            FC_PDO2_TX => FunctionCode::Pdo2Tx,
            FC_PDO2_RX => FunctionCode::Pdo2Rx,
            FC_PDO3_TX => FunctionCode::Pdo3Tx,
            FC_PDO3_RX => FunctionCode::Pdo3Rx,
            FC_PDO4_TX => FunctionCode::Pdo4Tx,
            FC_PDO4_RX => FunctionCode::Pdo4Rx,
            FC_SDO_TX => FunctionCode::SdoTx,
            FC_SDO_RX => FunctionCode::SdoRx,
            FC_NODE_GUARD => FunctionCode::NodeGuard,
            other => FunctionCode::Unknown(other),
        }
    }

    pub fn is_sdo(&self) -> bool {
        matches!(self, FunctionCode::SdoTx | FunctionCode::SdoRx)
    }
}

/// The 8 bytes of an SDO frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SdoPayload {
    pub command: u8,
    pub index: u16,
    pub subindex: u8,
    pub data: [u8; 4],
}

impl SdoPayload {
    pub fn new(command: u8, index: u16, subindex: u8, data: [u8; 4]) -> Self {
        SdoPayload { command, index, subindex, data }
    }

    pub fn from_bytes(bytes: &[u8; MAX_DATA_LEN]) -> Self {
        SdoPayload {
            command: bytes[0],
            index: u16::from_le_bytes([bytes[1], bytes[2]]),
            subindex: bytes[3],
            data: [bytes[4], bytes[5], bytes[6], bytes[7]],
        }
    }

    pub fn to_bytes(&self) -> [u8; MAX_DATA_LEN] {
        let [lsb, msb] = self.index.to_le_bytes();
        [self.command, lsb, msb, self.subindex, self.data[0], self.data[1], self.data[2], self.data[3]]
    }

    /// Valid bytes of an expedited initiate frame: `4 - n` when the size is
    /// indicated, 4 when it is not, 0 for a segmented initiate.
    pub fn expedited_size(&self) -> usize {
        let cmd = SdoInitiateCmd::from(self.command);
        match (cmd.e(), cmd.s()) {
            (true, true) => SDO_EXPEDITED_DATA_LEN - cmd.n() as usize,
            (true, false) => SDO_EXPEDITED_DATA_LEN,
            _ => 0,
        }
    }

    /// Valid bytes of an upload or download segment, `7 - n`.
    pub fn segment_size(&self) -> usize {
        SDO_SEGMENT_DATA_LEN - SdoSegmentCmd::from(self.command).n() as usize
    }

    /// Data bytes carried by this frame, read from the command byte: segment
    /// frames (specifier 0) hold `7 - n`, initiate frames `4 - n`.
    pub fn size(&self) -> usize {
        match command_specifier(self.command) {
            SDO_CCS_DOWNLOAD_SEGMENT => self.segment_size(),
            SDO_CCS_INITIATE_DOWNLOAD | SDO_CCS_INITIATE_UPLOAD => self.expedited_size(),
            _ => 0,
        }
    }
}

/// Payload of a CANopen frame; the arm is picked from the function code and length.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Payload {
    NmtControl { cs: u8, node: u8 },
    NodeGuard { state: u8 },
    Sdo(SdoPayload),
    Raw([u8; MAX_DATA_LEN]),
}

impl Payload {
    fn decode(function_code: Option<FunctionCode>, rtr: bool, bytes: [u8; MAX_DATA_LEN], data_len: usize)
        -> Payload {
        match function_code {
            Some(FunctionCode::NmtControl) if data_len == 2 && !rtr =>
                Payload::NmtControl { cs: bytes[0], node: bytes[1] },
            Some(FunctionCode::NodeGuard) if data_len == 1 && !rtr => Payload::NodeGuard { state: bytes[0] },
            Some(fc) if fc.is_sdo() && data_len == MAX_DATA_LEN && !rtr =>
                Payload::Sdo(SdoPayload::from_bytes(&bytes)),
            _ => Payload::Raw(bytes),
        }
    }

    pub fn bytes(&self) -> [u8; MAX_DATA_LEN] {
        match *self {
            Payload::NmtControl { cs, node } => [cs, node, 0, 0, 0, 0, 0, 0],
            Payload::NodeGuard { state } => [state, 0, 0, 0, 0, 0, 0, 0],
            Payload::Sdo(sdo) => sdo.to_bytes(),
            Payload::Raw(bytes) => bytes,
        }
    }
}

/// A parsed CANopen frame.
///
/// `node_id` is the 7-bit node id for standard frames and the whole 29-bit
/// identifier for extended frames, which carry no function code. Payload
/// bytes past `data_len` are always zero.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct CanopenFrame {
    pub addressing: Addressing,
    pub rtr: bool,
    pub function_code: Option<FunctionCode>,
    pub node_id: u32,
    pub payload: Payload,
    pub data_len: u8,
}

impl CanopenFrame {
    /// Standard frame addressed to `node`.
    pub fn new(function_code: FunctionCode, node: u8, rtr: bool, data: &[u8]) -> Result<Self, ErrorCode> {
        if node > MAX_NODE_ID {
            return Err(ErrorCode::InvalidStandardId {
                cob_id: ((function_code.code() as u16) << COB_FUNC_SHIFT) | node as u16,
            });
        }
        let (bytes, data_len) = copy_payload(data, rtr)?;
        let function_code = Some(function_code);
        Ok(CanopenFrame {
            addressing: Addressing::Standard,
            rtr,
            function_code,
            node_id: node as u32,
            payload: Payload::decode(function_code, rtr, bytes, data_len),
            data_len: data_len as u8,
        })
    }

    /// Extended (29-bit) frame; no function code is modelled for these.
    pub fn extended(id: u32, rtr: bool, data: &[u8]) -> Result<Self, ErrorCode> {
        if id > CAN_EFF_MASK {
            return Err(ErrorCode::InvalidExtendedId { id });
        }
        let (bytes, data_len) = copy_payload(data, rtr)?;
        Ok(CanopenFrame {
            addressing: Addressing::Extended,
            rtr,
            function_code: None,
            node_id: id,
            payload: Payload::Raw(bytes),
            data_len: data_len as u8,
        })
    }

    pub fn sdo_frame(function_code: FunctionCode, node: u8, sdo: SdoPayload) -> Result<Self, ErrorCode> {
        CanopenFrame::new(function_code, node, false, &sdo.to_bytes())
    }

    pub fn bytes(&self) -> [u8; MAX_DATA_LEN] {
        self.payload.bytes()
    }

    pub fn data(&self) -> Vec<u8> {
        self.bytes()[..self.data_len as usize].to_vec()
    }

    /// Standard COB-ID, `(function_code << 7) | node_id`.
    pub fn cob_id(&self) -> u32 {
        let fc = self.function_code.map_or(0, |fc| fc.code() as u32);
        (fc << COB_FUNC_SHIFT) | self.node_id
    }

    pub fn sdo(&self) -> Result<&SdoPayload, ErrorCode> {
        match &self.payload {
            Payload::Sdo(sdo) => Ok(sdo),
            _ => Err(ErrorCode::WrongPayloadArm { expected: "SDO" }),
        }
    }

    pub fn nmt_control(&self) -> Result<(u8, u8), ErrorCode> {
        match self.payload {
            Payload::NmtControl { cs, node } => Ok((cs, node)),
            _ => Err(ErrorCode::WrongPayloadArm { expected: "NMT module control" }),
        }
    }

    pub fn node_guard_state(&self) -> Result<u8, ErrorCode> {
        match self.payload {
            Payload::NodeGuard { state } => Ok(state),
            _ => Err(ErrorCode::WrongPayloadArm { expected: "node guard" }),
        }
    }

    /// True for a standard frame with the given function code from or to `node`.
    pub fn is_from(&self, function_code: FunctionCode, node: u8) -> bool {
        self.addressing == Addressing::Standard
            && self.function_code == Some(function_code)
            && self.node_id == node as u32
    }
}

/// A remote frame keeps the requested length but carries no bytes.
fn copy_payload(data: &[u8], rtr: bool) -> Result<([u8; MAX_DATA_LEN], usize), ErrorCode> {
    if data.len() > MAX_DATA_LEN {
        return Err(ErrorCode::ByteLengthExceedsLimit { len: data.len(), limit: MAX_DATA_LEN });
    }
    let mut bytes = [0u8; MAX_DATA_LEN];
    if !rtr {
        bytes[..data.len()].copy_from_slice(data);
    }
    Ok((bytes, data.len()))
}

/// Parses a raw CAN frame into a CANopen frame.
pub fn parse<F: Frame>(raw: &F) -> Result<CanopenFrame, ErrorCode> {
    let rtr = raw.is_remote_frame();
    let data_len = raw.dlc();
    if data_len > MAX_DATA_LEN {
        return Err(ErrorCode::Malformed { more_info: format!("dlc {} exceeds {}", data_len, MAX_DATA_LEN) });
    }
    let data = raw.data();
    if data.len() > MAX_DATA_LEN || (!rtr && data.len() != data_len) {
        return Err(ErrorCode::Malformed {
            more_info: format!("dlc {} but {} data bytes", data_len, data.len()),
        });
    }
    let mut bytes = [0u8; MAX_DATA_LEN];
    bytes[..data.len()].copy_from_slice(data);

    let frame = match raw.id() {
        Id::Extended(eid) => CanopenFrame {
            addressing: Addressing::Extended,
            rtr,
            function_code: None,
            node_id: eid.as_raw() & CAN_EFF_MASK,
            payload: Payload::Raw(bytes),
            data_len: data_len as u8,
        },
        Id::Standard(sid) => {
            let raw_id = sid.as_raw();
            let function_code = Some(FunctionCode::from_code(((raw_id & COB_FUNC_MASK) >> COB_FUNC_SHIFT) as u8));
            CanopenFrame {
                addressing: Addressing::Standard,
                rtr,
                function_code,
                node_id: (raw_id & COB_NODE_MASK) as u32,
                payload: Payload::decode(function_code, rtr, bytes, data_len),
                data_len: data_len as u8,
            }
        }
    };
    Ok(frame)
}

/// Packs a CANopen frame into a raw CAN frame ready for the bus.
pub fn pack<F: Frame>(frame: &CanopenFrame) -> Result<F, ErrorCode> {
    let data_len = frame.data_len as usize;
    if data_len > MAX_DATA_LEN {
        return Err(ErrorCode::ByteLengthExceedsLimit { len: data_len, limit: MAX_DATA_LEN });
    }
    let id: Id = match frame.addressing {
        Addressing::Standard => {
            if frame.node_id > COB_NODE_MASK as u32 {
                return Err(ErrorCode::InvalidStandardId { cob_id: frame.cob_id() as u16 });
            }
            let cob_id = frame.cob_id() as u16;
            StandardId::new(cob_id).ok_or(ErrorCode::InvalidStandardId { cob_id })?.into()
        }
        Addressing::Extended => {
            let id = frame.cob_id();
            ExtendedId::new(id).ok_or(ErrorCode::InvalidExtendedId { id })?.into()
        }
    };
    let bytes = frame.bytes();
    let raw = if frame.rtr {
        F::new_remote(id, data_len)
    } else {
        F::new(id, &bytes[..data_len])
    };
    raw.ok_or(ErrorCode::FrameCreationFailed { data: bytes[..data_len].to_vec() })
}

#[cfg(test)]
mod frame_tests {
    use super::*;

    const ALL_FUNCTION_CODES: [FunctionCode; 14] = [
        FunctionCode::NmtControl,
        FunctionCode::SyncEmergency,
        FunctionCode::Timestamp,
        FunctionCode::Pdo1Tx,
        FunctionCode::Pdo1Rx,
        FunctionCode::Pdo2Tx,
        FunctionCode::Pdo2Rx,
        FunctionCode::Pdo3Tx,
        FunctionCode::Pdo3Rx,
        FunctionCode::Pdo4Tx,
        FunctionCode::Pdo4Rx,
        FunctionCode::SdoTx,
        FunctionCode::SdoRx,
        FunctionCode::NodeGuard,
    ];

    struct MockFrame {
        id: Id,
        dlc: usize,
        data: Vec<u8>,
    }

    impl Frame for MockFrame {
        fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
            Some(MockFrame { id: id.into(), dlc: data.len(), data: data.to_vec() })
        }

        fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
            None
        }

        fn is_extended(&self) -> bool {
            matches!(self.id, Id::Extended(_))
        }

        fn is_remote_frame(&self) -> bool {
            false
        }

        fn id(&self) -> Id {
            self.id
        }

        fn dlc(&self) -> usize {
            self.dlc
        }

        fn data(&self) -> &[u8] {
            &self.data
        }
    }

    fn std_id(raw: u16) -> StandardId {
        StandardId::new(raw).unwrap()
    }

    #[test]
    fn test_parse_sdo_request() {
        let raw = RawFrame::new(std_id(0x607), &[0x40, 0x18, 0x10, 0x01, 0, 0, 0, 0]).unwrap();
        let frame = parse(&raw).unwrap();
        assert_eq!(frame.addressing, Addressing::Standard);
        assert_eq!(frame.function_code, Some(FunctionCode::SdoRx));
        assert_eq!(frame.node_id, 0x07);
        assert!(!frame.rtr);
        assert_eq!(frame.data_len, 8);
        let sdo = frame.sdo().unwrap();
        assert_eq!(sdo.command, 0x40);
        assert_eq!(sdo.index, 0x1018);
        assert_eq!(sdo.subindex, 0x01);
        assert!(frame.nmt_control().is_err());
    }

    #[test]
    fn test_parse_extended() {
        let eid = ExtendedId::new(0x1234_5678).unwrap();
        let raw = RawFrame::new(eid, &[1, 2, 3]).unwrap();
        let frame = parse(&raw).unwrap();
        assert_eq!(frame.addressing, Addressing::Extended);
        assert_eq!(frame.function_code, None);
        assert_eq!(frame.node_id, 0x1234_5678);
        assert_eq!(frame.data(), vec![1, 2, 3]);
        assert_eq!(raw.can_id(), 0x9234_5678);
    }

    #[test]
    fn test_parse_remote() {
        let raw = RawFrame::new_remote(std_id(0x707), 0).unwrap();
        let frame = parse(&raw).unwrap();
        assert!(frame.rtr);
        assert_eq!(frame.function_code, Some(FunctionCode::NodeGuard));
        assert_eq!(frame.payload, Payload::Raw([0; 8]));
        assert_eq!(raw.can_id(), 0x4000_0707);
    }

    #[test]
    fn test_parse_malformed() {
        let raw = MockFrame { id: std_id(0x581).into(), dlc: 9, data: vec![0; 9] };
        assert!(matches!(parse(&raw), Err(ErrorCode::Malformed { .. })));

        let truncated = MockFrame { id: std_id(0x581).into(), dlc: 8, data: vec![0x43, 0x18] };
        assert!(matches!(parse(&truncated), Err(ErrorCode::Malformed { .. })));
    }

    #[test]
    fn test_round_trip_standard() {
        let data = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
        for fc in ALL_FUNCTION_CODES {
            for len in 0..=8 {
                for rtr in [false, true] {
                    let f = CanopenFrame::new(fc, 0x2A, rtr, &data[..len]).unwrap();
                    let raw: RawFrame = pack(&f).unwrap();
                    assert_eq!(raw.dlc(), len);
                    assert_eq!(parse(&raw).unwrap(), f, "fc = {:?}, len = {}, rtr = {}", fc, len, rtr);
                }
            }
        }
    }

    #[test]
    fn test_round_trip_extended() {
        let data = [0xA5; 8];
        for len in 0..=8 {
            for rtr in [false, true] {
                let f = CanopenFrame::extended(0x1ABC_DEF0, rtr, &data[..len]).unwrap();
                let raw: RawFrame = pack(&f).unwrap();
                assert!(raw.is_extended());
                assert_eq!(raw.is_remote_frame(), rtr);
                assert_eq!(parse(&raw).unwrap(), f);
            }
        }
    }

    #[test]
    fn test_remote_frame_drops_data() {
        let f = CanopenFrame::new(FunctionCode::NodeGuard, 5, true, &[1, 2]).unwrap();
        assert_eq!(f.data_len, 2);
        assert_eq!(f.payload, Payload::Raw([0; 8]));
        let raw: RawFrame = pack(&f).unwrap();
        assert_eq!(raw.dlc(), 2);
        assert!(raw.data().is_empty());
        assert_eq!(parse(&raw).unwrap(), f);
    }

    #[test]
    fn test_pack_identifier() {
        let sdo = SdoPayload::new(0x40, 0x1018, 0x01, [0; 4]);
        let f = CanopenFrame::sdo_frame(FunctionCode::SdoRx, 0x07, sdo).unwrap();
        let raw: RawFrame = pack(&f).unwrap();
        assert_eq!(raw.id(), Id::Standard(std_id(0x607)));
        assert_eq!(raw.data(), &[0x40, 0x18, 0x10, 0x01, 0, 0, 0, 0]);
    }

    #[test]
    fn test_invalid_frames() {
        assert!(matches!(
            CanopenFrame::new(FunctionCode::SdoRx, 0x80, false, &[]),
            Err(ErrorCode::InvalidStandardId { .. })
        ));
        assert!(matches!(
            CanopenFrame::new(FunctionCode::Pdo1Tx, 1, false, &[0; 9]),
            Err(ErrorCode::ByteLengthExceedsLimit { len: 9, limit: 8 })
        ));
        assert!(matches!(CanopenFrame::extended(0x2000_0000, false, &[]), Err(ErrorCode::InvalidExtendedId { .. })));
    }

    #[test]
    fn test_sdo_sizes() {
        assert_eq!(SdoPayload::new(0x43, 0, 0, [0; 4]).expedited_size(), 4);
        assert_eq!(SdoPayload::new(0x47, 0, 0, [0; 4]).expedited_size(), 3);
        assert_eq!(SdoPayload::new(0x4F, 0, 0, [0; 4]).expedited_size(), 1);
        assert_eq!(SdoPayload::new(0x42, 0, 0, [0; 4]).expedited_size(), 4);
        assert_eq!(SdoPayload::new(0x41, 0, 0, [0; 4]).expedited_size(), 0);
        assert_eq!(SdoPayload::new(0x0B, 0, 0, [0; 4]).segment_size(), 2);
        assert_eq!(SdoPayload::new(0x00, 0, 0, [0; 4]).segment_size(), 7);
        assert_eq!(SdoPayload::new(0x1B, 0, 0, [0; 4]).size(), 2);
        assert_eq!(SdoPayload::new(0x2B, 0, 0, [0; 4]).size(), 2);
        assert_eq!(SdoPayload::new(0x80, 0, 0, [0; 4]).size(), 0);
    }

    #[test]
    fn test_unknown_function_code() {
        let raw = RawFrame::new(std_id(0x7E5), &[0x04]).unwrap();
        let frame = parse(&raw).unwrap();
        assert_eq!(frame.function_code, Some(FunctionCode::Unknown(0xF)));
        assert_eq!(frame.node_id, 0x65);
        let packed: RawFrame = pack(&frame).unwrap();
        assert_eq!(packed, raw);
    }
}
