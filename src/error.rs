use core::fmt::Formatter;

use crate::frame::SdoPayload;
use crate::prelude::*;

/// Errors of the frame codec and frame builders.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ErrorCode {
    Malformed { more_info: String },
    ByteLengthExceedsLimit { len: usize, limit: usize },
    InvalidStandardId { cob_id: u16 },
    InvalidExtendedId { id: u32 },
    InvalidNodeId { node: u8 },
    FrameCreationFailed { data: Vec<u8> },
    WrongPayloadArm { expected: &'static str },
}

impl Debug for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Malformed { more_info } => write!(f, "Malformed frame: {}", more_info),
            ErrorCode::ByteLengthExceedsLimit { len, limit } =>
                write!(f, "Byte length {} exceeds limit {}", len, limit),
            ErrorCode::InvalidStandardId { cob_id } => write!(f, "Invalid Standard ID: {:#x}", cob_id),
            ErrorCode::InvalidExtendedId { id } => write!(f, "Invalid Extended ID: {:#x}", id),
            ErrorCode::InvalidNodeId { node } => write!(f, "Invalid node id: {:#x}", node),
            ErrorCode::FrameCreationFailed { data } => write!(f, "Frame creation failed, data: {:x?}", data),
            ErrorCode::WrongPayloadArm { expected } =>
                write!(f, "Frame payload is not a {} payload", expected),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

/// Failure of one SDO transfer, generic over the transport's own error.
pub enum SdoError<E> {
    /// The transport failed to send or receive; never retried.
    Transport(E),
    /// A frame could not be decoded or built.
    Malformed(ErrorCode),
    /// The device aborted the transfer.
    Abort { code: u32, description: &'static str },
    /// The retry budget ran out before a terminating reply arrived.
    Timeout,
    /// The requested transfer mode is not implemented.
    Unsupported { operation: &'static str },
}

impl<E> From<ErrorCode> for SdoError<E> {
    fn from(ec: ErrorCode) -> Self {
        SdoError::Malformed(ec)
    }
}

impl<E: Debug> Debug for SdoError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SdoError::Transport(err) => write!(f, "Transport error: {:?}", err),
            SdoError::Malformed(ec) => write!(f, "{:?}", ec),
            SdoError::Abort { code, description } =>
                write!(f, "SDO abort {:#010x}: {}", code, description),
            SdoError::Timeout => write!(f, "SDO transfer timed out"),
            SdoError::Unsupported { operation } => write!(f, "Unsupported SDO operation: {}", operation),
        }
    }
}

impl<E: Debug> fmt::Display for SdoError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
impl<E: Debug> std::error::Error for SdoError<E> {}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
impl std::error::Error for ErrorCode {}

impl<E> PartialEq for SdoError<E> {
    /// Transport errors never compare equal; everything else compares by value.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SdoError::Malformed(a), SdoError::Malformed(b)) => a == b,
            (SdoError::Abort { code: a, .. }, SdoError::Abort { code: b, .. }) => a == b,
            (SdoError::Timeout, SdoError::Timeout) => true,
            (SdoError::Unsupported { operation: a }, SdoError::Unsupported { operation: b }) => a == b,
            _ => false,
        }
    }
}

/// Failure of an NMT exchange over a transport.
pub enum NmtError<E> {
    Transport(E),
    Malformed(ErrorCode),
    /// No matching node guard reply within the round budget.
    Timeout,
}

impl<E> From<ErrorCode> for NmtError<E> {
    fn from(ec: ErrorCode) -> Self {
        NmtError::Malformed(ec)
    }
}

impl<E: Debug> Debug for NmtError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NmtError::Transport(err) => write!(f, "Transport error: {:?}", err),
            NmtError::Malformed(ec) => write!(f, "{:?}", ec),
            NmtError::Timeout => write!(f, "Node guard timed out"),
        }
    }
}

impl<E: Debug> fmt::Display for NmtError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
impl<E: Debug> std::error::Error for NmtError<E> {}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum AbortCode {
    ToggleBitNotAlternated,
    SdoProtocolTimedOut,
    CommandSpecifierNotValidOrUnknown,
    InvalidBlockSize,
    InvalidSequenceNumber,
    CRCError,
    OutOfMemory,
    UnsupportedAccessToObject,
    AttemptToReadWriteOnlyObject,
    AttemptToWriteReadOnlyObject,
    ObjectDoesNotExistInObjectDictionary,
    ObjectCannotBeMappedToPDO,
    ExceedPDOSize,
    GeneralParameterIncompatibility,
    GeneralInternalIncompatibility,
    HardwareError,
    DataTypeMismatchLengthMismatch,
    DataTypeMismatchLengthTooHigh,
    DataTypeMismatchLengthTooLow,
    SubIndexDoesNotExist,
    ValueRangeExceeded,
    ValueWrittenTooHigh,
    ValueWrittenTooLow,
    MaxValueLessThanMinValue,
    GeneralError,
    DataTransferOrStoreFailed,
    DataTransferOrStoreFailedDueToLocalControl,
    DataTransferOrStoreFailedDueToDeviceState,
    ObjectDictionaryGenerationFailedOrNotPresent,
}

/// Lookup order of the abort code registry.
pub static ABORT_CODES: [AbortCode; 29] = [
    AbortCode::ToggleBitNotAlternated,
    AbortCode::SdoProtocolTimedOut,
    AbortCode::CommandSpecifierNotValidOrUnknown,
    AbortCode::InvalidBlockSize,
    AbortCode::InvalidSequenceNumber,
    AbortCode::CRCError,
    AbortCode::OutOfMemory,
    AbortCode::UnsupportedAccessToObject,
    AbortCode::AttemptToReadWriteOnlyObject,
    AbortCode::AttemptToWriteReadOnlyObject,
    AbortCode::ObjectDoesNotExistInObjectDictionary,
    AbortCode::ObjectCannotBeMappedToPDO,
    AbortCode::ExceedPDOSize,
    AbortCode::GeneralParameterIncompatibility,
    AbortCode::GeneralInternalIncompatibility,
    AbortCode::HardwareError,
    AbortCode::DataTypeMismatchLengthMismatch,
    AbortCode::DataTypeMismatchLengthTooHigh,
    AbortCode::DataTypeMismatchLengthTooLow,
    AbortCode::SubIndexDoesNotExist,
    AbortCode::ValueRangeExceeded,
    AbortCode::ValueWrittenTooHigh,
    AbortCode::ValueWrittenTooLow,
    AbortCode::MaxValueLessThanMinValue,
    AbortCode::GeneralError,
    AbortCode::DataTransferOrStoreFailed,
    AbortCode::DataTransferOrStoreFailedDueToLocalControl,
    AbortCode::DataTransferOrStoreFailedDueToDeviceState,
    AbortCode::ObjectDictionaryGenerationFailedOrNotPresent,
];

pub const UNKNOWN_ABORT_DESCRIPTION: &str = "Unknown error";
pub const NULL_SDO_DESCRIPTION: &str = "SDO null";

impl AbortCode {
    pub fn code(&self) -> u32 {
        match *self {
            AbortCode::ToggleBitNotAlternated => 0x0503_0000,
            AbortCode::SdoProtocolTimedOut => 0x0504_0000,
            AbortCode::CommandSpecifierNotValidOrUnknown => 0x0504_0001,
            AbortCode::InvalidBlockSize => 0x0504_0002,
            AbortCode::InvalidSequenceNumber => 0x0504_0003,
            AbortCode::CRCError => 0x0504_0004,
            AbortCode::OutOfMemory => 0x0504_0005,
            AbortCode::UnsupportedAccessToObject => 0x0601_0000,
            AbortCode::AttemptToReadWriteOnlyObject => 0x0601_0001,
            AbortCode::AttemptToWriteReadOnlyObject => 0x0601_0002,
            AbortCode::ObjectDoesNotExistInObjectDictionary => 0x0602_0000,
            AbortCode::ObjectCannotBeMappedToPDO => 0x0604_0041,
            AbortCode::ExceedPDOSize => 0x0604_0042,
            AbortCode::GeneralParameterIncompatibility => 0x0604_0043,
            AbortCode::GeneralInternalIncompatibility => 0x0604_0047,
            AbortCode::HardwareError => 0x0606_0000,
            AbortCode::DataTypeMismatchLengthMismatch => 0x0607_0010,
            AbortCode::DataTypeMismatchLengthTooHigh => 0x0607_0012,
            AbortCode::DataTypeMismatchLengthTooLow => 0x0607_0013,
            AbortCode::SubIndexDoesNotExist => 0x0609_0011,
            AbortCode::ValueRangeExceeded => 0x0609_0030,
            AbortCode::ValueWrittenTooHigh => 0x0609_0031,
            AbortCode::ValueWrittenTooLow => 0x0609_0032,
            AbortCode::MaxValueLessThanMinValue => 0x0609_0036,
            AbortCode::GeneralError => 0x0800_0000,
            AbortCode::DataTransferOrStoreFailed => 0x0800_0020,
            AbortCode::DataTransferOrStoreFailedDueToLocalControl => 0x0800_0021,
            AbortCode::DataTransferOrStoreFailedDueToDeviceState => 0x0800_0022,
            AbortCode::ObjectDictionaryGenerationFailedOrNotPresent => 0x0800_0023,
        }
    }

    pub fn description(&self) -> &'static str {
        match *self {
            AbortCode::ToggleBitNotAlternated => "Toggle bit not alternated",
            AbortCode::SdoProtocolTimedOut => "SDO protocol timed out",
            AbortCode::CommandSpecifierNotValidOrUnknown => "Client/server command specifier not valid or unknown",
            AbortCode::InvalidBlockSize => "Invalid block size (block mode only)",
            AbortCode::InvalidSequenceNumber => "Invalid sequence number (block mode only)",
            AbortCode::CRCError => "CRC error (block mode only)",
            AbortCode::OutOfMemory => "Out of memory",
            AbortCode::UnsupportedAccessToObject => "Unsupported access to an object",
            AbortCode::AttemptToReadWriteOnlyObject => "Attempt to read a write only object",
            AbortCode::AttemptToWriteReadOnlyObject => "Attempt to write a read only object",
            AbortCode::ObjectDoesNotExistInObjectDictionary => "Object does not exist in the object dictionary",
            AbortCode::ObjectCannotBeMappedToPDO => "Object cannot be mapped to the PDO",
            AbortCode::ExceedPDOSize => "The number and length of the objects to be mapped would exceed PDO length",
            AbortCode::GeneralParameterIncompatibility => "General parameter incompatibility reason",
            AbortCode::GeneralInternalIncompatibility => "General internal incompatibility in the device",
            AbortCode::HardwareError => "Access failed due to a hardware error",
            AbortCode::DataTypeMismatchLengthMismatch => "Data type does not match; length of service parameter does not match",
            AbortCode::DataTypeMismatchLengthTooHigh => "Data type does not match; length of service parameter too high",
            AbortCode::DataTypeMismatchLengthTooLow => "Data type does not match; length of service parameter too low",
            AbortCode::SubIndexDoesNotExist => "Sub-index does not exist",
            AbortCode::ValueRangeExceeded => "Value range of parameter exceeded (only for write access)",
            AbortCode::ValueWrittenTooHigh => "Value of parameter written too high",
            AbortCode::ValueWrittenTooLow => "Value of parameter written too low",
            AbortCode::MaxValueLessThanMinValue => "Maximum value is less than minimum value",
            AbortCode::GeneralError => "General error",
            AbortCode::DataTransferOrStoreFailed => "Data cannot be transferred or stored to the application",
            AbortCode::DataTransferOrStoreFailedDueToLocalControl => "Data cannot be transferred or stored to the application because of local control",
            AbortCode::DataTransferOrStoreFailedDueToDeviceState => "Data cannot be transferred or stored to the application because of the present device state",
            AbortCode::ObjectDictionaryGenerationFailedOrNotPresent => "Object dictionary dynamic generation fails or no object dictionary is present (e.g. object dictionary is generated from file and generation fails because of a file error)",
        }
    }

    /// Linear search of the registry, first match wins.
    pub fn from_code(code: u32) -> Option<Self> {
        ABORT_CODES.iter().find(|ac| ac.code() == code).copied()
    }
}

pub fn describe_abort_code(code: u32) -> &'static str {
    AbortCode::from_code(code).map_or(UNKNOWN_ABORT_DESCRIPTION, |ac| ac.description())
}

/// Resolves the abort code carried in the 4 data bytes of an abort frame.
pub fn lookup(sdo: Option<&SdoPayload>) -> &'static str {
    match sdo {
        Some(sdo) => describe_abort_code(u32::from_le_bytes(sdo.data)),
        None => NULL_SDO_DESCRIPTION,
    }
}
