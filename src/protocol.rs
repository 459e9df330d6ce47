//! The AirTouch 4 console wire protocol.
//!
//! Messages are framed as `5555 | address | id | type | length | payload | crc16`. The payloads
//! of the status replies and control commands are fixed-size records whose fields are addressed
//! by byte and by *reversed* bit number: bit 1 is the least significant bit of the byte (or of
//! the big-endian 16-bit unit for fields that straddle two bytes). The tables in [`fields`]
//! describe where each field lives and [`bitfield`] reads and writes them.

pub mod bitfield;
pub mod checksum;
pub mod control;
pub mod fields;
pub mod message;
pub mod status;

pub use bitfield::{BitWriter, FieldSpec};
pub use checksum::checksum;
pub use control::{encode_ac_control, encode_group_temperature};
pub use fields::{FieldMap, NamedField};
pub use message::{Envelope, frame, unframe};
pub use status::{
    AcMode, AcStatus, ControlMethod, GroupStatus, PowerState, decode_ac_status,
    decode_group_names, decode_group_status,
};

/// Number of groups (zones) the console reports in this protocol revision.
///
/// Installations with more zones can pass a larger limit to the decoders.
pub const DEFAULT_GROUP_LIMIT: usize = 4;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("field descriptor {0} is malformed")]
    MalformedFieldSpec(FieldSpec),
    #[error("field {spec} needs byte {needed} but the chunk only has {available} bytes")]
    ByteOutOfRange { spec: FieldSpec, needed: usize, available: usize },
    #[error("value {value} does not fit into the {} bits of field {spec}", .spec.width())]
    FieldValueOverflow { spec: FieldSpec, value: u64 },
    #[error("`{0}` is not a known AC mode")]
    UnknownMode(String),
    #[error("frame is {0} bytes long, shorter than the 8 byte header")]
    FrameTooShort(usize),
    #[error("frame checksum is {received:04x}, but the contents hash to {computed:04x}")]
    ChecksumMismatch { received: u16, computed: u16 },
    #[error("payload of {0} bytes does not fit the 16-bit length field")]
    PayloadTooLong(usize),
}
