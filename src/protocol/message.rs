use tokio_util::bytes::{Buf as _, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use super::Error;
use super::checksum::checksum;

pub const PREAMBLE: [u8; 2] = [0x55, 0x55];
/// Address and message id that outbound messages are sent with.
pub const ADDRESS: [u8; 3] = [0x80, 0xb0, 0x01];
/// Preamble, address, id, type and length.
pub const HEADER_LEN: usize = 8;
pub const CHECKSUM_LEN: usize = 2;

pub const GROUP_STATUS_TYPE: u8 = 0x2b;
pub const AC_STATUS_TYPE: u8 = 0x2d;
pub const AC_CONTROL_TYPE: u8 = 0x2c;
pub const GROUP_CONTROL_TYPE: u8 = 0x2a;

pub const GROUP_STATUS_QUERY: [u8; 10] = [0x55, 0x55, 0x80, 0xb0, 0x01, 0x2b, 0x00, 0x00, 0xf5, 0x2f];
pub const GROUP_NAME_QUERY: [u8; 12] =
    [0x55, 0x55, 0x90, 0xb0, 0x01, 0x1f, 0x00, 0x02, 0xff, 0x12, 0x82, 0x0c];
pub const AC_STATUS_QUERY: [u8; 12] =
    [0x55, 0x55, 0x80, 0xb0, 0x01, 0x2d, 0x00, 0x00, 0xf4, 0xcf, 0xe3, 0x52];

/// Wrap `payload` into a complete frame ready to be written to the console.
pub fn frame(message_type: u8, payload: &[u8]) -> Result<Vec<u8>, Error> {
    let length = u16::try_from(payload.len()).map_err(|_| Error::PayloadTooLong(payload.len()))?;
    let mut buffer = Vec::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN);
    buffer.extend(PREAMBLE);
    buffer.extend(ADDRESS);
    buffer.push(message_type);
    buffer.extend(length.to_be_bytes());
    buffer.extend_from_slice(payload);
    let crc = checksum(&buffer[PREAMBLE.len()..]);
    buffer.extend(crc.to_be_bytes());
    trace!(message = "framed", message_type, frame = ?buffer);
    Ok(buffer)
}

/// A reply from the console split into its header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub address: [u8; 2],
    pub id: u8,
    pub message_type: u8,
    pub length: u16,
    /// Everything following the header, including the trailing checksum.
    pub body: Vec<u8>,
}

impl Envelope {
    /// The body cut down to the length declared in the header.
    ///
    /// If the body is shorter than declared, all of it is returned.
    pub fn payload(&self) -> &[u8] {
        let declared = usize::from(self.length);
        &self.body[..declared.min(self.body.len())]
    }
}

/// Split a reply into its header fields.
///
/// The checksum is not verified here; see [`verify_checksum`].
pub fn unframe(raw: &[u8]) -> Result<Envelope, Error> {
    let Some((header, body)) = raw.split_first_chunk::<HEADER_LEN>() else {
        return Err(Error::FrameTooShort(raw.len()));
    };
    let [_, _, a0, a1, id, message_type, l0, l1] = *header;
    Ok(Envelope {
        address: [a0, a1],
        id,
        message_type,
        length: u16::from_be_bytes([l0, l1]),
        body: body.to_vec(),
    })
}

/// Check the trailing checksum of a complete frame against its contents.
pub fn verify_checksum(raw: &[u8]) -> Result<(), Error> {
    let envelope = unframe(raw)?;
    let end = HEADER_LEN + usize::from(envelope.length);
    let Some(&[c0, c1]) = raw.get(end..end + CHECKSUM_LEN) else {
        return Err(Error::FrameTooShort(raw.len()));
    };
    let received = u16::from_be_bytes([c0, c1]);
    let computed = checksum(&raw[PREAMBLE.len()..end]);
    if received != computed {
        return Err(Error::ChecksumMismatch { received, computed });
    }
    Ok(())
}

/// Splits the byte stream from the console into complete frames.
///
/// Garbage before a preamble is skipped. A frame is considered complete once the declared
/// length plus the checksum has arrived.
#[derive(Debug, Default)]
pub struct AirTouchCodec {}

impl Encoder<&[u8]> for AirTouchCodec {
    type Error = std::io::Error;
    fn encode(&mut self, frame: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(frame);
        trace!(message = "sending encoded", buffer = ?dst);
        Ok(())
    }
}

impl Decoder for AirTouchCodec {
    type Item = Vec<u8>;
    type Error = std::io::Error;
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            trace!(message = "attempt at decoding", buffer = ?src);
            let Some((header, _)) = src.split_first_chunk::<HEADER_LEN>() else {
                return Ok(None);
            };
            if header[..2] != PREAMBLE {
                src.advance(1);
                continue;
            }
            let length = usize::from(u16::from_be_bytes([header[6], header[7]]));
            let total = HEADER_LEN + length + CHECKSUM_LEN;
            if src.len() < total {
                src.reserve(total - src.len());
                return Ok(None);
            }
            return Ok(Some(src.split_to(total).to_vec()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_constants_are_framed_empty_messages() {
        assert_eq!(frame(GROUP_STATUS_TYPE, &[]).unwrap(), GROUP_STATUS_QUERY);
        verify_checksum(&GROUP_STATUS_QUERY).unwrap();
        verify_checksum(&GROUP_NAME_QUERY).unwrap();
    }

    #[test]
    fn ac_status_query_checksum_covers_trailing_bytes() {
        // The query declares an empty payload but carries two more bytes before its checksum.
        assert_eq!(checksum(&AC_STATUS_QUERY[2..10]), 0xe352);
        assert_eq!(&AC_STATUS_QUERY[10..], &[0xe3, 0x52]);
    }

    #[test]
    fn frame_layout() {
        let framed = frame(AC_CONTROL_TYPE, &[0x00, 0x4f, 0x3f, 0x00]).unwrap();
        assert_eq!(
            framed,
            [0x55, 0x55, 0x80, 0xb0, 0x01, 0x2c, 0x00, 0x04, 0x00, 0x4f, 0x3f, 0x00, 0xc1, 0xbf]
        );
    }

    #[test]
    fn unframe_slices_header() {
        let envelope = unframe(&[0x55, 0x55, 0xb0, 0x80, 0x01, 0x2b, 0x00, 0x02, 0xaa, 0xbb]).unwrap();
        assert_eq!(envelope.address, [0xb0, 0x80]);
        assert_eq!(envelope.id, 0x01);
        assert_eq!(envelope.message_type, 0x2b);
        assert_eq!(envelope.length, 2);
        assert_eq!(envelope.body, [0xaa, 0xbb]);
    }

    #[test]
    fn unframe_short() {
        assert_eq!(unframe(&[0x55; 7]), Err(Error::FrameTooShort(7)));
        assert!(unframe(&[0x55; 8]).unwrap().body.is_empty());
    }

    #[test]
    fn payload_excludes_checksum() {
        let framed = frame(GROUP_CONTROL_TYPE, &[1, 2, 3]).unwrap();
        let envelope = unframe(&framed).unwrap();
        assert_eq!(envelope.body.len(), 5);
        assert_eq!(envelope.payload(), [1, 2, 3]);
    }

    #[test]
    fn corrupted_frame_still_unframes() {
        let mut framed = frame(AC_CONTROL_TYPE, &[0x00, 0x4f, 0x3f, 0x00]).unwrap();
        framed[9] ^= 0xff;
        assert!(unframe(&framed).is_ok());
        assert!(matches!(verify_checksum(&framed), Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn decoder_resynchronises_and_waits_for_full_frame() {
        let framed = frame(AC_CONTROL_TYPE, &[0x00, 0x4f, 0x3f, 0x00]).unwrap();
        let mut codec = AirTouchCodec::default();
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&[0x00, 0x13]);
        buffer.extend_from_slice(&framed[..9]);
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
        buffer.extend_from_slice(&framed[9..]);
        buffer.extend_from_slice(&[0x55]);
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(framed));
        assert_eq!(&buffer[..], &[0x55]);
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
    }
}
