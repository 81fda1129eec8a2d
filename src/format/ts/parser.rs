use super::types::*;
use crate::error::{DemuxError, Result};

/// Parses the 4-byte transport packet header.
///
/// `offset` is the packet's position in the stream and only feeds the error
/// raised for a bad sync byte.
pub fn parse_header(data: &[u8], offset: u64) -> Result<TSHeader> {
    if data.len() < TS_HEADER_SIZE {
        return Err(DemuxError::InvalidData("TS packet too short".into()));
    }

    if data[0] != SYNC_BYTE {
        return Err(DemuxError::MalformedStream {
            byte: data[0],
            offset,
        });
    }

    Ok(TSHeader {
        payload_unit_start: (data[1] & 0x40) != 0,
        pid: (((data[1] & 0x1F) as u16) << 8) | data[2] as u16,
        adaptation_field_exists: (data[3] & 0x20) != 0,
        contains_payload: (data[3] & 0x10) != 0,
        continuity_counter: data[3] & 0x0F,
    })
}

/// Reads the adaptation field length and the two flags the demuxer acts on.
pub fn parse_adaptation_field(data: &[u8], header: &TSHeader) -> Option<AdaptationField> {
    if !header.adaptation_field_exists || data.len() <= TS_HEADER_SIZE {
        return None;
    }

    let length = data[TS_HEADER_SIZE] as usize;
    let mut field = AdaptationField {
        length,
        ..Default::default()
    };
    if length > 0 {
        if let Some(&flags) = data.get(TS_HEADER_SIZE + 1) {
            field.discontinuity = (flags & 0x80) != 0;
            field.random_access = (flags & 0x40) != 0;
        }
    }
    Some(field)
}

/// Offset of the first payload byte, clamped to the packet length.
pub fn payload_offset(data: &[u8], adaptation: Option<&AdaptationField>) -> usize {
    let offset = match adaptation {
        Some(field) => TS_HEADER_SIZE + 1 + field.length,
        None => TS_HEADER_SIZE,
    };
    offset.min(data.len())
}

/// Decodes the 5-byte PTS field of a PES header into 45 kHz ticks.
pub fn decode_pts(data: &[u8; PES_TIMESTAMP_SIZE]) -> u64 {
    ((data[0] as u64 & 0x0E) << 28)
        | ((data[1] as u64) << 21)
        | ((data[2] as u64 & 0xFE) << 13)
        | ((data[3] as u64) << 6)
        | ((data[4] as u64 & 0xFE) >> 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_ts_header() {
        let data = [
            0x47, // Sync byte
            0x41, // Payload unit start indicator set, PID high bits
            0x00, // PID low bits
            0x37, // Adaptation field + payload, continuity counter 7
        ];

        let header = parse_header(&data, 0).unwrap();
        assert_eq!(
            header,
            TSHeader {
                payload_unit_start: true,
                pid: 0x100,
                adaptation_field_exists: true,
                contains_payload: true,
                continuity_counter: 7,
            }
        );
    }

    #[test]
    fn test_pid_uses_thirteen_bits() {
        let header = parse_header(&[0x47, 0xff, 0xff, 0x10], 0).unwrap();
        assert_eq!(header.pid, PID_MAX);
        assert!(!header.adaptation_field_exists);
    }

    #[test]
    fn test_bad_sync_byte() {
        let err = parse_header(&[0x46, 0x40, 0x00, 0x10], 376).unwrap_err();
        match err {
            DemuxError::MalformedStream { byte, offset } => {
                assert_eq!(byte, 0x46);
                assert_eq!(offset, 376);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_payload_offset() {
        let mut packet = [0u8; TS_PACKET_SIZE];
        packet[..4].copy_from_slice(&[0x47, 0x40, 0x00, 0x30]);
        packet[4] = 7; // adaptation_field_length
        packet[5] = 0xC0; // discontinuity + random access

        let header = parse_header(&packet, 0).unwrap();
        let field = parse_adaptation_field(&packet, &header).unwrap();
        assert!(field.discontinuity);
        assert!(field.random_access);
        assert_eq!(payload_offset(&packet, Some(&field)), 12);
        assert_eq!(payload_offset(&packet, None), 4);
    }

    #[test]
    fn test_oversized_adaptation_field_leaves_no_payload() {
        let mut packet = [0u8; TS_PACKET_SIZE];
        packet[..4].copy_from_slice(&[0x47, 0x00, 0x00, 0x30]);
        packet[4] = 0xff;

        let header = parse_header(&packet, 0).unwrap();
        let field = parse_adaptation_field(&packet, &header);
        assert_eq!(payload_offset(&packet, field.as_ref()), TS_PACKET_SIZE);
    }

    #[test]
    fn test_decode_pts() {
        assert_eq!(decode_pts(&[0x21, 0x00, 0x01, 0x00, 0x01]), 0);
        // PES encoding of one second at 90 kHz
        assert_eq!(decode_pts(&[0x21, 0x00, 0x05, 0xBF, 0x21]), 45_000);
        assert_eq!(decode_pts(&[0x2F, 0xFF, 0xFF, 0xFF, 0xFF]), 0xFFFF_FFFF);
        assert_eq!(decode_pts(&[0x2F, 0xFF, 0xFF, 0xFF, 0xFD]), 0xFFFF_FFFF);
        assert_eq!(decode_pts(&[0x2F, 0xFF, 0xFF, 0xFF, 0xFB]), 0xFFFF_FFFE);
    }
}
