use super::demuxer::DemuxStats;
use super::types::*;
use crate::av::StreamCategory;
use log::debug;

/// Accumulates one PSI section across as many packets as it spans.
///
/// The first payload byte of a new section is taken as the pointer field and
/// skipped; a non-zero pointer field is not honoured.
#[derive(Debug)]
pub struct SectionReassembler {
    table_id: u8,
    section: Vec<u8>,
    /// Declared length of the section in progress, 0 while waiting for a new one.
    section_length: usize,
    write_offset: usize,
}

impl SectionReassembler {
    pub fn new(table_id: u8) -> Self {
        Self {
            table_id,
            section: vec![0u8; INITIAL_SECTION_CAPACITY],
            section_length: 0,
            write_offset: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.section.len()
    }

    /// Feeds one packet payload; returns the section body once its declared length is reached.
    pub fn push_payload(&mut self, payload: &[u8], stats: &mut DemuxStats) -> Option<&[u8]> {
        let mut payload = payload;
        if self.section_length == 0 {
            if payload.len() < 4 {
                debug!("section header does not fit in payload ({} bytes)", payload.len());
                return None;
            }
            let table_id = payload[1];
            if table_id != self.table_id {
                debug!("unexpected table id: {} != {}", table_id, self.table_id);
                stats.table_id_mismatches += 1;
            }
            self.section_length = ((payload[2] as usize & 0x0F) << 8) | payload[3] as usize;
            self.reserve(self.section_length);
            self.write_offset = 0;
            payload = &payload[4..];
        }

        let copy = (self.section_length - self.write_offset).min(payload.len());
        self.section[self.write_offset..self.write_offset + copy].copy_from_slice(&payload[..copy]);
        self.write_offset += copy;

        if self.write_offset == self.section_length {
            let length = self.section_length;
            self.section_length = 0;
            return Some(&self.section[..length]);
        }
        None
    }

    fn reserve(&mut self, length: usize) {
        let mut capacity = self.section.len().max(1);
        while capacity < length {
            capacity *= 2;
        }
        if capacity > self.section.len() {
            self.section.resize(capacity, 0);
        }
    }
}

/// Program entries of a PAT section body, stopping short of the CRC.
pub fn parse_pat(section: &[u8]) -> Vec<ProgramEntry> {
    // transport_stream_id, version/current_next, section_number, last_section_number
    const PAT_HEADER_SIZE: usize = 5;

    let end = section.len().saturating_sub(SECTION_CRC_SIZE);
    let mut programs = Vec::new();
    let mut pos = PAT_HEADER_SIZE;
    while pos + 4 <= end {
        programs.push(ProgramEntry {
            program_number: ((section[pos] as u16) << 8) | section[pos + 1] as u16,
            program_map_pid: ((section[pos + 2] as u16 & 0x1F) << 8) | section[pos + 3] as u16,
        });
        pos += 4;
    }
    programs
}

/// Elementary stream entries of a PMT section body, stopping short of the CRC.
pub fn parse_pmt(section: &[u8]) -> Vec<StreamEntry> {
    // program_number, version/current_next, section numbers, PCR_PID
    const PMT_HEADER_SIZE: usize = 7;

    let end = section.len().saturating_sub(SECTION_CRC_SIZE);
    let mut streams = Vec::new();
    if PMT_HEADER_SIZE + 2 > end {
        return streams;
    }

    let program_info_length =
        ((section[PMT_HEADER_SIZE] as usize & 0x0F) << 8) | section[PMT_HEADER_SIZE + 1] as usize;
    let mut pos = PMT_HEADER_SIZE + 2 + program_info_length;

    while pos + 5 <= end {
        let stream_type = section[pos];
        let elementary_pid = ((section[pos + 1] as u16 & 0x1F) << 8) | section[pos + 2] as u16;
        let es_info_length = ((section[pos + 3] as usize & 0x0F) << 8) | section[pos + 4] as usize;
        streams.push(StreamEntry {
            stream_type,
            elementary_pid,
        });
        pos += 5 + es_info_length;
    }
    streams
}

/// The first program that is not the network PID entry, or the first entry
/// when the PAT lists nothing else.
pub fn select_program(programs: &[ProgramEntry]) -> Option<ProgramEntry> {
    programs
        .iter()
        .copied()
        .find(|p| p.program_number != 0)
        .or_else(|| programs.first().copied())
}

/// Picks the first known audio stream and the first H.264 stream, in PMT order.
pub fn select_streams(streams: &[StreamEntry]) -> Vec<(u16, StreamType)> {
    let mut audio = false;
    let mut video = false;
    let mut selected = Vec::new();
    for entry in streams {
        let Some(stream_type) = StreamType::from_code(entry.stream_type) else {
            continue;
        };
        let taken = match stream_type.category() {
            StreamCategory::Audio => &mut audio,
            StreamCategory::Video => &mut video,
        };
        if !*taken {
            *taken = true;
            selected.push((entry.elementary_pid, stream_type));
        }
    }
    selected
}

/// Handler for PID 0: reassembles the PAT and reports its programs once.
#[derive(Debug)]
pub struct PATHandler {
    section: SectionReassembler,
}

impl PATHandler {
    pub fn new() -> Self {
        Self {
            section: SectionReassembler::new(TABLE_ID_PAT),
        }
    }

    pub fn handle_payload(
        &mut self,
        payload: &[u8],
        stats: &mut DemuxStats,
    ) -> Option<Vec<ProgramEntry>> {
        self.section.push_payload(payload, stats).map(parse_pat)
    }
}

impl Default for PATHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler for the PMT PID announced by the PAT.
#[derive(Debug)]
pub struct PMTHandler {
    section: SectionReassembler,
}

impl PMTHandler {
    pub fn new() -> Self {
        Self {
            section: SectionReassembler::new(TABLE_ID_PMT),
        }
    }

    pub fn handle_payload(
        &mut self,
        payload: &[u8],
        stats: &mut DemuxStats,
    ) -> Option<Vec<StreamEntry>> {
        self.section.push_payload(payload, stats).map(parse_pmt)
    }
}

impl Default for PMTHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// pointer field + table id + length, then the body.
    fn section_payload(table_id: u8, body: &[u8]) -> Vec<u8> {
        let mut payload = vec![0x00, table_id, 0xB0 | (body.len() >> 8) as u8, body.len() as u8];
        payload.extend_from_slice(body);
        payload
    }

    fn pat_body(programs: &[(u16, u16)]) -> Vec<u8> {
        let mut body = vec![0x00, 0x01, 0xC1, 0x00, 0x00];
        for &(number, pid) in programs {
            body.extend_from_slice(&number.to_be_bytes());
            body.extend_from_slice(&(0xE000 | pid).to_be_bytes());
        }
        body.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]); // CRC, not checked
        body
    }

    fn pmt_body(streams: &[(u8, u16, usize)]) -> Vec<u8> {
        let mut body = vec![
            0x00, 0x01, // program number
            0xC1, 0x00, 0x00, // version, section numbers
            0xE1, 0x00, // PCR PID
            0xF0, 0x03, 0x0A, 0x01, 0xFF, // program info with one descriptor
        ];
        for &(stream_type, pid, es_info_length) in streams {
            body.push(stream_type);
            body.extend_from_slice(&(0xE000 | pid).to_be_bytes());
            body.extend_from_slice(&(0xF000 | es_info_length as u16).to_be_bytes());
            body.extend(std::iter::repeat(0x52).take(es_info_length));
        }
        body.extend_from_slice(&[0, 0, 0, 0]);
        body
    }

    #[test]
    fn test_single_packet_section() {
        let body = pat_body(&[(1, 0x1000)]);
        let mut stats = DemuxStats::default();
        let mut section = SectionReassembler::new(TABLE_ID_PAT);

        let mut payload = section_payload(TABLE_ID_PAT, &body);
        payload.resize(184, 0xFF);
        assert_eq!(section.push_payload(&payload, &mut stats), Some(&body[..]));
        assert_eq!(stats.table_id_mismatches, 0);
    }

    #[test]
    fn test_section_spanning_packets_grows_buffer() {
        let body: Vec<u8> = (0..3000u32).map(|i| i as u8).collect();
        let payload = section_payload(TABLE_ID_PMT, &body);
        let mut stats = DemuxStats::default();
        let mut section = SectionReassembler::new(TABLE_ID_PMT);

        let chunks: Vec<&[u8]> = payload.chunks(184).collect();
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(section.push_payload(chunk, &mut stats).is_none());
        }
        let complete = section
            .push_payload(chunks[chunks.len() - 1], &mut stats)
            .unwrap()
            .to_vec();
        assert_eq!(complete, body);
        assert_eq!(section.capacity(), 4096);
    }

    #[test]
    fn test_section_resets_after_completion() {
        let first = pat_body(&[(1, 0x100)]);
        let second = pat_body(&[(2, 0x200)]);
        let mut stats = DemuxStats::default();
        let mut section = SectionReassembler::new(TABLE_ID_PAT);

        let parsed = section
            .push_payload(&section_payload(TABLE_ID_PAT, &first), &mut stats)
            .map(parse_pat);
        assert_eq!(parsed.unwrap()[0].program_map_pid, 0x100);
        let parsed = section
            .push_payload(&section_payload(TABLE_ID_PAT, &second), &mut stats)
            .map(parse_pat);
        assert_eq!(parsed.unwrap()[0].program_map_pid, 0x200);
    }

    #[test]
    fn test_unexpected_table_id_is_counted() {
        let body = pat_body(&[(1, 0x100)]);
        let mut stats = DemuxStats::default();
        let mut section = SectionReassembler::new(TABLE_ID_PAT);

        let parsed = section.push_payload(&section_payload(0x42, &body), &mut stats);
        assert!(parsed.is_some());
        assert_eq!(stats.table_id_mismatches, 1);
    }

    #[test]
    fn test_nonzero_pointer_field_is_unsupported() {
        // A pointer field of 2 means the section starts two bytes later;
        // the reassembler still reads the table header from fixed offsets.
        let body = pat_body(&[(1, 0x100)]);
        let mut payload = vec![0x02, 0xAA, 0xBB];
        payload.extend_from_slice(&section_payload(TABLE_ID_PAT, &body)[1..]);
        let mut stats = DemuxStats::default();
        let mut section = SectionReassembler::new(TABLE_ID_PAT);

        let parsed = section.push_payload(&payload, &mut stats).map(parse_pat);
        assert_eq!(stats.table_id_mismatches, 1);
        assert_ne!(parsed, Some(vec![ProgramEntry { program_number: 1, program_map_pid: 0x100 }]));
    }

    #[test]
    fn test_parse_pat() {
        let programs = parse_pat(&pat_body(&[(0, 0x10), (1, 0x1000), (2, 0x1FFF)]));
        assert_eq!(
            programs,
            vec![
                ProgramEntry { program_number: 0, program_map_pid: 0x10 },
                ProgramEntry { program_number: 1, program_map_pid: 0x1000 },
                ProgramEntry { program_number: 2, program_map_pid: 0x1FFF },
            ]
        );
        assert_eq!(select_program(&programs).map(|p| p.program_map_pid), Some(0x1000));
    }

    #[test]
    fn test_select_program_falls_back_to_first_entry() {
        let programs = parse_pat(&pat_body(&[(0, 0x1000)]));
        assert_eq!(
            select_program(&programs),
            Some(ProgramEntry { program_number: 0, program_map_pid: 0x1000 })
        );
        assert_eq!(select_program(&[]), None);
    }

    #[test]
    fn test_parse_truncated_tables() {
        assert!(parse_pat(&[]).is_empty());
        assert!(parse_pat(&[0, 1, 2]).is_empty());
        assert!(parse_pmt(&[0, 1, 2, 3, 4, 5, 6]).is_empty());
    }

    #[test]
    fn test_parse_pmt_skips_descriptors() {
        let streams = parse_pmt(&pmt_body(&[
            (STREAM_TYPE_H264, 0x100, 6),
            (STREAM_TYPE_AAC, 0x101, 0),
        ]));
        assert_eq!(
            streams,
            vec![
                StreamEntry { stream_type: STREAM_TYPE_H264, elementary_pid: 0x100 },
                StreamEntry { stream_type: STREAM_TYPE_AAC, elementary_pid: 0x101 },
            ]
        );
    }

    #[test]
    fn test_select_streams_first_match_wins() {
        let streams = parse_pmt(&pmt_body(&[
            (0x06, 0x0FF, 0),
            (STREAM_TYPE_H264, 0x100, 0),
            (STREAM_TYPE_AAC, 0x101, 0),
            (STREAM_TYPE_MPEG_AUDIO, 0x102, 0),
            (STREAM_TYPE_H264, 0x103, 0),
        ]));
        assert_eq!(
            select_streams(&streams),
            vec![(0x100, StreamType::H264), (0x101, StreamType::AacAdts)]
        );
    }

    #[test]
    fn test_handlers_parse_their_tables() {
        let mut stats = DemuxStats::default();
        let mut pat = PATHandler::new();
        let programs = pat
            .handle_payload(&section_payload(TABLE_ID_PAT, &pat_body(&[(1, 0x1000)])), &mut stats)
            .unwrap();
        assert_eq!(programs.len(), 1);

        let mut pmt = PMTHandler::new();
        let streams = pmt
            .handle_payload(
                &section_payload(TABLE_ID_PMT, &pmt_body(&[(STREAM_TYPE_MPEG_AUDIO2, 0x44, 0)])),
                &mut stats,
            )
            .unwrap();
        assert_eq!(select_streams(&streams), vec![(0x44, StreamType::MpegAudio2)]);
    }
}
