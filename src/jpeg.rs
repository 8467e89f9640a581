//! JPEG segment surgery for XMP packets.
//!
//! JPEG XMP storage:
//! - The packet lives in an APP1 segment whose payload starts with
//!   `http://ns.adobe.com/xap/1.0/\0`
//! - EXIF also uses APP1 but with an `Exif\0\0` prefix, so it is never touched here
//! - One segment holds at most 65533 payload bytes (16-bit length minus itself)
//!
//! Only the marker segments in front of the first scan are walked; the scan
//! and anything after it are copied verbatim.

use crate::error::{MetaError, Result};
use std::path::Path;

const MARKER_PREFIX: u8 = 0xFF;
const MARKER_SOI: u8 = 0xD8;
const MARKER_EOI: u8 = 0xD9;
const MARKER_SOS: u8 = 0xDA;
const MARKER_APP0: u8 = 0xE0;
const MARKER_APP1: u8 = 0xE1;
const MARKER_TEM: u8 = 0x01;

/// XMP namespace identifier in APP1 segment
pub const XMP_NAMESPACE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// Maximum payload of one APP1 segment (0xFFFF minus the length field).
pub const MAX_APP1_PAYLOAD: usize = 0xFFFF - 2;

/// A marker segment located in a byte stream. `start` points at the 0xFF.
#[derive(Debug, Clone, Copy)]
struct Segment {
    marker: u8,
    start: usize,
    end: usize,
}

impl Segment {
    fn payload<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        if self.end - self.start > 4 { &data[self.start + 4..self.end] } else { &[] }
    }

    fn is_xmp(&self, data: &[u8]) -> bool {
        self.marker == MARKER_APP1 && self.payload(data).starts_with(XMP_NAMESPACE)
    }
}

fn is_standalone(marker: u8) -> bool {
    matches!(marker, MARKER_SOI | MARKER_EOI | MARKER_TEM | 0xD0..=0xD7)
}

pub fn has_soi(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == MARKER_PREFIX && data[1] == MARKER_SOI
}

/// Walk the header segments after SOI.
///
/// Returns the segments and the offset where verbatim copying takes over:
/// the SOS or EOI marker, or the first byte that is not a well-formed segment.
fn walk(data: &[u8]) -> (Vec<Segment>, usize) {
    let mut segments = Vec::new();
    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != MARKER_PREFIX {
            break;
        }
        let marker = data[pos + 1];
        if marker == MARKER_PREFIX {
            // fill byte
            segments.push(Segment { marker, start: pos, end: pos + 1 });
            pos += 1;
            continue;
        }
        if marker == MARKER_SOS || marker == MARKER_EOI {
            break;
        }
        if is_standalone(marker) {
            segments.push(Segment { marker, start: pos, end: pos + 2 });
            pos += 2;
            continue;
        }
        if pos + 4 > data.len() {
            break;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let end = pos + 2 + length;
        if length < 2 || end > data.len() {
            break;
        }
        segments.push(Segment { marker, start: pos, end });
        pos = end;
    }
    (segments, pos.min(data.len()))
}

/// Remove every XMP APP1 segment, keeping all other bytes in order.
///
/// Streams without an SOI marker are returned unchanged.
pub fn remove_xmp(data: &[u8]) -> Vec<u8> {
    if !has_soi(data) {
        return data.to_vec();
    }
    let (segments, tail) = walk(data);
    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&data[..2]);
    for seg in segments.iter().filter(|s| !s.is_xmp(data)) {
        out.extend_from_slice(&data[seg.start..seg.end]);
    }
    out.extend_from_slice(&data[tail..]);
    out
}

/// Build a complete APP1 segment (marker, length, namespace, packet).
pub fn xmp_segment(packet: &[u8]) -> Result<Vec<u8>> {
    let payload_len = XMP_NAMESPACE.len() + packet.len();
    if payload_len > MAX_APP1_PAYLOAD {
        return Err(MetaError::SegmentTooLarge { size: payload_len, max: MAX_APP1_PAYLOAD });
    }
    let mut segment = Vec::with_capacity(payload_len + 4);
    segment.extend_from_slice(&[MARKER_PREFIX, MARKER_APP1]);
    segment.extend_from_slice(&((payload_len + 2) as u16).to_be_bytes());
    segment.extend_from_slice(XMP_NAMESPACE);
    segment.extend_from_slice(packet);
    Ok(segment)
}

/// Replace the stream's XMP packet.
///
/// Any existing XMP segment is dropped, then the new one goes right after the
/// first APP0/APP1 segment, or right before EOI when there is none.
pub fn inject_xmp(data: &[u8], packet: &[u8]) -> Result<Vec<u8>> {
    if !has_soi(data) {
        return Err(MetaError::InvalidJpeg);
    }
    let segment = xmp_segment(packet)?;
    let stripped = remove_xmp(data);
    let (segments, tail) = walk(&stripped);

    let insert_at = segments
        .iter()
        .find(|s| s.marker == MARKER_APP0 || s.marker == MARKER_APP1)
        .map(|s| s.end)
        .unwrap_or_else(|| eoi_offset(&stripped, tail));

    let mut out = Vec::with_capacity(stripped.len() + segment.len());
    out.extend_from_slice(&stripped[..insert_at]);
    out.extend_from_slice(&segment);
    out.extend_from_slice(&stripped[insert_at..]);
    Ok(out)
}

fn eoi_offset(data: &[u8], from: usize) -> usize {
    data[from..]
        .windows(2)
        .rposition(|w| w == [MARKER_PREFIX, MARKER_EOI])
        .map(|i| from + i)
        .unwrap_or(data.len())
}

/// Number of XMP APP1 segments in the header.
pub fn count_xmp_segments(data: &[u8]) -> usize {
    if !has_soi(data) {
        return 0;
    }
    let (segments, _) = walk(data);
    segments.iter().filter(|s| s.is_xmp(data)).count()
}

/// Remove the XMP packet from a JPEG file in place.
pub fn remove_xmp_file(path: &Path) -> Result<()> {
    let data = std::fs::read(path)?;
    let out = remove_xmp(&data);
    if out.len() != data.len() {
        std::fs::write(path, &out)?;
        log::debug!("Removed XMP segment from {}", path.display());
    }
    Ok(())
}

/// Inject an XMP packet into a JPEG file in place.
pub fn inject_xmp_file(path: &Path, packet: &[u8]) -> Result<()> {
    let data = std::fs::read(path)?;
    let out = inject_xmp(&data, packet)?;
    std::fs::write(path, &out)?;
    log::debug!("Injected {} byte XMP packet into {}", packet.len(), path.display());
    Ok(())
}
