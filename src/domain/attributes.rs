//! Attribute records and non-resident data-run decoding.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::core::error::{NtfsError, Result};

pub const ATTR_STANDARD_INFORMATION: u32 = 0x10;
pub const ATTR_FILE_NAME: u32 = 0x30;
pub const ATTR_DATA: u32 = 0x80;
pub const ATTR_INDEX_ROOT: u32 = 0x90;
pub const ATTR_INDEX_ALLOCATION: u32 = 0xA0;
pub const ATTR_END_MARKER: u32 = 0xFFFF_FFFF;

/// One extent of a non-resident stream: `(lcn, cluster_count)`.
/// `lcn == -1` marks a sparse run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRun {
    pub lcn: i64,
    pub cluster_count: u64,
}

impl DataRun {
    pub fn is_sparse(&self) -> bool {
        self.lcn == -1
    }
}

/// A single attribute record inside an MFT record.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub type_id: u32,
    pub name: Option<String>,
    pub is_resident: bool,
    /// Declared byte length of the stream: `len(content)` if resident,
    /// the non-resident `real_size` field otherwise.
    pub content_size: u64,
    /// Populated only for resident attributes.
    pub resident_content: Vec<u8>,
    /// Populated only for non-resident attributes, in stream order.
    pub data_runs: Vec<DataRun>,
}

impl Attribute {
    pub fn is_unnamed(&self) -> bool {
        self.name.as_deref().unwrap_or("").is_empty()
    }
}

/// Walks the attribute list inside one MFT record's raw 1024-byte buffer,
/// starting at `first_attr_offset`, stopping at the 0xFFFFFFFF sentinel or
/// `used_size`, whichever comes first.
pub fn decode_attributes(
    record: &[u8],
    first_attr_offset: usize,
    used_size: usize,
) -> Result<Vec<Attribute>> {
    let mut attrs = Vec::new();
    let mut offset = first_attr_offset;

    loop {
        if offset + 4 > used_size || offset + 4 > record.len() {
            // A well-formed record always hits the sentinel before
            // exceeding used_size; a corrupt one might land here instead.
            break;
        }
        let type_id = (&record[offset..offset + 4]).read_u32::<LittleEndian>()?;
        if type_id == ATTR_END_MARKER {
            break;
        }

        if offset + 8 > record.len() {
            return Err(NtfsError::InvalidMft(
                "attribute header truncated before length field".to_string(),
            ));
        }
        let length = (&record[offset + 4..offset + 8]).read_u32::<LittleEndian>()? as usize;
        if length == 0 || offset + length > record.len() {
            return Err(NtfsError::InvalidMft(format!(
                "attribute at {offset} has invalid length {length}"
            )));
        }

        let non_resident_flag = record[offset + 8];
        let name_length = record[offset + 9] as usize;
        let name_offset = offset + (&record[offset + 10..offset + 12]).read_u16::<LittleEndian>()? as usize;

        let name = if name_length > 0 {
            let end = name_offset + name_length * 2;
            if end > record.len() {
                return Err(NtfsError::InvalidMft(
                    "attribute name runs past record".to_string(),
                ));
            }
            Some(decode_utf16le(&record[name_offset..end]))
        } else {
            None
        };

        let is_resident = non_resident_flag == 0;
        let attr = if is_resident {
            let content_size =
                (&record[offset + 16..offset + 20]).read_u32::<LittleEndian>()? as usize;
            let content_offset =
                offset + (&record[offset + 20..offset + 22]).read_u16::<LittleEndian>()? as usize;
            let end = content_offset + content_size;
            if end > record.len() {
                return Err(NtfsError::InvalidMft(
                    "resident attribute content runs past record".to_string(),
                ));
            }
            Attribute {
                type_id,
                name,
                is_resident: true,
                content_size: content_size as u64,
                resident_content: record[content_offset..end].to_vec(),
                data_runs: Vec::new(),
            }
        } else {
            if length < 0x38 {
                return Err(NtfsError::InvalidMft(format!(
                    "non-resident attribute at {offset} is too short for its header ({length} bytes)"
                )));
            }
            let attr_bytes = &record[offset..offset + length];
            let real_size = (&attr_bytes[0x30..0x38]).read_u64::<LittleEndian>()?;
            let runs_offset = (&attr_bytes[0x20..0x22]).read_u16::<LittleEndian>()? as usize;
            let data_runs = decode_data_runs(attr_bytes, runs_offset)?;
            Attribute {
                type_id,
                name,
                is_resident: false,
                content_size: real_size,
                resident_content: Vec::new(),
                data_runs,
            }
        };

        attrs.push(attr);
        offset += length;
    }

    Ok(attrs)
}

/// Decodes the data-run list of a non-resident attribute.
///
/// Each run is `(header byte, length bytes, signed offset-delta bytes)`.
/// The cumulative LCN only advances on non-sparse runs; sparse runs
/// (`off_size == 0`) are emitted as `(lcn: -1, length)` without touching
/// the running total.
pub fn decode_data_runs(attr_bytes: &[u8], runs_offset: usize) -> Result<Vec<DataRun>> {
    let mut runs = Vec::new();
    let mut offset = runs_offset;
    let mut cumulative_lcn: i64 = 0;

    loop {
        if offset >= attr_bytes.len() {
            break;
        }
        let header = attr_bytes[offset];
        if header == 0 {
            break;
        }
        let len_size = (header & 0x0F) as usize;
        let off_size = ((header >> 4) & 0x0F) as usize;
        offset += 1;

        if len_size == 0 {
            return Err(NtfsError::InvalidMft(
                "data run has zero length_size with nonzero header".to_string(),
            ));
        }
        if len_size > 8 || off_size > 8 {
            return Err(NtfsError::InvalidMft(format!(
                "data run header {header:#04x} declares a field wider than 8 bytes"
            )));
        }
        if offset + len_size + off_size > attr_bytes.len() {
            return Err(NtfsError::InvalidMft(
                "data run descriptor exceeds attribute bounds".to_string(),
            ));
        }

        let length = read_le_uint(&attr_bytes[offset..offset + len_size]);
        offset += len_size;

        if off_size == 0 {
            runs.push(DataRun {
                lcn: -1,
                cluster_count: length,
            });
            continue;
        }

        let delta = read_le_sint(&attr_bytes[offset..offset + off_size]);
        offset += off_size;

        cumulative_lcn += delta;
        runs.push(DataRun {
            lcn: cumulative_lcn,
            cluster_count: length,
        });
    }

    Ok(runs)
}

fn read_le_uint(bytes: &[u8]) -> u64 {
    let mut value: u64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        value |= (b as u64) << (8 * i);
    }
    value
}

fn read_le_sint(bytes: &[u8]) -> i64 {
    let mut value = read_le_uint(bytes) as i64;
    let bits = bytes.len() * 8;
    if bits < 64 {
        let sign_bit = bytes.last().copied().unwrap_or(0) & 0x80 != 0;
        if sign_bit {
            value -= 1i64 << bits;
        }
    }
    value
}

/// Decodes a UTF-16LE byte slice without assuming one code unit per
/// character.
pub fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}
