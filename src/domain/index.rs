//! Directory index entries shared by `$INDEX_ROOT` and INDX blocks.
//!
//! Covers both the `$INDEX_ROOT` inline-entry case and INDX-block entries
//! with the same walk, and applies namespace/system-file filtering
//! uniformly across both.

use byteorder::{LittleEndian, ReadBytesExt};

use crate::core::error::{NtfsError, Result};
use super::attributes::decode_utf16le;

pub const ENTRY_FLAG_HAS_CHILD: u8 = 0x01;
pub const ENTRY_FLAG_LAST: u8 = 0x02;

/// POSIX namespace: case-sensitive, any Unicode name.
pub const NAMESPACE_POSIX: u8 = 0;
/// WIN32 namespace: the "long" name shown by Explorer.
pub const NAMESPACE_WIN32: u8 = 1;
/// DOS-only 8.3 short name; never surfaced in listings.
pub const NAMESPACE_DOS: u8 = 2;
/// Name is valid both as WIN32 and as DOS (name already fits 8.3).
pub const NAMESPACE_WIN32_AND_DOS: u8 = 3;

/// The embedded `$FILE_NAME` key carried by every index entry.
#[derive(Debug, Clone)]
pub struct FileNameKey {
    pub parent_reference: u64,
    pub created_ticks: u64,
    pub modified_ticks: u64,
    pub allocated_size: u64,
    pub real_size: u64,
    pub file_flags: u32,
    pub namespace: u8,
    pub name: String,
}

/// One entry of a directory B+ tree node.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub file_reference: u64,
    pub flags: u8,
    pub key: FileNameKey,
}

impl IndexEntry {
    /// Lower 48 bits of `file_reference`: the MFT record index.
    pub fn mft_index(&self) -> u64 {
        self.file_reference & 0x0000_FFFF_FFFF_FFFF
    }

    pub fn sequence(&self) -> u16 {
        (self.file_reference >> 48) as u16
    }

    pub fn has_child_node(&self) -> bool {
        self.flags & ENTRY_FLAG_HAS_CHILD != 0
    }

    fn is_last(&self) -> bool {
        self.flags & ENTRY_FLAG_LAST != 0
    }
}

/// Walks a buffer of index entries starting at `entries_offset`, stopping
/// at the last-entry marker, a zero-length entry, or the container
/// boundary — whichever comes first.
pub fn decode_index_entries(buf: &[u8], entries_offset: usize) -> Result<Vec<IndexEntry>> {
    let mut entries = Vec::new();
    let mut offset = entries_offset;

    loop {
        if offset + 16 > buf.len() {
            break;
        }

        let file_reference = (&buf[offset..offset + 8]).read_u64::<LittleEndian>()?;
        let entry_length = (&buf[offset + 8..offset + 10]).read_u16::<LittleEndian>()? as usize;
        let key_length = (&buf[offset + 10..offset + 12]).read_u16::<LittleEndian>()? as usize;
        let flags = buf[offset + 12];

        let last = flags & ENTRY_FLAG_LAST != 0;

        if entry_length == 0 {
            break;
        }
        if offset + entry_length > buf.len() {
            return Err(NtfsError::InvalidMft(
                "index entry runs past container bounds".to_string(),
            ));
        }

        // The last entry in a node carries no $FILE_NAME key (it only
        // marks the end, optionally pointing at a child node).
        if !last && key_length > 0 {
            let key_start = offset + 16;
            if let Some(key) = decode_file_name_key(buf, key_start) {
                entries.push(IndexEntry {
                    file_reference,
                    flags,
                    key,
                });
            }
        }

        if last {
            break;
        }
        offset += entry_length;
    }

    Ok(entries)
}

fn decode_file_name_key(buf: &[u8], key_start: usize) -> Option<FileNameKey> {
    if key_start + 66 > buf.len() {
        return None;
    }
    let parent_reference = (&buf[key_start..key_start + 8]).read_u64::<LittleEndian>().ok()?;
    let created_ticks = (&buf[key_start + 8..key_start + 16])
        .read_u64::<LittleEndian>()
        .ok()?;
    let modified_ticks = (&buf[key_start + 16..key_start + 24])
        .read_u64::<LittleEndian>()
        .ok()?;
    let allocated_size = (&buf[key_start + 40..key_start + 48])
        .read_u64::<LittleEndian>()
        .ok()?;
    let real_size = (&buf[key_start + 48..key_start + 56])
        .read_u64::<LittleEndian>()
        .ok()?;
    let file_flags = (&buf[key_start + 56..key_start + 60])
        .read_u32::<LittleEndian>()
        .ok()?;
    let name_length = buf[key_start + 64] as usize;
    let namespace = buf[key_start + 65];
    let name_start = key_start + 66;
    let name_end = name_start + name_length * 2;
    if name_end > buf.len() {
        return None;
    }
    let name = decode_utf16le(&buf[name_start..name_end]);

    Some(FileNameKey {
        parent_reference,
        created_ticks,
        modified_ticks,
        allocated_size,
        real_size,
        file_flags,
        namespace,
        name,
    })
}

/// Tag on every INDX block.
pub const INDX_SIGNATURE: &[u8; 4] = b"INDX";

/// Decodes the inline entries of a resident `$INDEX_ROOT` payload: a
/// 16-byte index root header, then a 16-byte Index Node Header at offset
/// 16, whose first field is the entries' offset relative to the node
/// header itself.
pub fn decode_index_root_entries(content: &[u8]) -> Result<Vec<IndexEntry>> {
    if content.len() < 32 {
        return Err(NtfsError::InvalidMft(
            "index root smaller than header".to_string(),
        ));
    }
    let entries_start = node_header_entries_start(content, 16)?;
    decode_index_entries(content, entries_start)
}

/// Decodes the entries of one already fixed-up INDX block: "INDX" tag,
/// then a 24-byte header preceding the Index Node Header at offset 24.
pub fn decode_indx_block_entries(buf: &[u8]) -> Result<Vec<IndexEntry>> {
    if buf.len() < 40 || &buf[0..4] != INDX_SIGNATURE {
        return Err(NtfsError::InvalidMft(
            "INDX block missing signature".to_string(),
        ));
    }
    let entries_start = node_header_entries_start(buf, 24)?;
    decode_index_entries(buf, entries_start)
}

fn node_header_entries_start(buf: &[u8], node_header_offset: usize) -> Result<usize> {
    if node_header_offset + 4 > buf.len() {
        return Err(NtfsError::InvalidMft(
            "index node header truncated".to_string(),
        ));
    }
    let relative = (&buf[node_header_offset..node_header_offset + 4])
        .read_u32::<LittleEndian>()? as usize;
    Ok(node_header_offset + relative)
}

/// Suppresses NTFS metadata files (`$MFT`, `$LogFile`, ...) from any
/// user-visible listing. Applies uniformly to `$INDEX_ROOT` walks,
/// `$INDEX_ALLOCATION` walks, and recovery output.
pub fn is_system_entry(mft_index: u64, name: &str) -> bool {
    mft_index <= 11 && name.starts_with('$')
}

/// Deduplicates entries that name the same MFT reference under multiple
/// namespaces (DOS + WIN32 aliases for one file), preferring WIN32 or
/// POSIX names over the short 8.3 DOS form, and drops DOS-only entries
/// outright as well as system entries.
pub fn filter_and_dedup(entries: Vec<IndexEntry>) -> Vec<IndexEntry> {
    use std::collections::HashMap;

    let mut best: HashMap<u64, IndexEntry> = HashMap::new();
    for entry in entries {
        if entry.key.namespace == NAMESPACE_DOS {
            continue;
        }
        let mft_index = entry.mft_index();
        if is_system_entry(mft_index, &entry.key.name) {
            continue;
        }
        match best.get(&mft_index) {
            Some(existing) if namespace_rank(existing.key.namespace) <= namespace_rank(entry.key.namespace) => {}
            _ => {
                best.insert(mft_index, entry);
            }
        }
    }
    best.into_values().collect()
}

/// Higher rank wins when the same file appears under multiple namespaces.
fn namespace_rank(namespace: u8) -> u8 {
    match namespace {
        NAMESPACE_WIN32 => 2,
        NAMESPACE_POSIX => 2,
        NAMESPACE_WIN32_AND_DOS => 1,
        _ => 0,
    }
}
