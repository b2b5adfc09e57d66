//! The decoded MFT record and its attribute list.

use byteorder::{LittleEndian, ReadBytesExt};

use super::attributes::{
    decode_attributes, Attribute, ATTR_DATA, ATTR_FILE_NAME, ATTR_INDEX_ALLOCATION,
    ATTR_INDEX_ROOT, ATTR_STANDARD_INFORMATION,
};
use crate::core::error::{NtfsError, Result};

pub const MFT_SIGNATURE: &[u8; 4] = b"FILE";
pub const FLAG_IN_USE: u16 = 0x0001;
pub const FLAG_IS_DIRECTORY: u16 = 0x0002;

/// MFT record 5 is always the volume root.
pub const ROOT_DIRECTORY_INDEX: u64 = 5;

/// A fully decoded, fixed-up 1024-byte MFT record.
#[derive(Debug, Clone)]
pub struct MftRecord {
    pub reference: u64,
    pub sequence: u16,
    pub flags: u16,
    pub used_size: u32,
    pub allocated_size: u32,
    pub base_reference: u64,
    pub attributes: Vec<Attribute>,
}

impl MftRecord {
    pub fn is_in_use(&self) -> bool {
        self.flags & FLAG_IN_USE != 0
    }

    pub fn is_directory(&self) -> bool {
        self.flags & FLAG_IS_DIRECTORY != 0
    }

    pub fn is_deleted(&self) -> bool {
        !self.is_in_use()
    }

    pub fn attributes_of_type(&self, type_id: u32) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(move |a| a.type_id == type_id)
    }

    pub fn file_names(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes_of_type(ATTR_FILE_NAME)
    }

    pub fn has_file_name(&self) -> bool {
        self.file_names().next().is_some()
    }

    pub fn standard_information(&self) -> Option<&Attribute> {
        self.attributes_of_type(ATTR_STANDARD_INFORMATION).next()
    }

    /// The unnamed `$DATA` stream — the canonical content. Named
    /// data streams are decoded as attributes but never selected here.
    pub fn unnamed_data(&self) -> Option<&Attribute> {
        self.attributes_of_type(ATTR_DATA).find(|a| a.is_unnamed())
    }

    pub fn index_root(&self) -> Option<&Attribute> {
        self.attributes_of_type(ATTR_INDEX_ROOT).next()
    }

    pub fn index_allocation(&self) -> Option<&Attribute> {
        self.attributes_of_type(ATTR_INDEX_ALLOCATION).next()
    }
}

/// Decodes header fields and walks attributes of an already fixed-up
/// 1024-byte record buffer.
pub fn decode_record(reference: u64, buf: &[u8]) -> Result<MftRecord> {
    if buf.len() < 48 || &buf[0..4] != MFT_SIGNATURE {
        return Err(NtfsError::InvalidMft(format!(
            "record {reference} missing FILE signature"
        )));
    }

    let sequence = (&buf[16..18]).read_u16::<LittleEndian>()?;
    let first_attr_offset = (&buf[20..22]).read_u16::<LittleEndian>()? as usize;
    let flags = (&buf[22..24]).read_u16::<LittleEndian>()?;
    let used_size = (&buf[24..28]).read_u32::<LittleEndian>()?;
    let allocated_size = (&buf[28..32]).read_u32::<LittleEndian>()?;
    let base_reference = (&buf[32..40]).read_u64::<LittleEndian>()?;

    if used_size > allocated_size || allocated_size > buf.len() as u32 {
        return Err(NtfsError::InvalidMft(format!(
            "record {reference}: used_size {used_size} > allocated_size {allocated_size}"
        )));
    }

    let attributes = decode_attributes(buf, first_attr_offset, used_size as usize)?;

    Ok(MftRecord {
        reference,
        sequence,
        flags,
        used_size,
        allocated_size,
        base_reference,
        attributes,
    })
}
