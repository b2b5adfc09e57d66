//! Update Sequence Array fix-up, shared by MFT records and INDX blocks.
//!
//! Without this step, the last two bytes of every 512-byte sector in a
//! multi-sector structure are the update sequence number rather than the
//! original payload — silently corrupting anything that reads past the
//! first sector.

use byteorder::{LittleEndian, ReadBytesExt};

use crate::core::error::{NtfsError, Result};

const FIXUP_SECTOR_SIZE: usize = 512;

/// Applies USA fix-up to `buf` in place. `usa_offset`/`usa_count` are the
/// fields read at the structure's fixed offsets (+4/+6 for both MFT
/// records and INDX blocks). Returns `InvalidMft` on any sector whose
/// trailing two bytes don't match the update sequence number.
pub fn apply_fixup(buf: &mut [u8], usa_offset: u16, usa_count: u16) -> Result<()> {
    if usa_count == 0 {
        return Ok(());
    }

    let usa_offset = usa_offset as usize;
    let usn = (&buf[usa_offset..usa_offset + 2]).read_u16::<LittleEndian>()?;
    let sector_count = usa_count as usize - 1;

    for i in 0..sector_count {
        let sector_end = (i + 1) * FIXUP_SECTOR_SIZE;
        if sector_end > buf.len() {
            return Err(NtfsError::InvalidMft(
                "USA fix-up sector runs past buffer".to_string(),
            ));
        }

        let check = (&buf[sector_end - 2..sector_end]).read_u16::<LittleEndian>()?;
        if check != usn {
            return Err(NtfsError::InvalidMft(format!(
                "USA fix-up mismatch at sector {i}: expected {usn:#06x}, found {check:#06x}"
            )));
        }

        let entry_offset = usa_offset + 2 * (i + 1);
        if entry_offset + 2 > buf.len() {
            return Err(NtfsError::InvalidMft(
                "USA fix-up entry runs past buffer".to_string(),
            ));
        }
        buf[sector_end - 2] = buf[entry_offset];
        buf[sector_end - 1] = buf[entry_offset + 1];
    }

    Ok(())
}

/// Reads the `usa_offset`/`usa_count` header fields shared by both
/// structures, both at +4/+6 relative to the structure's start.
pub fn read_usa_header(buf: &[u8]) -> Result<(u16, u16)> {
    if buf.len() < 8 {
        return Err(NtfsError::InvalidMft(
            "buffer too small for USA header".to_string(),
        ));
    }
    let usa_offset = (&buf[4..6]).read_u16::<LittleEndian>()?;
    let usa_count = (&buf[6..8]).read_u16::<LittleEndian>()?;
    Ok((usa_offset, usa_count))
}
