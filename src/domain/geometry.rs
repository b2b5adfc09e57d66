//! Volume geometry — captured once at mount, immutable thereafter.

use crate::core::error::{NtfsError, Result};

/// MFT records in this core are always 1024 bytes; the boot sector's
/// signed-log encoding of the "real" record size is out of scope.
pub const MFT_RECORD_BYTES: u32 = 1024;

/// Geometry decoded from the NTFS boot sector plus the partition offset
/// found by the MBR scan. Populated once at mount and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub total_sectors: u64,
    pub mft_lcn: u64,
    /// Absolute byte offset inside the image where the NTFS boot sector begins.
    pub partition_offset: u64,
}

impl Geometry {
    pub fn cluster_bytes(&self) -> u32 {
        self.bytes_per_sector as u32 * self.sectors_per_cluster as u32
    }

    /// Sector size must be a power of two in the documented range,
    /// cluster-per-sector count must be a power of two, and the
    /// resulting cluster size must not exceed 64 KiB.
    pub fn validate(&self) -> Result<()> {
        let valid_sector = matches!(self.bytes_per_sector, 256 | 512 | 1024 | 2048 | 4096);
        if !valid_sector {
            return Err(NtfsError::InvalidBootSector(format!(
                "bytes_per_sector {} is not one of 256/512/1024/2048/4096",
                self.bytes_per_sector
            )));
        }
        if self.sectors_per_cluster == 0 || !self.sectors_per_cluster.is_power_of_two() {
            return Err(NtfsError::InvalidBootSector(format!(
                "sectors_per_cluster {} is not a power of two",
                self.sectors_per_cluster
            )));
        }
        let cluster_bytes = self.cluster_bytes();
        if cluster_bytes == 0 || cluster_bytes > 64 * 1024 {
            return Err(NtfsError::InvalidBootSector(format!(
                "cluster size {} exceeds 64 KiB bound",
                cluster_bytes
            )));
        }
        if self.total_sectors == 0 {
            return Err(NtfsError::InvalidBootSector(
                "total_sectors is zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute byte offset of MFT record `index` within the image.
    pub fn mft_record_offset(&self, index: u64) -> u64 {
        self.partition_offset
            + self.mft_lcn * self.cluster_bytes() as u64
            + index * MFT_RECORD_BYTES as u64
    }

    /// Absolute byte offset of logical cluster `lcn` within the image.
    /// Callers are responsible for treating `lcn == -1` (sparse) specially;
    /// this function is only meaningful for real clusters.
    pub fn cluster_offset(&self, lcn: i64) -> u64 {
        (self.partition_offset as i128 + lcn as i128 * self.cluster_bytes() as i128) as u64
    }
}

/// Summary of volume geometry returned by `Volume::get_volume_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeInfo {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub cluster_bytes: u32,
    pub total_sectors: u64,
    pub mft_lcn: u64,
    pub partition_offset: u64,
}

impl From<Geometry> for VolumeInfo {
    fn from(g: Geometry) -> Self {
        Self {
            bytes_per_sector: g.bytes_per_sector,
            sectors_per_cluster: g.sectors_per_cluster,
            cluster_bytes: g.cluster_bytes(),
            total_sectors: g.total_sectors,
            mft_lcn: g.mft_lcn,
            partition_offset: g.partition_offset,
        }
    }
}
