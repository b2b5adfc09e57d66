//! Volume — mounts a (possibly segmented) NTFS image and exposes the
//! core's public read-only API: mount, MFT decode, directory index
//! traversal, path resolution, extraction, and deleted-file recovery.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::core::error::{NtfsError, Result};
use crate::domain::attributes::{Attribute, ATTR_INDEX_ALLOCATION, ATTR_INDEX_ROOT};
use crate::domain::file_view::ClusterSource;
use crate::domain::geometry::{Geometry, VolumeInfo, MFT_RECORD_BYTES};
use crate::domain::index::{
    decode_index_root_entries, decode_indx_block_entries, filter_and_dedup, is_system_entry,
    IndexEntry,
};
use crate::domain::mft::{self, MftRecord, ROOT_DIRECTORY_INDEX};
use crate::domain::FileView;

use super::fixup;
use super::mft_cache::RecordCache;
use super::segment_reader::SegmentReader;

/// Typical on-disk size of one INDX block; fixed for this core the same
/// way `MFT_RECORD_BYTES` is fixed at 1024.
const INDEX_RECORD_BYTES: u64 = 4096;

const MBR_SIZE: usize = 512;
const PARTITION_TABLE_OFFSET: usize = 0x1BE;
const PARTITION_ENTRY_SIZE: usize = 16;
const NTFS_PARTITION_TYPE: u8 = 0x07;

/// A mounted NTFS volume. Owns the Segment Reader; all reads are
/// rejected once `close()` has run.
pub struct Volume {
    segment_reader: SegmentReader,
    geometry: Geometry,
    cache: Mutex<RecordCache>,
    closed: AtomicBool,
}

impl Volume {
    /// Mounts the volume at `path`.
    pub fn mount(path: &str) -> Result<Self> {
        let segment_reader = SegmentReader::open(path)?;

        let mbr = segment_reader.read(0, MBR_SIZE)?;
        if mbr.len() != MBR_SIZE {
            return Err(NtfsError::InvalidBootSector(
                "image too short to contain an MBR".to_string(),
            ));
        }

        let partition_offset = scan_partition_table(&mbr)?;
        log::debug!("volume mount: NTFS partition at byte offset {partition_offset}");

        let boot_sector = segment_reader.read(partition_offset, MBR_SIZE)?;
        if boot_sector.len() != MBR_SIZE {
            return Err(NtfsError::InvalidBootSector(
                "could not read boot sector at partition offset".to_string(),
            ));
        }
        if &boot_sector[3..7] != b"NTFS" {
            return Err(NtfsError::InvalidBootSector(
                "boot sector missing NTFS tag at offset 3".to_string(),
            ));
        }

        let bytes_per_sector = (&boot_sector[0x0B..0x0D]).read_u16::<LittleEndian>()?;
        let sectors_per_cluster = boot_sector[0x0D];
        let total_sectors = (&boot_sector[0x28..0x30]).read_u64::<LittleEndian>()?;
        let mft_lcn = (&boot_sector[0x30..0x38]).read_u64::<LittleEndian>()?;

        let geometry = Geometry {
            bytes_per_sector,
            sectors_per_cluster,
            total_sectors,
            mft_lcn,
            partition_offset,
        };
        geometry.validate()?;

        log::info!(
            "volume mount: bytes_per_sector={} sectors_per_cluster={} total_sectors={} mft_lcn={}",
            geometry.bytes_per_sector,
            geometry.sectors_per_cluster,
            geometry.total_sectors,
            geometry.mft_lcn
        );

        Ok(Self {
            segment_reader,
            geometry,
            cache: Mutex::new(RecordCache::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn get_volume_info(&self) -> Result<VolumeInfo> {
        self.ensure_open()?;
        Ok(VolumeInfo::from(self.geometry))
    }

    /// Reads and decodes MFT record `index`, memoizing the result.
    pub fn read_mft_record(&self, index: u64) -> Result<MftRecord> {
        self.ensure_open()?;

        if let Some(record) = self.cached(index)? {
            return Ok(record);
        }

        let offset = self.geometry.mft_record_offset(index);
        let mut buf = self.segment_reader.read(offset, MFT_RECORD_BYTES as usize)?;
        if buf.len() != MFT_RECORD_BYTES as usize {
            return Err(NtfsError::InvalidMft(format!(
                "record {index}: short read at offset {offset}"
            )));
        }

        let (usa_offset, usa_count) = fixup::read_usa_header(&buf)?;
        fixup::apply_fixup(&mut buf, usa_offset, usa_count)?;

        let record = mft::decode_record(index, &buf)?;
        log::debug!(
            "mft reader: decoded record {index}, {} attribute(s)",
            record.attributes.len()
        );

        let mut cache = self.lock_cache()?;
        cache.insert(index, record.clone());
        Ok(record)
    }

    fn cached(&self, index: u64) -> Result<Option<MftRecord>> {
        let cache = self.lock_cache()?;
        Ok(cache.get(index).cloned())
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, RecordCache>> {
        self.cache
            .lock()
            .map_err(|_| NtfsError::CorruptVolume("MFT cache lock poisoned".to_string()))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(NtfsError::InvalidParameter(
                "volume is closed".to_string(),
            ));
        }
        Ok(())
    }

    /// Decodes the directory entries of `record` from `$INDEX_ROOT` and,
    /// if present, `$INDEX_ALLOCATION`, merged and filtered uniformly by
    /// namespace and by the system-file filter.
    fn directory_entries(&self, record: &MftRecord) -> Result<Vec<IndexEntry>> {
        let mut entries = Vec::new();

        if let Some(root) = record.attributes_of_type(ATTR_INDEX_ROOT).next() {
            entries.extend(decode_index_root_entries(&root.resident_content)?);
        }

        if let Some(allocation) = record.attributes_of_type(ATTR_INDEX_ALLOCATION).next() {
            entries.extend(self.walk_index_allocation(allocation)?);
        }

        Ok(filter_and_dedup(entries))
    }

    fn walk_index_allocation(&self, attr: &Attribute) -> Result<Vec<IndexEntry>> {
        let bytes = self.read_non_resident_bytes(attr)?;
        let mut entries = Vec::new();

        for chunk in bytes.chunks(INDEX_RECORD_BYTES as usize) {
            if chunk.len() < INDEX_RECORD_BYTES as usize {
                break;
            }
            let mut block = chunk.to_vec();
            let (usa_offset, usa_count) = fixup::read_usa_header(&block)?;
            fixup::apply_fixup(&mut block, usa_offset, usa_count)?;
            entries.extend(decode_indx_block_entries(&block)?);
        }

        Ok(entries)
    }

    /// Assembles a non-resident attribute's full byte stream from its
    /// data runs (shared by `$INDEX_ALLOCATION` walking; `FileView`
    /// handles the unnamed `$DATA` case itself through `ClusterSource`).
    fn read_non_resident_bytes(&self, attr: &Attribute) -> Result<Vec<u8>> {
        let cluster_bytes = self.geometry.cluster_bytes() as u64;
        let mut out = Vec::with_capacity(attr.content_size as usize);
        for run in &attr.data_runs {
            if run.is_sparse() {
                out.resize(out.len() + (run.cluster_count * cluster_bytes) as usize, 0);
            } else {
                out.extend(self.read_clusters(run.lcn, run.cluster_count)?);
            }
        }
        out.truncate(attr.content_size as usize);
        Ok(out)
    }

    fn file_view_for(&self, index: u64) -> Result<FileView> {
        let record = self.read_mft_record(index)?;
        Ok(FileView::from_record(&record))
    }

    /// Resolves a slash-delimited path from the root.
    pub fn get_file_by_path(&self, path: &str) -> Result<MftRecord> {
        self.ensure_open()?;

        if path.is_empty() || path == "/" || path == "." {
            return self.read_mft_record(ROOT_DIRECTORY_INDEX);
        }

        let mut current = self.read_mft_record(ROOT_DIRECTORY_INDEX)?;

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !current.is_directory() {
                return Err(NtfsError::NotFound(format!(
                    "{path}: not a directory at {segment}"
                )));
            }
            let entries = self.directory_entries(&current)?;
            let matched = entries
                .into_iter()
                .find(|e| e.key.name.eq_ignore_ascii_case(segment))
                .ok_or_else(|| NtfsError::NotFound(format!("{path}: no such entry {segment}")))?;
            current = self.read_mft_record(matched.mft_index())?;
        }

        Ok(current)
    }

    /// Lists the contents of the directory at `path` (default root).
    pub fn list_files(&self, path: Option<&str>) -> Result<Vec<FileView>> {
        self.ensure_open()?;
        let dir_record = self.get_file_by_path(path.unwrap_or("/"))?;
        if !dir_record.is_directory() {
            return Err(NtfsError::InvalidParameter(format!(
                "{}: not a directory",
                path.unwrap_or("/")
            )));
        }
        let entries = self.directory_entries(&dir_record)?;
        let mut views = Vec::with_capacity(entries.len());
        for entry in entries {
            views.push(self.file_view_for(entry.mft_index())?);
        }
        Ok(views)
    }

    /// Extracts a single file's unnamed `$DATA` stream to `dst`.
    pub fn extract_file(&self, src: &str, dst: &Path) -> Result<()> {
        self.ensure_open()?;
        let record = self.get_file_by_path(src)?;
        if record.is_directory() {
            return Err(NtfsError::InvalidParameter(format!(
                "{src}: is a directory"
            )));
        }
        let view = FileView::from_record(&record);
        let data = view.read_data(self)?;
        std::fs::write(dst, data)?;
        Ok(())
    }

    /// Recursively extracts every live file under the root into `dst`,
    /// mirroring the source tree's directory structure. Uses an explicit
    /// work queue instead of recursion, so a pathologically deep or
    /// cyclic directory tree cannot blow the native stack.
    pub fn extract_all_files(&self, dst: &Path) -> Result<()> {
        self.ensure_open()?;
        std::fs::create_dir_all(dst)?;

        let mut queue: VecDeque<(u64, PathBuf)> =
            VecDeque::from([(ROOT_DIRECTORY_INDEX, dst.to_path_buf())]);

        while let Some((index, out_dir)) = queue.pop_front() {
            let record = self.read_mft_record(index)?;
            let entries = self.directory_entries(&record)?;

            for entry in entries {
                let child_index = entry.mft_index();
                let child_record = match self.read_mft_record(child_index) {
                    Ok(r) => r,
                    Err(e) => {
                        log::warn!("extract-all: skipping record {child_index}: {e}");
                        continue;
                    }
                };
                let child_path = out_dir.join(&entry.key.name);

                if child_record.is_directory() {
                    std::fs::create_dir_all(&child_path)?;
                    queue.push_back((child_index, child_path));
                } else {
                    let view = FileView::from_record(&child_record);
                    match view.read_data(self) {
                        Ok(data) => std::fs::write(&child_path, data)?,
                        Err(e) => log::warn!(
                            "extract-all: could not read {}: {e}",
                            child_path.display()
                        ),
                    }
                }
            }
        }

        Ok(())
    }

    /// Recursively searches live directories from the root for names
    /// containing `pattern` as a case-insensitive substring. Bounded by
    /// the same explicit work queue as `extract_all_files`.
    pub fn search_files(&self, pattern: &str) -> Result<Vec<FileView>> {
        self.ensure_open()?;
        let pattern = pattern.to_lowercase();
        let mut results = Vec::new();
        let mut queue: VecDeque<u64> = VecDeque::from([ROOT_DIRECTORY_INDEX]);

        while let Some(index) = queue.pop_front() {
            let record = match self.read_mft_record(index) {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("search: skipping record {index}: {e}");
                    continue;
                }
            };
            let entries = self.directory_entries(&record)?;

            for entry in entries {
                if entry.key.name.to_lowercase().contains(&pattern) {
                    results.push(self.file_view_for(entry.mft_index())?);
                }
                let is_dir = self
                    .read_mft_record(entry.mft_index())
                    .map(|r| r.is_directory())
                    .unwrap_or(false);
                if is_dir {
                    queue.push_back(entry.mft_index());
                }
            }
        }

        Ok(results)
    }

    /// Enumerates deleted-but-recoverable entries. The upper bound is
    /// derived from `$MFT`'s own `$DATA` size rather than a hardcoded
    /// constant, since record 0 is always `$MFT` itself, just as record 5
    /// is always the root.
    pub fn list_deleted_files(&self) -> Result<Vec<FileView>> {
        self.ensure_open()?;
        let mft_record = self.read_mft_record(0)?;
        let mft_data = mft_record
            .unnamed_data()
            .map(|a| a.content_size)
            .unwrap_or(0);
        let upper_bound = mft_data / MFT_RECORD_BYTES as u64;

        let mut deleted = Vec::new();
        for index in 0..upper_bound {
            let record = match self.read_mft_record(index) {
                Ok(r) => r,
                Err(e) => {
                    log::debug!("recovery scan: record {index} failed to decode: {e}");
                    continue;
                }
            };
            if record.is_in_use() || !record.has_file_name() {
                continue;
            }
            let view = FileView::from_record(&record);
            if is_system_entry(record.reference, &view.name) {
                continue;
            }
            deleted.push(view);
        }

        log::info!("recovery scan: {} deleted record(s) recovered", deleted.len());
        Ok(deleted)
    }

    /// Closes the volume; subsequent reads return `InvalidParameter`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl ClusterSource for Volume {
    fn cluster_bytes(&self) -> u32 {
        self.geometry.cluster_bytes()
    }

    /// Sparse LCN (-1) produces zero-filled output without an image read.
    fn read_clusters(&self, lcn: i64, count: u64) -> Result<Vec<u8>> {
        let length = (count * self.geometry.cluster_bytes() as u64) as usize;
        if lcn == -1 {
            return Ok(vec![0u8; length]);
        }
        let absolute = self.geometry.cluster_offset(lcn);
        let buf = self.segment_reader.read(absolute, length)?;
        if buf.len() != length {
            return Err(NtfsError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short cluster read at lcn {lcn}"),
            )));
        }
        Ok(buf)
    }
}

/// Scans the four primary partition entries for the first NTFS (type
/// 0x07) partition and returns its absolute byte offset.
fn scan_partition_table(mbr: &[u8]) -> Result<u64> {
    for i in 0..4 {
        let entry_offset = PARTITION_TABLE_OFFSET + i * PARTITION_ENTRY_SIZE;
        let entry = &mbr[entry_offset..entry_offset + PARTITION_ENTRY_SIZE];
        let partition_type = entry[4];
        if partition_type == NTFS_PARTITION_TYPE {
            let first_lba = (&entry[8..12]).read_u32::<LittleEndian>()?;
            return Ok(first_lba as u64 * 512);
        }
    }
    Err(NtfsError::InvalidBootSector(
        "no NTFS (type 0x07) partition entry found in MBR".to_string(),
    ))
}
