//! File View — the read-only projection of an MFT record used by every
//! public operation (list, extract, search, recovery).
//!
//! `FileView` is a plain data type that borrows cluster access through the
//! `ClusterSource` trait instead of holding a literal back-pointer to
//! `Volume`, avoiding a cyclic ownership graph between the two.

use super::attributes::{Attribute, ATTR_FILE_NAME};
use super::index::{NAMESPACE_DOS, NAMESPACE_WIN32};
use super::mft::MftRecord;
use crate::core::error::Result;

/// Abstracts cluster reads so `FileView` never needs to own or borrow a
/// `Volume` directly.
pub trait ClusterSource {
    fn cluster_bytes(&self) -> u32;
    fn read_clusters(&self, lcn: i64, count: u64) -> Result<Vec<u8>>;
}

/// A read-only, presentation-ready view of one MFT record.
#[derive(Debug, Clone)]
pub struct FileView {
    pub mft_reference: u64,
    pub name: String,
    pub size: u64,
    pub is_directory: bool,
    pub is_deleted: bool,
    pub created_ticks: u64,
    pub modified_ticks: u64,
    data_attribute: Option<Attribute>,
}

impl FileView {
    /// Builds a `FileView` from a decoded record.
    pub fn from_record(record: &MftRecord) -> Self {
        let name = best_file_name(record).unwrap_or_default();
        let data_attribute = record.unnamed_data().cloned();
        let is_directory = record.is_directory();

        let size = if is_directory {
            0
        } else {
            data_attribute.as_ref().map(|a| a.content_size).unwrap_or(0)
        };

        let (created_ticks, modified_ticks) = record
            .standard_information()
            .map(|si| {
                let created = u64_at(&si.resident_content, 0).unwrap_or(0);
                let modified = u64_at(&si.resident_content, 8).unwrap_or(0);
                (created, modified)
            })
            .unwrap_or((0, 0));

        Self {
            mft_reference: record.reference,
            name,
            size,
            is_directory,
            is_deleted: record.is_deleted(),
            created_ticks,
            modified_ticks,
            data_attribute,
        }
    }

    /// Reads the full unnamed `$DATA` stream. Resident data is returned
    /// verbatim; non-resident data is assembled from cluster runs and
    /// truncated to the declared `content_size`.
    pub fn read_data(&self, source: &dyn ClusterSource) -> Result<Vec<u8>> {
        let Some(attr) = &self.data_attribute else {
            return Ok(Vec::new());
        };

        if attr.is_resident {
            return Ok(attr.resident_content.clone());
        }

        let cluster_bytes = source.cluster_bytes() as u64;
        let mut out = Vec::with_capacity(attr.content_size as usize);
        for run in &attr.data_runs {
            if out.len() as u64 >= attr.content_size {
                break;
            }
            if run.is_sparse() {
                out.resize(out.len() + (run.cluster_count * cluster_bytes) as usize, 0);
            } else {
                let chunk = source.read_clusters(run.lcn, run.cluster_count)?;
                out.extend_from_slice(&chunk);
            }
        }
        out.truncate(attr.content_size as usize);
        Ok(out)
    }

    /// Best-effort reconstruction for a deleted entry: per-run read
    /// failures are swallowed (the cluster may have been reallocated) and
    /// replaced with an empty span, instead of failing the whole read.
    pub fn read_deleted_data(&self, source: &dyn ClusterSource) -> Vec<u8> {
        let Some(attr) = &self.data_attribute else {
            return Vec::new();
        };

        if attr.is_resident {
            return attr.resident_content.clone();
        }

        let cluster_bytes = source.cluster_bytes() as u64;
        let mut out = Vec::with_capacity(attr.content_size as usize);
        for run in &attr.data_runs {
            if out.len() as u64 >= attr.content_size {
                break;
            }
            if run.is_sparse() {
                out.resize(out.len() + (run.cluster_count * cluster_bytes) as usize, 0);
                continue;
            }
            match source.read_clusters(run.lcn, run.cluster_count) {
                Ok(chunk) => out.extend_from_slice(&chunk),
                Err(e) => {
                    log::warn!(
                        "deleted file {}: run at lcn {} unreadable ({}), emitting empty span",
                        self.mft_reference,
                        run.lcn,
                        e
                    );
                }
            }
        }
        out.truncate(attr.content_size as usize);
        out
    }
}

fn u64_at(buf: &[u8], offset: usize) -> Option<u64> {
    buf.get(offset..offset + 8)
        .map(|s| u64::from_le_bytes(s.try_into().unwrap()))
}

/// Picks the first `$FILE_NAME` whose namespace is not DOS-only,
/// falling back to the first `$FILE_NAME` present at all.
fn best_file_name(record: &MftRecord) -> Option<String> {
    let mut fallback = None;
    for attr in record.file_names() {
        let namespace = attr.resident_content.get(65).copied().unwrap_or(NAMESPACE_WIN32);
        let name_length = attr.resident_content.get(64).copied().unwrap_or(0) as usize;
        let name_start = 66usize;
        let name_end = name_start + name_length * 2;
        let name = attr
            .resident_content
            .get(name_start..name_end)
            .map(|bytes| super::attributes::decode_utf16le(bytes));

        if namespace != NAMESPACE_DOS {
            if let Some(name) = name {
                return Some(name);
            }
        } else if fallback.is_none() {
            fallback = name;
        }
    }
    fallback
}
