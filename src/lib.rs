//! ntfs-forensic-core
//!
//! A read-only forensic parser for NTFS volume images: segment-aware
//! addressing over split images, boot-sector and MFT decoding, data-run
//! reconstruction, directory index traversal, path resolution, and
//! deleted-file recovery.

pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use core::{NtfsError, Result};
pub use domain::{Attribute, DataRun, FileNameKey, FileView, Geometry, IndexEntry, MftRecord, VolumeInfo};
pub use infrastructure::Volume;
