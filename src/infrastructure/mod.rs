//! Infrastructure layer — all I/O: segment-aware reads, USA fix-up, and
//! the `Volume` type that ties geometry, the MFT cache, directory index
//! decoding, path resolution, and recovery scanning together behind the
//! core's public API.

pub mod fixup;
pub mod mft_cache;
pub mod segment_reader;
pub mod volume;

pub use segment_reader::SegmentReader;
pub use volume::Volume;
