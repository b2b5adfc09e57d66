//! Segment Reader — presents a possibly-split raw image as one
//! contiguous, byte-addressable stream: a list of files addressed by a
//! cumulative-offset table, with a `Mutex`-guarded seek-then-read surface
//! shared across all segments.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Mutex;

use crate::core::error::{NtfsError, Result};

/// One opened segment and the absolute offset at which it starts.
struct Segment {
    file: File,
    len: u64,
}

/// A possibly multi-part raw image, addressed as one contiguous stream.
///
/// Segment `i` covers absolute offsets `[starts[i], starts[i] + len[i])`.
/// `starts` is a cumulative-offset table, looked up by binary search,
/// rather than a divide-by-first-segment-size shortcut — the latter
/// breaks whenever the final segment is shorter than the others, which
/// is the common case for a split image.
pub struct SegmentReader {
    segments: Mutex<Vec<Segment>>,
    starts: Vec<u64>,
    total_len: u64,
}

impl SegmentReader {
    /// Opens `<base>.001` and then probes `.002`, `.003`, … until a probe
    /// fails.
    ///
    /// `path` is resolved to a base first: if it already ends in a
    /// three-digit numeric suffix (`disk.001`), that suffix is stripped;
    /// otherwise `path` itself is the base and `<path>.001` is probed.
    pub fn open(path: &str) -> Result<Self> {
        let base = strip_segment_suffix(path);

        let mut segments = Vec::new();
        let mut starts = Vec::new();
        let mut cursor: u64 = 0;
        let mut n: u32 = 1;

        loop {
            let candidate = format!("{base}.{n:03}");
            let file = match File::open(&candidate) {
                Ok(f) => f,
                Err(e) => {
                    if n == 1 {
                        return Err(NtfsError::Io(e));
                    }
                    break;
                }
            };
            let len = file.metadata()?.len();
            log::debug!("segment reader: opened {candidate} ({len} bytes)");
            starts.push(cursor);
            cursor += len;
            segments.push(Segment { file, len });
            n += 1;
        }

        log::info!(
            "segment reader: {} segment(s), {} total bytes",
            segments.len(),
            cursor
        );

        Ok(Self {
            segments: Mutex::new(segments),
            starts,
            total_len: cursor,
        })
    }

    pub fn total_len(&self) -> u64 {
        self.total_len
    }

    /// Reads `length` bytes starting at `absolute_offset`, crossing
    /// segment boundaries transparently. Returns fewer bytes than
    /// requested only when the image ends; any other short read is an
    /// I/O error.
    pub fn read(&self, absolute_offset: u64, length: usize) -> Result<Vec<u8>> {
        if absolute_offset >= self.total_len || length == 0 {
            return Ok(Vec::new());
        }

        let mut segments = self
            .segments
            .lock()
            .map_err(|_| NtfsError::CorruptVolume("segment reader lock poisoned".to_string()))?;

        let mut seg_idx = self.segment_for_offset(absolute_offset);
        let mut pos_in_seg = absolute_offset - self.starts[seg_idx];
        let mut out = Vec::with_capacity(length);
        let mut remaining = length;

        while remaining > 0 && seg_idx < segments.len() {
            let seg = &mut segments[seg_idx];
            let available = seg.len - pos_in_seg;
            let want = remaining.min(available as usize);

            if want > 0 {
                seg.file.seek(SeekFrom::Start(pos_in_seg))?;
                let mut buf = vec![0u8; want];
                seg.file.read_exact(&mut buf)?;
                out.extend_from_slice(&buf);
                remaining -= want;
            }

            seg_idx += 1;
            pos_in_seg = 0;
        }

        Ok(out)
    }

    /// Cumulative-length binary search: finds the segment index whose
    /// range contains `offset`.
    fn segment_for_offset(&self, offset: u64) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        }
    }
}

fn strip_segment_suffix(path: &str) -> String {
    let bytes = path.as_bytes();
    if bytes.len() > 4 {
        let tail = &bytes[bytes.len() - 4..];
        if tail[0] == b'.' && tail[1..].iter().all(u8::is_ascii_digit) {
            return path[..path.len() - 4].to_string();
        }
    }
    path.to_string()
}
