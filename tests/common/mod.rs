//! Synthetic NTFS image builder used only by the integration tests in
//! `tests/`. Builds the smallest byte-accurate MBR + boot sector + MFT +
//! cluster layout that exercises `Volume::mount` end to end, instead of
//! depending on a real disk image fixture.

use std::path::Path;

pub const SECTOR_BYTES: usize = 512;
pub const CLUSTER_SECTORS: u8 = 8;
pub const CLUSTER_BYTES: usize = SECTOR_BYTES * CLUSTER_SECTORS as usize;
pub const PARTITION_OFFSET: u64 = 1_048_576;
pub const MFT_LCN: u64 = 4;
pub const MFT_RECORD_BYTES: usize = 1024;
pub const TOTAL_SECTORS: u64 = 20_480;

const ATTR_STANDARD_INFORMATION: u32 = 0x10;
const ATTR_FILE_NAME: u32 = 0x30;
const ATTR_DATA: u32 = 0x80;
const ATTR_INDEX_ROOT: u32 = 0x90;
const ATTR_INDEX_ALLOCATION: u32 = 0xA0;

const FLAG_IN_USE: u16 = 0x0001;
const FLAG_IS_DIRECTORY: u16 = 0x0002;

pub const NAMESPACE_WIN32: u8 = 1;

/// One data-run extent to encode, real or sparse.
pub enum RunSpec {
    Real(i64, u64),
    Sparse(u64),
}

/// One `$INDEX_ROOT`/INDX entry to encode.
pub struct IndexEntrySpec {
    pub mft_index: u64,
    pub sequence: u16,
    pub name: &'static str,
    pub namespace: u8,
}

fn encode_le_uint(mut value: u64, size: usize) -> Vec<u8> {
    let mut out = vec![0u8; size];
    for b in out.iter_mut() {
        *b = (value & 0xFF) as u8;
        value >>= 8;
    }
    out
}

fn min_bytes_unsigned(value: u64) -> usize {
    let mut n = 1;
    while n < 8 && (value >> (8 * n)) != 0 {
        n += 1;
    }
    n
}

fn min_bytes_signed(value: i64) -> usize {
    if value == 0 {
        return 1;
    }
    let mut n = 1;
    loop {
        let lo = -(1i64 << (8 * n - 1));
        let hi = (1i64 << (8 * n - 1)) - 1;
        if value >= lo && value <= hi || n >= 8 {
            return n;
        }
        n += 1;
    }
}

/// Encodes a data-run list the way `decode_data_runs` expects to read it:
/// cumulative LCN advancing only on real runs, terminated by a zero byte.
pub fn build_data_runs(runs: &[RunSpec]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut cumulative: i64 = 0;

    for run in runs {
        match run {
            RunSpec::Sparse(len) => {
                let len_size = min_bytes_unsigned(*len);
                out.push(len_size as u8);
                out.extend(encode_le_uint(*len, len_size));
            }
            RunSpec::Real(lcn, len) => {
                let delta = lcn - cumulative;
                cumulative = *lcn;
                let len_size = min_bytes_unsigned(*len);
                let off_size = min_bytes_signed(delta);
                out.push((len_size as u8) | ((off_size as u8) << 4));
                out.extend(encode_le_uint(*len, len_size));
                let masked = (delta as i128 & ((1i128 << (8 * off_size)) - 1)) as u64;
                out.extend(encode_le_uint(masked, off_size));
            }
        }
    }
    out.push(0);
    out
}

/// Applies USA fix-up encoding in place: stashes each protected sector's
/// real trailing two bytes into the update sequence array, then stamps the
/// sequence number over them, mirroring what a real on-disk structure
/// looks like before `fixup::apply_fixup` restores it.
fn apply_usa(buf: &mut [u8], usa_offset: usize, usa_count: u16) {
    let usn: u16 = 0x0001;
    buf[usa_offset..usa_offset + 2].copy_from_slice(&usn.to_le_bytes());
    let sector_count = usa_count as usize - 1;
    for i in 0..sector_count {
        let sector_end = (i + 1) * SECTOR_BYTES;
        if sector_end > buf.len() {
            break;
        }
        let original = [buf[sector_end - 2], buf[sector_end - 1]];
        let entry_off = usa_offset + 2 * (i + 1);
        buf[entry_off..entry_off + 2].copy_from_slice(&original);
        buf[sector_end - 2..sector_end].copy_from_slice(&usn.to_le_bytes());
    }
}

pub fn resident_attr(type_id: u32, content: &[u8]) -> Vec<u8> {
    let total_len = 24 + content.len();
    let mut buf = vec![0u8; total_len];
    buf[0..4].copy_from_slice(&type_id.to_le_bytes());
    buf[4..8].copy_from_slice(&(total_len as u32).to_le_bytes());
    buf[8] = 0; // resident
    buf[16..20].copy_from_slice(&(content.len() as u32).to_le_bytes());
    buf[20..22].copy_from_slice(&24u16.to_le_bytes()); // content_offset, attribute-relative
    buf[24..].copy_from_slice(content);
    buf
}

pub fn non_resident_attr(type_id: u32, content_size: u64, runs: &[RunSpec]) -> Vec<u8> {
    let run_bytes = build_data_runs(runs);
    let total_len = 64 + run_bytes.len();
    let mut buf = vec![0u8; total_len];
    buf[0..4].copy_from_slice(&type_id.to_le_bytes());
    buf[4..8].copy_from_slice(&(total_len as u32).to_le_bytes());
    buf[8] = 1; // non-resident
    buf[0x20..0x22].copy_from_slice(&64u16.to_le_bytes()); // runs_offset, attribute-relative
    buf[0x30..0x38].copy_from_slice(&content_size.to_le_bytes()); // real_size
    buf[64..].copy_from_slice(&run_bytes);
    buf
}

pub fn standard_information_content(created_ticks: u64, modified_ticks: u64) -> Vec<u8> {
    let mut buf = vec![0u8; 48];
    buf[0..8].copy_from_slice(&created_ticks.to_le_bytes());
    buf[8..16].copy_from_slice(&modified_ticks.to_le_bytes());
    buf
}

fn utf16le(name: &str) -> Vec<u8> {
    name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

pub fn file_name_content(parent_mft_index: u64, parent_sequence: u16, name: &str, namespace: u8, is_directory: bool) -> Vec<u8> {
    let name_utf16 = utf16le(name);
    let mut buf = vec![0u8; 66 + name_utf16.len()];
    let parent_ref = (parent_mft_index & 0x0000_FFFF_FFFF_FFFF) | ((parent_sequence as u64) << 48);
    buf[0..8].copy_from_slice(&parent_ref.to_le_bytes());
    buf[56..60].copy_from_slice(&(if is_directory { 0x1000_0010u32 } else { 0x20u32 }).to_le_bytes());
    buf[64] = name.encode_utf16().count() as u8;
    buf[65] = namespace;
    buf[66..].copy_from_slice(&name_utf16);
    buf
}

fn file_reference(mft_index: u64, sequence: u16) -> u64 {
    (mft_index & 0x0000_FFFF_FFFF_FFFF) | ((sequence as u64) << 48)
}

/// Encodes a flat entry list followed by the last-entry terminator marker,
/// shared by `$INDEX_ROOT` content and INDX blocks.
fn build_index_entries_bytes(entries: &[IndexEntrySpec]) -> Vec<u8> {
    let mut out = Vec::new();
    for e in entries {
        let name_utf16 = utf16le(e.name);
        let key_len = 66 + name_utf16.len();
        let entry_len = 16 + key_len;
        let mut entry = vec![0u8; entry_len];
        entry[0..8].copy_from_slice(&file_reference(e.mft_index, e.sequence).to_le_bytes());
        entry[8..10].copy_from_slice(&(entry_len as u16).to_le_bytes());
        entry[10..12].copy_from_slice(&(key_len as u16).to_le_bytes());
        entry[12] = 0; // flags: not last, no child
        entry[16 + 64] = e.name.encode_utf16().count() as u8;
        entry[16 + 65] = e.namespace;
        entry[16 + 66..16 + 66 + name_utf16.len()].copy_from_slice(&name_utf16);
        out.extend(entry);
    }
    let mut terminator = vec![0u8; 16];
    terminator[12] = 0x02; // ENTRY_FLAG_LAST
    out.extend(terminator);
    out
}

/// Resident `$INDEX_ROOT` content: 16-byte index-root header, 16-byte
/// Index Node Header at offset 16 (entries start right after it), entries.
pub fn index_root_content(entries: &[IndexEntrySpec]) -> Vec<u8> {
    let body = build_index_entries_bytes(entries);
    let mut buf = vec![0u8; 32];
    buf[16..20].copy_from_slice(&16u32.to_le_bytes());
    buf.extend(body);
    buf
}

/// One full 4096-byte INDX block ("INDX" tag, 24-byte pre-header, Index
/// Node Header at offset 24, its own USA fix-up over 8 sectors).
pub fn build_indx_block(entries: &[IndexEntrySpec]) -> Vec<u8> {
    const USA_OFFSET: usize = 40;
    const USA_COUNT: u16 = 9; // 4096 / 512 = 8 sectors, +1

    let body = build_index_entries_bytes(entries);
    let mut buf = vec![0u8; CLUSTER_BYTES];
    buf[0..4].copy_from_slice(b"INDX");
    buf[4..6].copy_from_slice(&(USA_OFFSET as u16).to_le_bytes());
    buf[6..8].copy_from_slice(&USA_COUNT.to_le_bytes());
    buf[24..28].copy_from_slice(&40u32.to_le_bytes()); // entries_offset, relative to node header (24)
    let entries_abs = 24 + 40;
    buf[entries_abs..entries_abs + body.len()].copy_from_slice(&body);
    apply_usa(&mut buf, USA_OFFSET, USA_COUNT);
    buf
}

/// Builds one fixed-up, 1024-byte MFT record from its already-encoded
/// attribute byte strings.
pub fn build_mft_record(sequence: u16, flags: u16, base_reference: u64, attrs: &[Vec<u8>]) -> Vec<u8> {
    const FIRST_ATTR_OFFSET: usize = 56;
    const USA_OFFSET: usize = 48;
    const USA_COUNT: u16 = 3; // 1024 / 512 = 2 sectors, +1

    let mut buf = vec![0u8; MFT_RECORD_BYTES];
    buf[0..4].copy_from_slice(b"FILE");
    buf[4..6].copy_from_slice(&(USA_OFFSET as u16).to_le_bytes());
    buf[6..8].copy_from_slice(&USA_COUNT.to_le_bytes());
    buf[16..18].copy_from_slice(&sequence.to_le_bytes());
    buf[20..22].copy_from_slice(&(FIRST_ATTR_OFFSET as u16).to_le_bytes());
    buf[22..24].copy_from_slice(&flags.to_le_bytes());
    buf[28..32].copy_from_slice(&(MFT_RECORD_BYTES as u32).to_le_bytes());
    buf[32..40].copy_from_slice(&base_reference.to_le_bytes());

    let mut offset = FIRST_ATTR_OFFSET;
    for attr in attrs {
        buf[offset..offset + attr.len()].copy_from_slice(attr);
        offset += attr.len();
    }
    buf[offset..offset + 4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    offset += 4;

    buf[24..28].copy_from_slice(&(offset as u32).to_le_bytes());
    apply_usa(&mut buf, USA_OFFSET, USA_COUNT);
    buf
}

/// Assembles the raw bytes of a (single-segment) NTFS image: MBR, boot
/// sector, MFT region, and arbitrary data clusters, writing the whole
/// thing to `<dir>/<base_name>.001` on `finish`.
pub struct ImageBuilder {
    buf: Vec<u8>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        let mut b = Self { buf: vec![0u8; 2 * 1024 * 1024] };
        b.write_mbr();
        b.write_boot_sector();
        b
    }

    fn ensure_len(&mut self, len: usize) {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
    }

    fn set_bytes(&mut self, offset: u64, data: &[u8]) {
        let end = offset as usize + data.len();
        self.ensure_len(end);
        self.buf[offset as usize..end].copy_from_slice(data);
    }

    fn write_mbr(&mut self) {
        let mut mbr = vec![0u8; SECTOR_BYTES];
        let entry_off = 0x1BE;
        mbr[entry_off + 4] = 0x07; // NTFS partition type
        let first_lba = (PARTITION_OFFSET / SECTOR_BYTES as u64) as u32;
        mbr[entry_off + 8..entry_off + 12].copy_from_slice(&first_lba.to_le_bytes());
        self.set_bytes(0, &mbr);
    }

    fn write_boot_sector(&mut self) {
        let mut bs = vec![0u8; SECTOR_BYTES];
        bs[3..7].copy_from_slice(b"NTFS");
        bs[0x0B..0x0D].copy_from_slice(&(SECTOR_BYTES as u16).to_le_bytes());
        bs[0x0D] = CLUSTER_SECTORS;
        bs[0x28..0x30].copy_from_slice(&TOTAL_SECTORS.to_le_bytes());
        bs[0x30..0x38].copy_from_slice(&MFT_LCN.to_le_bytes());
        self.set_bytes(PARTITION_OFFSET, &bs);
    }

    pub fn write_mft_record(&mut self, index: u64, record_bytes: &[u8]) {
        let offset = PARTITION_OFFSET + MFT_LCN * CLUSTER_BYTES as u64 + index * MFT_RECORD_BYTES as u64;
        self.set_bytes(offset, record_bytes);
    }

    pub fn write_cluster(&mut self, lcn: i64, data: &[u8]) {
        let offset = (PARTITION_OFFSET as i128 + lcn as i128 * CLUSTER_BYTES as i128) as u64;
        self.set_bytes(offset, data);
    }

    pub fn finish(self, dir: &Path, base_name: &str) -> String {
        let path = dir.join(format!("{base_name}.001"));
        std::fs::write(&path, &self.buf).unwrap();
        dir.join(base_name).to_str().unwrap().to_string()
    }
}

pub const ROOT_INDEX: u64 = 5;

pub fn resident_file_record(parent: u64, sequence: u16, name: &str, content: &[u8]) -> Vec<u8> {
    let attrs = vec![
        resident_attr(ATTR_STANDARD_INFORMATION, &standard_information_content(0, 0)),
        resident_attr(ATTR_FILE_NAME, &file_name_content(parent, 1, name, NAMESPACE_WIN32, false)),
        resident_attr(ATTR_DATA, content),
    ];
    build_mft_record(sequence, FLAG_IN_USE, 0, &attrs)
}

pub fn directory_record(parent: u64, sequence: u16, name: &str, entries: &[IndexEntrySpec]) -> Vec<u8> {
    let attrs = vec![
        resident_attr(ATTR_STANDARD_INFORMATION, &standard_information_content(0, 0)),
        resident_attr(ATTR_FILE_NAME, &file_name_content(parent, 1, name, NAMESPACE_WIN32, true)),
        resident_attr(ATTR_INDEX_ROOT, &index_root_content(entries)),
    ];
    build_mft_record(sequence, FLAG_IN_USE | FLAG_IS_DIRECTORY, 0, &attrs)
}

pub fn directory_record_with_allocation(
    parent: u64,
    sequence: u16,
    name: &str,
    allocation_lcn: i64,
    allocation_clusters: u64,
) -> Vec<u8> {
    let content_size = allocation_clusters * CLUSTER_BYTES as u64;
    let attrs = vec![
        resident_attr(ATTR_STANDARD_INFORMATION, &standard_information_content(0, 0)),
        resident_attr(ATTR_FILE_NAME, &file_name_content(parent, 1, name, NAMESPACE_WIN32, true)),
        resident_attr(ATTR_INDEX_ROOT, &index_root_content(&[])),
        non_resident_attr(
            ATTR_INDEX_ALLOCATION,
            content_size,
            &[RunSpec::Real(allocation_lcn, allocation_clusters)],
        ),
    ];
    build_mft_record(sequence, FLAG_IN_USE | FLAG_IS_DIRECTORY, 0, &attrs)
}

pub fn non_resident_file_record(
    parent: u64,
    sequence: u16,
    name: &str,
    content_size: u64,
    runs: &[RunSpec],
) -> Vec<u8> {
    let attrs = vec![
        resident_attr(ATTR_STANDARD_INFORMATION, &standard_information_content(0, 0)),
        resident_attr(ATTR_FILE_NAME, &file_name_content(parent, 1, name, NAMESPACE_WIN32, false)),
        non_resident_attr(ATTR_DATA, content_size, runs),
    ];
    build_mft_record(sequence, FLAG_IN_USE, 0, &attrs)
}

pub fn deleted_resident_file_record(parent: u64, sequence: u16, name: &str, content: &[u8]) -> Vec<u8> {
    let attrs = vec![
        resident_attr(ATTR_STANDARD_INFORMATION, &standard_information_content(0, 0)),
        resident_attr(ATTR_FILE_NAME, &file_name_content(parent, 1, name, NAMESPACE_WIN32, false)),
        resident_attr(ATTR_DATA, content),
    ];
    build_mft_record(sequence, 0, 0, &attrs) // FLAG_IN_USE not set
}

/// `$MFT`'s own record 0, whose unnamed `$DATA` `content_size` bounds the
/// recovery scan's upper limit.
pub fn mft_self_record(record_count: u64) -> Vec<u8> {
    let content_size = record_count * MFT_RECORD_BYTES as u64;
    let attrs = vec![non_resident_attr(
        ATTR_DATA,
        content_size,
        &[RunSpec::Real(1, 1)], // never read; only content_size matters here
    )];
    build_mft_record(1, FLAG_IN_USE, 0, &attrs)
}
