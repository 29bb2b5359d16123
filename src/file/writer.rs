//! File serialization: block emission and bufloc fixups.
//!
//! Blocks are encoded to memory in canonical order (LUT, IIDs, meta,
//! groups, segments), their extents recorded, and the header and LUT
//! patched before anything touches the filesystem: LUT records receive
//! the IID-relative and segment-absolute locations for each key, the
//! header receives absolute block locations. The write itself is all-or-
//! nothing; on failure the output path is removed rather than left
//! half-written.

use crate::codec::Bufloc;
use crate::error::{Error, Result};
use crate::file::groups::GroupTable;
use crate::file::header::Header;
use crate::file::lut::{LookupTable, LutRecord};
use crate::file::meta::Metadata;
use crate::file::reader::Entry;
use crate::file::{FORMAT_VERSION, HEADER_SIZE, LUT_RECORD_SIZE, RFORMAT_IMAGE};
use bytes::{Bytes, BytesMut};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// A fully serialized file plus the locations needed to re-point an
/// in-memory handle at it.
#[derive(Debug)]
pub(crate) struct EncodedFile {
    /// The complete file image.
    pub data: Bytes,
    /// The patched header.
    pub header: Header,
    /// The patched lookup-table records, in key order.
    pub lut: Vec<LutRecord>,
}

/// Serializes the entry set into the bit-exact file layout.
///
/// Every entry must have both its IID and segment materialized, and
/// every group's key set must be resolved.
pub(crate) fn encode_file(
    entries: &[Entry],
    meta: &Metadata,
    groups: &GroupTable,
) -> Result<EncodedFile> {
    // IID and segment blocks, recording block-relative extents per key.
    let mut iid_block = BytesMut::new();
    let mut seg_block = BytesMut::new();
    let mut lut = Vec::with_capacity(entries.len());

    for entry in entries {
        let iid = entry
            .iid
            .as_ref()
            .ok_or_else(|| Error::not_loaded(format!("entry {} has no IID", entry.key)))?;
        let seg = entry
            .seg
            .as_ref()
            .ok_or_else(|| Error::not_loaded(format!("entry {} has no segment", entry.key)))?;

        let iid_start = bufloc_at(iid_block.len(), iid.record_len())?;
        iid.encode_record(entry.key, &mut iid_block)?;

        let seg_start = bufloc_at(seg_block.len(), seg.record_len())?;
        seg.encode(entry.key, &mut seg_block)?;

        lut.push(LutRecord { key: entry.key, iid: iid_start, seg: seg_start });
    }

    let mut meta_block = BytesMut::new();
    meta.encode(&mut meta_block)?;

    let mut groups_block = BytesMut::new();
    groups.encode(&mut groups_block)?;

    // Absolute block offsets, in canonical order.
    let lut_len = entries.len() * LUT_RECORD_SIZE;
    let lut_offset = HEADER_SIZE;
    let iids_offset = lut_offset + lut_len;
    let meta_offset = iids_offset + iid_block.len();
    let groups_offset = meta_offset + meta_block.len();
    let segs_offset = groups_offset + groups_block.len();
    let total = segs_offset + seg_block.len();
    if total > u32::MAX as usize {
        return Err(Error::invalid_argument(format!(
            "file size {} exceeds the u32 offset range",
            total
        )));
    }

    // Segment locations become file-absolute; IID locations stay relative
    // to the IID block so the block can move without rewriting the LUT.
    for record in &mut lut {
        record.seg.offset += segs_offset as u32;
    }

    let header = Header {
        version: FORMAT_VERSION,
        rformat: RFORMAT_IMAGE,
        lut: Bufloc::new(lut_offset as u32, lut_len as u32),
        iids: Bufloc::new(iids_offset as u32, iid_block.len() as u32),
        meta: Bufloc::new(meta_offset as u32, meta_block.len() as u32),
        groups: Bufloc::new(groups_offset as u32, groups_block.len() as u32),
        segs: Bufloc::new(segs_offset as u32, seg_block.len() as u32),
    };

    let mut data = BytesMut::with_capacity(total);
    header.encode(&mut data);
    LookupTable::encode(&lut, &mut data);
    data.extend_from_slice(&iid_block);
    data.extend_from_slice(&meta_block);
    data.extend_from_slice(&groups_block);
    data.extend_from_slice(&seg_block);
    debug_assert_eq!(data.len(), total);

    Ok(EncodedFile { data: data.freeze(), header, lut })
}

/// Writes a file image to `path`, removing the output on failure.
pub(crate) fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let outcome = writer
        .write_all(data)
        .and_then(|_| writer.flush())
        .and_then(|_| writer.get_ref().sync_all());

    match outcome {
        Ok(()) => {
            log::info!("wrote iid file {:?}: {} bytes", path, data.len());
            Ok(())
        }
        Err(e) => {
            drop(writer);
            let _ = fs::remove_file(path);
            Err(Error::Io(e))
        }
    }
}

fn bufloc_at(offset: usize, length: usize) -> Result<Bufloc> {
    let offset =
        u32::try_from(offset).map_err(|_| Error::invalid_argument("block exceeds u32 range"))?;
    let length =
        u32::try_from(length).map_err(|_| Error::invalid_argument("record exceeds u32 range"))?;
    Ok(Bufloc::new(offset, length))
}
