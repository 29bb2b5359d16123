//! The `IidFile` handle: memory-mapped reading, lazy materialization,
//! queries, and the in-memory entry set.
//!
//! Opening a file maps it read-only and decodes the header, lookup
//! table, metadata, and group directory eagerly. IID and segment records
//! stay on disk until a `fetch` (or a query that is allowed to load)
//! materializes them, copying only the slices for the requested keys.
//! The map is held for the handle's lifetime and released on drop.

use crate::codec::{self, Bufloc};
use crate::config::{Fetch, Filter, OpenOptions, RegionTest};
use crate::error::{Error, Result};
use crate::file::groups::GroupTable;
use crate::file::header::Header;
use crate::file::lut::LookupTable;
use crate::file::meta::Metadata;
use crate::file::writer;
use crate::file::{FORMAT_VERSION, RFORMAT_IMAGE};
use crate::iid::Iid;
use crate::segment::{BBox, Segment};
use memmap2::Mmap;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::Path;

/// One entry: a key, the recorded block locations, and whichever halves
/// have been materialized.
#[derive(Debug, Clone)]
pub struct Entry {
    pub(crate) key: u32,
    pub(crate) iid_loc: Bufloc,
    pub(crate) seg_loc: Bufloc,
    pub(crate) iid: Option<Iid>,
    pub(crate) seg: Option<Segment>,
}

impl Entry {
    /// Creates a fully materialized entry with no backing file.
    pub(crate) fn in_memory(key: u32, iid: Iid, seg: Segment) -> Self {
        Self {
            key,
            iid_loc: Bufloc::default(),
            seg_loc: Bufloc::default(),
            iid: Some(iid),
            seg: Some(seg),
        }
    }

    /// The entry's dense lookup-table key.
    pub fn key(&self) -> u32 {
        self.key
    }

    /// The IID, if materialized.
    pub fn iid(&self) -> Option<&Iid> {
        self.iid.as_ref()
    }

    /// The segment, if materialized.
    pub fn seg(&self) -> Option<&Segment> {
        self.seg.as_ref()
    }

    /// Whether both the IID and the segment are materialized.
    pub fn is_fully_loaded(&self) -> bool {
        self.iid.is_some() && self.seg.is_some()
    }
}

/// A segmentation file: either an in-memory entry set under construction
/// or a memory-mapped on-disk file with entries materialized on demand.
///
/// The handle is single-threaded; exposing one to multiple threads
/// requires external serialization because queries may mutate the
/// per-key loaded state.
#[derive(Debug)]
pub struct IidFile {
    mmap: Option<Mmap>,
    header: Header,
    meta: Metadata,
    groups: GroupTable,
    entries: Vec<Entry>,
    iid_index: HashMap<Iid, u32>,
    options: OpenOptions,
}

impl IidFile {
    /// Creates an empty in-memory file.
    pub fn new() -> Self {
        Self {
            mmap: None,
            header: Header {
                version: FORMAT_VERSION,
                rformat: RFORMAT_IMAGE,
                lut: Bufloc::default(),
                iids: Bufloc::default(),
                meta: Bufloc::default(),
                groups: Bufloc::default(),
                segs: Bufloc::default(),
            },
            meta: Metadata::new(),
            groups: GroupTable::new(),
            entries: Vec::new(),
            iid_index: HashMap::new(),
            options: OpenOptions::default(),
        }
    }

    /// Opens a file with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, OpenOptions::default())
    }

    /// Opens a file, validating the header and eagerly decoding the
    /// lookup table, metadata, and group directory. IIDs and segments
    /// stay unresolved.
    pub fn open_with<P: AsRef<Path>>(path: P, options: OpenOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mmap = unsafe { Mmap::map(&file)? };

        let data: &[u8] = &mmap;
        let header = Header::decode(data)?;
        header.validate(data.len() as u64)?;

        let lut = LookupTable::decode(header.lut.slice(data)?)?;
        let meta = Metadata::decode(header.meta.slice(data)?)?;
        let groups = GroupTable::decode(header.groups.slice(data)?, header.groups.offset)?;

        let entries: Vec<Entry> = lut
            .records()
            .iter()
            .map(|r| Entry { key: r.key, iid_loc: r.iid, seg_loc: r.seg, iid: None, seg: None })
            .collect();

        log::debug!(
            "opened iid file {:?}: {} entries, {} groups",
            path.as_ref(),
            entries.len(),
            groups.len()
        );

        Ok(Self {
            mmap: Some(mmap),
            header,
            meta,
            groups,
            entries,
            iid_index: HashMap::new(),
            options,
        })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the file holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry for a key, if the key exists.
    pub fn entry(&self, key: u32) -> Option<&Entry> {
        self.entries.get(key as usize)
    }

    /// All entries, in key order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// The metadata document.
    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    /// Mutable access to the metadata document.
    pub fn meta_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }

    /// The advisory resource-format discriminator from the header.
    pub fn rformat(&self) -> u32 {
        self.header.rformat
    }

    /// All group names, sorted.
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.names()
    }

    /// The key set of a named group, materializing it on first access.
    pub fn group_keys(&mut self, name: &str) -> Result<&BTreeSet<u32>> {
        let data = self.mmap.as_deref();
        self.groups.keys(name, data)
    }

    /// Whether every entry has both halves materialized. Saving a
    /// partially loaded file drops the unloaded entries, so `save`
    /// checks this flag.
    pub fn is_fully_loaded(&self) -> bool {
        self.entries.iter().all(Entry::is_fully_loaded)
    }

    /// Adds an entry, assigning the next dense key.
    ///
    /// Fails with `DuplicateIid` if the `(domain, address)` pair is
    /// already present anywhere in the file; for a disk-backed handle
    /// this materializes the IID block first so the check is global.
    pub fn add(&mut self, iid: Iid, seg: Segment, group: Option<&str>) -> Result<u32> {
        for key in 0..self.entries.len() as u32 {
            self.load_iid(key)?;
        }
        if self.iid_index.contains_key(&iid) {
            return Err(Error::DuplicateIid(format!(
                "domain {:?}, address {:?}",
                String::from_utf8_lossy(iid.domain()),
                String::from_utf8_lossy(iid.address())
            )));
        }

        let key = codec::checked_u32(self.entries.len(), "entry count")?;
        self.iid_index.insert(iid.clone(), key);
        self.entries.push(Entry::in_memory(key, iid, seg));
        if let Some(name) = group {
            self.add_to_group(name, &[key])?;
        }
        Ok(key)
    }

    /// Adds keys to a named group, creating the group if needed. Every
    /// key must refer to an existing entry.
    pub fn add_to_group(&mut self, name: &str, keys: &[u32]) -> Result<()> {
        for &key in keys {
            if key as usize >= self.entries.len() {
                return Err(Error::not_found(format!("key {}", key)));
            }
        }
        // Extending a group read from disk merges with its stored keys.
        if self.groups.contains(name) {
            let data = self.mmap.as_deref();
            self.groups.keys(name, data)?;
        }
        self.groups.insert(name, keys.iter().copied());
        Ok(())
    }

    /// Materializes entries per the selector and returns them.
    ///
    /// Selection is additive: already-loaded halves stay loaded, and
    /// keys outside the selection are untouched.
    pub fn fetch(&mut self, selector: &Fetch) -> Result<Vec<&Entry>> {
        let (keys, want_iids, want_segs) = self.resolve_selector(selector)?;
        for &key in &keys {
            if want_iids {
                self.load_iid(key)?;
            }
            if want_segs {
                self.load_seg(key)?;
            }
        }
        Ok(keys.into_iter().map(|k| &self.entries[k as usize]).collect())
    }

    /// Returns entries whose IID address matches any of `addresses`,
    /// optionally constrained to the given domains and groups.
    ///
    /// IIDs are materialized for the candidate set first.
    pub fn find(
        &mut self,
        addresses: &[&[u8]],
        domains: Option<&[&[u8]]>,
        groups: Option<&[&str]>,
    ) -> Result<Vec<&Entry>> {
        let keys: Vec<u32> = match groups {
            Some(names) => {
                let mut set = BTreeSet::new();
                for name in names {
                    set.extend(self.checked_group_keys(name)?);
                }
                set.into_iter().collect()
            }
            None => (0..self.entries.len() as u32).collect(),
        };

        for &key in &keys {
            self.load_iid(key)?;
        }

        Ok(keys
            .into_iter()
            .map(|k| &self.entries[k as usize])
            .filter(|entry| {
                entry.iid.as_ref().map_or(false, |iid| {
                    addresses.iter().any(|a| *a == iid.address())
                        && domains.map_or(true, |ds| ds.iter().any(|d| *d == iid.domain()))
                })
            })
            .collect())
    }

    /// Returns entries whose segment covers pixel `(x, y)` (column,
    /// row).
    ///
    /// Every segment must be materialized for the answer to be complete;
    /// missing segments are loaded when the handle was opened with
    /// `auto_fill`, and fail with `NotLoaded` otherwise.
    pub fn at(&mut self, x: u16, y: u16) -> Result<Vec<&Entry>> {
        self.require_segments(self.options.auto_fill)?;
        let (row, col) = (y, x);
        Ok(self
            .entries
            .iter()
            .filter(|e| e.seg.as_ref().map_or(false, |s| s.contains(row, col)))
            .collect())
    }

    /// Returns entries whose segment intersects `qbox`.
    ///
    /// With `only_loaded` no I/O happens and unresolved segments are
    /// silently excluded; otherwise missing segments are materialized.
    pub fn region(
        &mut self,
        qbox: &BBox,
        test: RegionTest,
        only_loaded: bool,
    ) -> Result<Vec<&Entry>> {
        if !only_loaded {
            self.require_segments(true)?;
        }
        let exact = test == RegionTest::Exact;
        Ok(self
            .entries
            .iter()
            .filter(|e| e.seg.as_ref().map_or(false, |s| s.intersects(qbox, exact)))
            .collect())
    }

    /// Applies an in-memory predicate to the loaded entries. Entries
    /// whose tested attribute is unresolved are excluded, never loaded.
    pub fn filter(&mut self, filter: &Filter) -> Result<Vec<&Entry>> {
        let group_keys: Option<BTreeSet<u32>> = if filter.groups.is_empty() {
            None
        } else {
            let mut set = BTreeSet::new();
            for name in &filter.groups {
                set.extend(self.checked_group_keys(name)?);
            }
            Some(set)
        };

        Ok(self
            .entries
            .iter()
            .filter(|entry| {
                if let Some(keys) = &group_keys {
                    if !keys.contains(&entry.key) {
                        return false;
                    }
                }
                if !filter.domains.is_empty() {
                    match &entry.iid {
                        Some(iid) => {
                            if !filter.domains.iter().any(|d| d.as_slice() == iid.domain()) {
                                return false;
                            }
                        }
                        None => return false,
                    }
                }
                if filter.min_area.is_some() || filter.max_area.is_some() {
                    match &entry.seg {
                        Some(seg) => {
                            let area = seg.area();
                            if filter.min_area.map_or(false, |min| area <= min) {
                                return false;
                            }
                            if filter.max_area.map_or(false, |max| area >= max) {
                                return false;
                            }
                        }
                        None => return false,
                    }
                }
                true
            })
            .collect())
    }

    /// Computes the pairwise overlap graph over entries with
    /// materialized segments: an edge `(a, b)` with `a < b` exists iff
    /// the two segments share at least one set pixel. Pairs are pruned
    /// by envelope box before any mask comparison.
    pub fn compute_overlap(&self) -> Vec<(u32, u32)> {
        let loaded: Vec<(u32, &Segment)> = self
            .entries
            .iter()
            .filter_map(|e| e.seg.as_ref().map(|s| (e.key, s)))
            .collect();

        let mut edges = Vec::new();
        for i in 0..loaded.len() {
            for j in i + 1..loaded.len() {
                if loaded[i].1.overlaps(loaded[j].1) {
                    edges.push((loaded[i].0, loaded[j].0));
                }
            }
        }
        edges
    }

    /// Serializes the entry set to `path`.
    ///
    /// Refuses a partially loaded entry set: saving one would silently
    /// drop the unloaded entries. Use [`IidFile::save_partial`] to opt
    /// into that. On success the handle re-points at the written file.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if !self.is_fully_loaded() {
            return Err(Error::not_loaded(
                "entry set is partially loaded; fetch everything first or use save_partial",
            ));
        }
        self.save_inner(path.as_ref())
    }

    /// Serializes only the fully loaded entries to `path`, dropping the
    /// rest.
    ///
    /// Surviving entries are re-keyed densely in key order and group
    /// memberships are remapped; keys of dropped entries disappear from
    /// every group. This is the documented data-loss path for re-saving
    /// a partially loaded file.
    pub fn save_partial<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if self.is_fully_loaded() {
            return self.save_inner(path.as_ref());
        }

        // Group key arrays must come off the old map before it goes away.
        let data = self.mmap.as_deref();
        self.groups.materialize_all(data)?;

        let old_entries = std::mem::take(&mut self.entries);
        let total = old_entries.len();
        let mut remap: HashMap<u32, u32> = HashMap::new();
        for entry in old_entries {
            if entry.is_fully_loaded() {
                let mut survivor = entry;
                let new_key = self.entries.len() as u32;
                remap.insert(survivor.key, new_key);
                survivor.key = new_key;
                self.entries.push(survivor);
            }
        }
        log::warn!(
            "partial save drops {} of {} entries",
            total - self.entries.len(),
            total
        );

        self.groups.remap_keys(|k| remap.get(&k).copied());
        self.iid_index = self
            .entries
            .iter()
            .filter_map(|e| e.iid.clone().map(|iid| (iid, e.key)))
            .collect();

        self.save_inner(path.as_ref())
    }

    fn save_inner(&mut self, path: &Path) -> Result<()> {
        let data = self.mmap.as_deref();
        self.groups.materialize_all(data)?;

        let encoded = writer::encode_file(&self.entries, &self.meta, &self.groups)?;
        writer::write_file(path, &encoded.data)?;

        // Re-point the handle at the written file.
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        self.mmap = Some(mmap);
        self.header = encoded.header;
        for (entry, record) in self.entries.iter_mut().zip(&encoded.lut) {
            entry.iid_loc = record.iid;
            entry.seg_loc = record.seg;
        }
        Ok(())
    }

    /// Group keys validated against the entry range.
    fn checked_group_keys(&mut self, name: &str) -> Result<BTreeSet<u32>> {
        let len = self.entries.len();
        let data = self.mmap.as_deref();
        let keys = self.groups.keys(name, data)?;
        if let Some(&bad) = keys.iter().find(|&&k| k as usize >= len) {
            return Err(Error::corrupt(format!(
                "group '{}' references key {} but the file holds {} entries",
                name, bad, len
            )));
        }
        Ok(keys.clone())
    }

    fn resolve_selector(&mut self, selector: &Fetch) -> Result<(Vec<u32>, bool, bool)> {
        if selector.everything {
            return Ok(((0..self.entries.len() as u32).collect(), true, true));
        }

        let mut keys = BTreeSet::new();
        for name in &selector.groups {
            keys.extend(self.checked_group_keys(name)?);
        }
        if selector.all_keys {
            keys.extend(0..self.entries.len() as u32);
        }
        for &key in &selector.keys {
            if key as usize >= self.entries.len() {
                return Err(Error::not_found(format!("key {}", key)));
            }
            keys.insert(key);
        }

        Ok((
            keys.into_iter().collect(),
            selector.iids.unwrap_or(true),
            selector.segs.unwrap_or(true),
        ))
    }

    /// Ensures every segment is materialized, loading or failing with
    /// `NotLoaded` depending on `allow_load`.
    fn require_segments(&mut self, allow_load: bool) -> Result<()> {
        for key in 0..self.entries.len() as u32 {
            if self.entries[key as usize].seg.is_none() {
                if allow_load {
                    self.load_seg(key)?;
                } else {
                    return Err(Error::not_loaded(format!(
                        "segment for key {} is not materialized; fetch segments or open with auto_fill",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    fn load_iid(&mut self, key: u32) -> Result<()> {
        let idx = key as usize;
        if self.entries[idx].iid.is_some() {
            return Ok(());
        }

        let data = self
            .mmap
            .as_deref()
            .ok_or_else(|| Error::not_loaded(format!("entry {} has no backing file", key)))?;
        let block = self.header.iids.slice(data)?;
        // IID locations are relative to the block start.
        let record = self.entries[idx].iid_loc.slice(block)?;
        let (stored_key, iid) = Iid::decode_record(record)?;
        if stored_key != key {
            return Err(Error::corrupt(format!(
                "IID record for key {} carries key {}",
                key, stored_key
            )));
        }

        self.iid_index.insert(iid.clone(), key);
        self.entries[idx].iid = Some(iid);
        Ok(())
    }

    fn load_seg(&mut self, key: u32) -> Result<()> {
        let idx = key as usize;
        if self.entries[idx].seg.is_some() {
            return Ok(());
        }

        let data = self
            .mmap
            .as_deref()
            .ok_or_else(|| Error::not_loaded(format!("entry {} has no backing file", key)))?;
        // Segment locations are absolute.
        let record = self.entries[idx].seg_loc.slice(data)?;
        let (stored_key, seg) = Segment::decode(record, self.options.strict)?;
        if stored_key != key {
            return Err(Error::corrupt(format!(
                "segment record for key {} carries key {}",
                key, stored_key
            )));
        }

        self.entries[idx].seg = Some(seg);
        Ok(())
    }
}

impl Default for IidFile {
    fn default() -> Self {
        Self::new()
    }
}
