//! The groups block: named key sets for selective loading.
//!
//! Wire form:
//! ```text
//! [header_len: u32]
//! [header: header_len B]   // JSON: { name: { "offset": u32, "count": u32 } }
//! [payload]                // concatenated u32 key arrays
//! ```
//!
//! Header offsets are relative to the payload start (the byte after the
//! header), so a reader can enumerate names and sizes without touching
//! any key array, then materialize only the groups it needs.

use crate::codec::{self, Bufloc};
use crate::error::{Error, Result};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Location of one group's key array, as stored in the JSON header.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct GroupLoc {
    offset: u32,
    count: u32,
}

/// One named group: a resolved key set, a location to resolve it from,
/// or both.
#[derive(Debug, Clone, Default)]
struct Group {
    /// Absolute location of the key array, for groups read from a file.
    loc: Option<Bufloc>,
    /// The key set, once authored or materialized.
    keys: Option<BTreeSet<u32>>,
}

/// The group directory: names eagerly, key arrays lazily.
#[derive(Debug, Clone, Default)]
pub struct GroupTable {
    groups: BTreeMap<String, Group>,
}

impl GroupTable {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the block spanning `data`, which starts at absolute file
    /// offset `block_offset`. Key arrays are located, not read.
    pub(crate) fn decode(data: &[u8], block_offset: u32) -> Result<Self> {
        let input = &mut &data[..];
        let header_len = codec::get_u32(input)? as usize;
        let header = codec::get_raw(input, header_len)?;
        let locs: BTreeMap<String, GroupLoc> = serde_json::from_slice(header)
            .map_err(|e| Error::corrupt(format!("group header is not valid JSON: {}", e)))?;

        let payload_len = input.len() as u64;
        let payload_start = block_offset as u64 + 4 + header_len as u64;

        let mut groups = BTreeMap::new();
        for (name, loc) in locs {
            let length = loc.count as u64 * 4;
            if loc.offset as u64 + length > payload_len {
                return Err(Error::corrupt(format!(
                    "group '{}' key list {}..{} exceeds payload length {}",
                    name,
                    loc.offset,
                    loc.offset as u64 + length,
                    payload_len
                )));
            }
            let absolute = payload_start + loc.offset as u64;
            let absolute = u32::try_from(absolute).map_err(|_| {
                Error::corrupt(format!("group '{}' key list offset {} overflows u32", name, absolute))
            })?;
            groups.insert(
                name,
                Group { loc: Some(Bufloc::new(absolute, length as u32)), keys: None },
            );
        }
        Ok(Self { groups })
    }

    /// Encodes the block. Every group's key set must be materialized.
    pub(crate) fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let mut payload = BytesMut::new();
        let mut header = BTreeMap::new();

        for (name, group) in &self.groups {
            let keys = group.keys.as_ref().ok_or_else(|| {
                Error::not_loaded(format!("group '{}' keys are not materialized", name))
            })?;
            let offset = codec::checked_u32(payload.len(), "group payload offset")?;
            for &key in keys {
                payload.put_u32_le(key);
            }
            header.insert(
                name.as_str(),
                GroupLoc { offset, count: codec::checked_u32(keys.len(), "group size")? },
            );
        }

        let raw = serde_json::to_vec(&header)
            .map_err(|e| Error::invalid_argument(format!("group header not serializable: {}", e)))?;
        codec::put_bytes(buf, &raw)?;
        buf.put_slice(&payload);
        Ok(())
    }

    /// Whether a group with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// All group names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Adds keys to a group, creating it if needed.
    pub(crate) fn insert(&mut self, name: &str, keys: impl IntoIterator<Item = u32>) {
        let group = self.groups.entry(name.to_string()).or_insert_with(|| Group {
            loc: None,
            keys: Some(BTreeSet::new()),
        });
        // Extending a group read from disk requires its key set; callers
        // materialize it first.
        group.keys.get_or_insert_with(BTreeSet::new).extend(keys);
    }

    /// The key set of a named group, materializing it from `file` on
    /// first access.
    pub(crate) fn keys(&mut self, name: &str, file: Option<&[u8]>) -> Result<&BTreeSet<u32>> {
        let group = self
            .groups
            .get_mut(name)
            .ok_or_else(|| Error::not_found(format!("group '{}'", name)))?;

        if group.keys.is_none() {
            let loc = group
                .loc
                .ok_or_else(|| Error::corrupt(format!("group '{}' has no key list", name)))?;
            let data =
                file.ok_or_else(|| Error::not_loaded(format!("group '{}' has no backing file", name)))?;
            let raw = loc.slice(data)?;
            let set: BTreeSet<u32> = raw
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
                .collect();
            group.keys = Some(set);
        }

        match &group.keys {
            Some(keys) => Ok(keys),
            None => unreachable!("keys materialized above"),
        }
    }

    /// Materializes every group's key set from `file`.
    pub(crate) fn materialize_all(&mut self, file: Option<&[u8]>) -> Result<()> {
        let names: Vec<String> = self.groups.keys().cloned().collect();
        for name in names {
            self.keys(&name, file)?;
        }
        Ok(())
    }

    /// Rewrites every key set through `remap`, dropping keys it maps to
    /// `None`. Used when a partial save renumbers surviving entries.
    pub(crate) fn remap_keys(&mut self, remap: impl Fn(u32) -> Option<u32>) {
        for group in self.groups.values_mut() {
            if let Some(keys) = &group.keys {
                group.keys = Some(keys.iter().filter_map(|&k| remap(k)).collect());
            }
        }
    }
}
