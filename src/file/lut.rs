//! The lookup table: the one eagerly-parsed index block.
//!
//! A packed array of fixed 20-byte records with no count prefix; the
//! record count is `header.lut.length / 20`. Records are written in
//! creation order, so the record at position `k` carries key `k`.
//!
//! Record format:
//! ```text
//! [key: u32]
//! [iid bufloc: 8 B]    // relative to the IID block start
//! [seg bufloc: 8 B]    // absolute file offset
//! ```

use crate::codec::Bufloc;
use crate::error::{Error, Result};
use crate::file::LUT_RECORD_SIZE;
use bytes::{BufMut, BytesMut};

/// One lookup-table record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LutRecord {
    /// The entry key; equals the record's position.
    pub key: u32,
    /// Location of the entry's IID record, relative to the IID block
    /// start.
    pub iid: Bufloc,
    /// Location of the entry's segment record, absolute.
    pub seg: Bufloc,
}

impl LutRecord {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.key);
        self.iid.encode(buf);
        self.seg.encode(buf);
    }
}

/// The decoded lookup table.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    records: Vec<LutRecord>,
}

impl LookupTable {
    /// Decodes the packed record array spanning `data`.
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        if data.len() % LUT_RECORD_SIZE != 0 {
            return Err(Error::corrupt(format!(
                "lookup table length {} is not a multiple of {}",
                data.len(),
                LUT_RECORD_SIZE
            )));
        }

        let mut records = Vec::with_capacity(data.len() / LUT_RECORD_SIZE);
        for (position, chunk) in data.chunks_exact(LUT_RECORD_SIZE).enumerate() {
            let input = &mut &chunk[..];
            let key = crate::codec::get_u32(input)?;
            if key as usize != position {
                return Err(Error::corrupt(format!(
                    "lookup table record {} carries key {}",
                    position, key
                )));
            }
            records.push(LutRecord {
                key,
                iid: Bufloc::decode(input)?,
                seg: Bufloc::decode(input)?,
            });
        }
        Ok(Self { records })
    }

    /// Encodes all records in key order.
    pub(crate) fn encode(records: &[LutRecord], buf: &mut BytesMut) {
        for record in records {
            record.encode(buf);
        }
    }

    /// The records, in key order.
    pub fn records(&self) -> &[LutRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<LutRecord> {
        vec![
            LutRecord { key: 0, iid: Bufloc::new(0, 16), seg: Bufloc::new(200, 33) },
            LutRecord { key: 1, iid: Bufloc::new(16, 20), seg: Bufloc::new(233, 45) },
        ]
    }

    #[test]
    fn test_lut_roundtrip() {
        let records = sample_records();
        let mut buf = BytesMut::new();
        LookupTable::encode(&records, &mut buf);
        assert_eq!(buf.len(), 2 * LUT_RECORD_SIZE);

        let table = LookupTable::decode(&buf).unwrap();
        assert_eq!(table.records(), &records[..]);
    }

    #[test]
    fn test_lut_empty() {
        let table = LookupTable::decode(&[]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_lut_rejects_ragged_length() {
        let err = LookupTable::decode(&[0u8; 21]).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn test_lut_rejects_out_of_order_keys() {
        let records = vec![LutRecord {
            key: 5,
            iid: Bufloc::default(),
            seg: Bufloc::default(),
        }];
        let mut buf = BytesMut::new();
        LookupTable::encode(&records, &mut buf);

        assert!(matches!(LookupTable::decode(&buf), Err(Error::Corrupt(_))));
    }
}
