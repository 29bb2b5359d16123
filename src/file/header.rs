//! File header: the fixed 48-byte block at offset 0.
//!
//! Format:
//! ```text
//! [version: u32]          // format version, must equal FORMAT_VERSION
//! [rformat: u32]          // advisory resource format, 0 = image
//! [bufloc_lut: 8 B]       // lookup table
//! [bufloc_iids: 8 B]      // IID block
//! [bufloc_meta: 8 B]      // metadata block
//! [bufloc_groups: 8 B]    // groups block
//! [bufloc_segs: 8 B]      // segment block
//! ```
//!
//! Every bufloc holds an absolute file offset. Block order on disk is not
//! guaranteed; readers go through these locations only.

use crate::codec::{self, Bufloc};
use crate::error::{Error, Result};
use crate::file::{FORMAT_VERSION, HEADER_SIZE, RFORMAT_IMAGE};
use bytes::{BufMut, BytesMut};

/// The decoded file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Format version; always [`FORMAT_VERSION`] for files this crate
    /// writes.
    pub version: u32,
    /// Advisory resource-format discriminator; `0` = image segmentation.
    /// Unknown values are surfaced, never rejected.
    pub rformat: u32,
    /// Location of the lookup table.
    pub lut: Bufloc,
    /// Location of the IID block.
    pub iids: Bufloc,
    /// Location of the metadata block.
    pub meta: Bufloc,
    /// Location of the groups block.
    pub groups: Bufloc,
    /// Location of the segment block.
    pub segs: Bufloc,
}

impl Header {
    /// Encodes the header into exactly [`HEADER_SIZE`] bytes.
    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.version);
        buf.put_u32_le(self.rformat);
        self.lut.encode(buf);
        self.iids.encode(buf);
        self.meta.encode(buf);
        self.groups.encode(buf);
        self.segs.encode(buf);
    }

    /// Decodes and version-checks a header.
    pub(crate) fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::truncated(format!(
                "header needs {} bytes, got {}",
                HEADER_SIZE,
                data.len()
            )));
        }

        let input = &mut &data[..HEADER_SIZE];
        let version = codec::get_u32(input)?;
        if version != FORMAT_VERSION {
            return Err(Error::BadVersion { found: version });
        }

        let rformat = codec::get_u32(input)?;
        if rformat != RFORMAT_IMAGE {
            log::warn!("unknown rformat {} in header; treating blocks as opaque image data", rformat);
        }

        Ok(Self {
            version,
            rformat,
            lut: Bufloc::decode(input)?,
            iids: Bufloc::decode(input)?,
            meta: Bufloc::decode(input)?,
            groups: Bufloc::decode(input)?,
            segs: Bufloc::decode(input)?,
        })
    }

    /// Checks that every block location fits inside a file of `file_len`
    /// bytes.
    pub(crate) fn validate(&self, file_len: u64) -> Result<()> {
        for (name, loc) in [
            ("lut", &self.lut),
            ("iids", &self.iids),
            ("meta", &self.meta),
            ("groups", &self.groups),
            ("segs", &self.segs),
        ] {
            if loc.end() > file_len {
                return Err(Error::truncated(format!(
                    "{} block {}..{} exceeds file length {}",
                    name,
                    loc.offset,
                    loc.end(),
                    file_len
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header {
            version: FORMAT_VERSION,
            rformat: RFORMAT_IMAGE,
            lut: Bufloc::new(48, 40),
            iids: Bufloc::new(88, 30),
            meta: Bufloc::new(118, 6),
            groups: Bufloc::new(124, 6),
            segs: Bufloc::new(130, 64),
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let header = sample();
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);

        let decoded = Header::decode(&buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_rejects_bad_version() {
        let mut header = sample();
        header.version = 2;
        let mut buf = BytesMut::new();
        header.encode(&mut buf);

        match Header::decode(&buf) {
            Err(Error::BadVersion { found }) => assert_eq!(found, 2),
            other => panic!("expected BadVersion, got {:?}", other),
        }
    }

    #[test]
    fn test_header_too_short() {
        assert!(matches!(
            Header::decode(&[0u8; 20]),
            Err(Error::Truncated(_))
        ));
    }

    #[test]
    fn test_validate_extents() {
        let header = sample();
        assert!(header.validate(194).is_ok());
        assert!(matches!(header.validate(100), Err(Error::Truncated(_))));
    }
}
