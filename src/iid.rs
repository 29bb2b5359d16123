//! Individual IDentifiers.
//!
//! An IID is a `(domain, address)` pair of opaque byte strings that
//! globally names one individual. Equality and hashing are byte-exact;
//! any interpretation of the bytes (integers, UTF-8, ...) is the
//! caller's business, as long as the original byte sequence is restored
//! before the IID is stored again.

use crate::codec;
use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// A globally unique `(domain, address)` identifier. Both fields may be
/// empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Iid {
    domain: Bytes,
    address: Bytes,
}

impl Iid {
    /// Creates an IID from domain and address bytes.
    pub fn new(domain: impl AsRef<[u8]>, address: impl AsRef<[u8]>) -> Self {
        Self {
            domain: Bytes::copy_from_slice(domain.as_ref()),
            address: Bytes::copy_from_slice(address.as_ref()),
        }
    }

    /// The domain bytes.
    pub fn domain(&self) -> &[u8] {
        &self.domain
    }

    /// The address bytes.
    pub fn address(&self) -> &[u8] {
        &self.address
    }

    /// Encodes one IID-block record.
    ///
    /// Format: `[key: u32][domain_len: u32][address_len: u32][domain][address]`.
    pub(crate) fn encode_record(&self, key: u32, buf: &mut BytesMut) -> Result<()> {
        buf.put_u32_le(key);
        buf.put_u32_le(codec::checked_u32(self.domain.len(), "IID domain length")?);
        buf.put_u32_le(codec::checked_u32(self.address.len(), "IID address length")?);
        buf.put_slice(&self.domain);
        buf.put_slice(&self.address);
        Ok(())
    }

    /// Decodes one IID-block record, returning the embedded key and the IID.
    ///
    /// The record must span `data` exactly; the bufloc that resolved it
    /// covers the whole record.
    pub(crate) fn decode_record(data: &[u8]) -> Result<(u32, Iid)> {
        let input = &mut &data[..];
        let key = codec::get_u32(input)?;
        let domain_len = codec::get_u32(input)? as usize;
        let address_len = codec::get_u32(input)? as usize;
        let domain = Bytes::copy_from_slice(codec::get_raw(input, domain_len)?);
        let address = Bytes::copy_from_slice(codec::get_raw(input, address_len)?);
        if !input.is_empty() {
            return Err(Error::corrupt(format!(
                "IID record for key {} has {} trailing bytes",
                key,
                input.len()
            )));
        }
        Ok((key, Iid { domain, address }))
    }

    /// Encoded record size in bytes.
    pub(crate) fn record_len(&self) -> usize {
        12 + self.domain.len() + self.address.len()
    }
}
