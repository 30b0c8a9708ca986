use crate::error::{Error, Result};

const CTYPE_MASK: u16 = 0x000f;
const CTYPE_NONE: u16 = 0;
const CTYPE_MSZIP: u16 = 1;

/// A scheme for compressing data within the cabinet.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum CompressionType {
    /// No compression.
    None,
    /// MSZIP compression.  MSZIP is described further in
    /// [MS-MCI](https://msdn.microsoft.com/en-us/library/cc483131.aspx).
    MsZip,
}

impl CompressionType {
    /// Decodes the compression field of folder `folder`.  Only the low four
    /// bits select the scheme; Quantum and LZX are rejected.
    pub(crate) fn from_bitfield(
        bits: u16,
        folder: usize,
    ) -> Result<CompressionType> {
        match bits & CTYPE_MASK {
            CTYPE_NONE => Ok(CompressionType::None),
            CTYPE_MSZIP => Ok(CompressionType::MsZip),
            _ => Err(Error::UnsupportedCompression { folder, bits }),
        }
    }
}
