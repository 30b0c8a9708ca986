use flate2::{Decompress, FlushDecompress};

pub(crate) const MSZIP_SIGNATURE: [u8; 2] = *b"CK";
pub(crate) const DEFLATE_MAX_DICT_LEN: usize = 0x8000;

/// The sliding-window dictionary carried from one MSZIP block to the next
/// block of the same folder.  Holds at most the last 32 KiB of output.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct History {
    bytes: Vec<u8>,
}

impl History {
    /// An empty history, as used for the first block of a folder.
    pub fn new() -> History {
        History { bytes: Vec::new() }
    }

    /// Returns the bytes currently in the window.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the history as it stands after `output` has been produced.
    fn advance(mut self, output: &[u8]) -> History {
        if output.len() >= DEFLATE_MAX_DICT_LEN {
            let start = output.len() - DEFLATE_MAX_DICT_LEN;
            self.bytes.clear();
            self.bytes.extend_from_slice(&output[start..]);
        } else {
            let total = self.bytes.len() + output.len();
            if total > DEFLATE_MAX_DICT_LEN {
                self.bytes.drain(..(total - DEFLATE_MAX_DICT_LEN));
            }
            self.bytes.extend_from_slice(output);
        }
        self
    }
}

/// Why a single MSZIP block could not be decoded.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum BlockError {
    BadSignature,
    Inflate(String),
    WrongSize { expected: usize, actual: usize },
}

/// Decodes one MSZIP block, seeded with `history`.  On success returns the
/// block's uncompressed bytes together with the history for the next block.
pub(crate) fn decompress_block(
    history: History,
    data: &[u8],
    uncompressed_size: usize,
) -> Result<(Vec<u8>, History), BlockError> {
    if data.len() < MSZIP_SIGNATURE.len()
        || data[..MSZIP_SIGNATURE.len()] != MSZIP_SIGNATURE
    {
        return Err(BlockError::BadSignature);
    }
    let data = &data[MSZIP_SIGNATURE.len()..];
    let mut decompressor = Decompress::new(false);
    if !history.is_empty() {
        prime_window(&mut decompressor, history.as_bytes())?;
    }
    // The spare byte catches streams longer than declared.
    let mut out = Vec::<u8>::with_capacity(uncompressed_size + 1);
    decompressor
        .decompress_vec(data, &mut out, FlushDecompress::Finish)
        .map_err(|error| BlockError::Inflate(error.to_string()))?;
    if out.len() != uncompressed_size {
        return Err(BlockError::WrongSize {
            expected: uncompressed_size,
            actual: out.len(),
        });
    }
    let history = history.advance(&out);
    Ok((out, history))
}

/// Loads `dictionary` into the decoder's window by feeding it through as a
/// stored deflate block and discarding the output.
fn prime_window(
    decompressor: &mut Decompress,
    dictionary: &[u8],
) -> Result<(), BlockError> {
    debug_assert!(dictionary.len() <= DEFLATE_MAX_DICT_LEN);
    let length = dictionary.len() as u16;
    let mut chunk = Vec::<u8>::with_capacity(dictionary.len() + 5);
    chunk.push(0);
    chunk.extend_from_slice(&length.to_le_bytes());
    chunk.extend_from_slice(&(!length).to_le_bytes());
    chunk.extend_from_slice(dictionary);
    let mut sink = Vec::with_capacity(dictionary.len());
    decompressor
        .decompress_vec(&chunk, &mut sink, FlushDecompress::Sync)
        .map_err(|error| BlockError::Inflate(error.to_string()))?;
    if sink.len() != dictionary.len() {
        return Err(BlockError::Inflate(
            "could not load history window".to_string(),
        ));
    }
    Ok(())
}
