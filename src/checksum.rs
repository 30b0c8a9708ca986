/// Running CAB data-block checksum: the XOR of all little-endian 32-bit
/// words, with a trailing partial word folded in big-endian order.
pub(crate) struct Checksum {
    value: u32,
    tail: [u8; 3],
    tail_len: usize,
}

impl Checksum {
    pub fn new() -> Checksum {
        Checksum { value: 0, tail: [0; 3], tail_len: 0 }
    }

    pub fn update(&mut self, buf: &[u8]) {
        for &byte in buf {
            if self.tail_len == 3 {
                let word = [self.tail[0], self.tail[1], self.tail[2], byte];
                self.value ^= u32::from_le_bytes(word);
                self.tail_len = 0;
            } else {
                self.tail[self.tail_len] = byte;
                self.tail_len += 1;
            }
        }
    }

    pub fn value(&self) -> u32 {
        let tail = self.tail[..self.tail_len]
            .iter()
            .fold(0u32, |acc, &byte| (acc << 8) | byte as u32);
        self.value ^ tail
    }
}

/// Computes the value stored in a data block header: the checksum of the
/// block's reserve bytes and payload, mixed with the two size fields.
pub(crate) fn block_checksum(
    reserve_data: &[u8],
    payload: &[u8],
    compressed_size: u16,
    uncompressed_size: u16,
) -> u32 {
    let mut checksum = Checksum::new();
    checksum.update(reserve_data);
    checksum.update(payload);
    checksum.value()
        ^ ((compressed_size as u32) | ((uncompressed_size as u32) << 16))
}
