use bytes::Bytes;

/// A contiguous slice of the relayed file, uploaded in one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Byte offset of the first byte within the file.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Bytes,
    /// `true` if the source was exhausted with nothing left buffered.
    pub is_last: bool,
}

impl Chunk {
    /// Size of this chunk in bytes.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset one past the last byte of this chunk.
    pub fn end(&self) -> u64 {
        self.offset + self.len()
    }
}
