use std::error::Error;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};

use crate::types::Chunk;
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

// ---------------------------------------------------------------------------
// Rechunker
// ---------------------------------------------------------------------------

/// Repacks a byte stream with arbitrary fragment sizes into fixed-size
/// [`Chunk`]s.
///
/// Every chunk is exactly `chunk_size` bytes except the last one, which is
/// emitted only after the source reports end-of-stream and may be shorter.
/// A chunk is flagged `is_last` only when the stream is exhausted and
/// nothing remains buffered, so a source whose length is an exact multiple
/// of `chunk_size` still gets its final full-sized chunk flagged.
///
/// The internal buffer never grows past `2 * chunk_size`: the part of an
/// oversized fragment that does not fit yet is kept as a zero-copy view of
/// the fragment and admitted as chunks are emitted.
pub struct Rechunker<S> {
    stream: S,
    chunk_size: usize,
    buf: BytesMut,
    pending: Bytes,
    offset: u64,
    exhausted: bool,
    finished: bool,
}

impl<S, E> Rechunker<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<Box<dyn Error + Send + Sync>>,
{
    /// Wraps `stream` for chunked reading.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn new(stream: S, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            stream,
            chunk_size,
            buf: BytesMut::new(),
            pending: Bytes::new(),
            offset: 0,
            exhausted: false,
            finished: false,
        }
    }

    /// Reads the next chunk. Returns `None` once the last chunk was emitted.
    ///
    /// An empty source yields a single empty chunk flagged `is_last`.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            self.admit_pending();

            // More than one chunk buffered: this one cannot be the last.
            if self.buf.len() > self.chunk_size {
                return Ok(Some(self.emit(self.chunk_size, false)));
            }

            if self.exhausted {
                self.finished = true;
                let len = self.buf.len();
                return Ok(Some(self.emit(len, true)));
            }

            match self.stream.next().await {
                Some(Ok(fragment)) => self.pending = fragment,
                Some(Err(e)) => return Err(TransferError::Source(e.into())),
                None => self.exhausted = true,
            }
        }
    }

    /// Target chunk size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Bytes currently held in the internal buffer.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Byte offset of the next chunk to be emitted.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns `true` once the last chunk was emitted.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn admit_pending(&mut self) {
        let room = (2 * self.chunk_size).saturating_sub(self.buf.len());
        let take = room.min(self.pending.len());
        if take > 0 {
            let part = self.pending.split_to(take);
            self.buf.extend_from_slice(&part);
        }
    }

    fn emit(&mut self, len: usize, is_last: bool) -> Chunk {
        let data = self.buf.split_to(len).freeze();
        let chunk = Chunk {
            offset: self.offset,
            data,
            is_last,
        };
        self.offset += len as u64;
        chunk
    }
}
