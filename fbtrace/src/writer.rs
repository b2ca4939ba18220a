// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Log writer (C2): appends chunks to a single output file, tracking
//! the logical file position itself rather than querying the OS for
//! it on every call (the writer is the file's only writer).
//!
//! See `SPEC_FULL.md` §4.2 for the full algorithm. The one behavior
//! this implementation adds on top of the distilled original: on a
//! failed body write, it truncates the file back to the last
//! known-good logical position before returning the error, so a
//! reader never sees a truncated chunk body followed by the next
//! chunk's header (`SPEC_FULL.md` §9, "Partial-write corruption").

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::sync::Arc;

use fbtrace_domain::format::chunk::pad_header;
use fbtrace_domain::format::{ChunkHeader, FileHeader};
use fbtrace_domain::Statistics;

/// Appends framed chunks to a log file, inserting padding so that no
/// chunk straddles a `SEGMENT_SIZE` boundary.
pub struct LogWriter {
    file: File,
    position: u64,
    stats: Arc<Statistics>,
}

impl LogWriter {
    pub fn new(file: File, stats: Arc<Statistics>) -> Self {
        Self {
            file,
            position: 0,
            stats,
        }
    }

    /// Writes the 32-byte file header at offset 0. Only valid to call
    /// once, immediately after construction.
    pub fn write_file_header(&mut self, header: &FileHeader) -> io::Result<()> {
        debug_assert_eq!(self.position, 0);
        let bytes = header.to_bytes();
        self.file.write_all(&bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Debug-only consistency check: the logical position this writer
    /// believes it is at must equal the file's actual stream position
    /// whenever the sink is quiescent.
    #[cfg(debug_assertions)]
    pub fn assert_position_consistent(&mut self) {
        let actual = self.file.stream_position().expect("stream_position");
        debug_assert_eq!(
            actual, self.position,
            "writer's logical position diverged from the file's actual position"
        );
    }

    /// Appends one chunk. If `body` is given, `header.size` bytes are
    /// written as `header.size - body.len()` header-region bytes
    /// followed by `body.len()` body bytes — two writes, so large
    /// trace-buffer payloads never need to be copied into a combined
    /// buffer first.
    pub fn flush_chunk(&mut self, header: ChunkHeader, body: Option<&[u8]>) -> io::Result<()> {
        const CHUNK_ALIGNMENT: u64 = fbtrace_domain::constants::CHUNK_ALIGNMENT as u64;
        const SEGMENT_SIZE: u64 = fbtrace_domain::constants::SEGMENT_SIZE;

        debug_assert_eq!(self.position % CHUNK_ALIGNMENT, 0);
        debug_assert!(header.size as usize > ChunkHeader::LEN);
        if let Some(body) = body {
            debug_assert!(body.len() <= header.size as usize - ChunkHeader::LEN);
        }

        let known_good_position = self.position;

        let remaining = SEGMENT_SIZE - (self.position % SEGMENT_SIZE);
        if remaining < header.size as u64 {
            let pad = pad_header(remaining as u32);
            let pad_result = self
                .write_exact_tracked(&pad.to_bytes())
                .and_then(|_| self.write_padding_region(remaining as usize - ChunkHeader::LEN));
            if let Err(err) = pad_result {
                self.on_flush_failure(known_good_position);
                return Err(err);
            }
            debug_assert_eq!(self.position % SEGMENT_SIZE, 0);
        }

        debug_assert_eq!(self.position % CHUNK_ALIGNMENT, 0);

        let header_bytes = header.to_bytes();
        let result = match body {
            None => self
                .write_exact_tracked(&header_bytes)
                .and_then(|_| self.write_padding_region(header.size as usize - ChunkHeader::LEN)),
            Some(body) => {
                let header_region_len = header.size as usize - body.len();
                self.write_exact_tracked(&header_bytes[..header_bytes.len().min(header_region_len)])
                    .and_then(|_| self.write_padding_region(header_region_len - header_bytes.len()))
                    .and_then(|_| self.write_exact_tracked(body))
            }
        };

        if let Err(err) = result {
            self.on_flush_failure(known_good_position);
            return Err(err);
        }

        Ok(())
    }

    /// Writes `extra` zero bytes and tracks them in `self.position`.
    /// Used to advance the logical (and actual) file position by a
    /// chunk's full declared `size` when the caller supplies a body
    /// shorter than `size - ChunkHeader::LEN` (pad chunks, and any
    /// `None`-body chunk whose header doesn't fill its own size) —
    /// the written bytes and the tracked position must never diverge.
    fn write_padding_region(&mut self, extra: usize) -> io::Result<()> {
        if extra == 0 {
            return Ok(());
        }
        let zeros = vec![0u8; extra];
        self.write_exact_tracked(&zeros)
    }

    fn write_exact_tracked(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    fn on_flush_failure(&mut self, known_good_position: u64) {
        self.stats.record_failed_chunk_flush();
        tracing::debug!(known_good_position, "chunk flush failed, truncating to last known-good position");
        // Best-effort: if the truncate itself fails there is nothing
        // more we can do to protect the file, but we still must not
        // advance `self.position` past what is actually on disk.
        let _ = self.file.set_len(known_good_position);
        let _ = self.file.seek(SeekFrom::Start(known_good_position));
        self.position = known_good_position;
    }

    pub fn sync_all(&self) -> io::Result<()> {
        self.file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbtrace_domain::format::{image_info_chunk_len, ChunkType};
    use tempfile::tempdir;

    fn open(dir: &tempfile::TempDir, name: &str) -> File {
        File::options()
            .read(true)
            .write(true)
            .create_new(true)
            .open(dir.path().join(name))
            .unwrap()
    }

    #[test]
    fn header_then_no_events_leaves_header_only() {
        let dir = tempdir().unwrap();
        let file = open(&dir, "log.bin");
        let stats = Arc::new(Statistics::new());
        let mut writer = LogWriter::new(file, stats);
        writer.write_file_header(&FileHeader::current()).unwrap();
        assert_eq!(writer.position(), 32);
    }

    #[test]
    fn chunk_exactly_filling_segment_needs_no_pad() {
        let dir = tempdir().unwrap();
        let file = open(&dir, "log.bin");
        let stats = Arc::new(Statistics::new());
        let mut writer = LogWriter::new(file, Arc::clone(&stats));
        writer.write_file_header(&FileHeader::current()).unwrap();

        // Fabricate a position near a segment boundary by writing a
        // pad-sized chunk first so the remaining math is exercisable
        // without allocating a full 64KiB buffer in the test.
        let remaining = fbtrace_domain::constants::SEGMENT_SIZE - 32;
        let header = ChunkHeader::new(ChunkType::ImageInfo, remaining as u32);
        let _ = image_info_chunk_len(0); // keep import used
        writer.flush_chunk(header, None).unwrap();
        assert_eq!(writer.position() % fbtrace_domain::constants::SEGMENT_SIZE, 0);
        assert_eq!(writer.position(), fbtrace_domain::constants::SEGMENT_SIZE);
    }

    #[test]
    fn chunk_exceeding_remaining_gets_padded_to_boundary() {
        let dir = tempdir().unwrap();
        let file = open(&dir, "log.bin");
        let stats = Arc::new(Statistics::new());
        let mut writer = LogWriter::new(file, Arc::clone(&stats));
        writer.write_file_header(&FileHeader::current()).unwrap();

        // Consume bytes until only 32 remain in the segment (65536 -
        // 32 = 65504 used, matching the spec's literal scenario 4).
        let filler = fbtrace_domain::constants::SEGMENT_SIZE - 32 - 32;
        writer
            .flush_chunk(ChunkHeader::new(ChunkType::ImageInfo, filler as u32), None)
            .unwrap();
        assert_eq!(writer.position(), fbtrace_domain::constants::SEGMENT_SIZE - 32);

        // Now submit a 64-byte chunk; only 32 bytes remain, so a
        // 32-byte pad chunk must be emitted first.
        writer
            .flush_chunk(ChunkHeader::new(ChunkType::ImageInfo, 64), None)
            .unwrap();
        assert_eq!(writer.position(), fbtrace_domain::constants::SEGMENT_SIZE + 64);
    }

    #[test]
    fn failed_write_does_not_advance_position() {
        let dir = tempdir().unwrap();
        let file = open(&dir, "log.bin");
        let stats = Arc::new(Statistics::new());
        let mut writer = LogWriter::new(file, Arc::clone(&stats));
        writer.write_file_header(&FileHeader::current()).unwrap();
        let before = writer.position();

        // Simulate a failed flush by invoking the failure path
        // directly: the position must roll back to the pre-chunk
        // value and the failure counter must increment exactly once.
        writer.on_flush_failure(before);
        assert_eq!(writer.position(), before);
        assert_eq!(stats.snapshot().failed_chunk_flushes, 1);
    }
}
