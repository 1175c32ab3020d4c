//! Source stream decoding and chunked CSV reading

use std::fs::File;
use std::io::{BufReader, Cursor, ErrorKind, Read};
use std::path::Path;

use csv::{ByteRecord, StringRecord};
use flate2::read::MultiGzDecoder;

use super::config::Compression;
use super::error::IngestError;

/// Leading bytes of every gzip member
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open a local source file, decompressing it when needed
pub fn open_source(path: &Path, compression: Compression) -> Result<Box<dyn Read>, IngestError> {
    if !path.is_file() {
        return Err(IngestError::SourceNotFound(path.to_path_buf()));
    }

    let file = File::open(path).map_err(|e| IngestError::stream(0, e))?;
    tracing::debug!(path = %path.display(), compression = %compression.for_path(path), "Opening source");
    decode_stream(BufReader::new(file), compression.for_path(path))
}

/// Wrap a byte stream in a gzip decoder when it is marked (or sniffed) as compressed
pub fn decode_stream<R>(mut reader: R, compression: Compression) -> Result<Box<dyn Read>, IngestError>
where
    R: Read + 'static,
{
    match compression {
        Compression::Gzip => Ok(Box::new(MultiGzDecoder::new(reader))),
        Compression::None => Ok(Box::new(reader)),
        Compression::Auto => {
            let head = read_head(&mut reader)?;
            let gzip = head.starts_with(&GZIP_MAGIC);
            let stream = Cursor::new(head).chain(reader);
            if gzip {
                Ok(Box::new(MultiGzDecoder::new(stream)))
            } else {
                Ok(Box::new(stream))
            }
        }
    }
}

/// Read up to the length of the gzip magic, however the reader splits it
fn read_head<R: Read>(reader: &mut R) -> Result<Vec<u8>, IngestError> {
    let mut head = [0u8; GZIP_MAGIC.len()];
    let mut filled = 0;
    while filled < head.len() {
        match reader.read(&mut head[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(IngestError::stream(0, e)),
        }
    }
    Ok(head[..filled].to_vec())
}

/// A bounded window of raw rows
#[derive(Debug)]
pub struct Chunk {
    /// Zero-based chunk number
    pub index: usize,
    /// Raw rows in stream order. Fields are decoded per column by the normalizer.
    pub rows: Vec<ByteRecord>,
}

impl Chunk {
    /// Number of rows in the chunk
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the chunk has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads a CSV stream in chunks of at most `chunk_size` rows.
///
/// Only one chunk is held in memory at a time. Rows are kept as raw bytes, so a
/// cell that is not valid UTF-8 does not fail the stream. On a read failure the
/// rows already read come out as a final short chunk, followed by the error.
pub struct ChunkReader<R: Read> {
    reader: csv::Reader<R>,
    headers: StringRecord,
    chunk_size: usize,
    rows_read: u64,
    next_index: usize,
    pending_error: Option<IngestError>,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    /// Create a reader and consume the header row
    pub fn new(source: R, chunk_size: usize) -> Result<Self, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let headers = reader
            .headers()
            .map_err(|e| IngestError::stream(0, e))?
            .clone();

        Ok(Self {
            reader,
            headers,
            chunk_size: chunk_size.max(1),
            rows_read: 0,
            next_index: 0,
            pending_error: None,
            done: false,
        })
    }

    /// The header row of the source
    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    /// Data rows read so far
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Chunk, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending_error.take() {
            return Some(Err(err));
        }
        if self.done {
            return None;
        }

        let mut rows = Vec::with_capacity(self.chunk_size.min(4096));
        while rows.len() < self.chunk_size {
            let mut record = ByteRecord::new();
            match self.reader.read_byte_record(&mut record) {
                Ok(true) => {
                    self.rows_read += 1;
                    rows.push(record);
                }
                Ok(false) => {
                    self.done = true;
                    break;
                }
                Err(e) => {
                    self.done = true;
                    let err = IngestError::stream(self.rows_read, e);
                    if rows.is_empty() {
                        return Some(Err(err));
                    }
                    self.pending_error = Some(err);
                    break;
                }
            }
        }

        if rows.is_empty() {
            return None;
        }

        let chunk = Chunk {
            index: self.next_index,
            rows,
        };
        self.next_index += 1;
        Some(Ok(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression as GzLevel;
    use flate2::write::GzEncoder;
    use std::io::{Cursor, Write};

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), GzLevel::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    /// Hands out one byte per read call, then fails once the data runs out
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        fail_at_end: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos == self.data.len() {
                if self.fail_at_end {
                    return Err(std::io::Error::other("connection reset"));
                }
                return Ok(0);
            }
            if buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    fn trickle(data: Vec<u8>, fail_at_end: bool) -> Trickle {
        Trickle {
            data,
            pos: 0,
            fail_at_end,
        }
    }

    fn read_all(reader: Box<dyn Read>) -> String {
        let mut out = String::new();
        let mut reader = reader;
        reader.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_chunks_are_bounded() {
        let csv = "product_id,product_name\n1,a\n2,b\n3,c\n4,d\n5,e\n";
        let reader = ChunkReader::new(Cursor::new(csv), 2).unwrap();
        let sizes: Vec<usize> = reader.map(|c| c.unwrap().len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_chunk_indexes_and_row_count() {
        let csv = "product_id\n1\n2\n3\n";
        let mut reader = ChunkReader::new(Cursor::new(csv), 2).unwrap();
        assert_eq!(reader.headers().get(0), Some("product_id"));

        let first = reader.next().unwrap().unwrap();
        let second = reader.next().unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert!(reader.next().is_none());
        assert_eq!(reader.rows_read(), 3);
    }

    #[test]
    fn test_header_only_stream_yields_no_chunks() {
        let mut reader = ChunkReader::new(Cursor::new("product_id,product_name\n"), 10).unwrap();
        assert!(reader.next().is_none());

        let mut reader = ChunkReader::new(Cursor::new(""), 10).unwrap();
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_ragged_rows_do_not_fail_the_stream() {
        let csv = "product_id,product_name,price\n1,a\n2,b,3.5,extra\n";
        let chunk = ChunkReader::new(Cursor::new(csv), 10)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(chunk.len(), 2);
        assert_eq!(chunk.rows[0].get(2), None);
    }

    #[test]
    fn test_invalid_utf8_cell_does_not_fail_the_stream() {
        let csv = b"product_id,product_name,brand_name\n1,a,x\n2,b,\xff\n3,c,z\n".to_vec();
        let chunks: Vec<Chunk> = ChunkReader::new(Cursor::new(csv), 2)
            .unwrap()
            .map(|c| c.unwrap())
            .collect();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].rows[1].get(2), Some(&b"\xff"[..]));
        assert_eq!(chunks[1].len(), 1);
    }

    #[test]
    fn test_rows_before_a_read_failure_are_yielded() {
        let source = trickle(b"product_id\n1\n2\n3\n".to_vec(), true);
        let mut reader = ChunkReader::new(source, 2).unwrap();

        assert_eq!(reader.next().unwrap().unwrap().len(), 2);
        let partial = reader.next().unwrap().unwrap();
        assert_eq!(partial.len(), 1);
        assert_eq!(partial.index, 1);

        match reader.next() {
            Some(Err(IngestError::Stream { rows_read, .. })) => assert_eq!(rows_read, 3),
            other => panic!("expected a stream error, got {other:?}"),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_decode_stream_sniffs_gzip() {
        let compressed = gzip(b"product_id\n1\n");
        let reader = decode_stream(Cursor::new(compressed), Compression::Auto).unwrap();
        assert_eq!(read_all(reader), "product_id\n1\n");

        let reader = decode_stream(Cursor::new(b"product_id\n1\n".to_vec()), Compression::Auto)
            .unwrap();
        assert_eq!(read_all(reader), "product_id\n1\n");
    }

    #[test]
    fn test_sniffing_survives_short_reads() {
        let compressed = gzip(b"product_id\n1\n");
        let reader = decode_stream(trickle(compressed, false), Compression::Auto).unwrap();
        assert_eq!(read_all(reader), "product_id\n1\n");

        let reader = decode_stream(trickle(b"p".to_vec(), false), Compression::Auto).unwrap();
        assert_eq!(read_all(reader), "p");

        let reader = decode_stream(trickle(Vec::new(), false), Compression::Auto).unwrap();
        assert_eq!(read_all(reader), "");
    }

    #[test]
    fn test_plain_bytes_marked_gzip_surface_as_stream_error() {
        let plain = b"product_id,product_name\n1,a\n2,b\n".to_vec();

        let decoded = decode_stream(Cursor::new(plain), Compression::Gzip).unwrap();
        let result: Result<Vec<Chunk>, IngestError> = match ChunkReader::new(decoded, 10) {
            Ok(reader) => reader.collect(),
            Err(e) => Err(e),
        };
        assert!(matches!(result, Err(IngestError::Stream { .. })));
    }

    #[test]
    fn test_open_source_missing_file() {
        let result = open_source(Path::new("/definitely/not/here.csv.gz"), Compression::Auto);
        assert!(matches!(result, Err(IngestError::SourceNotFound(_))));
    }
}
