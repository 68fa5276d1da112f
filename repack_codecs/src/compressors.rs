//! Single-stream compressor stages. Every constructor resolves the
//! capability first, so a decode-only algorithm fails a compression request
//! before the output stream sees a single byte.

use std::io::{self, Cursor, Read, Write};

use repack_core::codec::FinishWrite;
use repack_core::error::{Error, Result};
use repack_core::format::CompressionAlgorithm;

use crate::z_codec;

/// Build the decoder stage for `algorithm` over `input`.
pub fn decoder(algorithm: CompressionAlgorithm, input: Box<dyn Read>) -> Result<Box<dyn Read>> {
    algorithm.ensure_decode()?;
    Ok(match algorithm {
        CompressionAlgorithm::Brotli => Box::new(brotli::Decompressor::new(input, 8 * 1024)),
        CompressionAlgorithm::Bzip2 => Box::new(bzip2::read::BzDecoder::new(input)),
        CompressionAlgorithm::Deflate => Box::new(flate2::read::ZlibDecoder::new(input)),
        CompressionAlgorithm::Deflate64 => Box::new(deflate64::Deflate64Decoder::new(input)),
        CompressionAlgorithm::Gzip => Box::new(flate2::read::GzDecoder::new(input)),
        CompressionAlgorithm::Lz4Block => Box::new(BlockDecodeReader::new(input, |data| {
            lz4_flex::block::decompress_size_prepended(data).map_err(io::Error::other)
        })),
        CompressionAlgorithm::Lz4Frame => Box::new(lz4_flex::frame::FrameDecoder::new(input)),
        CompressionAlgorithm::Lzma => {
            let stream =
                xz2::stream::Stream::new_lzma_decoder(u64::MAX).map_err(io::Error::other)?;
            Box::new(xz2::read::XzDecoder::new_stream(input, stream))
        }
        CompressionAlgorithm::Snappy => Box::new(BlockDecodeReader::new(input, |data| {
            snap::raw::Decoder::new()
                .decompress_vec(data)
                .map_err(io::Error::other)
        })),
        CompressionAlgorithm::SnappyFrame => Box::new(snap::read::FrameDecoder::new(input)),
        CompressionAlgorithm::Xz => Box::new(xz2::read::XzDecoder::new(input)),
        CompressionAlgorithm::Z => Box::new(BlockDecodeReader::new(input, z_codec::unlzw)),
        CompressionAlgorithm::Zstd => Box::new(zstd::stream::read::Decoder::new(input)?),
    })
}

/// Build the encoder stage for `algorithm` over `output`.
pub fn encoder(
    algorithm: CompressionAlgorithm,
    output: Box<dyn Write>,
) -> Result<Box<dyn FinishWrite>> {
    algorithm.ensure_encode()?;
    Ok(match algorithm {
        CompressionAlgorithm::Bzip2 => stage(bzip2::write::BzEncoder::new(
            output,
            bzip2::Compression::default(),
        )),
        CompressionAlgorithm::Deflate => stage(flate2::write::ZlibEncoder::new(
            output,
            flate2::Compression::default(),
        )),
        CompressionAlgorithm::Gzip => stage(flate2::write::GzEncoder::new(
            output,
            flate2::Compression::default(),
        )),
        CompressionAlgorithm::Lz4Block => stage(Lz4BlockSink {
            raw: Vec::new(),
            out: output,
        }),
        CompressionAlgorithm::Lz4Frame => stage(lz4_flex::frame::FrameEncoder::new(output)),
        CompressionAlgorithm::Lzma => {
            let options = xz2::stream::LzmaOptions::new_preset(6).map_err(io::Error::other)?;
            let stream =
                xz2::stream::Stream::new_lzma_encoder(&options).map_err(io::Error::other)?;
            stage(xz2::write::XzEncoder::new_stream(output, stream))
        }
        CompressionAlgorithm::SnappyFrame => stage(snap::write::FrameEncoder::new(output)),
        CompressionAlgorithm::Xz => stage(xz2::write::XzEncoder::new(output, 6)),
        CompressionAlgorithm::Zstd => stage(zstd::stream::write::Encoder::new(output, 0)?),
        CompressionAlgorithm::Brotli
        | CompressionAlgorithm::Deflate64
        | CompressionAlgorithm::Snappy
        | CompressionAlgorithm::Z => {
            unreachable!("capability matrix rejects {algorithm} encoding")
        }
    })
}

/// Encoder types that can finalize themselves and hand back the writer they
/// wrap. The wrapped writer is always the next stage down.
trait Finishable: Write {
    const STAGE: &'static str;

    fn finish_stage(self) -> io::Result<Box<dyn Write>>;
}

struct Stage<E: Finishable> {
    encoder: E,
}

fn stage<E: Finishable + 'static>(encoder: E) -> Box<dyn FinishWrite> {
    Box::new(Stage { encoder })
}

impl<E: Finishable> Write for Stage<E> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

impl<E: Finishable> FinishWrite for Stage<E> {
    fn finish(self: Box<Self>) -> Result<()> {
        let teardown = |source| Error::Teardown {
            stage: E::STAGE,
            source,
        };
        let mut inner = (*self).encoder.finish_stage().map_err(teardown)?;
        inner.flush().map_err(teardown)
    }
}

impl Finishable for flate2::write::GzEncoder<Box<dyn Write>> {
    const STAGE: &'static str = "GZIP";

    fn finish_stage(self) -> io::Result<Box<dyn Write>> {
        self.finish()
    }
}

impl Finishable for flate2::write::ZlibEncoder<Box<dyn Write>> {
    const STAGE: &'static str = "DEFLATE";

    fn finish_stage(self) -> io::Result<Box<dyn Write>> {
        self.finish()
    }
}

impl Finishable for bzip2::write::BzEncoder<Box<dyn Write>> {
    const STAGE: &'static str = "BZIP2";

    fn finish_stage(self) -> io::Result<Box<dyn Write>> {
        self.finish()
    }
}

// Covers both XZ and the legacy LZMA-alone container; the stream passed at
// construction decides which trailer is written.
impl Finishable for xz2::write::XzEncoder<Box<dyn Write>> {
    const STAGE: &'static str = "XZ";

    fn finish_stage(self) -> io::Result<Box<dyn Write>> {
        self.finish()
    }
}

impl Finishable for zstd::stream::write::Encoder<'static, Box<dyn Write>> {
    const STAGE: &'static str = "ZSTD";

    fn finish_stage(self) -> io::Result<Box<dyn Write>> {
        self.finish()
    }
}

impl Finishable for lz4_flex::frame::FrameEncoder<Box<dyn Write>> {
    const STAGE: &'static str = "LZ4FRAME";

    fn finish_stage(self) -> io::Result<Box<dyn Write>> {
        self.finish().map_err(io::Error::other)
    }
}

impl Finishable for snap::write::FrameEncoder<Box<dyn Write>> {
    const STAGE: &'static str = "SNAPPYFRAME";

    fn finish_stage(mut self) -> io::Result<Box<dyn Write>> {
        self.flush()?;
        self.into_inner().map_err(|e| e.into_error())
    }
}

/// LZ4 block coding has no streaming form; the raw bytes are gathered and
/// compressed as one size-prepended block at finish time.
struct Lz4BlockSink {
    raw: Vec<u8>,
    out: Box<dyn Write>,
}

impl Write for Lz4BlockSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.raw.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Finishable for Lz4BlockSink {
    const STAGE: &'static str = "LZ4BLOCK";

    fn finish_stage(mut self) -> io::Result<Box<dyn Write>> {
        let compressed = lz4_flex::block::compress_prepend_size(&self.raw);
        self.out.write_all(&compressed)?;
        Ok(self.out)
    }
}

/// Whole-stream decoder for block codecs with no streaming form (raw
/// Snappy, LZ4 block, compress(1) `.Z`). Input is drained lazily on the
/// first read, so construction stays I/O-free.
struct BlockDecodeReader {
    source: Option<Box<dyn Read>>,
    decode: fn(&[u8]) -> io::Result<Vec<u8>>,
    decoded: Cursor<Vec<u8>>,
}

impl BlockDecodeReader {
    fn new(source: Box<dyn Read>, decode: fn(&[u8]) -> io::Result<Vec<u8>>) -> Self {
        Self {
            source: Some(source),
            decode,
            decoded: Cursor::new(Vec::new()),
        }
    }
}

impl Read for BlockDecodeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(mut source) = self.source.take() {
            let mut compressed = Vec::new();
            source.read_to_end(&mut compressed)?;
            self.decoded = Cursor::new((self.decode)(&compressed)?);
        }
        self.decoded.read(buf)
    }
}
