//! Bundled codec catalogue: every archive container and compressor stage the
//! transcoding core can be asked for. The catalogue is static; capability
//! questions are answered by `repack_core`'s tables before any constructor
//! here runs, so an unsupported direction never opens a stream.

use std::io::{Read, Write};

use repack_core::codec::{ArchiveSink, ArchiveSource, CodecProvider, FinishWrite};
use repack_core::error::Result;
use repack_core::format::{ArchiveFormat, CompressionAlgorithm};

mod ar_codec;
mod arj_codec;
mod compressors;
mod cpio_codec;
mod dump_codec;
mod tar_codec;
mod z_codec;
mod zip_codec;

pub use ar_codec::{ArSink, ArSource};
pub use arj_codec::ArjSource;
pub use cpio_codec::{CpioSink, CpioSource};
pub use dump_codec::DumpSource;
pub use tar_codec::{TarSink, TarSource};
pub use zip_codec::{ZipSink, ZipSource};

/// The full built-in codec set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalogue;

impl CodecProvider for Catalogue {
    fn archive_source(
        &self,
        format: ArchiveFormat,
        input: Box<dyn Read>,
    ) -> Result<Box<dyn ArchiveSource>> {
        format.ensure_readable()?;
        Ok(match format {
            ArchiveFormat::Ar => Box::new(ArSource::new(input)),
            ArchiveFormat::Arj => Box::new(ArjSource::new(input)),
            ArchiveFormat::Cpio => Box::new(CpioSource::new(input)),
            ArchiveFormat::Dump => Box::new(DumpSource::new(input)),
            // JAR is ZIP with a conventional layout; same codec.
            ArchiveFormat::Jar | ArchiveFormat::Zip => Box::new(ZipSource::new(input)),
            ArchiveFormat::Tar => Box::new(TarSource::new(input)),
        })
    }

    fn archive_sink(
        &self,
        format: ArchiveFormat,
        output: Box<dyn FinishWrite>,
    ) -> Result<Box<dyn ArchiveSink>> {
        format.ensure_writable()?;
        Ok(match format {
            ArchiveFormat::Ar => Box::new(ArSink::new(output)),
            ArchiveFormat::Cpio => Box::new(CpioSink::new(output)),
            ArchiveFormat::Jar | ArchiveFormat::Zip => Box::new(ZipSink::new(output)?),
            ArchiveFormat::Tar => Box::new(TarSink::new(output)),
            ArchiveFormat::Arj | ArchiveFormat::Dump => {
                unreachable!("write capability was resolved above")
            }
        })
    }

    fn decoder(
        &self,
        algorithm: CompressionAlgorithm,
        input: Box<dyn Read>,
    ) -> Result<Box<dyn Read>> {
        compressors::decoder(algorithm, input)
    }

    fn encoder(
        &self,
        algorithm: CompressionAlgorithm,
        output: Box<dyn Write>,
    ) -> Result<Box<dyn FinishWrite>> {
        compressors::encoder(algorithm, output)
    }
}
