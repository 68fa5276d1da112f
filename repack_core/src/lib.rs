pub mod codec;
pub mod compose;
pub mod config;
pub mod error;
pub mod file;
pub mod format;
pub mod metrics;
pub mod reader;
pub mod store;
pub mod writer;

pub use codec::{ArchiveSink, ArchiveSource, CodecProvider, EntryMeta, FinishWrite};
pub use config::{ArchiveCompress, ArchiveDecompress, FileCompress, FileDecompress, SourceSpec};
pub use error::{Direction, Error, Result};
pub use file::{compress_file, decompress_file};
pub use format::{ArchiveFormat, CompressionAlgorithm};
pub use metrics::{MetricSink, NullMetrics};
pub use reader::{decompress_archive, DecompressedArchive};
pub use store::{ByteStore, MemoryStore, ObjectRef};
pub use writer::compress_archive;
