//! Request surface for an embedding workflow engine. Variable rendering and
//! templating happen upstream; by the time a request reaches this module the
//! values are literal, and the only remaining shape question is the `source`
//! field, which historically arrives as a plain reference, a mapping, or a
//! JSON-serialized mapping.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codec::CodecProvider;
use crate::error::{Error, Result};
use crate::file;
use crate::format::{ArchiveFormat, CompressionAlgorithm};
use crate::metrics::MetricSink;
use crate::reader::{self, DecompressedArchive};
use crate::store::{ByteStore, ObjectRef};
use crate::writer;

/// The `source` configuration value. Normalized once at this boundary so
/// the pipelines only ever see an opaque reference or an ordered mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    /// A single storage reference, or a JSON-serialized mapping.
    Text(String),
    /// Ordered mapping of destination path → storage reference.
    Map(IndexMap<String, ObjectRef>),
}

impl SourceSpec {
    /// Normalize to the ordered entry mapping a compress-archive request
    /// needs. The text form must hold a JSON object of path → reference.
    pub fn into_entries(self) -> Result<IndexMap<String, ObjectRef>> {
        match self {
            SourceSpec::Map(map) => Ok(map),
            SourceSpec::Text(text) => serde_json::from_str(&text).map_err(|err| {
                Error::InvalidRequest(format!(
                    "source is not a JSON mapping of path to reference: {err}"
                ))
            }),
        }
    }

    /// Normalize to the single reference a decompress or file request needs.
    pub fn into_reference(self) -> Result<ObjectRef> {
        match self {
            SourceSpec::Text(text) => Ok(ObjectRef(text)),
            SourceSpec::Map(_) => Err(Error::InvalidRequest(
                "source must be a single reference, not a mapping".into(),
            )),
        }
    }
}

/// Pack named sources into one archive artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveCompress {
    pub archive_format: ArchiveFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_algorithm: Option<CompressionAlgorithm>,
    pub source: SourceSpec,
}

impl ArchiveCompress {
    pub fn run(self, provider: &dyn CodecProvider, store: &dyn ByteStore) -> Result<ObjectRef> {
        let entries = self.source.into_entries()?;
        writer::compress_archive(
            provider,
            store,
            self.archive_format,
            self.compression_algorithm,
            &entries,
        )
    }
}

/// Unpack one archive artifact into one artifact per entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveDecompress {
    pub archive_format: ArchiveFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_algorithm: Option<CompressionAlgorithm>,
    pub source: SourceSpec,
}

impl ArchiveDecompress {
    pub fn run(
        self,
        provider: &dyn CodecProvider,
        store: &dyn ByteStore,
        metrics: &dyn MetricSink,
    ) -> Result<DecompressedArchive> {
        let from = self.source.into_reference()?;
        reader::decompress_archive(
            provider,
            store,
            metrics,
            self.archive_format,
            self.compression_algorithm,
            &from,
        )
    }
}

/// Compress a single stream; no archive container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCompress {
    pub compression_algorithm: CompressionAlgorithm,
    pub source: SourceSpec,
}

impl FileCompress {
    pub fn run(self, provider: &dyn CodecProvider, store: &dyn ByteStore) -> Result<ObjectRef> {
        let from = self.source.into_reference()?;
        file::compress_file(provider, store, self.compression_algorithm, &from)
    }
}

/// Decompress a single stream; no archive container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDecompress {
    pub compression_algorithm: CompressionAlgorithm,
    pub source: SourceSpec,
}

impl FileDecompress {
    pub fn run(self, provider: &dyn CodecProvider, store: &dyn ByteStore) -> Result<ObjectRef> {
        let from = self.source.into_reference()?;
        file::decompress_file(provider, store, self.compression_algorithm, &from)
    }
}
