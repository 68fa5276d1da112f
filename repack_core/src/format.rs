use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Direction, Error, Result};

/// Archive container format. The set is closed: there is no runtime
/// registration, every capability question is answered by a static table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArchiveFormat {
    Ar,
    Arj,
    Cpio,
    Dump,
    Jar,
    Tar,
    Zip,
}

/// Per-format capability flags consulted once at resolution time, so a
/// request for an impossible direction fails before any byte is moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveCaps {
    pub read: bool,
    pub write: bool,
    /// TAR only: the writer stage must enable long-filename and large-size
    /// extensions before the first entry is written.
    pub write_extensions: bool,
}

impl ArchiveFormat {
    pub const ALL: [ArchiveFormat; 7] = [
        ArchiveFormat::Ar,
        ArchiveFormat::Arj,
        ArchiveFormat::Cpio,
        ArchiveFormat::Dump,
        ArchiveFormat::Jar,
        ArchiveFormat::Tar,
        ArchiveFormat::Zip,
    ];

    pub fn caps(self) -> ArchiveCaps {
        match self {
            // ARJ and DUMP are extract-only.
            ArchiveFormat::Arj | ArchiveFormat::Dump => ArchiveCaps {
                read: true,
                write: false,
                write_extensions: false,
            },
            ArchiveFormat::Tar => ArchiveCaps {
                read: true,
                write: true,
                write_extensions: true,
            },
            ArchiveFormat::Ar | ArchiveFormat::Cpio | ArchiveFormat::Jar | ArchiveFormat::Zip => {
                ArchiveCaps {
                    read: true,
                    write: true,
                    write_extensions: false,
                }
            }
        }
    }

    /// Resolve the read capability, failing with a typed configuration
    /// error when the format cannot be read.
    pub fn ensure_readable(self) -> Result<ArchiveCaps> {
        let caps = self.caps();
        if caps.read {
            Ok(caps)
        } else {
            Err(Error::UnsupportedFormat {
                format: self,
                direction: Direction::Read,
            })
        }
    }

    /// Resolve the write capability. ARJ and DUMP fail here, deterministically
    /// and before any stream is opened.
    pub fn ensure_writable(self) -> Result<ArchiveCaps> {
        let caps = self.caps();
        if caps.write {
            Ok(caps)
        } else {
            Err(Error::UnsupportedFormat {
                format: self,
                direction: Direction::Write,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveFormat::Ar => "AR",
            ArchiveFormat::Arj => "ARJ",
            ArchiveFormat::Cpio => "CPIO",
            ArchiveFormat::Dump => "DUMP",
            ArchiveFormat::Jar => "JAR",
            ArchiveFormat::Tar => "TAR",
            ArchiveFormat::Zip => "ZIP",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownName {
                kind: "archive format",
                name: s.to_string(),
            })
    }
}

/// Single-stream compression algorithm applied to a whole byte stream,
/// independent of any archive framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompressionAlgorithm {
    Brotli,
    Bzip2,
    Deflate,
    Deflate64,
    Gzip,
    Lz4Block,
    Lz4Frame,
    Lzma,
    Snappy,
    SnappyFrame,
    Xz,
    Z,
    Zstd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionCaps {
    pub decode: bool,
    pub encode: bool,
}

impl CompressionAlgorithm {
    pub const ALL: [CompressionAlgorithm; 13] = [
        CompressionAlgorithm::Brotli,
        CompressionAlgorithm::Bzip2,
        CompressionAlgorithm::Deflate,
        CompressionAlgorithm::Deflate64,
        CompressionAlgorithm::Gzip,
        CompressionAlgorithm::Lz4Block,
        CompressionAlgorithm::Lz4Frame,
        CompressionAlgorithm::Lzma,
        CompressionAlgorithm::Snappy,
        CompressionAlgorithm::SnappyFrame,
        CompressionAlgorithm::Xz,
        CompressionAlgorithm::Z,
        CompressionAlgorithm::Zstd,
    ];

    pub fn caps(self) -> CompressionCaps {
        match self {
            // Decode-only: no encoder exists in the catalogue for these.
            CompressionAlgorithm::Brotli
            | CompressionAlgorithm::Deflate64
            | CompressionAlgorithm::Snappy
            | CompressionAlgorithm::Z => CompressionCaps {
                decode: true,
                encode: false,
            },
            _ => CompressionCaps {
                decode: true,
                encode: true,
            },
        }
    }

    pub fn ensure_decode(self) -> Result<CompressionCaps> {
        let caps = self.caps();
        if caps.decode {
            Ok(caps)
        } else {
            Err(Error::UnsupportedAlgorithm {
                algorithm: self,
                direction: Direction::Read,
            })
        }
    }

    pub fn ensure_encode(self) -> Result<CompressionCaps> {
        let caps = self.caps();
        if caps.encode {
            Ok(caps)
        } else {
            Err(Error::UnsupportedAlgorithm {
                algorithm: self,
                direction: Direction::Write,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompressionAlgorithm::Brotli => "BROTLI",
            CompressionAlgorithm::Bzip2 => "BZIP2",
            CompressionAlgorithm::Deflate => "DEFLATE",
            CompressionAlgorithm::Deflate64 => "DEFLATE64",
            CompressionAlgorithm::Gzip => "GZIP",
            CompressionAlgorithm::Lz4Block => "LZ4BLOCK",
            CompressionAlgorithm::Lz4Frame => "LZ4FRAME",
            CompressionAlgorithm::Lzma => "LZMA",
            CompressionAlgorithm::Snappy => "SNAPPY",
            CompressionAlgorithm::SnappyFrame => "SNAPPYFRAME",
            CompressionAlgorithm::Xz => "XZ",
            CompressionAlgorithm::Z => "Z",
            CompressionAlgorithm::Zstd => "ZSTD",
        }
    }

    /// Algorithms with an encoder, i.e. usable for compression requests.
    pub fn encodable() -> impl Iterator<Item = CompressionAlgorithm> {
        Self::ALL.into_iter().filter(|a| a.caps().encode)
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownName {
                kind: "compression algorithm",
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arj_and_dump_are_read_only() {
        for format in [ArchiveFormat::Arj, ArchiveFormat::Dump] {
            assert!(format.ensure_readable().is_ok());
            assert!(matches!(
                format.ensure_writable(),
                Err(Error::UnsupportedFormat {
                    direction: Direction::Write,
                    ..
                })
            ));
        }
    }

    #[test]
    fn only_tar_needs_write_extensions() {
        for format in ArchiveFormat::ALL {
            assert_eq!(
                format.caps().write_extensions,
                format == ArchiveFormat::Tar,
                "{format}"
            );
        }
    }

    #[test]
    fn decode_only_algorithms_reject_encode() {
        for algorithm in [
            CompressionAlgorithm::Brotli,
            CompressionAlgorithm::Deflate64,
            CompressionAlgorithm::Snappy,
            CompressionAlgorithm::Z,
        ] {
            assert!(algorithm.ensure_decode().is_ok());
            assert!(matches!(
                algorithm.ensure_encode(),
                Err(Error::UnsupportedAlgorithm {
                    direction: Direction::Write,
                    ..
                })
            ));
        }
        assert_eq!(CompressionAlgorithm::encodable().count(), 9);
    }

    #[test]
    fn names_round_trip_through_fromstr() {
        for format in ArchiveFormat::ALL {
            assert_eq!(format.as_str().parse::<ArchiveFormat>().unwrap(), format);
        }
        for algorithm in CompressionAlgorithm::ALL {
            assert_eq!(
                algorithm.as_str().parse::<CompressionAlgorithm>().unwrap(),
                algorithm
            );
        }
        assert!("LZW".parse::<CompressionAlgorithm>().is_err());
    }

    #[test]
    fn serde_names_match_config_surface() {
        let json = serde_json::to_string(&ArchiveFormat::Tar).unwrap();
        assert_eq!(json, "\"TAR\"");
        let alg: CompressionAlgorithm = serde_json::from_str("\"LZ4BLOCK\"").unwrap();
        assert_eq!(alg, CompressionAlgorithm::Lz4Block);
    }
}
