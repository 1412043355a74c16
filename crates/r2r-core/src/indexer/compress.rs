//! Compressed representations of a `Packages` index.

use std::io::{self, Write};

/// One on-disk representation of an index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Representation {
    Plain,
    Gzip,
    Bzip2,
    Xz,
}

impl Representation {
    /// In the order they are listed in `Release`.
    pub const ALL: [Self; 4] = [Self::Plain, Self::Gzip, Self::Bzip2, Self::Xz];

    /// File name suffix, including the dot.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Plain => "",
            Self::Gzip => ".gz",
            Self::Bzip2 => ".bz2",
            Self::Xz => ".xz",
        }
    }

    /// Encode `content` in this representation.
    ///
    /// The gzip header carries no timestamp or file name, so the same input
    /// always produces the same bytes.
    ///
    /// # Errors
    ///
    /// Returns any error raised by the encoder.
    pub fn encode(&self, content: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Self::Plain => Ok(content.to_vec()),
            Self::Gzip => {
                let mut encoder = flate2::GzBuilder::new()
                    .mtime(0)
                    .write(Vec::new(), flate2::Compression::best());
                encoder.write_all(content)?;
                encoder.finish()
            }
            Self::Bzip2 => {
                let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::best());
                encoder.write_all(content)?;
                encoder.finish()
            }
            Self::Xz => {
                let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
                encoder.write_all(content)?;
                encoder.finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    const PACKAGES: &[u8] = b"Package: tool\nVersion: 1.0.0\nArchitecture: amd64\n\n";

    fn decode(rep: Representation, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        match rep {
            Representation::Plain => out.extend_from_slice(data),
            Representation::Gzip => {
                flate2::read::GzDecoder::new(data).read_to_end(&mut out).unwrap();
            }
            Representation::Bzip2 => {
                bzip2::read::BzDecoder::new(data).read_to_end(&mut out).unwrap();
            }
            Representation::Xz => {
                xz2::read::XzDecoder::new(data).read_to_end(&mut out).unwrap();
            }
        }
        out
    }

    #[test]
    fn test_every_representation_decodes_to_input() {
        for rep in Representation::ALL {
            let encoded = rep.encode(PACKAGES).unwrap();
            assert_eq!(decode(rep, &encoded), PACKAGES, "{rep:?}");
        }
    }

    #[test]
    fn test_gzip_is_deterministic() {
        let a = Representation::Gzip.encode(PACKAGES).unwrap();
        let b = Representation::Gzip.encode(PACKAGES).unwrap();
        assert_eq!(a, b);
        // MTIME field of the gzip header.
        assert_eq!(&a[4..8], &[0, 0, 0, 0]);
    }
}
