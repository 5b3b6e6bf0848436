//! Randomness sources handed to generators
//!
//! A fresh generation reads from the OS RNG and records every byte into an
//! encrypted entropy file. A reproducibility check replays that record
//! instead, so a deterministic generator yields identical output.

use crate::envelope::EnvelopeWriter;
use crate::error::{EnvelopeError, GenerateError};
use rand::rngs::OsRng;
use rand::TryRngCore;
use std::fmt;
use std::io::{self, Read, Write};
use zeroize::Zeroizing;

pub struct Entropy {
    source: Source,
}

enum Source {
    Unavailable,
    Replay {
        recorded: Zeroizing<Vec<u8>>,
        position: usize,
    },
    Record {
        rng: OsRng,
        recorder: EnvelopeWriter,
    },
    Reader(Box<dyn Read + Send>),
}

impl Entropy {
    /// No randomness. Any read fails.
    pub fn unavailable() -> Self {
        Self {
            source: Source::Unavailable,
        }
    }

    /// Replay previously recorded bytes. Reading past the end fails.
    pub fn replay(recorded: Zeroizing<Vec<u8>>) -> Self {
        Self {
            source: Source::Replay {
                recorded,
                position: 0,
            },
        }
    }

    /// Draw from the OS RNG, copying every byte into `recorder`
    pub fn record(recorder: EnvelopeWriter) -> Self {
        Self {
            source: Source::Record {
                rng: OsRng,
                recorder,
            },
        }
    }

    /// Arbitrary byte source, used for fixed-input generation
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            source: Source::Reader(Box::new(reader)),
        }
    }

    /// Fill `buf` completely
    pub fn fill(&mut self, buf: &mut [u8]) -> Result<(), GenerateError> {
        self.read_exact(buf).map_err(GenerateError::from_entropy)
    }

    /// Bytes consumed so far from a replayed record
    #[cfg(test)]
    pub fn replayed(&self) -> Option<usize> {
        match &self.source {
            Source::Replay { position, .. } => Some(*position),
            _ => None,
        }
    }

    /// Finalize the entropy record, if this source is recording
    pub fn finish(self) -> Result<(), EnvelopeError> {
        match self.source {
            Source::Record { recorder, .. } => recorder.finish(),
            _ => Ok(()),
        }
    }
}

impl Default for Entropy {
    fn default() -> Self {
        Self::unavailable()
    }
}

impl Read for Entropy {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.source {
            Source::Unavailable => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "no entropy source available",
            )),
            Source::Replay { recorded, position } => {
                let remaining = &recorded[*position..];
                let n = remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&remaining[..n]);
                *position += n;
                Ok(n)
            }
            Source::Record { rng, recorder } => {
                rng.try_fill_bytes(buf).map_err(io::Error::other)?;
                recorder.write_all(buf)?;
                Ok(buf.len())
            }
            Source::Reader(reader) => reader.read(buf),
        }
    }
}

impl fmt::Debug for Entropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.source {
            Source::Unavailable => "unavailable",
            Source::Replay { .. } => "replay",
            Source::Record { .. } => "record",
            Source::Reader(_) => "reader",
        };
        f.debug_struct("Entropy").field("source", &kind).finish()
    }
}
