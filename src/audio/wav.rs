//! Streaming WAV file writer.
//!
//! Writes a placeholder 44-byte RIFF/WAVE header up front, appends raw
//! little-endian PCM16 samples as they arrive, and patches the two size
//! fields on finalize. If finalize is never reached (crash), the placeholder
//! sizes remain invalid, an accepted degradation rather than silent corruption.

use crate::error::{HearkenError, Result};
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Fixed header length: RIFF chunk descriptor (12) + `fmt ` subchunk (24)
/// + `data` subchunk header (8).
const HEADER_LEN: u64 = 44;

/// Byte offset of the RIFF chunk-size field.
const CHUNK_SIZE_OFFSET: u64 = 4;

/// Byte offset of the `data` subchunk size field.
const DATA_SIZE_OFFSET: u64 = 40;

const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u64 = 2;

/// Append-only PCM16 WAV writer.
pub struct WavWriter {
    file: File,
    path: PathBuf,
    total_samples: u64,
    open: bool,
}

impl WavWriter {
    /// Create the file and write the placeholder header.
    ///
    /// Parent directories are created as needed. The header carries the
    /// negotiated format and zero-length size placeholders until `finalize`.
    ///
    /// # Errors
    /// Returns `Persistence` if the directory cannot be created or the file
    /// cannot be opened for writing. Callers treat this as non-fatal:
    /// recognition proceeds without persistence.
    pub fn open(path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| HearkenError::Persistence {
                message: format!("cannot create {}: {}", parent.display(), e),
            })?;
        }

        let mut file = File::create(path).map_err(|e| HearkenError::Persistence {
            message: format!("cannot open {}: {}", path.display(), e),
        })?;

        let byte_rate = sample_rate * channels as u32 * BITS_PER_SAMPLE as u32 / 8;
        let block_align = channels * BITS_PER_SAMPLE / 8;

        let mut header = [0u8; HEADER_LEN as usize];
        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&0u32.to_le_bytes()); // chunk size placeholder
        header[8..12].copy_from_slice(b"WAVE");
        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&16u32.to_le_bytes()); // fmt subchunk size
        header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
        header[22..24].copy_from_slice(&channels.to_le_bytes());
        header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
        header[32..34].copy_from_slice(&block_align.to_le_bytes());
        header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&0u32.to_le_bytes()); // data size placeholder

        file.write_all(&header)
            .map_err(|e| HearkenError::Persistence {
                message: format!("cannot write header to {}: {}", path.display(), e),
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            total_samples: 0,
            open: true,
        })
    }

    /// Append interleaved PCM16 samples as little-endian bytes.
    ///
    /// A zero-length call is a no-op. Appends after `finalize` are ignored.
    pub fn append(&mut self, samples: &[i16]) -> Result<()> {
        if !self.open || samples.is_empty() {
            return Ok(());
        }

        let mut bytes = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE as usize);
        for &sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }

        self.file
            .write_all(&bytes)
            .map_err(|e| HearkenError::Persistence {
                message: format!("append to {} failed: {}", self.path.display(), e),
            })?;
        self.total_samples += samples.len() as u64;
        Ok(())
    }

    /// Patch the header size fields and close the file.
    ///
    /// Idempotent: the second and later calls are no-ops.
    pub fn finalize(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        let data_size = (self.total_samples * BYTES_PER_SAMPLE) as u32;
        let chunk_size = 36 + data_size;

        self.file.seek(SeekFrom::Start(CHUNK_SIZE_OFFSET))?;
        self.file.write_all(&chunk_size.to_le_bytes())?;
        self.file.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        self.file.write_all(&data_size.to_le_bytes())?;
        self.file.flush()?;

        tracing::debug!(path = %self.path.display(), data_size, "finalized audio file");
        Ok(())
    }

    /// Close and delete the file.
    ///
    /// For a writer that never received audio because its session failed to
    /// start: the placeholder-header artifact is removed instead of being
    /// left behind unfinalized.
    pub fn discard(self) {
        let path = self.path.clone();
        drop(self);
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::debug!("removing {} failed: {}", path.display(), e);
        }
    }

    /// Destination path of this writer.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total PCM16 samples appended so far.
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    fn read_u16_le(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    #[test]
    fn test_header_layout_after_finalize() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let mut writer = WavWriter::open(&path, 16000, 1).unwrap();
        writer.append(&[1, 2, 3, 4]).unwrap();
        writer.finalize().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(read_u32_le(&bytes, 16), 16, "fmt subchunk size");
        assert_eq!(read_u16_le(&bytes, 20), 1, "PCM format tag");
        assert_eq!(read_u16_le(&bytes, 22), 1, "channel count");
        assert_eq!(read_u32_le(&bytes, 24), 16000, "sample rate");
        assert_eq!(read_u32_le(&bytes, 28), 32000, "byte rate");
        assert_eq!(read_u16_le(&bytes, 32), 2, "block align");
        assert_eq!(read_u16_le(&bytes, 34), 16, "bits per sample");
    }

    #[test]
    fn test_size_fields_match_appended_bytes() {
        // N appends of k samples: chunk size = 36 + N*k*2, data size = N*k*2
        let dir = tempdir().unwrap();
        let path = dir.path().join("sizes.wav");

        let mut writer = WavWriter::open(&path, 44100, 2).unwrap();
        for _ in 0..5 {
            writer.append(&vec![0i16; 300]).unwrap();
        }
        writer.finalize().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let data_size = 5 * 300 * 2;
        assert_eq!(read_u32_le(&bytes, 40), data_size);
        assert_eq!(read_u32_le(&bytes, 4), 36 + data_size);
        assert_eq!(bytes.len() as u32, 44 + data_size);
    }

    #[test]
    fn test_placeholder_sizes_before_finalize() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("placeholder.wav");

        let mut writer = WavWriter::open(&path, 16000, 1).unwrap();
        writer.append(&[5i16; 100]).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(read_u32_le(&bytes, 4), 0);
        assert_eq!(read_u32_le(&bytes, 40), 0);

        writer.finalize().unwrap();
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("twice.wav");

        let mut writer = WavWriter::open(&path, 16000, 1).unwrap();
        writer.append(&[7i16; 64]).unwrap();
        writer.finalize().unwrap();
        let first = std::fs::read(&path).unwrap();

        writer.finalize().unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_append_after_finalize_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("closed.wav");

        let mut writer = WavWriter::open(&path, 16000, 1).unwrap();
        writer.append(&[1i16; 10]).unwrap();
        writer.finalize().unwrap();

        writer.append(&[2i16; 10]).unwrap();
        assert_eq!(writer.total_samples(), 10);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(read_u32_le(&bytes, 40), 20);
    }

    #[test]
    fn test_empty_append_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.wav");

        let mut writer = WavWriter::open(&path, 16000, 1).unwrap();
        writer.append(&[]).unwrap();
        writer.finalize().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 44);
        assert_eq!(read_u32_le(&bytes, 4), 36);
        assert_eq!(read_u32_le(&bytes, 40), 0);
    }

    #[test]
    fn test_discard_removes_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aborted.wav");

        let writer = WavWriter::open(&path, 16000, 1).unwrap();
        assert!(path.exists());

        writer.discard();
        assert!(!path.exists());
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/c/nested.wav");

        let mut writer = WavWriter::open(&path, 16000, 1).unwrap();
        writer.finalize().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_failure_is_persistence_error() {
        // A path whose parent is an existing file cannot be created.
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let result = WavWriter::open(&blocker.join("out.wav"), 16000, 1);
        assert!(matches!(result, Err(HearkenError::Persistence { .. })));
    }

    #[test]
    fn test_samples_are_little_endian() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("le.wav");

        let mut writer = WavWriter::open(&path, 16000, 1).unwrap();
        writer.append(&[0x0102i16, -2]).unwrap();
        writer.finalize().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[44..48], &[0x02, 0x01, 0xFE, 0xFF]);
    }

    #[test]
    fn test_readable_by_standard_decoder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("decode.wav");

        let samples: Vec<i16> = (0..3200).map(|i| (i % 120) as i16 * 100).collect();
        let mut writer = WavWriter::open(&path, 16000, 2).unwrap();
        writer.append(&samples).unwrap();
        writer.finalize().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);

        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }
}
