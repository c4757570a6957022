//! CD-DA audio sources.
//!
//! Audio tracks come either from WAV containers or from headerless PCM
//! rips. Only the canonical red book format is accepted from WAV files
//! (44.1 kHz, 16-bit, stereo); headerless files are passed through
//! untouched on the assumption that they're already in that shape.
//! Either way the payload is cut into raw 2352-byte sectors with the
//! tail zero-padded.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::sector::SECTOR_SIZE;
use crate::writer::ImageWriter;
use crate::{CdResult, Error};

/// What `probe` learned about an audio source
pub(crate) struct AudioSource {
    /// PCM payload length in bytes, not yet rounded to sectors
    pub payload_len: u64,
    /// Offset of the payload within the file
    pub data_offset: u64,
    /// False for headerless rips taken whole
    pub riff: bool,
}

/// Inspect an audio source and locate its PCM payload. Files without a
/// RIFF/WAVE header are taken whole.
pub(crate) fn probe(path: &Path) -> CdResult<AudioSource> {
    let mut file = open(path)?;

    let len = file.metadata().map_err(|e| source_err(path, e))?.len();

    let mut riff = [0u8; 12];
    let is_wav = len >= 12 && {
        read_exact(path, &mut file, &mut riff)?;
        &riff[..4] == b"RIFF" && &riff[8..12] == b"WAVE"
    };

    if !is_wav {
        return Ok(AudioSource {
            payload_len: len,
            data_offset: 0,
            riff: false,
        });
    }

    // The format chunk is expected first
    let (id, size) = chunk_header(path, &mut file)?;
    if &id != b"fmt " || size < 16 {
        return Err(Error::WavFormat {
            path: path.to_path_buf(),
            desc: "unsupported WAV layout".to_string(),
        });
    }

    let mut fmt = [0u8; 16];
    read_exact(path, &mut file, &mut fmt)?;

    let channels = u16::from_le_bytes([fmt[2], fmt[3]]);
    let sample_rate = u32::from_le_bytes([fmt[4], fmt[5], fmt[6], fmt[7]]);
    let bits_per_sample = u16::from_le_bytes([fmt[14], fmt[15]]);

    if channels != 2 || sample_rate != 44_100 || bits_per_sample != 16 {
        return Err(Error::WavFormat {
            path: path.to_path_buf(),
            desc: format!(
                "only 44.1KHz 16-bit stereo is supported, got {}Hz {}-bit {} channel(s)",
                sample_rate, bits_per_sample, channels
            ),
        });
    }

    // Skip any format extension, then walk the chunks to "data"
    let mut pos = file
        .seek(SeekFrom::Current(size as i64 - 16))
        .map_err(|e| source_err(path, e))?;

    loop {
        if pos + 8 > len {
            return Err(Error::WavFormat {
                path: path.to_path_buf(),
                desc: "no data chunk found".to_string(),
            });
        }

        let (id, size) = chunk_header(path, &mut file)?;
        pos += 8;

        if &id == b"data" {
            return Ok(AudioSource {
                payload_len: size as u64,
                data_offset: pos,
                riff: true,
            });
        }

        pos = file
            .seek(SeekFrom::Current(size as i64))
            .map_err(|e| source_err(path, e))?;
    }
}

/// Copy an audio source onto the image as raw sectors. When `pregap` is
/// set, 150 sectors of silence are written first (every audio track
/// after the first one carries its own lead-in on the image).
pub(crate) fn pack(writer: &mut ImageWriter, path: &Path, pregap: bool) -> CdResult<()> {
    let info = probe(path)?;

    if !info.riff {
        log::warn!("{}: no RIFF header, packing as raw audio", path.display());
    }

    if pregap {
        let silence = [0u8; SECTOR_SIZE];

        for _ in 0..150 {
            writer.write_raw(&silence)?;
        }
    }

    let mut file = open(path)?;
    file.seek(SeekFrom::Start(info.data_offset))
        .map_err(|e| source_err(path, e))?;

    let mut remaining = info.payload_len;

    while remaining > 0 {
        let n = remaining.min(SECTOR_SIZE as u64) as usize;

        let mut buf = [0u8; SECTOR_SIZE];
        read_exact(path, &mut file, &mut buf[..n])?;

        writer.write_raw(&buf)?;
        remaining -= n as u64;
    }

    Ok(())
}

fn open(path: &Path) -> CdResult<File> {
    File::open(path).map_err(|e| source_err(path, e))
}

fn chunk_header(path: &Path, file: &mut File) -> CdResult<([u8; 4], u32)> {
    let mut header = [0u8; 8];
    read_exact(path, file, &mut header)?;

    Ok((
        [header[0], header[1], header[2], header[3]],
        u32::from_le_bytes([header[4], header[5], header[6], header[7]]),
    ))
}

fn read_exact(path: &Path, file: &mut File, buf: &mut [u8]) -> CdResult<()> {
    file.read_exact(buf).map_err(|e| source_err(path, e))
}

fn source_err(path: &Path, e: std::io::Error) -> Error {
    Error::Source {
        path: path.to_path_buf(),
        source: e,
    }
}
