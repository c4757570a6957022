//! Sector-addressed sink over the output image file.
//!
//! The writer tracks a current LBA and an active subheader. Data writes
//! are packaged through the sector codec one sector at a time; raw
//! writes (CD-DA payloads, pregap silence) go through untouched. Seeking
//! is explicit: a write always lands at the current LBA and advances it
//! by one sector per 2048/2336/2352 bytes consumed.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::sector::{self, SubHeader, XaForm, SECTOR_SIZE};
use crate::CdResult;

/// Writer for a raw 2352-byte-sector image file
pub struct ImageWriter {
    file: BufWriter<File>,
    /// LBA the next write lands on
    lba: u32,
    /// Subheader applied to Form 1 data writes
    subheader: SubHeader,
}

impl ImageWriter {
    /// Create (or truncate) the image file at `path`. The writer starts
    /// at LBA 0 with a plain data subheader.
    pub fn create(path: &Path) -> CdResult<ImageWriter> {
        let file = File::create(path)?;

        Ok(ImageWriter {
            file: BufWriter::new(file),
            lba: 0,
            subheader: SubHeader::DATA,
        })
    }

    /// Position the writer on `lba`
    pub fn seek_to_sector(&mut self, lba: u32) -> CdResult<()> {
        self.file
            .seek(SeekFrom::Start(lba as u64 * SECTOR_SIZE as u64))?;
        self.lba = lba;

        Ok(())
    }

    /// Position the writer after the last written sector and return its
    /// LBA, which is the current length of the image in sectors
    pub fn seek_to_end(&mut self) -> CdResult<u32> {
        let offset = self.file.seek(SeekFrom::End(0))?;
        self.lba = (offset / SECTOR_SIZE as u64) as u32;

        Ok(self.lba)
    }

    /// LBA of the next write
    pub fn current_lba(&self) -> u32 {
        self.lba
    }

    /// Set the subheader used by subsequent data writes
    pub fn set_subheader(&mut self, subheader: SubHeader) {
        self.subheader = subheader;
    }

    /// Write `data` as Mode 2 Form 1 sectors under the active
    /// subheader, 2048 bytes per sector. A final partial chunk is
    /// padded with zeroes.
    pub fn write_data(&mut self, data: &[u8]) -> CdResult<()> {
        let mut sector = [0u8; SECTOR_SIZE];

        for chunk in data.chunks(sector::FORM1_DATA_SIZE) {
            let mut payload = [0u8; sector::FORM1_DATA_SIZE];
            payload[..chunk.len()].copy_from_slice(chunk);

            sector::encode_form1(self.lba, self.subheader, &payload, &mut sector)?;

            self.file.write_all(&sector)?;
            self.lba += 1;
        }

        Ok(())
    }

    /// Write XA source data carrying its own subheaders, 2336 bytes per
    /// sector, regenerating the error codes for the given form. A final
    /// partial chunk is padded with zeroes.
    pub fn write_xa(&mut self, data: &[u8], form: XaForm) -> CdResult<()> {
        let mut sector = [0u8; SECTOR_SIZE];

        for chunk in data.chunks(sector::XA_SECTOR_SIZE) {
            let mut payload = [0u8; sector::XA_SECTOR_SIZE];
            payload[..chunk.len()].copy_from_slice(chunk);

            sector::encode_xa(self.lba, &payload, form, &mut sector)?;

            self.file.write_all(&sector)?;
            self.lba += 1;
        }

        Ok(())
    }

    /// Write raw 2352-byte sectors with no packaging at all, for CD-DA
    /// payloads and pregap silence. A final partial chunk is padded
    /// with zeroes.
    pub fn write_raw(&mut self, data: &[u8]) -> CdResult<()> {
        for chunk in data.chunks(SECTOR_SIZE) {
            if chunk.len() == SECTOR_SIZE {
                self.file.write_all(chunk)?;
            } else {
                let mut sector = [0u8; SECTOR_SIZE];
                sector[..chunk.len()].copy_from_slice(chunk);
                self.file.write_all(&sector)?;
            }

            self.lba += 1;
        }

        Ok(())
    }

    /// Flush and close the image file
    pub fn close(self) -> CdResult<()> {
        let mut file = self.file;
        file.flush()?;

        Ok(())
    }
}
