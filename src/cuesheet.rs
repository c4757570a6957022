//! CUE sheet emission.
//!
//! The CUE format was created for the CDRWIN burning software; this
//! module writes the small subset an authored PlayStation disc needs:
//! one BINARY file entry, a MODE2/2352 data track and any number of
//! audio tracks with their INDEX 00/01 positions. Timecodes are decimal
//! MM:SS:FF relative to the start of the image file.

use std::io::Write;

use crate::msf::Msf;
use crate::{CdResult, Error};

/// Writer for a cue sheet describing a single image file
pub struct CueSheet<W: Write> {
    out: W,
}

impl<W: Write> CueSheet<W> {
    /// Start a cue sheet referring to the image file named
    /// `image_name` (the base name, not a path)
    pub fn new(mut out: W, image_name: &str) -> CdResult<CueSheet<W>> {
        writeln!(out, "FILE \"{}\" BINARY", image_name)?;

        Ok(CueSheet { out })
    }

    /// The data track opening every disc: track 01, Mode 2 raw sectors,
    /// starting at the very beginning of the image
    pub fn data_track(&mut self) -> CdResult<()> {
        writeln!(self.out, "  TRACK 01 MODE2/2352")?;
        writeln!(self.out, "    INDEX 01 00:00:00")?;

        Ok(())
    }

    /// Open audio track `number`
    pub fn audio_track(&mut self, number: u32) -> CdResult<()> {
        writeln!(self.out, "  TRACK {:02} AUDIO", number)?;

        Ok(())
    }

    /// The virtual two-second pregap of the first audio track
    pub fn pregap(&mut self) -> CdResult<()> {
        writeln!(self.out, "    PREGAP 00:02:00")?;

        Ok(())
    }

    /// An INDEX line pointing at `lba` within the image file
    pub fn index(&mut self, number: u8, lba: u32) -> CdResult<()> {
        let msf = Msf::from_sector_index(lba).ok_or(Error::LbaOutOfRange(lba))?;

        writeln!(self.out, "    INDEX {:02} {}", number, msf)?;

        Ok(())
    }

    /// Flush the sheet and hand back the underlying writer
    pub fn finish(mut self) -> CdResult<W> {
        self.out.flush()?;

        Ok(self.out)
    }
}

#[cfg(test)]
mod test {
    use super::CueSheet;

    #[test]
    fn full_sheet() {
        let mut cue = CueSheet::new(Vec::new(), "game.bin").unwrap();

        cue.data_track().unwrap();
        cue.audio_track(2).unwrap();
        cue.pregap().unwrap();
        cue.index(1, 1_000).unwrap();
        cue.audio_track(3).unwrap();
        cue.index(0, 2_000).unwrap();
        cue.index(1, 2_150).unwrap();

        let sheet = String::from_utf8(cue.finish().unwrap()).unwrap();

        assert_eq!(
            sheet,
            "FILE \"game.bin\" BINARY\n\
             \x20 TRACK 01 MODE2/2352\n\
             \x20   INDEX 01 00:00:00\n\
             \x20 TRACK 02 AUDIO\n\
             \x20   PREGAP 00:02:00\n\
             \x20   INDEX 01 00:13:25\n\
             \x20 TRACK 03 AUDIO\n\
             \x20   INDEX 00 00:26:50\n\
             \x20   INDEX 01 00:28:50\n"
        );
    }
}
