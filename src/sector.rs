//! Mode 2 sector assembly.
//!
//! Every non-audio sector of an authored image is a CD-ROM XA Mode 2
//! sector: 12 bytes of sync pattern, a 4-byte header holding the BCD
//! MSF address and the mode, an 8-byte subheader (4 bytes stored twice
//! for integrity) and then the payload in one of two forms:
//!
//!   * Form 1: 2048 bytes of data, a 4-byte EDC and 276 bytes of ECC
//!   * Form 2: 2324 bytes of data and a 4-byte EDC, no ECC
//!
//! CD-DA audio sectors bypass all of this and hold 2352 bytes of raw
//! PCM.

use crate::ecc;
use crate::edc;
use crate::msf::Msf;
use crate::{CdResult, Error};

/// Size of a raw CD sector in bytes
pub const SECTOR_SIZE: usize = 2352;

/// Payload bytes in a Mode 2 Form 1 sector
pub const FORM1_DATA_SIZE: usize = 2048;

/// Payload bytes in a Mode 2 Form 2 sector
pub const FORM2_DATA_SIZE: usize = 2324;

/// Bytes of an XA source sector: subheader plus Form 2 payload and EDC
/// span. This is the unit XA and STR files are cut into.
pub const XA_SECTOR_SIZE: usize = 2336;

/// Sectors between the start of the program area and MSF 00:00:00; the
/// header of LBA 0 reads 00:02:00.
pub const MSF_OFFSET: u32 = 150;

/// CD-ROM sync pattern at the start of every data sector
pub const SYNC_PATTERN: [u8; 12] = [
    0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00,
];

/// A 4-byte XA subheader: file number, channel number, submode and
/// coding information. Stored twice on the sector, at bytes 16..20 and
/// 20..24.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct SubHeader([u8; 4]);

impl SubHeader {
    /// Plain data sector
    pub const DATA: SubHeader = SubHeader([0x00, 0x00, 0x08, 0x00]);
    /// Streaming (real time) data sector
    pub const STREAMING: SubHeader = SubHeader([0x00, 0x00, 0x48, 0x00]);
    /// Last sector of a logical record
    pub const END_OF_RECORD: SubHeader = SubHeader([0x00, 0x00, 0x81, 0x00]);
    /// Last sector of a file (end-of-record and end-of-file bits)
    pub const END_OF_FILE: SubHeader = SubHeader([0x00, 0x00, 0x89, 0x00]);

    /// Build a subheader from its 4 raw bytes
    pub const fn from_bytes(bytes: [u8; 4]) -> SubHeader {
        SubHeader(bytes)
    }

    /// The raw subheader bytes
    pub fn bytes(self) -> [u8; 4] {
        self.0
    }

    /// The submode byte
    pub fn submode(self) -> XaSubmode {
        XaSubmode(self.0[2])
    }
}

/// The submode byte of an XA subheader
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct XaSubmode(pub u8);

impl XaSubmode {
    /// True if the End Of Record (EOR) bit is set
    pub fn end_of_record(self) -> bool {
        self.0 & 1 != 0
    }

    /// True if the Video (V) bit is set
    pub fn video(self) -> bool {
        self.0 & (1 << 1) != 0
    }

    /// True if the Audio (A) bit is set
    pub fn audio(self) -> bool {
        self.0 & (1 << 2) != 0
    }

    /// True if the Data (D) bit is set
    pub fn data(self) -> bool {
        self.0 & (1 << 3) != 0
    }

    /// Return the sector form
    pub fn form(self) -> XaForm {
        if self.0 & (1 << 5) != 0 {
            XaForm::Form2
        } else {
            XaForm::Form1
        }
    }

    /// True if the Real-Time Sector (RT) bit is set
    pub fn real_time(self) -> bool {
        self.0 & (1 << 6) != 0
    }

    /// True if the End Of File (EOF) bit is set
    pub fn end_of_file(self) -> bool {
        self.0 & (1 << 7) != 0
    }
}

/// The two payload layouts of a Mode 2 sector
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum XaForm {
    /// 2048 bytes of data protected by EDC and ECC
    Form1,
    /// 2324 bytes of data with only an EDC
    Form2,
}

/// Write the sync pattern and the Mode 2 address header for `lba` into
/// `sector`. Fails when the sector is past the end of the MSF address
/// space.
fn put_header(sector: &mut [u8; SECTOR_SIZE], lba: u32) -> CdResult<()> {
    let msf = Msf::from_sector_index(lba + MSF_OFFSET).ok_or(Error::LbaOutOfRange(lba))?;

    sector[..12].copy_from_slice(&SYNC_PATTERN);
    sector[12..15].copy_from_slice(&msf.to_bcd());
    sector[15] = 0x02;

    Ok(())
}

/// Encode a Mode 2 Form 1 sector: 2048 bytes of `data` under the given
/// subheader, with EDC and ECC.
pub fn encode_form1(
    lba: u32,
    sub: SubHeader,
    data: &[u8; FORM1_DATA_SIZE],
    sector: &mut [u8; SECTOR_SIZE],
) -> CdResult<()> {
    put_header(sector, lba)?;

    sector[16..20].copy_from_slice(&sub.bytes());
    sector[20..24].copy_from_slice(&sub.bytes());
    sector[24..2072].copy_from_slice(data);

    let edc = edc::compute(&sector[16..2072]);
    sector[2072..2076].copy_from_slice(&edc.to_le_bytes());

    ecc::generate(sector);

    Ok(())
}

/// Encode a Mode 2 Form 2 sector: 2324 bytes of `data` under the given
/// subheader, with EDC and no ECC.
pub fn encode_form2(
    lba: u32,
    sub: SubHeader,
    data: &[u8; FORM2_DATA_SIZE],
    sector: &mut [u8; SECTOR_SIZE],
) -> CdResult<()> {
    put_header(sector, lba)?;

    sector[16..20].copy_from_slice(&sub.bytes());
    sector[20..24].copy_from_slice(&sub.bytes());
    sector[24..2348].copy_from_slice(data);

    let edc = edc::compute(&sector[16..2348]);
    sector[2348..2352].copy_from_slice(&edc.to_le_bytes());

    Ok(())
}

/// Encode a sector from 2336 bytes of XA source data carrying its own
/// subheader. The source fills bytes 16..2352 of the sector and the
/// error codes are regenerated over it: both EDC and ECC for Form 1,
/// EDC alone for Form 2. The form is chosen by the caller, not by the
/// submode bits of the source.
pub fn encode_xa(
    lba: u32,
    src: &[u8; XA_SECTOR_SIZE],
    form: XaForm,
    sector: &mut [u8; SECTOR_SIZE],
) -> CdResult<()> {
    put_header(sector, lba)?;

    sector[16..].copy_from_slice(src);

    match form {
        XaForm::Form1 => {
            let edc = edc::compute(&sector[16..2072]);
            sector[2072..2076].copy_from_slice(&edc.to_le_bytes());

            ecc::generate(sector);
        }
        XaForm::Form2 => {
            let edc = edc::compute(&sector[16..2348]);
            sector[2348..2352].copy_from_slice(&edc.to_le_bytes());
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn form1_framing() {
        let data = [0x5au8; FORM1_DATA_SIZE];
        let mut sector = [0u8; SECTOR_SIZE];

        encode_form1(16, SubHeader::END_OF_RECORD, &data, &mut sector).unwrap();

        assert_eq!(&sector[..12], &SYNC_PATTERN);
        // LBA 16 + 150 = 166 sectors = 00:02:16
        assert_eq!(&sector[12..16], &[0x00, 0x02, 0x16, 0x02]);
        // Subheader is duplicated
        assert_eq!(&sector[16..20], &[0x00, 0x00, 0x81, 0x00]);
        assert_eq!(&sector[16..20], &sector[20..24]);
        assert_eq!(&sector[24..2072], &data[..]);

        let edc = u32::from_le_bytes([sector[2072], sector[2073], sector[2074], sector[2075]]);
        assert_eq!(edc, edc::compute(&sector[16..2072]));
    }

    #[test]
    fn form2_framing() {
        let data = [0xc3u8; FORM2_DATA_SIZE];
        let mut sector = [0u8; SECTOR_SIZE];

        encode_form2(0, SubHeader::DATA, &data, &mut sector).unwrap();

        assert_eq!(&sector[12..16], &[0x00, 0x02, 0x00, 0x02]);
        assert_eq!(&sector[16..20], &sector[20..24]);

        let edc = u32::from_le_bytes([sector[2348], sector[2349], sector[2350], sector[2351]]);
        assert_eq!(edc, edc::compute(&sector[16..2348]));
    }

    #[test]
    fn xa_keeps_source_subheader() {
        let mut src = [0u8; XA_SECTOR_SIZE];
        // Form 2 real-time audio submode, duplicated like on disc
        for base in [0, 4] {
            src[base] = 0x01;
            src[base + 1] = 0x02;
            src[base + 2] = 0x64;
            src[base + 3] = 0x05;
        }

        let mut sector = [0u8; SECTOR_SIZE];
        encode_xa(100, &src, XaForm::Form2, &mut sector).unwrap();

        assert_eq!(&sector[16..24], &src[..8]);
        assert_eq!(
            SubHeader::from_bytes([0x01, 0x02, 0x64, 0x05]).submode().form(),
            XaForm::Form2
        );
    }

    #[test]
    fn lba_past_msf_range_is_rejected() {
        let data = [0u8; FORM1_DATA_SIZE];
        let mut sector = [0u8; SECTOR_SIZE];

        // 99:59:74 minus the 150 sector offset is the last valid LBA
        assert!(encode_form1(449_849, SubHeader::DATA, &data, &mut sector).is_ok());
        assert!(encode_form1(449_850, SubHeader::DATA, &data, &mut sector).is_err());
    }

    #[test]
    fn submode_bits() {
        let sub = SubHeader::END_OF_FILE.submode();

        assert!(sub.end_of_record());
        assert!(sub.end_of_file());
        assert!(sub.data());
        assert!(!sub.video());
        assert!(!sub.audio());
        assert!(!sub.real_time());
        assert_eq!(sub.form(), XaForm::Form1);

        assert!(SubHeader::STREAMING.submode().real_time());
    }
}
