//! Directory record emission.
//!
//! Each directory owns one or more 2048-byte record sectors starting at
//! the LBA the planner assigned. A sector opens with the "." and ".."
//! records and then holds one record per named child in sort order. A
//! record never straddles a sector boundary: when the next one wouldn't
//! fit the sector is flushed and a fresh one is started.

use crate::sector::SubHeader;
use crate::tree::{DirId, DirTree, EntryKind};
use crate::volume::{pair16, pair32};
use crate::writer::ImageWriter;
use crate::{CdResult, Timestamp};

/// XA attribute word for a regular Form 1 file
const XA_ATTR_DATA: u16 = 0x550d;
/// XA attribute word for a Form 2 / interleaved stream
const XA_ATTR_STREAM: u16 = 0x553d;
/// XA attribute word for a CD-DA track
const XA_ATTR_CDDA: u16 = 0x5545;
/// XA attribute word for a directory
const XA_ATTR_DIR: u16 = 0x558d;

/// A single encoded directory record; the longest possible one is a
/// 33-byte header, a 14-byte identifier and the XA attribute block.
struct DirRecord {
    buf: [u8; 64],
    len: usize,
}

impl DirRecord {
    /// Encode a record. `size` and `lba` are the corrected values that
    /// land on disc, not necessarily the source byte length.
    fn new(id: &[u8], lba: u32, size: u32, date: Timestamp, flags: u8, xa_attr: Option<u16>) -> DirRecord {
        let mut buf = [0u8; 64];

        // Byte 1 (extended attribute length) stays zero
        pair32(&mut buf[2..10], lba);
        pair32(&mut buf[10..18], size);
        buf[18..25].copy_from_slice(&date.record_bytes());
        buf[25] = flags;
        // File unit size and interleave gap stay zero
        pair16(&mut buf[28..32], 1);
        buf[32] = id.len() as u8;

        let mut len = 33;
        buf[len..len + id.len()].copy_from_slice(id);
        len += id.len();

        // Pad the identifier so the record stays even-sized
        if id.len() % 2 == 0 {
            len += 1;
        }

        if let Some(attr) = xa_attr {
            // Owner/group ids stay zero; the attribute word is stored
            // in the byte order the console's libraries read it in
            buf[len + 4..len + 6].copy_from_slice(&attr.to_le_bytes());
            buf[len + 6] = b'X';
            buf[len + 7] = b'A';
            len += 14;
        }

        buf[0] = len as u8;

        DirRecord { buf, len }
    }

    fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// Sector-granular accumulator for a directory's records
struct RecordSectors<'a> {
    writer: &'a mut ImageWriter,
    buf: [u8; 2048],
    pos: usize,
}

impl<'a> RecordSectors<'a> {
    fn new(writer: &'a mut ImageWriter) -> RecordSectors<'a> {
        RecordSectors {
            writer,
            buf: [0; 2048],
            pos: 0,
        }
    }

    fn push(&mut self, record: DirRecord) -> CdResult<()> {
        if self.pos + record.len > 2048 {
            self.flush(SubHeader::DATA)?;
        }

        self.buf[self.pos..self.pos + record.len].copy_from_slice(record.bytes());
        self.pos += record.len;

        Ok(())
    }

    fn flush(&mut self, subheader: SubHeader) -> CdResult<()> {
        self.writer.set_subheader(subheader);
        self.writer.write_data(&self.buf)?;

        self.buf = [0; 2048];
        self.pos = 0;

        Ok(())
    }
}

/// Write the record sectors of `dir` and of every subdirectory below
/// it, depth-first. `xa` controls the XA attribute blocks.
pub(crate) fn write_directory_records(
    tree: &DirTree,
    dir: DirId,
    writer: &mut ImageWriter,
    xa: bool,
) -> CdResult<()> {
    write_dir(tree, dir, writer, xa)?;

    for entry in &tree.node(dir).entries {
        if let EntryKind::Dir(child) = entry.kind {
            write_directory_records(tree, child, writer, xa)?;
        }
    }

    Ok(())
}

fn write_dir(tree: &DirTree, dir: DirId, writer: &mut ImageWriter, xa: bool) -> CdResult<()> {
    let node = tree.node(dir);
    let own_len = tree.dir_record_len(dir, xa);
    let dir_attr = if xa { Some(XA_ATTR_DIR) } else { None };

    writer.seek_to_sector(node.record_lba)?;

    let mut out = RecordSectors::new(writer);

    // "." points at this directory's own record
    out.push(DirRecord::new(
        &[0x00],
        node.record_lba,
        own_len,
        tree.build_time,
        0x02,
        dir_attr,
    ))?;

    // ".." points at the parent's record, or back at ourselves for the
    // root
    let (parent_lba, parent_len) = match node.parent {
        Some(parent) => (
            tree.node(parent).record_lba,
            tree.dir_record_len(parent, xa),
        ),
        None => (node.record_lba, own_len),
    };

    out.push(DirRecord::new(
        &[0x01],
        parent_lba,
        parent_len,
        tree.build_time,
        0x02,
        dir_attr,
    ))?;

    for entry in &node.entries {
        if entry.id.is_empty() {
            continue;
        }

        // The size and position fields describe what a reader of the
        // file system sees, which differs from the source byte length
        // for sector-addressed payloads
        let (lba, size) = match entry.kind {
            EntryKind::XaAudio | EntryKind::Stream => {
                (entry.lba, 2048 * sectors(entry.length, 2336))
            }
            EntryKind::StreamDataOnly => (entry.lba, 2048 * sectors(entry.length, 2048)),
            // CD-DA payloads are addressed with the pregap offset
            // included
            EntryKind::CdAudio => (entry.lba + 150, 2048 * sectors(entry.length, 2352)),
            _ => (entry.lba, entry.length as u32),
        };

        let (flags, attr) = match entry.kind {
            EntryKind::Dir(_) => (0x02, XA_ATTR_DIR),
            EntryKind::CdAudio => (0x00, XA_ATTR_CDDA),
            EntryKind::XaAudio | EntryKind::Stream => (0x00, XA_ATTR_STREAM),
            _ => (0x00, XA_ATTR_DATA),
        };

        out.push(DirRecord::new(
            entry.id.as_bytes(),
            lba,
            size,
            entry.date,
            flags,
            if xa { Some(attr) } else { None },
        ))?;
    }

    out.flush(SubHeader::END_OF_FILE)
}

fn sectors(len: u64, per_sector: u64) -> u32 {
    ((len + per_sector - 1) / per_sector) as u32
}

#[cfg(test)]
mod test {
    use super::DirRecord;
    use crate::Timestamp;

    #[test]
    fn record_header_fields() {
        let date = Timestamp::from_unix(951_827_696);
        let rec = DirRecord::new(b"HELLO.BIN;1", 23, 1024, date, 0x00, Some(0x550d));

        let b = rec.bytes();

        // 33 header bytes, 11 identifier bytes (odd length, no pad) and
        // the 14-byte XA block
        assert_eq!(b.len(), 58);
        assert_eq!(b[0], 58);
        assert_eq!(&b[2..6], &23u32.to_le_bytes());
        assert_eq!(&b[6..10], &23u32.to_be_bytes());
        assert_eq!(&b[10..14], &1024u32.to_le_bytes());
        assert_eq!(&b[14..18], &1024u32.to_be_bytes());
        // 2000-02-29 with the 1900 bias
        assert_eq!(&b[18..25], &[100, 2, 29, 12, 34, 56, 0]);
        assert_eq!(b[25], 0x00);
        assert_eq!(&b[28..32], &[1, 0, 0, 1]);
        assert_eq!(b[32], 11);
        assert_eq!(&b[33..44], b"HELLO.BIN;1");
        assert_eq!(&b[48..50], &[0x0d, 0x55]);
        assert_eq!(&b[50..52], b"XA");
    }

    #[test]
    fn even_identifiers_get_a_pad_byte() {
        let date = Timestamp::from_unix(0);
        let rec = DirRecord::new(b"AB.DAT;1", 0, 0, date, 0, None);

        // 33 + 8 + 1 pad
        assert_eq!(rec.bytes().len(), 42);
        assert_eq!(rec.bytes()[41], 0);
    }

    #[test]
    fn dot_record_shape() {
        let date = Timestamp::from_unix(0);
        let rec = DirRecord::new(&[0x00], 22, 2048, date, 0x02, Some(0x558d));

        // 33 + 1 + 14, the single-byte identifier needs no pad
        assert_eq!(rec.bytes().len(), 48);
        assert_eq!(rec.bytes()[25], 0x02);
        assert_eq!(rec.bytes()[32], 1);
        assert_eq!(rec.bytes()[33], 0x00);
        // Attribute word as stored
        assert_eq!(&rec.bytes()[38..40], &[0x8d, 0x55]);
    }
}
