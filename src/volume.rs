//! Primary volume descriptor, terminator and path tables.
//!
//! ISO9660 stores every size and count in both byte orders so that
//! neither kind of machine has to swap anything: 16-bit fields take 4
//! bytes (little-endian then big-endian) and 32-bit fields take 8. The
//! path table instead exists in four whole copies: two little-endian
//! ("L") followed by two big-endian ("M").

use crate::layout::Layout;
use crate::sector::SubHeader;
use crate::tree::DirTree;
use crate::writer::ImageWriter;
use crate::{CdResult, Identifiers, Timestamp};

/// Encode a 16-bit both-endian pair into 4 bytes
pub(crate) fn pair16(buf: &mut [u8], v: u16) {
    buf[..2].copy_from_slice(&v.to_le_bytes());
    buf[2..4].copy_from_slice(&v.to_be_bytes());
}

/// Encode a 32-bit both-endian pair into 8 bytes
pub(crate) fn pair32(buf: &mut [u8], v: u32) {
    buf[..4].copy_from_slice(&v.to_le_bytes());
    buf[4..8].copy_from_slice(&v.to_be_bytes());
}

/// Fill an identifier field: space padded, upper-cased, silently
/// truncated to the field width
fn put_id(buf: &mut [u8], id: Option<&str>) {
    buf.fill(b' ');

    if let Some(id) = id {
        for (slot, b) in buf.iter_mut().zip(id.bytes()) {
            *slot = b.to_ascii_uppercase();
        }
    }
}

/// The 17-byte decimal descriptor date: YYYYMMDDHHMMSScc plus a GMT
/// offset byte
fn put_date(buf: &mut [u8], t: Timestamp) {
    let s = format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}00",
        t.year, t.month, t.day, t.hour, t.minute, t.second
    );

    buf[..16].copy_from_slice(s.as_bytes());
    buf[16] = 0;
}

/// Write the primary volume descriptor at LBA 16 and the terminator at
/// LBA 17, then the four path table copies starting at LBA 18.
pub(crate) fn write_descriptors(
    tree: &DirTree,
    layout: &Layout,
    writer: &mut ImageWriter,
    ids: &Identifiers,
    volume_sectors: u32,
    xa: bool,
) -> CdResult<()> {
    let mut pvd = [0u8; 2048];

    pvd[0] = 1;
    pvd[1..6].copy_from_slice(b"CD001");
    pvd[6] = 1;

    put_id(&mut pvd[8..40], Some(ids.system.as_deref().unwrap_or("PLAYSTATION")));
    put_id(&mut pvd[40..72], ids.volume.as_deref());

    pair32(&mut pvd[80..88], volume_sectors);

    pair16(&mut pvd[120..124], 1);
    pair16(&mut pvd[124..128], 1);
    pair16(&mut pvd[128..132], 2048);
    pair32(&mut pvd[132..140], layout.path_table_len);

    // L-path table LBAs as plain little-endian, M-path as big-endian
    let s = layout.path_table_sectors;
    pvd[140..144].copy_from_slice(&18u32.to_le_bytes());
    pvd[144..148].copy_from_slice(&(18 + s).to_le_bytes());
    pvd[148..152].copy_from_slice(&(18 + 2 * s).to_be_bytes());
    pvd[152..156].copy_from_slice(&(18 + 3 * s).to_be_bytes());

    // Root directory record, inline
    let root = tree.root();
    pvd[156] = 34;
    pair32(&mut pvd[158..166], layout.filesystem_base);
    pair32(&mut pvd[166..174], tree.dir_record_len(root, xa));
    pvd[174..181].copy_from_slice(&tree.build_time.record_bytes());
    pvd[181] = 0x02;
    pair16(&mut pvd[184..188], 1);
    pvd[188] = 1;
    pvd[189] = 0;

    put_id(&mut pvd[190..318], ids.volume_set.as_deref());
    put_id(&mut pvd[318..446], ids.publisher.as_deref());
    put_id(&mut pvd[446..574], ids.data_preparer.as_deref());
    put_id(
        &mut pvd[574..702],
        Some(ids.application.as_deref().unwrap_or("PLAYSTATION")),
    );
    put_id(
        &mut pvd[702..739],
        Some(ids.copyright.as_deref().unwrap_or("COPYLEFTED")),
    );
    put_id(&mut pvd[739..776], None);
    put_id(&mut pvd[776..813], None);

    put_date(&mut pvd[813..830], tree.build_time);
    put_date(&mut pvd[830..847], tree.build_time);
    pvd[847..863].copy_from_slice(b"0000000000000000");
    pvd[864..880].copy_from_slice(b"0000000000000000");

    pvd[881] = 1;

    if xa {
        // CD-XA signature in the application use area
        pvd[883 + 141..883 + 149].copy_from_slice(b"CD-XA001");
    }

    writer.seek_to_sector(16)?;
    writer.set_subheader(SubHeader::END_OF_RECORD);
    writer.write_data(&pvd)?;

    // Set terminator
    let mut term = [0u8; 2048];
    term[0] = 255;
    term[1..6].copy_from_slice(b"CD001");
    term[6] = 1;

    writer.set_subheader(SubHeader::END_OF_FILE);
    writer.write_data(&term)?;

    write_path_tables(tree, layout, writer)
}

/// Write the two L-endian and two M-endian path table copies
fn write_path_tables(tree: &DirTree, layout: &Layout, writer: &mut ImageWriter) -> CdResult<()> {
    for msb in [false, false, true, true] {
        let mut table = generate_path_table(tree, layout, msb);
        table.resize(layout.path_table_sectors as usize * 2048, 0);

        for (i, sector) in table.chunks(2048).enumerate() {
            let last = i as u32 == layout.path_table_sectors - 1;

            writer.set_subheader(if last {
                SubHeader::END_OF_FILE
            } else {
                SubHeader::DATA
            });
            writer.write_data(sector)?;
        }
    }

    writer.set_subheader(SubHeader::DATA);

    Ok(())
}

/// Serialize the path table in the directory order the planner
/// established. Root comes first with a single NUL identifier byte.
pub(crate) fn generate_path_table(tree: &DirTree, layout: &Layout, msb: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(layout.path_table_len as usize);

    for (i, entry) in layout.path.iter().enumerate() {
        let node = tree.node(entry.dir);
        let id: &[u8] = if i == 0 { &[0x00] } else { node.name.as_bytes() };

        buf.push(id.len() as u8);
        // Extended attribute record length, unused
        buf.push(0);

        let lba = node.record_lba;
        let parent = entry.parent_index;

        if msb {
            buf.extend_from_slice(&lba.to_be_bytes());
            buf.extend_from_slice(&parent.to_be_bytes());
        } else {
            buf.extend_from_slice(&lba.to_le_bytes());
            buf.extend_from_slice(&parent.to_le_bytes());
        }

        buf.extend_from_slice(id);
        if id.len() % 2 != 0 {
            buf.push(0);
        }
    }

    buf
}
