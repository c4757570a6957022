//! Human and machine readable reports of the planned layout.
//!
//! Both listings require the layout to be assigned first, since they
//! print the LBAs the planner handed out. The text report is meant for
//! eyeballing a build; the header listing produces C `#define`s so
//! PlayStation-side code can seek straight to its assets without
//! walking the file system.

use std::io::{self, Write};

use crate::msf::Msf;
use crate::sector::MSF_OFFSET;
use crate::tree::{DirId, DirTree, EntryKind};

/// Write a table of every entry: type, identifier, length in sectors,
/// LBA, absolute timecode, length in bytes and source path.
pub fn write_lba_listing<W: Write>(tree: &DirTree, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "    Type  Name             Length    LBA       Timecode    Bytes     Source File"
    )?;
    writeln!(out)?;

    list_dir(tree, tree.root(), 0, out)
}

fn list_dir<W: Write>(tree: &DirTree, dir: DirId, level: u32, out: &mut W) -> io::Result<()> {
    let node = tree.node(dir);

    for entry in &node.entries {
        let kind = match entry.kind {
            EntryKind::File => "File ",
            EntryKind::Dir(_) => "Dir  ",
            EntryKind::Stream | EntryKind::StreamDataOnly => "STR  ",
            EntryKind::XaAudio => "XA   ",
            EntryKind::CdAudio => "CDDA ",
            EntryKind::Dummy => "Dummy",
        };

        let name = if entry.id.is_empty() {
            "<DUMMY>"
        } else {
            entry.id.as_str()
        };

        // Sector headers are offset two seconds from LBA 0, mirror that
        // in the printed timecode
        let timecode = match Msf::from_sector_index(entry.lba + MSF_OFFSET) {
            Some(msf) => msf.to_string(),
            None => "??:??:??".to_string(),
        };

        let source = entry
            .src
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        writeln!(
            out,
            "    {} {:<16} {:<9} {:<9} {}    {:<9} {}",
            kind,
            name,
            (entry.length + 2047) / 2048,
            entry.lba,
            timecode,
            entry.length,
            source
        )?;

        if let EntryKind::Dir(child) = entry.kind {
            list_dir(tree, child, level + 1, out)?;
        }
    }

    if level > 0 {
        writeln!(out, "    End   {}", node.name)?;
    }

    Ok(())
}

/// Write a C header with one `#define LBA_<NAME>` per named file entry.
/// Dots in identifiers become underscores and the version suffix is
/// dropped.
pub fn write_header_listing<W: Write>(tree: &DirTree, out: &mut W) -> io::Result<()> {
    writeln!(out, "#ifndef _ISO_FILES")?;
    writeln!(out, "#define _ISO_FILES")?;
    writeln!(out)?;

    header_dir(tree, tree.root(), out)?;

    writeln!(out)?;
    writeln!(out, "#endif")
}

fn header_dir<W: Write>(tree: &DirTree, dir: DirId, out: &mut W) -> io::Result<()> {
    let node = tree.node(dir);

    writeln!(out, "/* {} */", node.name)?;

    for entry in &node.entries {
        if entry.id.is_empty() || matches!(entry.kind, EntryKind::Dir(_)) {
            continue;
        }

        let name: String = entry
            .id
            .chars()
            .take_while(|&c| c != ';')
            .map(|c| if c == '.' { '_' } else { c })
            .collect();

        writeln!(out, "#define LBA_{:<17}{}", name, entry.lba)?;
    }

    for entry in &node.entries {
        if let EntryKind::Dir(child) = entry.kind {
            writeln!(out)?;
            header_dir(tree, child, out)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::{write_header_listing, write_lba_listing};
    use crate::tree::{DirTree, FileKind};
    use crate::Timestamp;
    use std::fs;

    fn sample_tree(dir: &tempfile::TempDir) -> DirTree {
        let src = dir.path().join("main.exe");
        fs::write(&src, [0u8; 4096]).unwrap();

        let mut tree = DirTree::new(Timestamp::from_unix(0));
        tree.add_file(tree.root(), "MAIN.EXE", FileKind::Data, &src)
            .unwrap();
        let sub = tree.add_subdir(tree.root(), "GFX").unwrap();
        tree.add_file(sub, "TILES.DAT", FileKind::Data, &src)
            .unwrap();

        tree.sort_entries();
        tree.assign_layout(true);

        tree
    }

    #[test]
    fn header_listing_defines() {
        let dir = tempfile::tempdir().unwrap();
        let tree = sample_tree(&dir);

        let mut out = Vec::new();
        write_header_listing(&tree, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("#ifndef _ISO_FILES"));
        assert!(text.contains("#define LBA_MAIN_EXE"));
        assert!(text.contains("#define LBA_TILES_DAT"));
        assert!(text.contains("/* GFX */"));
        assert!(text.trim_end().ends_with("#endif"));
    }

    #[test]
    fn lba_listing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let tree = sample_tree(&dir);

        let mut out = Vec::new();
        write_lba_listing(&tree, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("MAIN.EXE;1"));
        assert!(text.contains("Dir   GFX"));
        assert!(text.contains("End   GFX"));
    }
}
