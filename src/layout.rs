//! Two-pass LBA assignment.
//!
//! The file system metadata (path tables, directory records) sits in
//! front of the file payloads, so its size has to be known before any
//! LBA can be handed out. The planner first derives the path table
//! length from the directory names alone, which fixes where the records
//! start, then walks the tree in pre-order reserving record sectors and
//! payload sectors as it goes.
//!
//! Path table entries are collected during the same walk so their
//! numbering can't diverge from the order LBAs were assigned in.

use crate::tree::{DirId, DirTree, EntryKind};

/// Sector count needed for `len` bytes at `per_sector` bytes each
fn sectors(len: u64, per_sector: u64) -> u32 {
    ((len + per_sector - 1) / per_sector) as u32
}

/// One directory in path table order. The first entry is always the
/// root with parent index 1.
pub(crate) struct PathEntry {
    pub dir: DirId,
    /// 1-based index of the parent directory in the same table
    pub parent_index: u16,
}

/// Result of the layout pass
pub struct Layout {
    /// Path table length in bytes
    pub path_table_len: u32,
    /// Sectors occupied by one path table copy
    pub path_table_sectors: u32,
    /// LBA of the root directory record (right after the four path
    /// table copies)
    pub filesystem_base: u32,
    /// Total size of the planned image in sectors
    pub total_sectors: u32,
    /// Directories in table order with their parent links
    pub(crate) path: Vec<PathEntry>,
}

impl DirTree {
    /// Length in bytes of the path table: a 10-byte root entry plus one
    /// entry per subdirectory, identifiers padded to even length.
    pub fn path_table_len(&self) -> u32 {
        let mut len = 10;

        for dir in self.dirs.iter().skip(1) {
            len += 8 + 2 * ((dir.name.len() as u32 + 1) / 2);
        }

        len
    }

    /// Space reserved for a directory's record sectors, in bytes,
    /// rounded up to whole sectors. An entry that would straddle a
    /// sector boundary is pushed to the next sector, matching the
    /// record writer.
    pub(crate) fn dir_record_len(&self, dir: DirId, xa: bool) -> u32 {
        2048 * ((self.dir_record_raw_len(dir, xa) + 2047) / 2048)
    }

    fn dir_record_raw_len(&self, dir: DirId, xa: bool) -> u32 {
        let attr = if xa { 14 } else { 0 };

        // "." and ".."
        let mut len = 68 + 2 * attr;

        for entry in &self.node(dir).entries {
            if entry.id.is_empty() {
                continue;
            }

            // 33 byte header, identifier, pad byte keeping the record
            // even-sized
            let cost = 34 + entry.id.len() as u32 + attr;

            if (len % 2048) + cost > 2048 {
                len = (len / 2048 + 1) * 2048;
            }

            len += cost;
        }

        len
    }

    /// Assign every LBA in the tree: directory record positions, file
    /// payload positions and the 150-sector pregap reserved after the
    /// first CD-DA track. Entries must already be sorted. Returns the
    /// computed [`Layout`].
    pub fn assign_layout(&mut self, xa: bool) -> Layout {
        let path_table_len = self.path_table_len();
        let path_table_sectors = (path_table_len + 2047) / 2048;
        let filesystem_base = 18 + 4 * path_table_sectors;

        let mut path = vec![PathEntry {
            dir: self.root(),
            parent_index: 1,
        }];
        let mut first_track = false;

        let total_sectors = self.walk_assign(
            self.root(),
            1,
            filesystem_base,
            xa,
            &mut first_track,
            &mut path,
        );

        Layout {
            path_table_len,
            path_table_sectors,
            filesystem_base,
            total_sectors,
            path,
        }
    }

    fn walk_assign(
        &mut self,
        dir: DirId,
        dir_index: u16,
        mut lba: u32,
        xa: bool,
        first_track: &mut bool,
        path: &mut Vec<PathEntry>,
    ) -> u32 {
        if self.dir_record_raw_len(dir, xa) > 2048 {
            let path = self.dir_path(dir);
            let path = if path.is_empty() { "/" } else { path.as_str() };

            log::warn!("directory record {} exceeds 2048 bytes", path);
        }

        self.dirs[dir.0].record_lba = lba;
        lba += self.dir_record_len(dir, xa) / 2048;

        for i in 0..self.dirs[dir.0].entries.len() {
            let (kind, length) = {
                let e = &self.dirs[dir.0].entries[i];
                (e.kind, e.length)
            };

            self.dirs[dir.0].entries[i].lba = lba;

            match kind {
                EntryKind::Dir(child) => {
                    let child_index = (path.len() + 1) as u16;
                    path.push(PathEntry {
                        dir: child,
                        parent_index: dir_index,
                    });

                    lba = self.walk_assign(child, child_index, lba, xa, first_track, path);

                    let child_len = self.dir_record_len(child, xa);
                    self.dirs[dir.0].entries[i].length = child_len as u64;
                }
                EntryKind::File | EntryKind::StreamDataOnly | EntryKind::Dummy => {
                    lba += sectors(length, 2048);
                }
                EntryKind::XaAudio | EntryKind::Stream => {
                    lba += sectors(length, 2336);
                }
                EntryKind::CdAudio => {
                    lba += sectors(length, 2352);

                    // The first audio track's pregap is virtual in the
                    // cue sheet but the two seconds are still reserved;
                    // the next track's silence lead-in lands there
                    if !*first_track {
                        lba += 150;
                        *first_track = true;
                    }
                }
            }
        }

        lba
    }

    /// Total image size in sectors, computed without touching the tree.
    /// Yields the same value `assign_layout` returns for the same
    /// input.
    pub fn filesystem_size(&self, xa: bool) -> u32 {
        let base = 18 + 4 * ((self.path_table_len() + 2047) / 2048);
        let mut first_track = false;

        self.walk_size(self.root(), base, xa, &mut first_track)
    }

    fn walk_size(&self, dir: DirId, mut lba: u32, xa: bool, first_track: &mut bool) -> u32 {
        lba += self.dir_record_len(dir, xa) / 2048;

        for entry in &self.node(dir).entries {
            match entry.kind {
                EntryKind::Dir(child) => {
                    lba = self.walk_size(child, lba, xa, first_track);
                }
                EntryKind::File | EntryKind::StreamDataOnly | EntryKind::Dummy => {
                    lba += sectors(entry.length, 2048);
                }
                EntryKind::XaAudio | EntryKind::Stream => {
                    lba += sectors(entry.length, 2336);
                }
                EntryKind::CdAudio => {
                    lba += sectors(entry.length, 2352);

                    if !*first_track {
                        lba += 150;
                        *first_track = true;
                    }
                }
            }
        }

        lba
    }
}
