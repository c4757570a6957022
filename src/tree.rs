//! In-memory model of the data track's directory tree.
//!
//! Directories live in an arena indexed by [`DirId`]: children reference
//! their parent by index and the tree owns every node, so there are no
//! ownership cycles to break. Entries are appended during the project
//! build phase and validated as they come in; planning and writing
//! treat the tree as read-only (apart from the LBA fields the planner
//! fills).

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::wave;
use crate::{CdResult, Error, Timestamp};

/// Handle to a directory in a [`DirTree`] arena
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct DirId(pub(crate) usize);

/// Kinds a directory entry can have once it's in the tree
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EntryKind {
    /// Ordinary data, stored as Mode 2 Form 1
    File,
    /// Stream holding only data sectors, stored as Mode 2 Form 1
    StreamDataOnly,
    /// Interleaved video/XA-audio stream; each source sector's submode
    /// decides between Form 1 and Form 2
    Stream,
    /// Pure XA audio, stored as Mode 2 Form 2
    XaAudio,
    /// CD-DA audio track, stored as raw sectors outside the data track
    CdAudio,
    /// Subdirectory
    Dir(DirId),
    /// Reserved empty sectors with no identifier and no source
    Dummy,
}

/// File entry types accepted by [`DirTree::add_file`]. Streams with a
/// payload that is a multiple of 2048 bytes rather than 2336 are
/// reclassified as data-only streams automatically.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FileKind {
    /// Plain data file
    Data,
    /// Pure XA audio stream
    Xa,
    /// Interleaved video/audio stream
    Stream,
    /// CD-DA audio track
    Audio,
}

/// One member of a directory
pub(crate) struct Entry {
    /// Identifier on disc, uppercased, with the `;1` suffix for files.
    /// Empty for dummies.
    pub id: String,
    /// What the entry is
    pub kind: EntryKind,
    /// Source file for everything that has a payload
    pub src: Option<PathBuf>,
    /// Payload length in bytes (directory record length for
    /// subdirectories, filled by the planner)
    pub length: u64,
    /// Assigned LBA, filled by the planner
    pub lba: u32,
    /// Timestamp stored in the directory record
    pub date: Timestamp,
}

pub(crate) struct DirNode {
    /// Directory name (no version suffix), `<root>` for the root
    pub name: String,
    pub parent: Option<DirId>,
    pub entries: Vec<Entry>,
    /// LBA of the directory's own record sectors, filled by the planner
    pub record_lba: u32,
}

/// The directory tree of the data track
pub struct DirTree {
    pub(crate) dirs: Vec<DirNode>,
    /// Timestamp stamped on directories and used for the volume
    /// descriptor dates
    pub(crate) build_time: Timestamp,
}

impl DirTree {
    /// Create a tree holding only an empty root directory. `build_time`
    /// is stamped on every directory and on the volume descriptor, so
    /// builds are reproducible when it's injected rather than sampled.
    pub fn new(build_time: Timestamp) -> DirTree {
        DirTree {
            dirs: vec![DirNode {
                name: "<root>".to_string(),
                parent: None,
                entries: Vec::new(),
                record_lba: 0,
            }],
            build_time,
        }
    }

    /// Handle to the root directory
    pub fn root(&self) -> DirId {
        DirId(0)
    }

    /// The build timestamp the tree was created with
    pub fn build_time(&self) -> Timestamp {
        self.build_time
    }

    /// Add a file entry to directory `dir`. The identifier is `name`
    /// uppercased with a `;1` suffix appended; `src` is read to
    /// validate the payload and determine its length.
    pub fn add_file(&mut self, dir: DirId, name: &str, kind: FileKind, src: &Path) -> CdResult<()> {
        if name.len() > 12 {
            return Err(Error::NameTooLong(name.to_string()));
        }

        let id = format!("{};1", name.to_uppercase());

        self.check_duplicate(dir, &id)?;

        if kind != FileKind::Audio && self.has_audio_in(dir) {
            return Err(Error::EntryAfterAudio(id));
        }

        let meta = fs::metadata(src).map_err(|e| Error::Source {
            path: src.to_path_buf(),
            source: e,
        })?;

        let (kind, length) = match kind {
            FileKind::Data => (EntryKind::File, meta.len()),
            FileKind::Xa => {
                check_xa_source(src, meta.len())?;

                (EntryKind::XaAudio, meta.len())
            }
            FileKind::Stream => (check_stream_source(src, meta.len())?, meta.len()),
            FileKind::Audio => (EntryKind::CdAudio, wave::probe(src)?.payload_len),
        };

        let date = meta
            .modified()
            .map(Timestamp::from_system_time)
            .unwrap_or(self.build_time);

        self.dirs[dir.0].entries.push(Entry {
            id,
            kind,
            src: Some(src.to_path_buf()),
            length,
            lba: 0,
            date,
        });

        Ok(())
    }

    /// Reserve `sectors` empty 2048-byte sectors at this point of the
    /// directory. The entry has no identifier and never shows up in the
    /// directory records.
    pub fn add_dummy(&mut self, dir: DirId, sectors: u32) -> CdResult<()> {
        if self.has_audio_in(dir) {
            return Err(Error::EntryAfterAudio("<dummy>".to_string()));
        }

        self.dirs[dir.0].entries.push(Entry {
            id: String::new(),
            kind: EntryKind::Dummy,
            src: None,
            length: 2048 * sectors as u64,
            lba: 0,
            date: self.build_time,
        });

        Ok(())
    }

    /// Add a subdirectory named `name` (uppercased) to `dir` and return
    /// a handle to it.
    pub fn add_subdir(&mut self, dir: DirId, name: &str) -> CdResult<DirId> {
        if name.len() > 12 {
            return Err(Error::NameTooLong(name.to_string()));
        }

        let id = name.to_uppercase();

        self.check_duplicate(dir, &id)?;

        if self.has_audio_in(dir) {
            return Err(Error::EntryAfterAudio(id));
        }

        let child = DirId(self.dirs.len());

        self.dirs.push(DirNode {
            name: id.clone(),
            parent: Some(dir),
            entries: Vec::new(),
            record_lba: 0,
        });

        self.dirs[dir.0].entries.push(Entry {
            id,
            kind: EntryKind::Dir(child),
            src: None,
            length: 0,
            lba: 0,
            date: self.build_time,
        });

        Ok(child)
    }

    /// Sort every directory: dummies move to the end, everything else
    /// is ordered by identifier. Must run before the layout is
    /// assigned so that record order and LBA order agree.
    pub fn sort_entries(&mut self) {
        for dir in &mut self.dirs {
            dir.entries.sort_by(|a, b| {
                match (a.id.is_empty(), b.id.is_empty()) {
                    // Dummies sort after named entries but keep their
                    // relative order
                    (true, true) => std::cmp::Ordering::Equal,
                    (true, false) => std::cmp::Ordering::Greater,
                    (false, true) => std::cmp::Ordering::Less,
                    (false, false) => a.id.cmp(&b.id),
                }
            });
        }
    }

    /// True if any directory holds a CD-DA entry
    pub fn has_audio(&self) -> bool {
        (0..self.dirs.len()).any(|i| self.has_audio_in(DirId(i)))
    }

    /// Total number of file entries (everything but directories and
    /// dummies)
    pub fn file_count(&self) -> u32 {
        self.dirs
            .iter()
            .flat_map(|d| d.entries.iter())
            .filter(|e| !e.id.is_empty() && !matches!(e.kind, EntryKind::Dir(_)))
            .count() as u32
    }

    /// Total number of directories, not counting the root
    pub fn dir_count(&self) -> u32 {
        (self.dirs.len() - 1) as u32
    }

    /// Slash-separated path of a directory, for diagnostics
    pub(crate) fn dir_path(&self, dir: DirId) -> String {
        let node = &self.dirs[dir.0];

        match node.parent {
            Some(parent) => format!("{}/{}", self.dir_path(parent), node.name),
            None => String::new(),
        }
    }

    pub(crate) fn node(&self, dir: DirId) -> &DirNode {
        &self.dirs[dir.0]
    }

    fn has_audio_in(&self, dir: DirId) -> bool {
        self.dirs[dir.0]
            .entries
            .iter()
            .any(|e| e.kind == EntryKind::CdAudio)
    }

    fn check_duplicate(&self, dir: DirId, id: &str) -> CdResult<()> {
        for entry in &self.dirs[dir.0].entries {
            if !entry.id.is_empty() && entry.id.eq_ignore_ascii_case(id) {
                return Err(Error::DuplicateEntry(id.to_string()));
            }
        }

        Ok(())
    }
}

/// XA sources must already be cut into 2336-byte sectors with subheader
/// data; a RIFF header means the file was never ripped properly.
fn check_xa_source(src: &Path, len: u64) -> CdResult<()> {
    let head = read_head(src)?;

    if head.starts_with(b"RIFF") {
        return Err(Error::UnexpectedRiff {
            path: src.to_path_buf(),
        });
    }

    if len % 2336 != 0 {
        return Err(Error::MisalignedPayload {
            path: src.to_path_buf(),
            len,
            align: 2336,
        });
    }

    // A real subheader is stored twice in a row; two identical words at
    // the start usually mean the rip kept something else there
    if head[..4] == head[4..8] {
        log::warn!("{}: may not have a valid subheader", src.display());
    }

    Ok(())
}

/// Streams are either full 2336-byte source sectors or, when the length
/// only divides by 2048, plain data sectors.
fn check_stream_source(src: &Path, len: u64) -> CdResult<EntryKind> {
    let head = read_head(src)?;

    if head.starts_with(b"RIFF") {
        return Err(Error::UnexpectedRiff {
            path: src.to_path_buf(),
        });
    }

    if len % 2336 == 0 {
        Ok(EntryKind::Stream)
    } else if len % 2048 == 0 {
        Ok(EntryKind::StreamDataOnly)
    } else {
        Err(Error::MisalignedPayload {
            path: src.to_path_buf(),
            len,
            align: 2336,
        })
    }
}

fn read_head(src: &Path) -> CdResult<[u8; 8]> {
    let mut head = [0u8; 8];

    let mut file = fs::File::open(src).map_err(|e| Error::Source {
        path: src.to_path_buf(),
        source: e,
    })?;

    // Short files simply leave the tail zeroed, the length checks
    // reject them anyway
    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..]).map_err(|e| Error::Source {
            path: src.to_path_buf(),
            source: e,
        })?;

        if n == 0 {
            break;
        }

        filled += n;
    }

    Ok(head)
}
