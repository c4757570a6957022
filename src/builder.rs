//! The build sequencer.
//!
//! Drives a full image build from a populated [`DirTree`]: sorts and
//! plans the layout, emits the cue sheet, then writes the image in
//! on-disc order. Sectors 0..15 (the license area) and the file system
//! metadata are first written as zero padding and filled in properly
//! after the payloads, so the file grows front to back and every seek
//! lands on an existing offset.
//!
//! Validation happens before the output file is created wherever
//! possible; an I/O failure once writing has begun closes and removes
//! the partial image and cue sheet.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::cuesheet::CueSheet;
use crate::layout::Layout;
use crate::record;
use crate::sector::{SubHeader, XaForm, XaSubmode, FORM1_DATA_SIZE, XA_SECTOR_SIZE};
use crate::tree::{DirId, DirTree, EntryKind};
use crate::volume;
use crate::wave;
use crate::writer::ImageWriter;
use crate::{CdResult, Error, Identifiers};

/// Expected size of a license file: the 12 XA sectors of the boot area
const LICENSE_SIZE: usize = 12 * XA_SECTOR_SIZE;

/// Everything configuring a build apart from the directory tree itself
pub struct BuildConfig {
    /// Path of the output image
    pub image_path: PathBuf,
    /// Path of the cue sheet; mandatory as soon as any CD-DA track is
    /// present
    pub cue_path: Option<PathBuf>,
    /// Suppress the CD-XA signature and the XA attribute records
    pub no_xa: bool,
    /// Volume descriptor identifier strings
    pub identifiers: Identifiers,
    /// Optional license file blown over sectors 0..15
    pub license_path: Option<PathBuf>,
    /// Audio sources appended as tracks after the data track, in
    /// addition to any CD-DA entries inside the tree
    pub audio_tracks: Vec<PathBuf>,
}

impl BuildConfig {
    /// Configuration with defaults: no cue sheet, XA attributes on, no
    /// license, no appended audio
    pub fn new<P: Into<PathBuf>>(image_path: P) -> BuildConfig {
        BuildConfig {
            image_path: image_path.into(),
            cue_path: None,
            no_xa: false,
            identifiers: Identifiers::default(),
            license_path: None,
            audio_tracks: Vec::new(),
        }
    }
}

/// What a finished build looked like
pub struct BuildSummary {
    /// Number of file entries packed
    pub files: u32,
    /// Number of directories (excluding the root)
    pub directories: u32,
    /// Final image length in sectors
    pub image_sectors: u32,
}

/// Build the image (and cue sheet) described by `config` from `tree`.
/// The tree is sorted and laid out in place; on success the summary is
/// returned, on failure any partial outputs are removed.
pub fn build_image(config: &BuildConfig, tree: &mut DirTree) -> CdResult<BuildSummary> {
    if (tree.has_audio() || !config.audio_tracks.is_empty()) && config.cue_path.is_none() {
        return Err(Error::AudioWithoutCue);
    }

    // Read the license up front so a missing file aborts the build
    // before the output is touched
    let license = match &config.license_path {
        Some(path) => Some(read_license(path)?),
        None => None,
    };

    let xa = !config.no_xa;

    tree.sort_entries();
    let layout = tree.assign_layout(xa);

    if layout.path_table_len > 2048 {
        log::warn!("path table exceeds 2048 bytes");
    }

    let mut cue = match &config.cue_path {
        Some(path) => {
            let file = File::create(path)?;
            let mut cue = CueSheet::new(BufWriter::new(file), &image_basename(config))?;

            cue.data_track()?;
            Some(cue)
        }
        None => None,
    };

    // Tracks for CD-DA entries inside the tree are known already, their
    // cue lines go in before any sector is written
    let mut track_num = 1;
    if let Some(cue) = cue.as_mut() {
        write_cue_entries(tree, tree.root(), cue, &mut track_num)?;
    }

    let mut writer = ImageWriter::create(&config.image_path)?;

    let res = write_image(
        config,
        tree,
        &layout,
        &mut writer,
        &mut cue,
        track_num,
        license.as_deref(),
    );

    match res {
        Ok(image_sectors) => {
            writer.close()?;
            if let Some(cue) = cue {
                cue.finish()?;
            }

            Ok(BuildSummary {
                files: tree.file_count(),
                directories: tree.dir_count(),
                image_sectors,
            })
        }
        Err(e) => {
            // A partial image is of no use to anyone
            drop(writer);
            drop(cue);

            let _ = fs::remove_file(&config.image_path);
            if let Some(path) = &config.cue_path {
                let _ = fs::remove_file(path);
            }

            Err(e)
        }
    }
}

fn image_basename(config: &BuildConfig) -> String {
    match config.image_path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => config.image_path.display().to_string(),
    }
}

/// Cue lines for the CD-DA entries of the tree, in traversal order. The
/// first audio track of the disc gets the virtual two-second pregap,
/// later ones point INDEX 00 at their silence lead-in.
fn write_cue_entries<W: Write>(
    tree: &DirTree,
    dir: DirId,
    cue: &mut CueSheet<W>,
    track_num: &mut u32,
) -> CdResult<()> {
    for entry in &tree.node(dir).entries {
        match entry.kind {
            EntryKind::CdAudio => {
                *track_num += 1;

                cue.audio_track(*track_num)?;

                if *track_num == 2 {
                    cue.pregap()?;
                } else {
                    cue.index(0, entry.lba - 150)?;
                }

                cue.index(1, entry.lba)?;
            }
            EntryKind::Dir(child) => {
                write_cue_entries(tree, child, cue, track_num)?;
            }
            _ => (),
        }
    }

    Ok(())
}

/// Write every sector of the image, in file order: padding over the
/// metadata area, payloads, directory records, descriptors and path
/// tables, license data, then the appended audio tracks. Returns the
/// final image length in sectors.
fn write_image<W: Write>(
    config: &BuildConfig,
    tree: &DirTree,
    layout: &Layout,
    writer: &mut ImageWriter,
    cue: &mut Option<CueSheet<W>>,
    mut track_num: u32,
    license: Option<&[u8]>,
) -> CdResult<u32> {
    let xa = !config.no_xa;

    // Zero padding over the system area, descriptors, path tables and
    // directory records; all of it is overwritten with real content
    // once the payload positions are settled
    writer.set_subheader(SubHeader::DATA);

    let zero = [0u8; FORM1_DATA_SIZE];
    for _ in 0..layout.filesystem_base {
        writer.write_data(&zero)?;
    }

    let mut first_track = false;
    write_files(tree, tree.root(), writer, &mut first_track)?;

    record::write_directory_records(tree, tree.root(), writer, xa)?;

    volume::write_descriptors(
        tree,
        layout,
        writer,
        &config.identifiers,
        tree.filesystem_size(xa),
        xa,
    )?;

    if let Some(license) = license {
        write_license(writer, license)?;
    }

    // Standalone audio tracks are appended past everything the planner
    // placed
    let mut first_da_done = first_track;

    for src in &config.audio_tracks {
        track_num += 1;

        let lba = writer.seek_to_end()?;

        if let Some(cue) = cue.as_mut() {
            cue.audio_track(track_num)?;
        }

        if !first_da_done && track_num == 2 {
            // The pregap of track 2 is virtual, the payload starts
            // right where the data track ended
            if let Some(cue) = cue.as_mut() {
                cue.pregap()?;
                cue.index(1, lba)?;
            }

            wave::pack(writer, src, false)?;
            first_da_done = true;
        } else {
            if let Some(cue) = cue.as_mut() {
                cue.index(0, lba)?;
                cue.index(1, lba + 150)?;
            }

            wave::pack(writer, src, true)?;
        }
    }

    writer.seek_to_end()
}

/// Pack the payload of every entry below `dir`, depth-first, each at
/// its assigned LBA
fn write_files(
    tree: &DirTree,
    dir: DirId,
    writer: &mut ImageWriter,
    first_track: &mut bool,
) -> CdResult<()> {
    for entry in &tree.node(dir).entries {
        let src = entry.src.as_deref();

        match entry.kind {
            EntryKind::File => {
                if let Some(src) = src {
                    writer.seek_to_sector(entry.lba)?;
                    writer.set_subheader(SubHeader::DATA);

                    copy_form1_payload(src, entry.length, writer, true)?;
                }
            }
            EntryKind::Dummy => {
                writer.seek_to_sector(entry.lba)?;
                writer.set_subheader(SubHeader::DATA);

                let zero = [0u8; FORM1_DATA_SIZE];
                let sectors = entry.length / 2048;

                for i in 0..sectors {
                    if i == sectors - 1 {
                        writer.set_subheader(SubHeader::END_OF_FILE);
                    }

                    writer.write_data(&zero)?;
                }
            }
            EntryKind::StreamDataOnly => {
                if let Some(src) = src {
                    writer.seek_to_sector(entry.lba)?;

                    // Data-only streams are all streaming sectors, no
                    // end-of-file marking
                    writer.set_subheader(SubHeader::STREAMING);
                    copy_form1_payload(src, entry.length, writer, false)?;

                    writer.set_subheader(SubHeader::DATA);
                }
            }
            EntryKind::Stream => {
                if let Some(src) = src {
                    writer.seek_to_sector(entry.lba)?;
                    copy_xa_payload(src, entry.length, writer, None)?;
                }
            }
            EntryKind::XaAudio => {
                if let Some(src) = src {
                    writer.seek_to_sector(entry.lba)?;
                    copy_xa_payload(src, entry.length, writer, Some(XaForm::Form2))?;
                }
            }
            EntryKind::CdAudio => {
                if let Some(src) = src {
                    if *first_track {
                        // Later tracks own the 150 silence sectors in
                        // front of their payload
                        writer.seek_to_sector(entry.lba - 150)?;
                        wave::pack(writer, src, true)?;
                    } else {
                        writer.seek_to_sector(entry.lba)?;
                        wave::pack(writer, src, false)?;
                        *first_track = true;
                    }
                }
            }
            EntryKind::Dir(child) => {
                write_files(tree, child, writer, first_track)?;
            }
        }
    }

    Ok(())
}

/// Copy `length` bytes of `src` as Form 1 sectors, zero padding the
/// tail. With `mark_eof` the last sector is flagged end-of-file.
fn copy_form1_payload(
    src: &Path,
    length: u64,
    writer: &mut ImageWriter,
    mark_eof: bool,
) -> CdResult<()> {
    let mut file = File::open(src).map_err(|e| Error::Source {
        path: src.to_path_buf(),
        source: e,
    })?;

    let sectors = (length + 2047) / 2048;
    let mut remaining = length;

    for i in 0..sectors {
        let n = remaining.min(FORM1_DATA_SIZE as u64) as usize;

        let mut buf = [0u8; FORM1_DATA_SIZE];
        file.read_exact(&mut buf[..n]).map_err(|e| Error::Source {
            path: src.to_path_buf(),
            source: e,
        })?;

        if mark_eof && i == sectors - 1 {
            writer.set_subheader(SubHeader::END_OF_FILE);
        }

        writer.write_data(&buf)?;
        remaining -= n as u64;
    }

    Ok(())
}

/// Copy a payload already cut into 2336-byte source sectors. With
/// `form` set every sector is written in that form; otherwise each
/// source sector's own submode picks between Form 1 (video) and Form 2
/// (XA audio), the interleave used by movie streams.
fn copy_xa_payload(
    src: &Path,
    length: u64,
    writer: &mut ImageWriter,
    form: Option<XaForm>,
) -> CdResult<()> {
    let mut file = File::open(src).map_err(|e| Error::Source {
        path: src.to_path_buf(),
        source: e,
    })?;

    for _ in 0..length / XA_SECTOR_SIZE as u64 {
        let mut buf = [0u8; XA_SECTOR_SIZE];
        file.read_exact(&mut buf).map_err(|e| Error::Source {
            path: src.to_path_buf(),
            source: e,
        })?;

        let form = form.unwrap_or_else(|| XaSubmode(buf[2]).form());

        writer.write_xa(&buf, form)?;
    }

    Ok(())
}

/// Load the license file, zero padded to the 12 sector boot area
fn read_license(path: &Path) -> CdResult<Vec<u8>> {
    let meta = fs::metadata(path).map_err(|e| Error::Source {
        path: path.to_path_buf(),
        source: e,
    })?;

    if meta.len() != LICENSE_SIZE as u64 {
        log::warn!(
            "{}: license file is {} bytes, expected {}",
            path.display(),
            meta.len(),
            LICENSE_SIZE
        );
    }

    let mut data = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut data))
        .map_err(|e| Error::Source {
            path: path.to_path_buf(),
            source: e,
        })?;

    data.resize(LICENSE_SIZE, 0);

    Ok(data)
}

/// Blow the license data over the boot area: 12 XA sectors carrying the
/// file's own subheaders, then 4 sectors of its first 2048 bytes under
/// the boot tail subheader
fn write_license(writer: &mut ImageWriter, license: &[u8]) -> CdResult<()> {
    writer.seek_to_sector(0)?;
    writer.write_xa(license, XaForm::Form1)?;

    writer.set_subheader(SubHeader::from_bytes([0x00, 0x00, 0x20, 0x00]));
    for _ in 0..4 {
        writer.write_data(&license[..2048])?;
    }

    writer.set_subheader(SubHeader::DATA);

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tree::FileKind;
    use crate::{DirTree, Timestamp};

    fn tree() -> DirTree {
        DirTree::new(Timestamp::from_unix(0))
    }

    #[test]
    fn audio_without_cue_is_rejected_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let track = dir.path().join("track.raw");
        fs::write(&track, [0u8; 2352]).unwrap();

        let mut t = tree();
        t.add_file(t.root(), "TRACK1", FileKind::Audio, &track)
            .unwrap();

        let config = BuildConfig::new(dir.path().join("out.bin"));

        assert!(matches!(
            build_image(&config, &mut t),
            Err(Error::AudioWithoutCue)
        ));
        assert!(!dir.path().join("out.bin").exists());
    }

    #[test]
    fn failed_build_removes_partial_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("data.bin");
        fs::write(&src, [0u8; 4096]).unwrap();

        let mut t = tree();
        t.add_file(t.root(), "DATA.BIN", FileKind::Data, &src)
            .unwrap();

        // The source disappears between validation and packing
        fs::remove_file(&src).unwrap();

        let config = BuildConfig::new(dir.path().join("out.bin"));

        assert!(matches!(
            build_image(&config, &mut t),
            Err(Error::Source { .. })
        ));
        assert!(!dir.path().join("out.bin").exists());
    }

    #[test]
    fn summary_counts_and_length() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("hello.bin");
        fs::write(&src, [0u8; 1024]).unwrap();

        let mut t = tree();
        t.add_file(t.root(), "HELLO.BIN", FileKind::Data, &src)
            .unwrap();

        let config = BuildConfig::new(dir.path().join("out.bin"));
        let summary = build_image(&config, &mut t).unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(summary.directories, 0);
        assert_eq!(summary.image_sectors, 24);

        let len = fs::metadata(dir.path().join("out.bin")).unwrap().len();
        assert_eq!(len, 24 * 2352);
    }
}
