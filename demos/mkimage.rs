//! Build a small PlayStation disc image from a list of files.
//!
//! Every input lands in the root directory as a data file; WAV inputs
//! passed through `--audio` become CD-DA tracks appended after the data
//! track.

use std::path::PathBuf;
use std::process::exit;

use clap::Parser;

use cdauthor::{build_image, BuildConfig, DirTree, FileKind, Timestamp};

#[derive(Parser)]
#[command(about = "Pack files into a PlayStation CD-ROM image")]
struct Args {
    /// Output image path
    #[arg(short, long)]
    output: PathBuf,

    /// Cue sheet path (required when audio tracks are present)
    #[arg(short, long)]
    cue: Option<PathBuf>,

    /// Volume identifier
    #[arg(long)]
    volume: Option<String>,

    /// Audio tracks appended after the data track
    #[arg(short, long)]
    audio: Vec<PathBuf>,

    /// Files stored in the root directory
    files: Vec<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    let mut tree = DirTree::new(Timestamp::from_unix(now));
    let root = tree.root();

    for path in &args.files {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => {
                eprintln!("{}: not a file name", path.display());
                exit(1);
            }
        };

        if let Err(e) = tree.add_file(root, &name, FileKind::Data, path) {
            eprintln!("{}", e);
            exit(1);
        }
    }

    let mut config = BuildConfig::new(&args.output);
    config.cue_path = args.cue;
    config.identifiers.volume = args.volume;
    config.audio_tracks = args.audio;

    match build_image(&config, &mut tree) {
        Ok(summary) => {
            println!(
                "{}: {} files, {} directories, {} sectors ({} bytes)",
                args.output.display(),
                summary.files,
                summary.directories,
                summary.image_sectors,
                summary.image_sectors as u64 * 2352
            );
        }
        Err(e) => {
            eprintln!("{}", e);
            exit(1);
        }
    }
}
