//! FastTagParse CLI entry point
//!
//! Detects alignment formats and loads reads into in-memory tracks.

use clap::{Parser, Subcommand, ValueEnum};
use fast_tagparse::core::parser::DEFAULT_TRACK_BUFFER_SIZE;
use fast_tagparse::core::LARGE_BUFFER_SIZE;
use fast_tagparse::{
    detect_format, open_fragment_parser, open_tag_parser, AlignmentParser, Format,
    FragmentLocations, FragmentParser, FragmentStats, ParserOptions, TagLocations, TagParser,
};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Input format (CLI enum)
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum FormatArg {
    /// Detect the format by sniffing (single-end formats only)
    #[default]
    #[value(name = "auto")]
    Auto,
    #[value(name = "bed")]
    Bed,
    #[value(name = "bedpe")]
    Bedpe,
    #[value(name = "eland")]
    Eland,
    #[value(name = "elandmulti")]
    ElandMulti,
    #[value(name = "elandexport")]
    ElandExport,
    #[value(name = "sam")]
    Sam,
    #[value(name = "bam")]
    Bam,
    #[value(name = "bampe")]
    Bampe,
    #[value(name = "bowtie")]
    Bowtie,
}

impl FormatArg {
    /// Explicit format, `None` for auto-detection
    fn format(self) -> Option<Format> {
        match self {
            FormatArg::Auto => None,
            FormatArg::Bed => Some(Format::Bed),
            FormatArg::Bedpe => Some(Format::Bedpe),
            FormatArg::Eland => Some(Format::Eland),
            FormatArg::ElandMulti => Some(Format::ElandMulti),
            FormatArg::ElandExport => Some(Format::ElandExport),
            FormatArg::Sam => Some(Format::Sam),
            FormatArg::Bam => Some(Format::Bam),
            FormatArg::Bampe => Some(Format::Bampe),
            FormatArg::Bowtie => Some(Format::Bowtie),
        }
    }
}

#[derive(Parser)]
#[command(name = "fast-tagparse")]
#[command(about = "Streaming parsers for sequencing alignment files")]
#[command(version)]
#[command(author = "FastTagParse Contributors")]
struct Cli {
    /// Initial per-chromosome capacity of built tracks
    #[arg(long = "buffer-size", global = true, default_value_t = DEFAULT_TRACK_BUFFER_SIZE)]
    buffer_size: usize,

    /// Read buffer size in bytes
    #[arg(long = "read-buffer", global = true, default_value_t = LARGE_BUFFER_SIZE)]
    read_buffer_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the format of an alignment file
    Detect {
        /// Input alignment file
        input: PathBuf,
    },
    /// Load one or more alignment files into a single track
    Load {
        /// Input format
        #[arg(short = 'f', long, default_value = "auto")]
        format: FormatArg,
        /// Input alignment files, merged in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

fn open_single_end(
    format: Option<Format>,
    input: &Path,
    options: ParserOptions,
) -> anyhow::Result<Box<dyn TagParser>> {
    let parser = match format {
        Some(format) => open_tag_parser(format, input, options),
        None => detect_format(input, options),
    };
    parser.map_err(|e| anyhow::anyhow!("Failed to open {:?}: {}", input, e))
}

fn load_tags(format: Option<Format>, inputs: &[PathBuf], options: ParserOptions) -> anyhow::Result<()> {
    let Some((first, rest)) = inputs.split_first() else {
        anyhow::bail!("No input files given");
    };

    eprintln!("Reading tags from: {:?}", first);
    let mut parser = open_single_end(format, first, options)?;
    eprintln!("Tag size:        {}", parser.estimate_tag_size()?);
    let mut track: TagLocations = parser.build_single_end_track()?;

    for input in rest {
        eprintln!("Reading tags from: {:?}", input);
        open_single_end(format, input, options)?.append_to_track(&mut track)?;
    }

    eprintln!("\n=== Track Statistics ===");
    eprintln!("Total tags:      {}", track.total());
    for chrom in track.chromosomes() {
        if let Some(positions) = track.positions(chrom) {
            eprintln!(
                "{:<16} +{} -{}",
                String::from_utf8_lossy(chrom),
                positions.forward.len(),
                positions.reverse.len()
            );
        }
    }
    Ok(())
}

fn load_fragments(format: Format, inputs: &[PathBuf], options: ParserOptions) -> anyhow::Result<()> {
    let mut track: Option<FragmentLocations> = None;
    let mut stats = FragmentStats::default();

    for input in inputs {
        eprintln!("Reading fragments from: {:?}", input);
        let mut parser = open_fragment_parser(format, input, options)
            .map_err(|e| anyhow::anyhow!("Failed to open {:?}: {}", input, e))?;
        match track.as_mut() {
            Some(track) => parser.append_to_fragment_track(track, &mut stats)?,
            None => {
                let (built, built_stats) = parser.build_paired_end_track::<FragmentLocations>()?;
                stats.merge(&built_stats);
                track = Some(built);
            }
        }
    }

    let total = track.as_ref().map_or(0, FragmentLocations::total);
    eprintln!("\n=== Track Statistics ===");
    eprintln!("Total fragments: {}", total);
    eprintln!("Stats count:     {}", stats.count);
    eprintln!("Mean length:     {:.1}", stats.mean_length);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let start = Instant::now();
    let options = ParserOptions {
        buffer_size: cli.buffer_size,
        read_buffer_size: cli.read_buffer_size,
    };

    match cli.command {
        Commands::Detect { input } => {
            let mut parser = detect_format(&input, options)
                .map_err(|e| anyhow::anyhow!("Failed to detect format of {:?}: {}", input, e))?;
            println!("Format:          {}", parser.format());
            println!("Gzip compressed: {}", parser.is_gzip_compressed());
            println!("Tag size:        {}", parser.estimate_tag_size()?);
        }

        Commands::Load { format, inputs } => {
            match format.format() {
                Some(format) if format.is_paired() => load_fragments(format, &inputs, options)?,
                format => load_tags(format, &inputs, options)?,
            }
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }
    }

    Ok(())
}
