use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use solidify_lang::log;
use solidify_lang::snapshot::Snapshot;
use solidify_lang::utils::error::ReportableError;
use solidify_lang::utils::{error::report, fileloader};
use solidify_lang::{dump, DumpOptions};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub mode: Mode,

    /// Snapshot file to solidify
    #[clap(value_parser)]
    pub file: String,

    /// Write the generated C source to a file instead of stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Item to solidify. Defaults to the last closure, class or module.
    #[arg(long, short)]
    pub root: Option<String>,

    /// Symbol prefix for a closure root
    #[arg(long, short)]
    pub prefix: Option<String>,

    /// Reference strings the host already interned instead of defining them
    #[arg(long, short, default_value_t = false)]
    pub weak: bool,
}

#[derive(clap::Args, Debug)]
#[group(required = false, multiple = false)]
pub struct Mode {
    /// Print a listing of the root's prototypes and exit
    #[arg(long, default_value_t = false)]
    pub emit_graph: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if cfg!(debug_assertions) | cfg!(test) {
        colog::default_builder()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        colog::default_builder().init();
    }

    let args = Args::parse();
    let fullpath = fileloader::get_canonical_path(".", &args.file)?;
    let path = fullpath.to_string_lossy().to_string();
    let content = fileloader::load(&path)?;
    if let Err(e) = run_file(&args, &content, &fullpath) {
        report(&content, &path, &e);
        return Err(format!("Failed to process {}", args.file).into());
    }
    Ok(())
}

fn as_reportable<E: ReportableError + 'static>(e: E) -> Vec<Box<dyn ReportableError>> {
    vec![Box::new(e)]
}

fn run_file(
    args: &Args,
    content: &str,
    fullpath: &Path,
) -> Result<(), Vec<Box<dyn ReportableError>>> {
    log::debug!("Filename: {}", fullpath.display());
    let snapshot = Snapshot::parse(content, &fullpath.to_string_lossy())?;
    let root = snapshot
        .root(args.root.as_deref())
        .map_err(as_reportable)?;
    let graph = snapshot.graph();

    if args.mode.emit_graph {
        for clo in graph.root_closures(&root) {
            println!("{}", graph.listing(clo));
        }
        return Ok(());
    }

    let options = DumpOptions {
        weak: args.weak,
        prefix: args.prefix.clone(),
    };
    match &args.output {
        Some(out) => {
            let file = File::create(out)
                .map_err(|e| as_reportable(solidify_lang::solidify::Error::from(e)))?;
            let mut writer = BufWriter::new(file);
            dump(graph, &root, &options, Some(&mut writer)).map_err(as_reportable)?;
            writer
                .flush()
                .map_err(|e| as_reportable(solidify_lang::solidify::Error::from(e)))?;
            log::info!("wrote {}", out.display());
        }
        None => dump(graph, &root, &options, None).map_err(as_reportable)?,
    }
    Ok(())
}
