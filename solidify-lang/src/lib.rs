pub mod interner;
pub mod runtime;
pub mod snapshot;
pub mod solidify;
pub mod utils;

pub use log;

pub use solidify::{dump, dump_to_string, DumpOptions};

use snapshot::Snapshot;
use utils::error::ReportableError;

/// Loads a snapshot and solidifies one of its items into a string.
///
/// `root` picks the item by name, defaulting to the last closure, class or
/// module of the snapshot.
pub fn solidify_source(
    src: &str,
    path: &str,
    root: Option<&str>,
    options: &DumpOptions,
) -> Result<String, Vec<Box<dyn ReportableError>>> {
    let snapshot = Snapshot::parse(src, path)?;
    let root = snapshot
        .root(root)
        .map_err(|e| vec![Box::new(e) as Box<dyn ReportableError>])?;
    dump_to_string(snapshot.graph(), &root, options)
        .map_err(|e| vec![Box::new(e) as Box<dyn ReportableError>])
}
