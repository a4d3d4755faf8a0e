extern crate solidify_lang;
use std::path::PathBuf;

use solidify_lang::{
    snapshot::Snapshot,
    solidify_source,
    utils::{
        error::{report, ReportableError},
        fileloader,
    },
    DumpOptions,
};

pub fn load_src(path: &str) -> (PathBuf, String) {
    let file: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests/snap", path]
        .iter()
        .collect();
    println!("{}", file.to_str().unwrap());
    let src = fileloader::load(&file.to_string_lossy()).unwrap();
    (file, src)
}

pub fn solidify_file_with(
    path: &str,
    root: Option<&str>,
    options: &DumpOptions,
) -> Result<String, Vec<Box<dyn ReportableError>>> {
    let (file, src) = load_src(path);
    let file = file.to_string_lossy();
    let res = solidify_source(&src, &file, root, options);
    if let Err(errs) = &res {
        report(&src, &file, errs);
    }
    res
}

/// Solidifies the last item of a fixture with default options.
pub fn solidify_file(path: &str) -> Result<String, ()> {
    solidify_file_with(path, None, &DumpOptions::default()).map_err(|_| ())
}

pub fn load_snapshot(path: &str) -> Snapshot {
    let (file, src) = load_src(path);
    let file = file.to_string_lossy();
    match Snapshot::parse(&src, &file) {
        Ok(snap) => snap,
        Err(errs) => {
            report(&src, &file, &errs);
            panic!("failed to load {path}");
        }
    }
}
