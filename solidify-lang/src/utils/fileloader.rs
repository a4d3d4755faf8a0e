use std::{fmt, path::Path, path::PathBuf};

/// Failure to read a snapshot from disk.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    NotFound(std::io::Error, PathBuf),
    NotUtf8(PathBuf, std::string::FromUtf8Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "cannot read snapshot: {e}"),
            Error::NotFound(e, p) => write!(f, "snapshot {} not found: {e}", p.display()),
            Error::NotUtf8(p, e) => {
                write!(f, "snapshot {} is not valid UTF-8: {e}", p.display())
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Resolves `relpath` against the directory of `current_file_or_dir`.
pub fn get_canonical_path(current_file_or_dir: &str, relpath: &str) -> Result<PathBuf, Error> {
    let current = Path::new(current_file_or_dir);
    let base = if current.is_dir() {
        current.to_path_buf()
    } else {
        match current.parent() {
            Some(p) => p.to_path_buf(),
            None => std::env::current_dir()?,
        }
    };
    base.join(relpath)
        .canonicalize()
        .map_err(|e| Error::NotFound(e, PathBuf::from(relpath)))
}

pub fn load(canonical_path: &str) -> Result<String, Error> {
    let path = PathBuf::from(canonical_path);
    let content = std::fs::read(&path).map_err(|e| Error::NotFound(e, path.clone()))?;
    String::from_utf8(content).map_err(|e| Error::NotUtf8(path, e))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_snapshot() {
        let err = get_canonical_path(".", "no_such_dir/none.snap").unwrap_err();
        assert!(matches!(err, Error::NotFound(..)));
        assert!(err.to_string().starts_with("snapshot no_such_dir/none.snap not found: "));
        assert!(matches!(load("no_such_dir/none.snap"), Err(Error::NotFound(..))));
    }

    #[test]
    fn loads_manifest() {
        let dir = env!("CARGO_MANIFEST_DIR");
        let path = get_canonical_path(dir, "Cargo.toml").unwrap();
        let content = load(&path.to_string_lossy()).unwrap();
        assert!(content.contains("solidify-lang"));
    }
}
