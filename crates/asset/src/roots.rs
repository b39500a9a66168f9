//! Asset search roots.
//!
//! Loaders never consult process-wide state: every lookup goes through an
//! [`AssetRoots`] built by the caller.

use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

/// Ordered list of directories searched for relative asset paths.
/// Earlier roots win.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssetRoots {
    roots: Vec<PathBuf>,
}

impl AssetRoots {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    pub fn push(&mut self, root: impl Into<PathBuf>) {
        self.roots.push(root.into());
    }

    /// Append every entry of an OS path list (`:`/`;` separated), as found
    /// in environment variables.
    pub fn with_path_list(mut self, list: &OsStr) -> Self {
        self.roots
            .extend(std::env::split_paths(list).filter(|p| !p.as_os_str().is_empty()));
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// First existing file for `rel`.
    pub fn resolve(&self, rel: impl AsRef<Path>) -> Option<PathBuf> {
        let rel = rel.as_ref();
        self.roots
            .iter()
            .map(|root| root.join(rel))
            .find(|candidate| candidate.is_file())
    }

    /// Open `rel` under the first root where it opens.
    pub fn open(&self, rel: impl AsRef<Path>) -> Result<(File, PathBuf)> {
        let rel = rel.as_ref();
        if self.roots.is_empty() {
            anyhow::bail!("No asset roots configured while looking for {}", rel.display());
        }

        let mut last_err = None;
        for root in &self.roots {
            let path = root.join(rel);
            match File::open(&path) {
                Ok(file) => {
                    log::debug!("Resolved {} -> {}", rel.display(), path.display());
                    return Ok((file, path));
                }
                Err(e) => last_err = Some(e),
            }
        }

        let searched: Vec<String> = self.roots.iter().map(|r| r.display().to_string()).collect();
        let err = last_err.map_or_else(|| anyhow!("not found"), anyhow::Error::from);
        Err(err.context(format!(
            "Asset {} not found in [{}]",
            rel.display(),
            searched.join(", ")
        )))
    }

    /// Read the whole of `rel`.
    pub fn read(&self, rel: impl AsRef<Path>) -> Result<Vec<u8>> {
        let (mut file, path) = self.open(rel)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(data)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Fresh scratch directory under the system temp dir.
    pub(crate) fn scratch_dir(tag: &str) -> PathBuf {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let dir = std::env::temp_dir().join(format!(
            "svarog-asset-{}-{}-{}",
            tag,
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn earlier_root_wins() {
        let a = scratch_dir("a");
        let b = scratch_dir("b");
        fs::write(a.join("x.txt"), b"from a").unwrap();
        fs::write(b.join("x.txt"), b"from b").unwrap();
        fs::write(b.join("y.txt"), b"only b").unwrap();

        let roots = AssetRoots::new([&a, &b]);
        assert_eq!(roots.read("x.txt").unwrap(), b"from a");
        assert_eq!(roots.read("y.txt").unwrap(), b"only b");
        assert_eq!(roots.resolve("y.txt"), Some(b.join("y.txt")));
    }

    #[test]
    fn missing_asset_lists_roots() {
        let a = scratch_dir("missing");
        let roots = AssetRoots::new([&a]);
        let err = roots.open("nope.bin").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("nope.bin"), "{msg}");
        assert!(msg.contains(&a.display().to_string()), "{msg}");
    }

    #[test]
    fn no_roots_is_an_error() {
        assert!(AssetRoots::default().open("x").is_err());
    }

    #[test]
    fn path_list_appends_entries() {
        let list = std::env::join_paths(["/one", "/two"]).unwrap();
        let roots = AssetRoots::new(["/zero"]).with_path_list(&list);
        assert_eq!(
            roots.roots(),
            &[PathBuf::from("/zero"), PathBuf::from("/one"), PathBuf::from("/two")]
        );
    }
}
