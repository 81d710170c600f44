use crate::core::deadline::Deadline;
use crate::domain::model::ResolvedFile;
use crate::utils::error::{CrawlError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Suffix Chromium gives a download that is still being written.
const PARTIAL_SUFFIX: &str = "crdownload";

/// Regular files present before an export, with their modification times.
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshot {
    files: HashMap<PathBuf, SystemTime>,
}

impl DirectorySnapshot {
    /// True when `file` was already there, unchanged, when the snapshot was taken.
    pub fn contains(&self, file: &ResolvedFile) -> bool {
        self.files.get(&file.path) == Some(&file.modified)
    }
}

/// Picks the freshest new file in the download directory and gives it its
/// canonical name.
///
/// The browser chooses the downloaded file's name, so recency is the only way
/// to tell which entry is the export. Only entries that appeared or changed
/// after the [`DirectorySnapshot`] taken before the export are candidates;
/// files collected earlier in the run are never picked again. This only holds
/// while nothing else writes to the directory during the crawl. Entries with
/// equal timestamps resolve to the first one in directory listing order, which
/// is platform-defined.
#[derive(Debug, Clone)]
pub struct DownloadResolver {
    directory: PathBuf,
}

impl DownloadResolver {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn files(&self) -> Result<Vec<ResolvedFile>> {
        let entries =
            fs::read_dir(&self.directory).map_err(|e| CrawlError::system(&self.directory, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CrawlError::system(&self.directory, e))?;
            let path = entry.path();
            let metadata = fs::metadata(&path).map_err(|e| CrawlError::system(&path, e))?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata
                .modified()
                .map_err(|e| CrawlError::system(&path, e))?;
            files.push(ResolvedFile { path, modified });
        }
        Ok(files)
    }

    /// Records what is in the directory before an export is triggered.
    pub fn snapshot(&self) -> Result<DirectorySnapshot> {
        let files = self
            .files()?
            .into_iter()
            .map(|f| (f.path, f.modified))
            .collect();
        Ok(DirectorySnapshot { files })
    }

    /// The regular file with the greatest modification time among those not
    /// in `before`, if any.
    pub fn newest(&self, before: &DirectorySnapshot) -> Result<Option<ResolvedFile>> {
        let mut newest: Option<ResolvedFile> = None;
        for file in self.files()? {
            if before.contains(&file) {
                continue;
            }
            if newest.as_ref().map_or(true, |n| file.modified > n.modified) {
                newest = Some(file);
            }
        }
        Ok(newest)
    }

    /// Gives the browser `settle` to finish writing, then resolves.
    pub async fn await_download(
        &self,
        deadline: &Deadline,
        canonical_name: &str,
        before: &DirectorySnapshot,
        settle: Duration,
    ) -> Result<PathBuf> {
        tracing::debug!("Waiting {:?} for the download to land", settle);
        deadline.settle("download settle", settle).await?;
        self.resolve(canonical_name, before)
    }

    /// Renames the newest file not in `before` to `canonical_name` and
    /// returns its new path.
    pub fn resolve(&self, canonical_name: &str, before: &DirectorySnapshot) -> Result<PathBuf> {
        let target = self.directory.join(canonical_name);
        let newest = self.newest(before)?.ok_or_else(|| {
            CrawlError::output(format!(
                "no new download appeared in {}",
                self.directory.display()
            ))
        })?;

        if newest.path.extension().is_some_and(|ext| ext == PARTIAL_SUFFIX) {
            return Err(CrawlError::output(format!(
                "download still in progress ({})",
                newest.path.display()
            )));
        }

        tracing::debug!(
            "Newest download: {} (modified {})",
            newest.path.display(),
            DateTime::<Utc>::from(newest.modified).to_rfc3339()
        );

        if newest.path != target {
            fs::rename(&newest.path, &target).map_err(|e| CrawlError::system(&newest.path, e))?;
        }

        if !target.is_file() {
            return Err(CrawlError::output(format!(
                "download of {} not completed",
                target.display()
            )));
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::path::Path;
    use tempfile::TempDir;

    fn nothing_before() -> DirectorySnapshot {
        DirectorySnapshot::default()
    }

    fn write_at(dir: &Path, name: &str, contents: &str, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        path
    }

    #[test]
    fn picks_strictly_newest_file() {
        let dir = TempDir::new().unwrap();
        write_at(dir.path(), "old.xlsx", "old", 300);
        write_at(dir.path(), "fresh", "fresh", 5);
        write_at(dir.path(), "older.xlsx", "older", 600);

        let newest = DownloadResolver::new(dir.path())
            .newest(&nothing_before())
            .unwrap()
            .unwrap();
        assert_eq!(newest.path.file_name().unwrap(), "fresh");
    }

    #[test]
    fn rename_moves_content_unchanged() {
        let dir = TempDir::new().unwrap();
        write_at(dir.path(), "a.xlsx", "previous", 100);
        write_at(dir.path(), "6b1f2c0e-guid", "payload", 1);

        let resolver = DownloadResolver::new(dir.path());
        let path = resolver
            .resolve("membros-ativos-contracheque-03-2021.xlsx", &nothing_before())
            .unwrap();

        assert_eq!(path, dir.path().join("membros-ativos-contracheque-03-2021.xlsx"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "payload");
        assert!(!dir.path().join("6b1f2c0e-guid").exists());
        assert_eq!(fs::read_to_string(dir.path().join("a.xlsx")).unwrap(), "previous");
    }

    #[test]
    fn resolving_twice_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        write_at(dir.path(), "download", "payload", 1);

        let resolver = DownloadResolver::new(dir.path());
        let before = nothing_before();
        let first = resolver
            .resolve("membros-ativos-contracheque-01-2018.xlsx", &before)
            .unwrap();
        let second = resolver
            .resolve("membros-ativos-contracheque-01-2018.xlsx", &before)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(&second).unwrap(), "payload");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn empty_directory_is_an_output_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let err = DownloadResolver::new(dir.path()).resolve("x.xlsx", &nothing_before()).unwrap_err();
        assert!(matches!(err, CrawlError::Output { .. }));
    }

    #[test]
    fn missing_directory_is_a_system_error() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("gone");

        let err = DownloadResolver::new(&gone).resolve("x.xlsx", &nothing_before()).unwrap_err();
        assert!(matches!(err, CrawlError::System { .. }));
        assert!(!gone.join("x.xlsx").exists());
    }

    #[test]
    fn partial_download_is_not_renamed() {
        let dir = TempDir::new().unwrap();
        write_at(dir.path(), "a.xlsx", "previous", 100);
        let partial = write_at(dir.path(), "Unconfirmed 123.crdownload", "half", 1);

        let err = DownloadResolver::new(dir.path()).resolve("x.xlsx", &nothing_before()).unwrap_err();
        assert!(matches!(err, CrawlError::Output { .. }));
        assert!(partial.exists());
    }

    #[test]
    fn files_present_before_the_export_are_never_picked() {
        let dir = TempDir::new().unwrap();
        let payroll = write_at(dir.path(), "membros-ativos-contracheque-03-2021.xlsx", "payroll", 30);
        let resolver = DownloadResolver::new(dir.path());
        let before = resolver.snapshot().unwrap();

        let err = resolver
            .resolve("membros-ativos-verbas-indenizatorias-03-2021.xlsx", &before)
            .unwrap_err();
        assert!(matches!(err, CrawlError::Output { .. }));
        assert_eq!(fs::read_to_string(&payroll).unwrap(), "payroll");

        write_at(dir.path(), "export.xlsx", "indemnities", 40);
        let path = resolver
            .resolve("membros-ativos-verbas-indenizatorias-03-2021.xlsx", &before)
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "indemnities");
        assert_eq!(fs::read_to_string(&payroll).unwrap(), "payroll");
    }
}
