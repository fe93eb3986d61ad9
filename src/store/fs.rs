//! Filesystem-backed page store

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::locks::TitleLocks;
use super::{LoadOutcome, Page, StoreError, PAGE_SUFFIX};

/// Permission bits for newly created page files
#[cfg(unix)]
const PAGE_FILE_MODE: u32 = 0o600;

/// Flat directory of `<title>.txt` files
pub struct PageStore {
    dir: PathBuf,
    locks: TitleLocks,
}

impl PageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: TitleLocks::new(),
        }
    }

    /// Storage location for a title (no escaping is applied)
    pub fn path_for(&self, title: &str) -> PathBuf {
        self.dir.join(format!("{title}{PAGE_SUFFIX}"))
    }

    /// Read the whole body of a page
    pub async fn load(&self, title: &str) -> LoadOutcome {
        let path = self.path_for(title);
        match fs::read(&path).await {
            Ok(body) => LoadOutcome::Found(Page::new(title, body)),
            Err(e) if e.kind() == ErrorKind::NotFound => LoadOutcome::NotFound,
            Err(source) => LoadOutcome::StorageFault(StoreError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Replace the page's content with `page.body`, creating the file if needed
    pub async fn save(&self, page: &Page) -> Result<(), StoreError> {
        let path = self.path_for(&page.title);
        let _guard = self.locks.acquire(&page.title).await;
        write_file(&path, &page.body)
            .await
            .map_err(|source| StoreError::Write {
                path: path.display().to_string(),
                source,
            })
    }

    /// Remove the page's file; a missing page is an error
    pub async fn delete(&self, title: &str) -> Result<(), StoreError> {
        let path = self.path_for(title);
        let _guard = self.locks.acquire(title).await;
        fs::remove_file(&path)
            .await
            .map_err(|source| StoreError::Remove {
                path: path.display().to_string(),
                source,
            })
    }

    /// Titles of all stored pages, in file name order
    pub async fn enumerate(&self) -> Result<Vec<String>, StoreError> {
        let list_err = |source| StoreError::List {
            path: self.dir.display().to_string(),
            source,
        };

        let mut entries = fs::read_dir(&self.dir).await.map_err(list_err)?;
        let mut titles = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }
            // Non-UTF-8 file names cannot be titles
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if let Some(title) = name.strip_suffix(PAGE_SUFFIX) {
                titles.push(title.to_string());
            }
        }
        titles.sort_unstable();
        Ok(titles)
    }
}

/// Truncating write of the whole buffer
async fn write_file(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(PAGE_FILE_MODE);

    let mut file = options.open(path).await?;
    file.write_all(body).await?;
    file.flush().await
}
