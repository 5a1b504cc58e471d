use anyhow::Result;
use flate2::read::GzDecoder;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;
use xz2::read::XzDecoder;

use crate::error::Error;
use crate::runtime::Runtime;

use super::desc::Desc;
use super::{IndexEntry, IndexReader};

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const XZ_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
const BZIP2_MAGIC: [u8; 3] = *b"BZh";

/// Native reader for a pacman repository database tarball.
pub struct PacmanDatabase<'a, R: Runtime> {
    runtime: &'a R,
    path: PathBuf,
}

impl<'a, R: Runtime> PacmanDatabase<'a, R> {
    pub fn new(runtime: &'a R, path: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unreadable(&self, reason: impl ToString) -> anyhow::Error {
        Error::IndexUnreadable {
            path: self.path.clone(),
            missing: false,
            reason: reason.to_string(),
        }
        .into()
    }

    fn decompress(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if data.starts_with(&GZIP_MAGIC) {
            debug!("{:?} is gzip compressed", self.path);
            GzDecoder::new(data.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| self.unreadable(e))?;
        } else if data.starts_with(&XZ_MAGIC) {
            debug!("{:?} is xz compressed", self.path);
            XzDecoder::new(data.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| self.unreadable(e))?;
        } else if data.starts_with(&ZSTD_MAGIC) {
            debug!("{:?} is zstd compressed", self.path);
            out = zstd::decode_all(data.as_slice()).map_err(|e| self.unreadable(e))?;
        } else if data.starts_with(&BZIP2_MAGIC) {
            return Err(self.unreadable("bzip2 compressed databases are not supported"));
        } else {
            out = data;
        }
        Ok(out)
    }
}

impl<R: Runtime> IndexReader for PacmanDatabase<'_, R> {
    #[tracing::instrument(skip(self), fields(path = ?self.path))]
    fn list_entries(&self) -> Result<BTreeMap<String, IndexEntry>> {
        if !self.runtime.exists(&self.path) {
            return Err(Error::IndexUnreadable {
                path: self.path.clone(),
                missing: true,
                reason: "no such file".to_string(),
            }
            .into());
        }

        let mut data = Vec::new();
        self.runtime
            .open(&self.path)
            .map_err(|e| self.unreadable(e))?
            .read_to_end(&mut data)
            .map_err(|e| self.unreadable(e))?;
        let tarball = self.decompress(data)?;

        let mut entries = BTreeMap::new();
        let mut archive = Archive::new(tarball.as_slice());
        for member in archive.entries().map_err(|e| self.unreadable(e))? {
            let mut member = member.map_err(|e| self.unreadable(e))?;
            let member_path = member
                .path()
                .map_err(|e| self.unreadable(e))?
                .to_string_lossy()
                .into_owned();
            if !member_path.ends_with("/desc") {
                continue;
            }

            let mut content = String::new();
            member
                .read_to_string(&mut content)
                .map_err(|e| self.unreadable(format!("{}: {}", member_path, e)))?;
            let desc = Desc::parse(&content);

            let (Some(name), Some(version)) = (desc.get("NAME"), desc.get("VERSION")) else {
                return Err(self.unreadable(format!(
                    "{} lacks %NAME% or %VERSION%",
                    member_path
                )));
            };
            let entry = IndexEntry {
                name: name.to_string(),
                version: version.to_string(),
                filename: desc.get("FILENAME").map(str::to_string),
            };
            if let Some(previous) = entries.insert(entry.name.clone(), entry) {
                warn!(
                    "Database {:?} lists {} more than once; using the last entry",
                    self.path, previous.name
                );
            }
        }

        debug!("Read {} entries from {:?}", entries.len(), self.path);
        Ok(entries)
    }
}

/// Repository name of a database path: `myrepo` for `myrepo.db.tar.gz`.
pub fn repository_name(database: &Path) -> Option<&str> {
    let filename = database.file_name()?.to_str()?;
    let at = filename.rfind(".db")?;
    let rest = &filename[at + 3..];
    (at > 0 && (rest.is_empty() || rest.starts_with('.'))).then(|| &filename[..at])
}

/// The database plus the companion files `repo-add` maintains next to it
/// (`<repo>.db` link, `<repo>.files` and its tarball).
pub fn database_files(database: &Path) -> Vec<PathBuf> {
    let mut files = vec![database.to_path_buf()];
    let (Some(repo), Some(filename)) = (
        repository_name(database),
        database.file_name().and_then(|s| s.to_str()),
    ) else {
        return files;
    };
    let suffix = &filename[repo.len() + 3..];
    let dir = database.parent().unwrap_or(Path::new(""));

    for name in [
        format!("{}.db", repo),
        format!("{}.files", repo),
        format!("{}.files{}", repo, suffix),
    ] {
        let path = dir.join(name);
        if !files.contains(&path) {
            files.push(path);
        }
    }
    files
}
