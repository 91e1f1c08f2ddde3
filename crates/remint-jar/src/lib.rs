//! Jar container I/O.
//!
//! Jars are plain zip archives. Class entries live at
//! `<internal name>.class`, so entry names double as class name keys; a
//! leading `/` on an entry name is stripped to keep that correspondence.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub type Result<T> = std::result::Result<T, JarError>;

#[derive(Debug, thiserror::Error)]
pub enum JarError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error in {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

fn normalize_entry_name(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

/// Read-only view of one jar.
pub struct JarReader {
    path: PathBuf,
    archive: ZipArchive<File>,
}

impl JarReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let archive = ZipArchive::new(file).map_err(|source| JarError::Zip {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, archive })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Iterates `(entry_name, content)` for every non-directory entry.
    pub fn entries(&mut self) -> Entries<'_> {
        Entries {
            reader: self,
            index: 0,
        }
    }

    /// Reads a single entry by name, or `None` if absent.
    pub fn read_entry(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path.clone();
        let mut file = match self.archive.by_name(normalize_entry_name(name)) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(source) => return Err(JarError::Zip { path, source }),
        };
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }
}

pub struct Entries<'a> {
    reader: &'a mut JarReader,
    index: usize,
}

impl Iterator for Entries<'_> {
    type Item = Result<(String, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.index >= self.reader.archive.len() {
                return None;
            }
            let i = self.index;
            self.index += 1;

            let mut file = match self.reader.archive.by_index(i) {
                Ok(file) => file,
                Err(source) => {
                    return Some(Err(JarError::Zip {
                        path: self.reader.path.clone(),
                        source,
                    }))
                }
            };
            if !file.is_file() {
                continue;
            }

            let name = normalize_entry_name(file.name()).to_string();
            let mut bytes = Vec::with_capacity(file.size() as usize);
            if let Err(err) = file.read_to_end(&mut bytes) {
                return Some(Err(err.into()));
            }
            return Some(Ok((name, bytes)));
        }
    }
}

/// Write half: entries are written in insertion order.
pub struct JarWriter {
    path: PathBuf,
    zip: ZipWriter<BufWriter<File>>,
}

impl JarWriter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            zip: ZipWriter::new(BufWriter::new(file)),
        })
    }

    pub fn add(&mut self, name: &str, content: &[u8]) -> Result<()> {
        let options = SimpleFileOptions::default();
        self.zip
            .start_file(normalize_entry_name(name), options)
            .map_err(|source| JarError::Zip {
                path: self.path.clone(),
                source,
            })?;
        self.zip.write_all(content)?;
        Ok(())
    }

    /// Finishes the central directory and flushes the archive.
    pub fn finish(mut self) -> Result<()> {
        let mut inner = self.zip.finish().map_err(|source| JarError::Zip {
            path: self.path.clone(),
            source,
        })?;
        inner.flush()?;
        Ok(())
    }
}

/// A composite read-only view over several jars, closed together on drop.
///
/// Entries are yielded jar by jar in the order the jars were opened; the
/// first jar containing a given entry name wins for keyed lookups.
pub struct JarSet {
    jars: Vec<JarReader>,
}

impl JarSet {
    pub fn open_all<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Result<Self> {
        let mut jars = Vec::new();
        for path in paths {
            jars.push(JarReader::open(path)?);
        }
        Ok(Self { jars })
    }

    pub fn jars(&mut self) -> &mut [JarReader] {
        &mut self.jars
    }

    /// Reads every non-directory entry from every jar, in jar order.
    pub fn read_all(&mut self) -> Result<Vec<(String, Vec<u8>)>> {
        let mut out = Vec::new();
        for jar in &mut self.jars {
            for entry in jar.entries() {
                out.push(entry?);
            }
        }
        Ok(out)
    }

    /// Reads an entry by name from the first jar that contains it.
    pub fn read_entry(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        for jar in &mut self.jars {
            if let Some(bytes) = jar.read_entry(name)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }
}
