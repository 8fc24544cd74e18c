use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::warn;

use crate::error::{GradeError, GradeResult};
use crate::semester::{GradeBook, Semester};
use crate::subject::optional_number_text;

pub const SEMESTERS_KEY: &str = "grade_app_semesters";
pub const CUMULATIVE_TARGET_KEY: &str = "grade_app_cumulative_target";
pub const THEME_KEY: &str = "grade_app_theme";

/// String key-value storage the app persists into.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> GradeResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> GradeResult<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> GradeResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> GradeResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// All entries in one gzip-compressed JSON file, rewritten on every `set`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file is an empty store, and so is
    /// one that no longer decodes; it is replaced on the next `set`.
    pub fn open(path: impl AsRef<Path>) -> GradeResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match File::open(&path) {
            Ok(file) => {
                let reader = BufReader::new(GzDecoder::new(file));
                serde_json::from_reader(reader).unwrap_or_else(|err| {
                    warn!("{} is unreadable, starting empty: {}", path.display(), err);
                    HashMap::new()
                })
            }
            Err(err) if err.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(FileStore { path, entries })
    }

    fn flush(&self) -> GradeResult<()> {
        let file = File::create(&self.path)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut writer = BufWriter::new(encoder);
        serde_json::to_writer(&mut writer, &self.entries)?;
        let encoder = writer
            .into_inner()
            .map_err(|err| GradeError::Storage(err.to_string()))?;
        encoder.finish()?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> GradeResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> GradeResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

/// Reads the saved grade book. Missing or unreadable data falls back to the
/// first-launch book; semesters or subjects saved without an id get one.
pub fn load_book(store: &impl KeyValueStore) -> GradeBook {
    let semesters = match store.get(SEMESTERS_KEY) {
        Ok(Some(raw)) => match serde_json::from_str::<Vec<Semester>>(&raw) {
            Ok(semesters) => Some(semesters),
            Err(err) => {
                warn!("saved semesters are unreadable, starting over: {}", err);
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            warn!("could not read saved semesters: {}", err);
            None
        }
    };

    let mut book = match semesters {
        Some(semesters) => GradeBook {
            semesters,
            cumulative_target: None,
        },
        None => GradeBook::initial(),
    };
    book.cumulative_target = load_cumulative_target(store);
    book.ensure_ids();
    book
}

pub fn save_semesters(store: &mut impl KeyValueStore, semesters: &[Semester]) -> GradeResult<()> {
    let json = serde_json::to_string(semesters)?;
    store.set(SEMESTERS_KEY, &json)
}

pub fn load_cumulative_target(store: &impl KeyValueStore) -> Option<f64> {
    match store.get(CUMULATIVE_TARGET_KEY) {
        Ok(Some(raw)) => optional_number_text::parse_lenient(&raw),
        Ok(None) => None,
        Err(err) => {
            warn!("could not read saved cumulative target: {}", err);
            None
        }
    }
}

pub fn save_cumulative_target(store: &mut impl KeyValueStore, target: Option<f64>) -> GradeResult<()> {
    let text = target.map(|v| v.to_string()).unwrap_or_default();
    store.set(CUMULATIVE_TARGET_KEY, &text)
}

pub fn save_book(store: &mut impl KeyValueStore, book: &GradeBook) -> GradeResult<()> {
    save_semesters(store, &book.semesters)?;
    save_cumulative_target(store, book.cumulative_target)
}
