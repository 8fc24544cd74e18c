use log::{info, warn};

use crate::downloader;
use crate::engine::{Edit, apply_edit};
use crate::error::{GradeError, GradeResult};
use crate::loader::{self, ImportGuard, ImportTicket};
use crate::saving::{KeyValueStore, load_book, save_semesters};
use crate::semester::{CumulativeSummary, GradeBook, Semester, SemesterSummary};
use crate::settings::{Settings, Theme};
use crate::subject::Subject;

/// Subject snapshot taken when the edit dialog opens.
#[derive(Clone, Debug, PartialEq)]
struct EditorBackup {
    semester: usize,
    subject: usize,
    snapshot: Subject,
}

/// The grade app state: one grade book snapshot, the settings, and the store
/// both are written back to after every change.
pub struct GradeApp<S: KeyValueStore> {
    store: S,
    book: GradeBook,
    settings: Settings,
    editor: Option<EditorBackup>,
    imports: ImportGuard,
}

impl<S: KeyValueStore> GradeApp<S> {
    /// Reads the saved book and settings from `store`.
    pub fn load(store: S) -> Self {
        let settings = Settings::load(&store);
        let mut book = load_book(&store);
        book.cumulative_target = settings.cumulative_target;
        info!(
            "loaded {} semesters, theme {}",
            book.semesters.len(),
            settings.theme.as_str()
        );
        GradeApp {
            store,
            book,
            settings,
            editor: None,
            imports: ImportGuard::new(),
        }
    }

    pub fn book(&self) -> &GradeBook {
        &self.book
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one edit through the engine and keeps the result. On error the
    /// snapshot is left as it was.
    pub fn apply(&mut self, edit: &Edit) -> GradeResult<&GradeBook> {
        let next = apply_edit(&self.book, edit)?;
        let target_changed = next.cumulative_target != self.book.cumulative_target;
        self.book = next;
        self.persist_semesters();
        if target_changed {
            self.settings.cumulative_target = self.book.cumulative_target;
            self.persist_settings();
        }
        Ok(&self.book)
    }

    pub fn set_cumulative_target(&mut self, value: &str) -> GradeResult<&GradeBook> {
        self.apply(&Edit::CumulativeTarget {
            value: value.to_string(),
        })
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.settings.theme = self.settings.theme.toggled();
        self.persist_settings();
        self.settings.theme
    }

    pub fn semester_summary(&self, semester: usize) -> GradeResult<SemesterSummary> {
        self.book
            .semesters
            .get(semester)
            .map(Semester::summary)
            .ok_or_else(|| GradeError::SemesterNotFound(format!("#{}", semester)))
    }

    pub fn cumulative_summary(&self) -> CumulativeSummary {
        self.book.cumulative_summary()
    }

    /// Remembers the subject as it is now so `cancel_editor` can put it back.
    pub fn open_editor(&mut self, semester: usize, subject: usize) -> GradeResult<&Subject> {
        let snapshot = self
            .book
            .semesters
            .get(semester)
            .ok_or_else(|| GradeError::SemesterNotFound(format!("#{}", semester)))?
            .subjects
            .get(subject)
            .ok_or(GradeError::SubjectNotFound { semester, subject })?
            .clone();
        self.editor = Some(EditorBackup {
            semester,
            subject,
            snapshot,
        });
        Ok(&self.book.semesters[semester].subjects[subject])
    }

    /// Keeps the edits made while the dialog was open.
    pub fn close_editor(&mut self) {
        self.editor = None;
    }

    /// Restores the subject saved by `open_editor`. Does nothing when no
    /// dialog is open.
    pub fn cancel_editor(&mut self) -> GradeResult<&GradeBook> {
        if let Some(backup) = self.editor.take() {
            self.apply(&Edit::RestoreSubject {
                semester: backup.semester,
                subject: backup.subject,
                snapshot: Box::new(backup.snapshot),
            })?;
        }
        Ok(&self.book)
    }

    /// Starts an import; results of earlier imports will be discarded.
    pub fn begin_import(&mut self) -> ImportTicket {
        let ticket = self.imports.begin();
        info!("import #{} started", ticket.value());
        ticket
    }

    /// Replaces every semester with the import result when `ticket` is still
    /// the latest import. Failed or stale imports leave the book untouched.
    pub fn finish_import(
        &mut self,
        ticket: ImportTicket,
        result: GradeResult<Vec<Semester>>,
    ) -> GradeResult<&GradeBook> {
        let semesters = self.imports.accept(ticket, result)?;
        info!(
            "import #{} finished with {} semesters",
            ticket.value(),
            semesters.len()
        );
        self.editor = None;
        self.book.semesters = semesters;
        self.persist_semesters();
        Ok(&self.book)
    }

    pub fn import_pdf(&mut self, bytes: &[u8]) -> GradeResult<&GradeBook> {
        let ticket = self.begin_import();
        let result = loader::import_pdf(bytes);
        self.finish_import(ticket, result)
    }

    pub fn import_remote(&mut self, json: &str) -> GradeResult<&GradeBook> {
        let ticket = self.begin_import();
        let result = loader::import_remote_json(json);
        self.finish_import(ticket, result)
    }

    pub fn export_xlsx(&self) -> GradeResult<Vec<u8>> {
        downloader::to_xlsx(&self.book)
    }

    fn persist_semesters(&mut self) {
        if let Err(err) = save_semesters(&mut self.store, &self.book.semesters) {
            warn!("could not save semesters: {}", err);
        }
    }

    fn persist_settings(&mut self) {
        if let Err(err) = self.settings.persist(&mut self.store) {
            warn!("could not save settings: {}", err);
        }
    }
}
