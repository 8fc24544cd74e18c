/*!
# Grade Tracker

A grade-tracking engine for university transcripts, built in Rust. It keeps a
table of semesters and courses, works out the component scores a student still
needs to reach a target, and imports transcripts straight from PDF.

## Overview

Each course has four graded components (progress, midterm, practice, final)
weighted 20/20/20/40 by default. Targets can be set at three levels:

- a course's expected score, back-solved into minimum scores for its empty
  components
- a semester's expected average, spread over its open courses
- a cumulative target, spread over every semester still in progress

Every edit is applied to an immutable snapshot and returns a new one with all
derived fields re-solved, which keeps the engine deterministic and easy to test.

## Architecture

### Engine Layer
- **subject**, **semester**: records, completeness, credit-weighted averages
- **engine**: input normalization, required-scores solver, target distribution,
  the `Edit` update protocol

### Import / Export Layer
- **pdf_reader**: walks PDF content streams into positioned text fragments
- **pdf_lines**: rebuilds course rows from those fragments
- **loader**: PDF and remote-extraction JSON into semesters, stale-import guard
- **downloader**: XLSX (one sheet per semester) and CSV export

### Data Persistence Layer
- **saving**: key-value storage port, in-memory and gzip-compressed file stores
- **settings**: theme and cumulative target
- **session**: `GradeApp`, owning the snapshot and writing it back on change

### Other
- **eligibility**: graduation requirements check
- **web**: `wasm-bindgen` bindings (feature `web`)

## Usage

```no_run
use gradebook::engine::Edit;
use gradebook::saving::FileStore;
use gradebook::session::GradeApp;
use gradebook::subject::{Component, SubjectField};

let store = FileStore::open("grades.json.gz").unwrap();
let mut app = GradeApp::load(store);
app.apply(&Edit::SubjectField {
    semester: 0,
    subject: 0,
    field: SubjectField::Score(Component::Progress),
    value: "8,5".to_string(),
})
.unwrap();
println!("{:?}", app.cumulative_summary());
```
*/

pub mod downloader;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod loader;
pub mod pdf_lines;
pub mod pdf_reader;
pub mod saving;
pub mod semester;
pub mod session;
pub mod settings;
pub mod subject;
#[cfg(feature = "web")]
pub mod web;

pub use engine::{Edit, apply_edit};
pub use error::{GradeError, GradeResult};
pub use semester::{GradeBook, Semester};
pub use session::GradeApp;
pub use subject::{Component, Subject, SubjectField};
