use std::fs;

use gradebook::engine::Edit;
use gradebook::saving::{FileStore, KeyValueStore, SEMESTERS_KEY, THEME_KEY, load_book};
use gradebook::session::GradeApp;
use gradebook::settings::Theme;
use gradebook::subject::{Component, SubjectField};
use tempfile::tempdir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn file_store_survives_reopen() {
    init_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("grades.json.gz");

    {
        let mut app = GradeApp::load(FileStore::open(&path).unwrap());
        app.apply(&Edit::SubjectField {
            semester: 0,
            subject: 0,
            field: SubjectField::CourseCode,
            value: " IT001 ".to_string(),
        })
        .unwrap();
        app.apply(&Edit::SubjectField {
            semester: 0,
            subject: 0,
            field: SubjectField::Score(Component::Midterm),
            value: "7,5".to_string(),
        })
        .unwrap();
        app.set_cumulative_target("8").unwrap();
        app.toggle_theme();
    }
    assert!(path.exists());

    let app = GradeApp::load(FileStore::open(&path).unwrap());
    let subject = &app.book().semesters[0].subjects[0];
    assert_eq!(subject.course_code, "IT001");
    assert_eq!(subject.midterm_score, Some(7.5));
    assert_eq!(app.book().cumulative_target, Some(8.0));
    assert_eq!(app.settings().theme, Theme::Light);
    println!("✓ grade book and settings reloaded from {}", path.display());
}

#[test]
fn ids_are_stable_across_reloads() {
    init_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("grades.json.gz");

    let mut app = GradeApp::load(FileStore::open(&path).unwrap());
    app.apply(&Edit::AddSubject { semester: 0 }).unwrap();
    let semester_id = app.book().semesters[0].id.clone();
    let subject_id = app.book().semesters[0].subjects[1].id.clone();
    drop(app);

    let reloaded = load_book(&FileStore::open(&path).unwrap());
    assert_eq!(reloaded.semesters[0].id, semester_id);
    assert_eq!(reloaded.semesters[0].subjects[1].id, subject_id);
}

#[test]
fn missing_file_is_an_empty_store() {
    let dir = tempdir().unwrap();
    let store = FileStore::open(dir.path().join("nothing-here.gz")).unwrap();
    assert_eq!(store.get(SEMESTERS_KEY).unwrap(), None);
    assert_eq!(store.get(THEME_KEY).unwrap(), None);
}

#[test]
fn corrupt_file_starts_from_defaults() {
    init_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.gz");
    fs::write(&path, b"not gzip at all").unwrap();

    let mut app = GradeApp::load(FileStore::open(&path).unwrap());
    assert_eq!(app.book().semesters.len(), 1);
    assert_eq!(app.book().semesters[0].name, "Học kỳ 1");
    assert_eq!(app.settings().theme, Theme::Dark);

    app.apply(&Edit::AddSemester).unwrap();
    let reloaded = load_book(&FileStore::open(&path).unwrap());
    assert_eq!(reloaded.semesters.len(), 2);
    println!("✓ corrupt save replaced by a fresh grade book");
}
