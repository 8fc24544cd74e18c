use gradebook::engine::{Edit, is_out_of_reach};
use gradebook::saving::MemoryStore;
use gradebook::session::GradeApp;
use gradebook::subject::{Component, SubjectField};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn field(semester: usize, subject: usize, field: SubjectField, value: &str) -> Edit {
    Edit::SubjectField {
        semester,
        subject,
        field,
        value: value.to_string(),
    }
}

fn fill_course(app: &mut GradeApp<MemoryStore>, semester: usize, subject: usize, credits: &str, scores: [&str; 4]) {
    app.apply(&field(semester, subject, SubjectField::Credits, credits))
        .unwrap();
    for (component, value) in Component::ALL.into_iter().zip(scores) {
        app.apply(&field(semester, subject, SubjectField::Score(component), value))
            .unwrap();
    }
}

#[test]
fn semester_target_reaches_open_course() {
    init_logging();
    let mut app = GradeApp::load(MemoryStore::new());
    app.apply(&Edit::AddSubject { semester: 0 }).unwrap();

    fill_course(&mut app, 0, 0, "3", ["8", "8", "8", "8"]);
    app.apply(&field(0, 1, SubjectField::Credits, "2")).unwrap();
    app.apply(&Edit::SemesterTarget {
        semester: 0,
        value: "7".to_string(),
    })
    .unwrap();

    let open = &app.book().semesters[0].subjects[1];
    assert_eq!(open.expected_score_text(), "5.50");
    assert_eq!(open.min_progress_score, Some(5.5));
    assert_eq!(open.min_final_score, Some(5.5));
    println!("✓ semester target distributed to the open course");

    app.apply(&field(0, 1, SubjectField::Score(Component::Progress), "5"))
        .unwrap();
    let open = &app.book().semesters[0].subjects[1];
    assert_eq!(open.min_progress_score, None);
    assert_eq!(open.min_final_score, Some(5.63));
    println!("✓ entered component re-solves the remaining minimums");
}

#[test]
fn unreachable_target_is_reported_not_clamped() {
    init_logging();
    let mut app = GradeApp::load(MemoryStore::new());
    app.apply(&field(0, 0, SubjectField::Credits, "3")).unwrap();
    for component in [Component::Progress, Component::Midterm, Component::Practice] {
        app.apply(&field(0, 0, SubjectField::Score(component), "0"))
            .unwrap();
    }
    app.apply(&field(0, 0, SubjectField::ExpectedScore, "6"))
        .unwrap();

    let subject = &app.book().semesters[0].subjects[0];
    assert_eq!(subject.min_final_score, Some(15.0));
    assert!(is_out_of_reach(subject));
}

#[test]
fn cumulative_target_flows_into_unfinished_semesters() {
    init_logging();
    let mut app = GradeApp::load(MemoryStore::new());
    fill_course(&mut app, 0, 0, "3", ["8", "8", "8", "8"]);

    app.apply(&Edit::AddSemester).unwrap();
    app.apply(&field(1, 0, SubjectField::Credits, "2")).unwrap();
    app.apply(&Edit::AddSemester).unwrap();
    app.apply(&field(2, 0, SubjectField::Credits, "1")).unwrap();

    app.set_cumulative_target("7").unwrap();
    let book = app.book();
    assert_eq!(book.cumulative_target, Some(7.0));
    assert_eq!(book.semesters[0].expected_average, None);
    // 7 * 6 credits - 24 locked points = 18 over 3 open credits.
    assert_eq!(book.semesters[1].expected_average, Some(6.0));
    assert_eq!(book.semesters[2].expected_average, Some(6.0));
    assert_eq!(book.semesters[2].subjects[0].expected_score, Some(6.0));
    assert_eq!(app.settings().cumulative_target, Some(7.0));
    println!("✓ cumulative target reached every unfinished semester");

    app.apply(&Edit::SemesterTarget {
        semester: 1,
        value: "9".to_string(),
    })
    .unwrap();
    let book = app.book();
    assert_eq!(book.semesters[1].expected_average, Some(9.0));
    // 42 - 24 - 18 = 0 points left for the last semester.
    assert_eq!(book.semesters[2].expected_average, Some(0.0));
}

#[test]
fn summaries_follow_completed_courses() {
    init_logging();
    let mut app = GradeApp::load(MemoryStore::new());
    app.apply(&Edit::AddSubject { semester: 0 }).unwrap();
    fill_course(&mut app, 0, 0, "3", ["9", "9", "9", "9"]);
    fill_course(&mut app, 0, 1, "1", ["4", "4", "4", "4"]);

    let summary = app.semester_summary(0).unwrap();
    assert!((summary.average_score.unwrap() - 7.75).abs() < 1e-9);
    assert_eq!(summary.credits_earned, 3.0);

    let cumulative = app.cumulative_summary();
    assert_eq!(cumulative.total_credits_accumulated, 3.0);
    assert!((cumulative.cumulative_gpa.unwrap() - 7.75).abs() < 1e-9);
    assert!(app.semester_summary(3).is_err());
}

#[test]
fn delete_and_rename_semesters() {
    init_logging();
    let mut app = GradeApp::load(MemoryStore::new());
    app.apply(&Edit::AddSemester).unwrap();
    app.apply(&Edit::RenameSemester {
        semester: 1,
        name: "Học kỳ hè".to_string(),
    })
    .unwrap();
    assert_eq!(app.book().semesters[1].name, "Học kỳ hè");

    let id = app.book().semesters[0].id.clone();
    app.apply(&Edit::DeleteSemester { id: id.clone() }).unwrap();
    assert_eq!(app.book().semesters.len(), 1);
    assert!(app.apply(&Edit::DeleteSemester { id }).is_err());
}
