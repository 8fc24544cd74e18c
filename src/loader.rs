use log::{info, warn};
use serde::Deserialize;

use crate::error::{GradeError, GradeResult};
use crate::pdf_lines::{CourseRow, SemesterTable, extract_tables};
use crate::pdf_reader::read_pages;
use crate::semester::{Semester, new_semester_id};
use crate::subject::{Component, Subject, new_subject_id, optional_number_text};

/// Name given to the single semester built from a flat remote payload.
pub const FLAT_SEMESTER_NAME: &str = "Học kỳ 1";

/// Import semesters from the bytes of a transcript PDF
///
/// Every page that holds at least one course row becomes one semester. The
/// transcript carries no weights or targets, so rows get the default weights
/// 20/20/20/40, zero minimum scores and a zero expected score.
///
/// # Arguments
/// * `bytes` - Raw contents of the PDF file
///
/// # Returns
/// * `GradeResult<Vec<Semester>>` - The imported semesters, or `Pdf` when the
///   document cannot be read and `NoCourseRows` when nothing importable was found
///
/// # Examples
/// ```no_run
/// use gradebook::loader::import_pdf;
///
/// let bytes = std::fs::read("bang-diem.pdf").unwrap();
/// match import_pdf(&bytes) {
///     Ok(semesters) => println!("Imported {} semesters", semesters.len()),
///     Err(e) => eprintln!("{}", e.user_message()),
/// }
/// ```
pub fn import_pdf(bytes: &[u8]) -> GradeResult<Vec<Semester>> {
    let pages = read_pages(bytes)?;
    let tables = extract_tables(&pages);
    let semesters = semesters_from_tables(&tables);
    if semesters.is_empty() {
        warn!("PDF had {} pages but no course rows", pages.len());
        return Err(GradeError::NoCourseRows);
    }
    info!(
        "imported {} semesters ({} subjects) from PDF",
        semesters.len(),
        semesters.iter().map(|s| s.subjects.len()).sum::<usize>()
    );
    Ok(semesters)
}

/// Convert extracted tables into semesters in the canonical subject shape
///
/// # Arguments
/// * `tables` - Tables produced by the line extractor
///
/// # Returns
/// * `Vec<Semester>` - One semester per table, with fresh ids
pub fn semesters_from_tables(tables: &[SemesterTable]) -> Vec<Semester> {
    tables
        .iter()
        .map(|table| Semester {
            id: new_semester_id(),
            name: table.name.clone(),
            year: String::new(),
            expected_average: None,
            subjects: table.rows.iter().map(subject_from_row).collect(),
        })
        .collect()
}

fn subject_from_row(row: &CourseRow) -> Subject {
    let mut subject = Subject {
        course_code: row.course_code.clone(),
        course_name: row.course_name.clone(),
        credits: optional_number_text::parse_lenient(&row.credits).unwrap_or(0.0),
        expected_score: Some(0.0),
        ..Subject::blank()
    };
    for component in Component::ALL {
        subject.set_component_score(component, row.grade(component));
        subject.set_min_score(component, Some(0.0));
    }
    subject.refresh_score();
    subject
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteScores {
    #[serde(default, deserialize_with = "optional_number_text::deserialize")]
    progress_score: Option<f64>,
    #[serde(default, deserialize_with = "optional_number_text::deserialize")]
    midterm_score: Option<f64>,
    #[serde(default, deserialize_with = "optional_number_text::deserialize")]
    practice_score: Option<f64>,
    #[serde(default, deserialize_with = "optional_number_text::deserialize")]
    finalterm_score: Option<f64>,
    #[serde(default, deserialize_with = "optional_number_text::deserialize")]
    total_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteCourse {
    #[serde(default)]
    course_code: Option<String>,
    #[serde(default)]
    course_name_vi: Option<String>,
    #[serde(default, deserialize_with = "optional_number_text::deserialize")]
    credits: Option<f64>,
    #[serde(default)]
    scores: Option<RemoteScores>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteSemester {
    #[serde(default)]
    semester_name: String,
    #[serde(default)]
    courses: Vec<RemoteCourse>,
}

#[derive(Debug, Deserialize)]
struct RemotePayload {
    #[serde(default)]
    semesters: Option<Vec<RemoteSemester>>,
    #[serde(default)]
    grades: Option<Vec<RemoteCourse>>,
    #[serde(default)]
    error: Option<String>,
}

/// Import semesters from the JSON returned by the remote extraction service
///
/// Accepts `{ "semesters": [...] }` as well as a flat `{ "grades": [...] }`,
/// which is wrapped into one semester named "Học kỳ 1". Remote rows keep
/// their own total score when a component is missing and carry no targets.
///
/// # Arguments
/// * `json` - Response body of the extraction service
///
/// # Returns
/// * `GradeResult<Vec<Semester>>` - The imported semesters, `RemoteExtraction`
///   when the service reported an error or the body has neither shape
pub fn import_remote_json(json: &str) -> GradeResult<Vec<Semester>> {
    let payload: RemotePayload = serde_json::from_str(json)?;

    if let Some(message) = payload.error {
        return Err(GradeError::RemoteExtraction(message));
    }

    let remote = match (payload.semesters, payload.grades) {
        (Some(semesters), _) => semesters,
        (None, Some(grades)) => vec![RemoteSemester {
            semester_name: FLAT_SEMESTER_NAME.to_string(),
            courses: grades,
        }],
        (None, None) => {
            return Err(GradeError::RemoteExtraction(
                "Failed to process PDF".to_string(),
            ));
        }
    };

    let semesters: Vec<Semester> = remote
        .into_iter()
        .map(|sem| Semester {
            id: new_semester_id(),
            name: sem.semester_name,
            year: String::new(),
            expected_average: None,
            subjects: sem.courses.into_iter().map(subject_from_remote).collect(),
        })
        .collect();
    info!("imported {} semesters from remote extraction", semesters.len());
    Ok(semesters)
}

fn subject_from_remote(course: RemoteCourse) -> Subject {
    let scores = course.scores.unwrap_or_default();
    let mut subject = Subject {
        id: new_subject_id(),
        course_code: course.course_code.unwrap_or_default(),
        course_name: course.course_name_vi.unwrap_or_default(),
        credits: course.credits.unwrap_or(0.0),
        progress_score: scores.progress_score,
        midterm_score: scores.midterm_score,
        practice_score: scores.practice_score,
        final_score: scores.finalterm_score,
        ..Subject::default()
    };
    subject.score = subject.achieved_score().or(scores.total_score);
    subject
}

/// Token handed out when an import starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImportTicket(u64);

impl ImportTicket {
    /// Rebuilds a ticket that crossed a boundary as a plain number.
    pub fn from_value(value: u64) -> Self {
        ImportTicket(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Hands out increasing import tickets and only lets the newest one through.
#[derive(Debug, Default)]
pub struct ImportGuard {
    latest: u64,
}

impl ImportGuard {
    pub fn new() -> Self {
        ImportGuard::default()
    }

    /// Starts an import; every earlier ticket becomes stale.
    pub fn begin(&mut self) -> ImportTicket {
        self.latest += 1;
        ImportTicket(self.latest)
    }

    fn is_current(&self, ticket: ImportTicket) -> bool {
        ticket.0 == self.latest
    }

    /// Passes `result` through for the newest ticket and turns anything
    /// else into `StaleImport`.
    pub fn accept<T>(&self, ticket: ImportTicket, result: GradeResult<T>) -> GradeResult<T> {
        if !self.is_current(ticket) {
            info!("discarding import #{} (latest is #{})", ticket.0, self.latest);
            return Err(GradeError::StaleImport {
                ticket: ticket.0,
                latest: self.latest,
            });
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SemesterTable {
        SemesterTable {
            name: "Học kỳ 1 - Năm học 2023-2024".to_string(),
            rows: vec![
                CourseRow {
                    course_code: "CS101".to_string(),
                    course_name: "Intro to Programming".to_string(),
                    credits: "3".to_string(),
                    grades: vec![8.0, 7.5, 9.0, 6.0],
                },
                CourseRow {
                    course_code: "MA003".to_string(),
                    course_name: "Đại số".to_string(),
                    credits: "4".to_string(),
                    grades: vec![9.0],
                },
            ],
        }
    }

    #[test]
    fn tables_become_semesters_with_defaults() {
        let semesters = semesters_from_tables(&[table()]);
        assert_eq!(semesters.len(), 1);
        let semester = &semesters[0];
        assert!(semester.id.starts_with("sem-"));
        assert_eq!(semester.name, "Học kỳ 1 - Năm học 2023-2024");

        let first = &semester.subjects[0];
        assert!(first.id.starts_with("sub-"));
        assert_eq!(first.credits, 3.0);
        assert_eq!(first.midterm_score, Some(7.5));
        assert_eq!(first.final_score, Some(6.0));
        assert_eq!(first.min_final_score, Some(0.0));
        assert_eq!(first.expected_score, Some(0.0));
        assert_eq!(first.weight_total(), 100.0);
        assert!((first.score.unwrap() - 7.3).abs() < 1e-9);

        let second = &semester.subjects[1];
        assert_eq!(second.progress_score, Some(9.0));
        assert_eq!(second.midterm_score, None);
        assert_eq!(second.score, None);
    }

    #[test]
    fn unreadable_pdf_is_reported() {
        assert!(matches!(import_pdf(b"%PDF-garbage"), Err(GradeError::Pdf(_))));
    }

    #[test]
    fn remote_semesters_shape() {
        let json = r#"{
            "semesters": [{
                "semesterName": "Học kỳ 2 - Năm học 2023-2024",
                "courses": [{
                    "courseCode": "IT001",
                    "courseNameVi": "Nhập môn lập trình",
                    "credits": 4,
                    "scores": {
                        "progressScore": 8,
                        "practiceScore": "9",
                        "midtermScore": 7,
                        "finaltermScore": null,
                        "totalScore": 7.8
                    }
                }]
            }]
        }"#;
        let semesters = import_remote_json(json).unwrap();
        let subject = &semesters[0].subjects[0];
        assert_eq!(semesters[0].name, "Học kỳ 2 - Năm học 2023-2024");
        assert_eq!(subject.course_name, "Nhập môn lập trình");
        assert_eq!(subject.credits, 4.0);
        assert_eq!(subject.practice_score, Some(9.0));
        assert_eq!(subject.final_score, None);
        assert_eq!(subject.score, Some(7.8));
        assert_eq!(subject.min_final_score, None);
        assert_eq!(subject.expected_score, None);
    }

    #[test]
    fn flat_grades_are_wrapped() {
        let json = r#"{ "grades": [{ "courseCode": "PH002", "credits": "2" }] }"#;
        let semesters = import_remote_json(json).unwrap();
        assert_eq!(semesters.len(), 1);
        assert_eq!(semesters[0].name, FLAT_SEMESTER_NAME);
        assert_eq!(semesters[0].subjects[0].course_code, "PH002");
        assert_eq!(semesters[0].subjects[0].credits, 2.0);
    }

    #[test]
    fn remote_error_is_surfaced() {
        let err = import_remote_json(r#"{ "error": "File quá lớn" }"#).unwrap_err();
        assert_eq!(err.user_message(), "File quá lớn");
        assert!(matches!(
            import_remote_json("{}"),
            Err(GradeError::RemoteExtraction(_))
        ));
    }

    #[test]
    fn only_the_latest_ticket_is_accepted() {
        let mut guard = ImportGuard::new();
        let first = guard.begin();
        let second = guard.begin();
        assert!(second > first);

        let stale = guard.accept(first, Ok(1));
        assert!(matches!(
            stale,
            Err(GradeError::StaleImport { ticket: 1, latest: 2 })
        ));
        assert_eq!(guard.accept(second, Ok(2)).unwrap(), 2);
    }
}
