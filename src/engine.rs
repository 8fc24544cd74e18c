use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{GradeError, GradeResult};
use crate::semester::{GradeBook, NEW_SEMESTER_NAME, Semester};
use crate::subject::{Component, MAX_SCORE, Subject, SubjectField, is_valid_score};

lazy_static! {
    static ref DECIMAL_REGEX: Regex = Regex::new(r"^(?:\d+(?:[.,]\d*)?|[.,]\d+)$").unwrap();
}

pub const MAX_WEIGHT: f64 = 100.0;

/// A single user action against the grade table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Edit {
    SubjectField {
        semester: usize,
        subject: usize,
        field: SubjectField,
        value: String,
    },
    SemesterTarget {
        semester: usize,
        value: String,
    },
    CumulativeTarget {
        value: String,
    },
    RenameSemester {
        semester: usize,
        name: String,
    },
    AddSemester,
    DeleteSemester {
        id: String,
    },
    AddSubject {
        semester: usize,
    },
    DeleteSubject {
        semester: usize,
        subject: usize,
    },
    RestoreSubject {
        semester: usize,
        subject: usize,
        snapshot: Box<Subject>,
    },
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parses a non-negative decimal written with either `.` or `,`.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if !DECIMAL_REGEX.is_match(trimmed) {
        return None;
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Accepts a component or target score in [0, 10]; anything else is unset.
pub fn normalize_score(raw: &str) -> Option<f64> {
    parse_decimal(raw).filter(|v| is_valid_score(*v))
}

/// Text form of `normalize_score`: the accepted value in its shortest decimal
/// form, or an empty string.
pub fn normalize_score_text(raw: &str) -> String {
    normalize_score(raw).map(|v| v.to_string()).unwrap_or_default()
}

pub fn normalize_weight(raw: &str) -> Option<f64> {
    parse_decimal(raw).filter(|v| *v <= MAX_WEIGHT)
}

pub fn normalize_credits(raw: &str) -> f64 {
    parse_decimal(raw).unwrap_or(0.0)
}

/// Writes one raw input into a subject through the field table.
pub fn write_field(subject: &mut Subject, field: SubjectField, raw: &str) {
    match field {
        SubjectField::CourseCode => subject.course_code = raw.trim().to_string(),
        SubjectField::CourseName => subject.course_name = raw.to_string(),
        SubjectField::Credits => subject.credits = normalize_credits(raw),
        SubjectField::Score(component) => {
            let value = normalize_score(raw);
            subject.set_component_score(component, value);
            if value.is_some() {
                subject.set_min_score(component, None);
            }
        }
        SubjectField::Weight(component) => {
            subject.set_weight(component, normalize_weight(raw).unwrap_or(0.0))
        }
        SubjectField::ExpectedScore => subject.expected_score = normalize_score(raw),
    }
    subject.refresh_score();
}

/// Minimum scores the empty components need for the course to reach `target`.
///
/// Entered components contribute their real weighted points; what is left is
/// spread evenly per unit of open weight. Results below zero are floored, but
/// results above 10 are kept so the caller can flag the target as out of
/// reach.
pub fn calc_required_scores(subject: &Subject, target: f64) -> Subject {
    let mut solved = subject.clone();

    let mut locked_points = 0.0;
    let mut open_weight = 0.0;
    let entered = |component: Component| subject.component_score(component).filter(|v| is_valid_score(*v));

    for component in Component::ALL {
        match entered(component) {
            Some(score) => locked_points += score * subject.weight(component),
            None => open_weight += subject.weight(component),
        }
    }

    let required = if open_weight > 0.0 {
        let needed = target * 100.0 - locked_points;
        Some(round2((needed / open_weight).max(0.0)))
    } else {
        None
    };

    for component in Component::ALL {
        if entered(component).is_some() {
            solved.set_min_score(component, None);
        } else {
            solved.set_min_score(component, required);
        }
    }
    solved
}

/// True when a required minimum exceeds the score scale.
pub fn is_out_of_reach(subject: &Subject) -> bool {
    Component::ALL
        .iter()
        .filter_map(|&c| subject.min_score(c))
        .any(|v| v > MAX_SCORE)
}

/// Solves for the expected score every incomplete subject must carry so the
/// credit-weighted mean of the set reaches `target`.
///
/// Complete subjects are locked at their real score; the subject at `skip`
/// is locked at its own expected score when it has one. Subjects without
/// credits are left out entirely.
pub fn distribute_to_subjects(subjects: &[Subject], target: f64, skip: Option<usize>) -> Vec<Subject> {
    let mut distributed = subjects.to_vec();

    let mut locked_points = 0.0;
    let mut locked_credits = 0.0;
    let mut flexible = Vec::new();
    let mut flexible_credits = 0.0;

    for (index, subject) in subjects.iter().enumerate() {
        if !subject.has_credits() {
            continue;
        }
        let pinned = if Some(index) == skip {
            subject.expected_score
        } else {
            None
        };
        match subject.achieved_score().or(pinned) {
            Some(value) => {
                locked_points += subject.credits * value;
                locked_credits += subject.credits;
            }
            None => {
                flexible.push(index);
                flexible_credits += subject.credits;
            }
        }
    }

    if flexible.is_empty() {
        return distributed;
    }

    let needed_total = target * (locked_credits + flexible_credits);
    let remaining = needed_total - locked_points;
    let avg_for_flexible = round2((remaining / flexible_credits).max(0.0));
    debug!(
        "distributing target {:.2}: locked {:.2} over {} credits, {} flexible subjects get {:.2}",
        target,
        locked_points,
        locked_credits,
        flexible.len(),
        avg_for_flexible
    );

    for index in flexible {
        let subject = &mut distributed[index];
        subject.expected_score = Some(avg_for_flexible);
        *subject = calc_required_scores(subject, avg_for_flexible);
    }
    distributed
}

/// Value a semester is locked at during the global pass, if any.
fn locked_semester_value(semester: &Semester, is_edited: bool) -> Option<f64> {
    if semester.is_fully_scored() {
        semester.average_score()
    } else if is_edited {
        semester.expected_average
    } else {
        None
    }
}

/// Same solve one level up: every semester that is neither fully scored nor
/// the one being edited receives the expected average the cumulative target
/// still needs, which is then distributed over its own subjects.
pub fn rebalance_global(semesters: &[Semester], target: f64, skip: Option<usize>) -> Vec<Semester> {
    let mut rebalanced = semesters.to_vec();

    let mut locked_points = 0.0;
    let mut locked_credits = 0.0;
    let mut flexible = Vec::new();
    let mut flexible_credits = 0.0;

    for (index, semester) in semesters.iter().enumerate() {
        let credits = semester.total_credits();
        if credits <= 0.0 {
            continue;
        }
        match locked_semester_value(semester, Some(index) == skip) {
            Some(value) => {
                locked_points += credits * value;
                locked_credits += credits;
            }
            None => {
                flexible.push(index);
                flexible_credits += credits;
            }
        }
    }

    if flexible.is_empty() {
        return rebalanced;
    }

    let remaining = target * (locked_credits + flexible_credits) - locked_points;
    let avg_for_flexible = round2((remaining / flexible_credits).max(0.0));
    debug!(
        "rebalancing cumulative target {:.2}: {} flexible semesters get {:.2}",
        target,
        flexible.len(),
        avg_for_flexible
    );

    for index in flexible {
        let semester = &mut rebalanced[index];
        semester.expected_average = Some(avg_for_flexible);
        semester.subjects = distribute_to_subjects(&semester.subjects, avg_for_flexible, None);
    }
    rebalanced
}

fn rebalance(book: &mut GradeBook, skip: Option<usize>) {
    if let Some(target) = book.cumulative_target {
        book.semesters = rebalance_global(&book.semesters, target, skip);
    }
}

fn semester_mut(book: &mut GradeBook, semester: usize) -> GradeResult<&mut Semester> {
    book.semesters
        .get_mut(semester)
        .ok_or_else(|| GradeError::SemesterNotFound(format!("#{}", semester)))
}

/// Steps (c) to (e) of the update protocol after a subject changed.
fn resolve_subject_change(book: &mut GradeBook, semester: usize, subject: usize, pin: bool) -> GradeResult<()> {
    let sem = semester_mut(book, semester)?;
    let sub = sem
        .subjects
        .get_mut(subject)
        .ok_or(GradeError::SubjectNotFound { semester, subject })?;

    if let Some(expected) = sub.expected_score {
        *sub = calc_required_scores(sub, expected);
    }

    if let Some(average) = sem.expected_average {
        let skip = if pin { Some(subject) } else { None };
        sem.subjects = distribute_to_subjects(&sem.subjects, average, skip);
    }

    rebalance(book, Some(semester));
    Ok(())
}

/// Applies one edit to a snapshot and returns the re-solved snapshot. The
/// input is never modified; on error nothing changes.
pub fn apply_edit(book: &GradeBook, edit: &Edit) -> GradeResult<GradeBook> {
    let mut next = book.clone();

    match edit {
        Edit::SubjectField {
            semester,
            subject,
            field,
            value,
        } => {
            let sem = semester_mut(&mut next, *semester)?;
            let sub = sem.subjects.get_mut(*subject).ok_or(GradeError::SubjectNotFound {
                semester: *semester,
                subject: *subject,
            })?;
            write_field(sub, *field, value);
            let pin = *field == SubjectField::ExpectedScore;
            resolve_subject_change(&mut next, *semester, *subject, pin)?;
        }
        Edit::SemesterTarget { semester, value } => {
            let sem = semester_mut(&mut next, *semester)?;
            sem.expected_average = normalize_score(value);
            if let Some(average) = sem.expected_average {
                sem.subjects = distribute_to_subjects(&sem.subjects, average, None);
            }
            rebalance(&mut next, Some(*semester));
        }
        Edit::CumulativeTarget { value } => {
            next.cumulative_target = normalize_score(value);
            rebalance(&mut next, None);
        }
        Edit::RenameSemester { semester, name } => {
            semester_mut(&mut next, *semester)?.name = name.clone();
        }
        Edit::AddSemester => {
            next.semesters.push(Semester::new(NEW_SEMESTER_NAME));
        }
        Edit::DeleteSemester { id } => {
            let index = next
                .semester_index(id)
                .ok_or_else(|| GradeError::SemesterNotFound(id.clone()))?;
            next.semesters.remove(index);
            rebalance(&mut next, None);
        }
        Edit::AddSubject { semester } => {
            semester_mut(&mut next, *semester)?
                .subjects
                .push(Subject::blank());
        }
        Edit::DeleteSubject { semester, subject } => {
            let sem = semester_mut(&mut next, *semester)?;
            if *subject >= sem.subjects.len() {
                return Err(GradeError::SubjectNotFound {
                    semester: *semester,
                    subject: *subject,
                });
            }
            sem.subjects.remove(*subject);
            if let Some(average) = sem.expected_average {
                sem.subjects = distribute_to_subjects(&sem.subjects, average, None);
            }
            rebalance(&mut next, Some(*semester));
        }
        Edit::RestoreSubject {
            semester,
            subject,
            snapshot,
        } => {
            let sem = semester_mut(&mut next, *semester)?;
            let sub = sem.subjects.get_mut(*subject).ok_or(GradeError::SubjectNotFound {
                semester: *semester,
                subject: *subject,
            })?;
            *sub = (**snapshot).clone();
            sub.refresh_score();
            resolve_subject_change(&mut next, *semester, *subject, false)?;
        }
    }

    Ok(next)
}
