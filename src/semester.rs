use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subject::{Subject, new_subject_id, optional_number_text};

/// Course score needed to earn a course's credits.
pub const PASSING_SCORE: f64 = 5.0;

pub const NEW_SEMESTER_NAME: &str = "Nhập tên học kỳ";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub year: String,
    #[serde(default, with = "optional_number_text")]
    pub expected_average: Option<f64>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SemesterSummary {
    pub average_score: Option<f64>,
    pub credits_earned: f64,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeSummary {
    pub total_credits_accumulated: f64,
    pub cumulative_gpa: Option<f64>,
}

/// The whole grade table: every semester plus the global target.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GradeBook {
    #[serde(default)]
    pub semesters: Vec<Semester>,
    #[serde(default, with = "optional_number_text")]
    pub cumulative_target: Option<f64>,
}

pub fn new_semester_id() -> String {
    format!("sem-{}", Uuid::new_v4())
}

/// Credit-weighted mean of `(credits, value)` pairs, ignoring pairs without
/// positive credits.
pub fn credit_weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (points, credits) = pairs
        .into_iter()
        .filter(|(credits, _)| credits.is_finite() && *credits > 0.0)
        .fold((0.0, 0.0), |(points, total), (credits, value)| {
            (points + credits * value, total + credits)
        });
    if credits > 0.0 {
        Some(points / credits)
    } else {
        None
    }
}

impl Semester {
    pub fn new(name: impl Into<String>) -> Self {
        Semester {
            id: new_semester_id(),
            name: name.into(),
            year: Local::now().year().to_string(),
            expected_average: None,
            subjects: vec![Subject::blank()],
        }
    }

    /// Credits of every subject that takes part in averages.
    pub fn total_credits(&self) -> f64 {
        self.subjects
            .iter()
            .filter(|s| s.has_credits())
            .map(|s| s.credits)
            .sum()
    }

    /// Every credit-bearing subject has all four components, and there is at
    /// least one such subject.
    pub fn is_fully_scored(&self) -> bool {
        let mut counted = self.subjects.iter().filter(|s| s.has_credits()).peekable();
        counted.peek().is_some() && counted.all(|s| s.is_complete())
    }

    /// Credit-weighted average over complete subjects.
    pub fn average_score(&self) -> Option<f64> {
        credit_weighted_mean(
            self.subjects
                .iter()
                .filter_map(|s| s.achieved_score().map(|score| (s.credits, score))),
        )
    }

    pub fn summary(&self) -> SemesterSummary {
        let credits_earned = self
            .subjects
            .iter()
            .filter(|s| s.has_credits())
            .filter(|s| s.achieved_score().is_some_and(|score| score >= PASSING_SCORE))
            .map(|s| s.credits)
            .sum();
        SemesterSummary {
            average_score: self.average_score(),
            credits_earned,
        }
    }

    /// Fills in missing ids on the semester and its subjects.
    pub fn ensure_ids(&mut self) {
        if self.id.trim().is_empty() {
            self.id = new_semester_id();
        }
        for subject in self.subjects.iter_mut() {
            if subject.id.trim().is_empty() {
                subject.id = new_subject_id();
            }
        }
    }
}

impl GradeBook {
    /// State shown on first launch.
    pub fn initial() -> Self {
        GradeBook {
            semesters: vec![Semester::new("Học kỳ 1")],
            cumulative_target: None,
        }
    }

    pub fn semester_index(&self, id: &str) -> Option<usize> {
        self.semesters.iter().position(|s| s.id == id)
    }

    pub fn cumulative_summary(&self) -> CumulativeSummary {
        let total_credits_accumulated = self
            .semesters
            .iter()
            .map(|s| s.summary().credits_earned)
            .sum();
        let cumulative_gpa = credit_weighted_mean(
            self.semesters
                .iter()
                .flat_map(|sem| sem.subjects.iter())
                .filter_map(|s| s.achieved_score().map(|score| (s.credits, score))),
        );
        CumulativeSummary {
            total_credits_accumulated,
            cumulative_gpa,
        }
    }

    pub fn ensure_ids(&mut self) {
        for semester in self.semesters.iter_mut() {
            semester.ensure_ids();
        }
    }
}
