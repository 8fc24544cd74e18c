//! Graduation requirements check.
//!
//! Works on a summary of the student's record rather than on the grade book:
//! GPA here is on the 4-point scale and several requirements (military
//! training, soft skills, discipline) are not tracked by the grade table.

use serde::{Deserialize, Serialize};

pub const REQUIRED_CREDITS: f64 = 130.0;
pub const REQUIRED_GPA: f64 = 2.0;
pub const REQUIRED_THESIS_SCORE: f64 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnglishTest {
    Ielts,
    Toefl,
    Toeic,
    Vstep,
    Uit,
}

impl EnglishTest {
    pub fn required_score(self) -> f64 {
        match self {
            EnglishTest::Ielts => 5.5,
            EnglishTest::Toefl => 61.0,
            EnglishTest::Toeic => 600.0,
            EnglishTest::Vstep => 3.5,
            EnglishTest::Uit => 60.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnglishCertificate {
    #[serde(rename = "type")]
    pub test: EnglishTest,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicRecord {
    pub total_credits: f64,
    pub gpa: f64,
    pub has_f_grade: bool,
    pub completed_thesis: bool,
    #[serde(default)]
    pub thesis_score: Option<f64>,
    pub english_proficiency: EnglishCertificate,
    pub completed_military_training: bool,
    pub completed_physical_education: bool,
    pub completed_soft_skills: bool,
    pub is_under_disciplinary_action: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub eligible: bool,
    pub reasons: Vec<String>,
}

/// Lists every unmet requirement; the student is eligible when there are none.
pub fn check_graduation_eligibility(record: &AcademicRecord) -> EligibilityReport {
    let mut reasons = Vec::new();

    if record.total_credits < REQUIRED_CREDITS {
        reasons.push(format!(
            "Not enough credits ({}/{} required)",
            record.total_credits, REQUIRED_CREDITS
        ));
    }
    if record.gpa < REQUIRED_GPA {
        reasons.push(format!("GPA too low ({:.2}/4.00 required)", record.gpa));
    }
    if record.has_f_grade {
        reasons.push("Has F grade in one or more courses".to_string());
    }
    let thesis_failed = record
        .thesis_score
        .is_some_and(|score| score < REQUIRED_THESIS_SCORE);
    if !record.completed_thesis || thesis_failed {
        reasons.push("Thesis or alternative requirements not met".to_string());
    }

    let english = record.english_proficiency;
    if english.score < english.test.required_score() {
        reasons.push("English proficiency requirement not met".to_string());
    }

    if !record.completed_military_training {
        reasons.push("Military training not completed".to_string());
    }
    if !record.completed_physical_education {
        reasons.push("Physical education not completed".to_string());
    }
    if !record.completed_soft_skills {
        reasons.push("Soft skills requirement not met".to_string());
    }
    if record.is_under_disciplinary_action {
        reasons.push("Student is under disciplinary action".to_string());
    }

    EligibilityReport {
        eligible: reasons.is_empty(),
        reasons,
    }
}
