use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Weights used when a course carries no weighting of its own, in
/// `Component::ALL` order.
pub const DEFAULT_WEIGHTS: [f64; 4] = [20.0, 20.0, 20.0, 40.0];

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

/// One of the four graded parts of a course.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Component {
    Progress,
    Midterm,
    Practice,
    Final,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Progress,
        Component::Midterm,
        Component::Practice,
        Component::Final,
    ];

    /// Short column label used on transcripts and exports.
    pub fn label(self) -> &'static str {
        match self {
            Component::Progress => "QT",
            Component::Midterm => "GK",
            Component::Practice => "TH",
            Component::Final => "CK",
        }
    }

    pub fn default_weight(self) -> f64 {
        DEFAULT_WEIGHTS[self as usize]
    }
}

/// Every field of a subject the UI is allowed to edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "component", rename_all = "camelCase")]
pub enum SubjectField {
    CourseCode,
    CourseName,
    Credits,
    Score(Component),
    Weight(Component),
    ExpectedScore,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub course_code: String,
    #[serde(default)]
    pub course_name: String,
    #[serde(default, with = "number_text")]
    pub credits: f64,

    #[serde(default, with = "score_text")]
    pub progress_score: Option<f64>,
    #[serde(default, with = "score_text")]
    pub midterm_score: Option<f64>,
    #[serde(default, with = "score_text")]
    pub practice_score: Option<f64>,
    #[serde(default, with = "score_text")]
    pub final_score: Option<f64>,

    #[serde(default, with = "optional_number_text")]
    pub min_progress_score: Option<f64>,
    #[serde(default, with = "optional_number_text")]
    pub min_midterm_score: Option<f64>,
    #[serde(default, with = "optional_number_text")]
    pub min_practice_score: Option<f64>,
    #[serde(default, with = "optional_number_text")]
    pub min_final_score: Option<f64>,

    #[serde(default = "default_progress_weight", with = "number_text")]
    pub progress_weight: f64,
    #[serde(default = "default_midterm_weight", with = "number_text")]
    pub midterm_weight: f64,
    #[serde(default = "default_practice_weight", with = "number_text")]
    pub practice_weight: f64,
    #[serde(default = "default_final_weight", with = "number_text")]
    pub final_weight: f64,

    #[serde(default, with = "optional_number_text")]
    pub score: Option<f64>,
    #[serde(default, with = "optional_number_text")]
    pub expected_score: Option<f64>,
}

fn default_progress_weight() -> f64 {
    Component::Progress.default_weight()
}

fn default_midterm_weight() -> f64 {
    Component::Midterm.default_weight()
}

fn default_practice_weight() -> f64 {
    Component::Practice.default_weight()
}

fn default_final_weight() -> f64 {
    Component::Final.default_weight()
}

pub fn new_subject_id() -> String {
    format!("sub-{}", Uuid::new_v4())
}

pub fn is_valid_score(value: f64) -> bool {
    value.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&value)
}

impl Default for Subject {
    fn default() -> Self {
        Subject {
            id: String::new(),
            course_code: String::new(),
            course_name: String::new(),
            credits: 0.0,
            progress_score: None,
            midterm_score: None,
            practice_score: None,
            final_score: None,
            min_progress_score: None,
            min_midterm_score: None,
            min_practice_score: None,
            min_final_score: None,
            progress_weight: default_progress_weight(),
            midterm_weight: default_midterm_weight(),
            practice_weight: default_practice_weight(),
            final_weight: default_final_weight(),
            score: None,
            expected_score: None,
        }
    }
}

impl Subject {
    /// An empty row with a fresh id and the default weights.
    pub fn blank() -> Self {
        Subject {
            id: new_subject_id(),
            ..Subject::default()
        }
    }

    pub fn component_score(&self, component: Component) -> Option<f64> {
        match component {
            Component::Progress => self.progress_score,
            Component::Midterm => self.midterm_score,
            Component::Practice => self.practice_score,
            Component::Final => self.final_score,
        }
    }

    pub fn set_component_score(&mut self, component: Component, value: Option<f64>) {
        match component {
            Component::Progress => self.progress_score = value,
            Component::Midterm => self.midterm_score = value,
            Component::Practice => self.practice_score = value,
            Component::Final => self.final_score = value,
        }
    }

    pub fn min_score(&self, component: Component) -> Option<f64> {
        match component {
            Component::Progress => self.min_progress_score,
            Component::Midterm => self.min_midterm_score,
            Component::Practice => self.min_practice_score,
            Component::Final => self.min_final_score,
        }
    }

    pub fn set_min_score(&mut self, component: Component, value: Option<f64>) {
        match component {
            Component::Progress => self.min_progress_score = value,
            Component::Midterm => self.min_midterm_score = value,
            Component::Practice => self.min_practice_score = value,
            Component::Final => self.min_final_score = value,
        }
    }

    pub fn weight(&self, component: Component) -> f64 {
        match component {
            Component::Progress => self.progress_weight,
            Component::Midterm => self.midterm_weight,
            Component::Practice => self.practice_weight,
            Component::Final => self.final_weight,
        }
    }

    pub fn set_weight(&mut self, component: Component, value: f64) {
        match component {
            Component::Progress => self.progress_weight = value,
            Component::Midterm => self.midterm_weight = value,
            Component::Practice => self.practice_weight = value,
            Component::Final => self.final_weight = value,
        }
    }

    /// All four component scores present and inside [0, 10].
    pub fn is_complete(&self) -> bool {
        Component::ALL.iter().all(|&c| {
            self.component_score(c)
                .map(is_valid_score)
                .unwrap_or(false)
        })
    }

    /// Weighted course score. Weights are percentages and the sum is divided
    /// by 100, not by the actual weight total.
    pub fn achieved_score(&self) -> Option<f64> {
        if !self.is_complete() {
            return None;
        }
        let points: f64 = Component::ALL
            .iter()
            .map(|&c| self.component_score(c).unwrap_or(0.0) * self.weight(c))
            .sum();
        Some(points / 100.0)
    }

    pub fn refresh_score(&mut self) {
        self.score = self.achieved_score();
    }

    /// Subjects without a positive credit count never take part in averages.
    pub fn has_credits(&self) -> bool {
        self.credits.is_finite() && self.credits > 0.0
    }

    pub fn weight_total(&self) -> f64 {
        Component::ALL.iter().map(|&c| self.weight(c)).sum()
    }

    /// Expected score formatted the way the grade table shows it.
    pub fn expected_score_text(&self) -> String {
        self.expected_score
            .map(|v| format!("{:.2}", v))
            .unwrap_or_default()
    }
}

/// Persisted numbers are stored as text; an empty string means unset. Loading
/// also accepts plain JSON numbers and `null`.
pub(crate) mod optional_number_text {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let raw = Option::<Raw>::deserialize(deserializer)?;
        Ok(match raw {
            Some(Raw::Number(n)) if n.is_finite() => Some(n),
            Some(Raw::Text(text)) => parse_lenient(&text),
            _ => None,
        })
    }

    pub(crate) fn parse_lenient(text: &str) -> Option<f64> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        trimmed
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
    }
}

/// Component scores: stored like `optional_number_text`, but a loaded value
/// outside [0, 10] counts as unset.
pub(crate) mod score_text {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        super::optional_number_text::serialize(value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(super::optional_number_text::deserialize(deserializer)?.filter(|v| super::is_valid_score(*v)))
    }
}

pub(crate) mod number_text {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(super::optional_number_text::deserialize(deserializer)?.unwrap_or(0.0))
    }
}
