//! Rebuilds transcript rows from positioned text.
//!
//! A PDF page carries no table structure, only text fragments at x/y
//! positions. Fragments are ordered top to bottom and left to right, glued
//! into lines wherever the baseline stays within `LINE_THRESHOLD`, and every
//! line that starts with a course code is read as one course row.

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::engine::parse_decimal;
use crate::subject::{Component, is_valid_score};

/// Largest baseline change that still counts as the same line.
pub const LINE_THRESHOLD: f64 = 5.0;

lazy_static! {
    static ref SEMESTER_REGEX: Regex =
        Regex::new(r"(?i)(Học kỳ\s*\d+\s*-\s*Năm học\s*\d{4}-\d{4})").unwrap();
    static ref COURSE_CODE_REGEX: Regex = Regex::new(r"^([A-Z]{2,4}\d{3,4})").unwrap();
    static ref TOKEN_REGEX: Regex = Regex::new(r"\S+").unwrap();
    static ref NUMBER_REGEX: Regex = Regex::new(r"^\d+(?:[.,]\d+)?$").unwrap();
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
    static ref EDGE_SEPARATORS_REGEX: Regex = Regex::new(r"^[\s\-:]+|[\s\-:]+$").unwrap();
}

/// A run of text drawn at one position on the page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

impl TextFragment {
    pub fn new(x: f64, y: f64, text: impl Into<String>) -> Self {
        TextFragment {
            x,
            y,
            text: text.into(),
        }
    }
}

/// One course line as read from the transcript.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRow {
    pub course_code: String,
    pub course_name: String,
    pub credits: String,
    /// Grade values in reading order: progress, midterm, practice, final.
    pub grades: Vec<f64>,
}

impl CourseRow {
    pub fn grade(&self, component: Component) -> Option<f64> {
        self.grades.get(component as usize).copied()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemesterTable {
    pub name: String,
    pub rows: Vec<CourseRow>,
}

pub fn clean_text(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text, " ").trim().to_string()
}

/// Orders fragments top to bottom, then left to right. Fragments at the same
/// position keep the order they were drawn in; NaN coordinates sort first.
pub fn sort_fragments(fragments: &mut [TextFragment]) {
    fragments.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));
}

/// Groups sorted fragments into cleaned text lines.
pub fn group_lines(fragments: &[TextFragment]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut last_y: Option<f64> = None;

    for fragment in fragments {
        if let Some(y) = last_y {
            if (fragment.y - y).abs() > LINE_THRESHOLD {
                lines.push(clean_text(&current));
                current.clear();
            }
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&fragment.text);
        last_y = Some(fragment.y);
    }

    if !current.is_empty() {
        lines.push(clean_text(&current));
    }
    lines.retain(|line| !line.is_empty());
    lines
}

pub fn is_semester_line(line: &str) -> bool {
    SEMESTER_REGEX.is_match(line)
}

pub fn extract_semester_name(line: &str) -> Option<String> {
    SEMESTER_REGEX
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| clean_text(m.as_str()))
}

fn numeric_token(token: &str) -> Option<f64> {
    if NUMBER_REGEX.is_match(token) {
        parse_decimal(token)
    } else {
        None
    }
}

/// Reads one line as a course row, or `None` when it is not one.
///
/// The first number in (0, 10] after the code is taken as the credit count,
/// the text between code and credits as the course name, and the numbers in
/// [0, 10] after the credits as the grades.
pub fn parse_course_line(line: &str) -> Option<CourseRow> {
    let code_match = COURSE_CODE_REGEX.find(line)?;
    let course_code = code_match.as_str().to_string();

    let tokens: Vec<(usize, &str)> = TOKEN_REGEX
        .find_iter(line)
        .filter(|m| m.start() >= code_match.end())
        .map(|m| (m.start(), m.as_str()))
        .collect();

    let credit_position = tokens.iter().position(|(_, token)| {
        numeric_token(token).is_some_and(|value| value > 0.0 && value <= 10.0)
    });

    let (name_end, credits, grade_tokens) = match credit_position {
        Some(pos) => (tokens[pos].0, tokens[pos].1.to_string(), &tokens[pos + 1..]),
        None => (line.len(), "0".to_string(), &tokens[..]),
    };

    let grades: Vec<f64> = grade_tokens
        .iter()
        .filter_map(|(_, token)| numeric_token(token))
        .filter(|value| is_valid_score(*value))
        .take(Component::ALL.len())
        .collect();

    if credit_position.is_none() && grades.is_empty() {
        return None;
    }

    let raw_name = &line[code_match.end()..name_end];
    let course_name = clean_text(&EDGE_SEPARATORS_REGEX.replace_all(raw_name.trim(), ""));

    debug!(
        "parsed course {} ({}) credits={} grades={:?}",
        course_code, course_name, credits, grades
    );

    Some(CourseRow {
        course_code,
        course_name,
        credits,
        grades,
    })
}

/// Turns one page of fragments into a semester table. Pages without course
/// rows yield nothing. `position` is the number of tables found so far and
/// names the table when the page has no semester header.
pub fn extract_page(fragments: &[TextFragment], position: usize) -> Option<SemesterTable> {
    let mut sorted = fragments.to_vec();
    sort_fragments(&mut sorted);
    let lines = group_lines(&sorted);

    let name = lines
        .iter()
        .find(|line| is_semester_line(line))
        .and_then(|line| extract_semester_name(line))
        .unwrap_or_else(|| format!("Học kỳ {}", position + 1));

    let rows: Vec<CourseRow> = lines
        .iter()
        .filter_map(|line| parse_course_line(line))
        .collect();

    if rows.is_empty() {
        None
    } else {
        Some(SemesterTable { name, rows })
    }
}

/// Runs every page through `extract_page`.
pub fn extract_tables(pages: &[Vec<TextFragment>]) -> Vec<SemesterTable> {
    let mut tables = Vec::new();
    for page in pages {
        if let Some(table) = extract_page(page, tables.len()) {
            tables.push(table);
        }
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_fragments(y: f64, words: &[&str]) -> Vec<TextFragment> {
        words
            .iter()
            .enumerate()
            .map(|(i, w)| TextFragment::new(40.0 + i as f64 * 30.0, y, *w))
            .collect()
    }

    #[test]
    fn reads_a_plain_course_line() {
        let row = parse_course_line("CS101 Intro to Programming 3 8.0 7.5 9.0 6.0").unwrap();
        assert_eq!(row.course_code, "CS101");
        assert_eq!(row.course_name, "Intro to Programming");
        assert_eq!(row.credits, "3");
        assert_eq!(row.grades, vec![8.0, 7.5, 9.0, 6.0]);
        assert_eq!(row.grade(Component::Practice), Some(9.0));
    }

    #[test]
    fn accepts_comma_decimals_and_skips_malformed_numbers() {
        let row = parse_course_line("IT001 - Nhập môn lập trình: 4 8,5 7..5 6,0 x 9").unwrap();
        assert_eq!(row.course_name, "Nhập môn lập trình");
        assert_eq!(row.credits, "4");
        assert_eq!(row.grades, vec![8.5, 6.0, 9.0]);
    }

    #[test]
    fn ignores_out_of_range_grades() {
        let row = parse_course_line("MATH1010 Calculus 4 12 8 7 6 5").unwrap();
        assert_eq!(row.course_code, "MATH1010");
        assert_eq!(row.grades, vec![8.0, 7.0, 6.0, 5.0]);
    }

    #[test]
    fn non_course_lines_are_skipped() {
        assert_eq!(parse_course_line("STT Mã HP Tên HP TC"), None);
        assert_eq!(parse_course_line("cs101 lower case"), None);
        assert_eq!(parse_course_line("IT001 Only a name"), None);
    }

    #[test]
    fn groups_fragments_by_baseline() {
        let mut fragments = vec![
            TextFragment::new(100.0, 700.0, "world"),
            TextFragment::new(10.0, 650.0, "second"),
            TextFragment::new(10.0, 702.0, "hello"),
            TextFragment::new(60.0, 650.0, "  line  "),
        ];
        sort_fragments(&mut fragments);
        let lines = group_lines(&fragments);
        assert_eq!(lines, vec!["hello world", "second line"]);
    }

    #[test]
    fn baseline_threshold_is_inclusive() {
        let same = vec![
            TextFragment::new(10.0, 100.0, "IT001"),
            TextFragment::new(60.0, 95.0, "Toán"),
        ];
        assert_eq!(group_lines(&same), vec!["IT001 Toán"]);

        let split = vec![
            TextFragment::new(10.0, 100.0, "IT001"),
            TextFragment::new(60.0, 94.99, "Toán"),
        ];
        assert_eq!(group_lines(&split), vec!["IT001", "Toán"]);
    }

    #[test]
    fn sorting_tolerates_nan_positions() {
        let mut fragments: Vec<TextFragment> = (0..40)
            .map(|i| {
                let y = if i % 3 == 0 { f64::NAN } else { 800.0 - i as f64 * 10.0 };
                TextFragment::new((i % 7) as f64 * 20.0, y, format!("w{}", i))
            })
            .collect();
        sort_fragments(&mut fragments);

        let finite: Vec<f64> = fragments.iter().map(|f| f.y).filter(|y| !y.is_nan()).collect();
        assert!(finite.windows(2).all(|pair| pair[0] >= pair[1]));
        assert!(!group_lines(&fragments).is_empty());
    }

    #[test]
    fn detects_semester_header() {
        let line = "Học kỳ 1 - Năm học 2023-2024";
        assert!(is_semester_line(line));
        assert!(is_semester_line("HỌC KỲ 2 - NĂM HỌC 2023-2024"));
        assert_eq!(extract_semester_name(&format!("Kết quả {}", line)).as_deref(), Some(line));
        assert!(!is_semester_line("Năm học 2023"));
    }

    #[test]
    fn builds_one_table_per_page() {
        let mut page_one = row_fragments(780.0, &["Học", "kỳ", "2", "-", "Năm", "học", "2023-2024"]);
        page_one.extend(row_fragments(740.0, &["IT001", "Nhập", "môn", "4", "8", "7", "9", "6"]));
        page_one.extend(row_fragments(720.0, &["MA003", "Đại", "số", "3", "9", "8", "7", "10"]));

        let blank_page = row_fragments(700.0, &["Trang", "2"]);
        let page_three = row_fragments(700.0, &["PH002", "Vật", "lý", "2", "5"]);

        let tables = extract_tables(&[page_one, blank_page, page_three]);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "Học kỳ 2 - Năm học 2023-2024");
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(tables[0].rows[1].course_name, "Đại số");
        assert_eq!(tables[1].name, "Học kỳ 2");
        assert_eq!(tables[1].rows[0].grades, vec![5.0]);
    }
}
