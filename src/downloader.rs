#![cfg(not(tarpaulin_include))]

use std::collections::HashSet;

use chrono::NaiveDate;
use log::info;
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::error::GradeResult;
use crate::semester::{GradeBook, Semester};
use crate::subject::{Component, Subject};

/// Column headers of every exported semester table.
pub const HEADERS: [&str; 10] = [
    "STT",
    "Mã HP",
    "Tên HP",
    "TC",
    "QT",
    "GK",
    "TH",
    "CK",
    "Điểm HP",
    "Điểm kỳ vọng",
];

/// Column widths in characters, matching `HEADERS`.
pub const COLUMN_WIDTHS: [f64; 10] = [5.0, 10.0, 40.0, 5.0, 5.0, 5.0, 5.0, 5.0, 10.0, 15.0];

/// Excel refuses longer sheet names.
pub const SHEET_NAME_LIMIT: usize = 31;

const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Convert a grade book to XLSX format
///
/// Each semester gets its own worksheet: the semester name on the first row,
/// the column headers on the second and one row per subject after that. Empty
/// scores are left as blank cells.
///
/// # Arguments
/// * `book` - The grade book to export
///
/// # Returns
/// * `GradeResult<Vec<u8>>` - XLSX file content as bytes or an `Export` error
///
/// # Examples
/// ```no_run
/// use gradebook::downloader::{export_file_name, to_xlsx};
/// use gradebook::semester::GradeBook;
///
/// let book = GradeBook::initial();
/// let bytes = to_xlsx(&book).unwrap();
/// let today = chrono::Local::now().date_naive();
/// std::fs::write(export_file_name(today), bytes).unwrap();
/// ```
pub fn to_xlsx(book: &GradeBook) -> GradeResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let names = sheet_names(&book.semesters);

    for (semester, name) in book.semesters.iter().zip(names) {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(&name)?;
        for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
            worksheet.set_column_width(col as u16, *width)?;
        }

        worksheet.write_string(0, 0, &semester.name)?;
        for (col, header) in HEADERS.iter().enumerate() {
            worksheet.write_string(1, col as u16, *header)?;
        }

        for (idx, subject) in semester.subjects.iter().enumerate() {
            let row = (idx + 2) as u32;
            worksheet.write_number(row, 0, (idx + 1) as f64)?;
            worksheet.write_string(row, 1, &subject.course_code)?;
            worksheet.write_string(row, 2, &subject.course_name)?;
            worksheet.write_number(row, 3, subject.credits)?;
            for (offset, value) in score_cells(subject).into_iter().enumerate() {
                if let Some(value) = value {
                    worksheet.write_number(row, (offset + 4) as u16, value)?;
                }
            }
        }

        workbook.push_worksheet(worksheet);
    }

    let buffer = workbook.save_to_buffer()?;
    info!(
        "exported {} semesters to XLSX ({} bytes)",
        book.semesters.len(),
        buffer.len()
    );
    Ok(buffer)
}

/// Convert a grade book to CSV format
///
/// Same table as the XLSX export with a leading semester column instead of
/// the title row. Values containing commas, quotes or newlines are quoted.
///
/// # Arguments
/// * `book` - The grade book to export
///
/// # Returns
/// * `String` - CSV content
pub fn to_csv(book: &GradeBook) -> String {
    let mut csv_content = String::new();

    csv_content.push_str("Học kỳ");
    for header in HEADERS {
        csv_content.push(',');
        csv_content.push_str(header);
    }
    csv_content.push('\n');

    for semester in &book.semesters {
        for (idx, subject) in semester.subjects.iter().enumerate() {
            let mut fields = vec![
                semester.name.clone(),
                (idx + 1).to_string(),
                subject.course_code.clone(),
                subject.course_name.clone(),
                subject.credits.to_string(),
            ];
            fields.extend(
                score_cells(subject)
                    .into_iter()
                    .map(|value| value.map(|v| v.to_string()).unwrap_or_default()),
            );
            let escaped: Vec<String> = fields.iter().map(|f| escape_csv(f)).collect();
            csv_content.push_str(&escaped.join(","));
            csv_content.push('\n');
        }
    }

    csv_content
}

/// Name of the downloaded workbook, e.g. `bang-diem-2024-05-31.xlsx`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("bang-diem-{}.xlsx", date.format("%Y-%m-%d"))
}

/// QT, GK, TH, CK, course score and expected score in export column order.
fn score_cells(subject: &Subject) -> Vec<Option<f64>> {
    let mut cells: Vec<Option<f64>> = Component::ALL
        .iter()
        .map(|&c| subject.component_score(c))
        .collect();
    cells.push(subject.score);
    cells.push(subject.expected_score);
    cells
}

fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Sheet names Excel accepts: forbidden characters dropped, cut to 31
/// characters, blanks replaced and duplicates numbered.
pub fn sheet_names(semesters: &[Semester]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(semesters.len());

    for (idx, semester) in semesters.iter().enumerate() {
        let cleaned: String = semester
            .name
            .chars()
            .filter(|ch| !FORBIDDEN_SHEET_CHARS.contains(ch))
            .collect();
        let cleaned = cleaned.trim().trim_matches('\'').to_string();
        let base = if cleaned.is_empty() {
            format!("Sheet{}", idx + 1)
        } else {
            truncate_chars(&cleaned, SHEET_NAME_LIMIT)
        };

        let mut candidate = base.clone();
        let mut counter = 2;
        while used.contains(&candidate.to_lowercase()) {
            let suffix = format!(" ({})", counter);
            let room = SHEET_NAME_LIMIT - suffix.chars().count();
            candidate = format!("{}{}", truncate_chars(&base, room), suffix);
            counter += 1;
        }
        used.insert(candidate.to_lowercase());
        names.push(candidate);
    }

    names
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Semester {
        Semester::new(name)
    }

    #[test]
    fn file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        assert_eq!(export_file_name(date), "bang-diem-2024-05-31.xlsx");
    }

    #[test]
    fn sheet_names_are_cleaned_cut_and_unique() {
        let long = "Học kỳ 1 - Năm học 2023-2024 (bổ sung thêm)";
        let semesters = vec![
            named("HK1/2024: [chính]"),
            named(long),
            named(long),
            named("   "),
        ];
        let names = sheet_names(&semesters);
        assert_eq!(names[0], "HK12024 chính");
        assert_eq!(names[1].chars().count(), SHEET_NAME_LIMIT);
        assert_ne!(names[1], names[2]);
        assert!(names[2].ends_with(" (2)"));
        assert_eq!(names[2].chars().count(), SHEET_NAME_LIMIT);
        assert_eq!(names[3], "Sheet4");
    }

    #[test]
    fn csv_has_semester_column_and_escapes() {
        let mut semester = named("HK1");
        semester.subjects[0].course_code = "IT001".to_string();
        semester.subjects[0].course_name = "Lập trình, cơ bản".to_string();
        semester.subjects[0].credits = 4.0;
        semester.subjects[0].progress_score = Some(8.5);
        let book = GradeBook {
            semesters: vec![semester],
            cumulative_target: None,
        };

        let csv = to_csv(&book);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Học kỳ,STT,Mã HP,Tên HP,TC,QT,GK,TH,CK,Điểm HP,Điểm kỳ vọng"
        );
        assert_eq!(lines[1], "HK1,1,IT001,\"Lập trình, cơ bản\",4,8.5,,,,,");
    }

    #[test]
    fn xlsx_is_a_zip_archive() {
        let book = GradeBook {
            semesters: vec![named("HK1"), named("HK2")],
            cumulative_target: None,
        };
        let bytes = to_xlsx(&book).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[..2], b"PK");
    }
}
