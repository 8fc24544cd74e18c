use thiserror::Error;

pub type GradeResult<T> = Result<T, GradeError>;

#[derive(Debug, Error)]
pub enum GradeError {
    #[error("could not read PDF: {0}")]
    Pdf(String),

    #[error("no course rows found in the document")]
    NoCourseRows,

    #[error("remote extraction failed: {0}")]
    RemoteExtraction(String),

    #[error("import #{ticket} was superseded by import #{latest}")]
    StaleImport { ticket: u64, latest: u64 },

    #[error("semester not found: {0}")]
    SemesterNotFound(String),

    #[error("subject {subject} not found in semester {semester}")]
    SubjectNotFound { semester: usize, subject: usize },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export error: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),
}

impl GradeError {
    /// Message shown to the user when an import or export fails.
    pub fn user_message(&self) -> String {
        match self {
            GradeError::Pdf(_) | GradeError::NoCourseRows => {
                "Lỗi khi đọc file PDF".to_string()
            }
            GradeError::RemoteExtraction(message) => message.clone(),
            GradeError::Export(_) => {
                "Đã xảy ra lỗi khi xuất file Excel. Vui lòng thử lại.".to_string()
            }
            other => other.to_string(),
        }
    }
}
