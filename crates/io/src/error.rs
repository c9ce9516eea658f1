use std::fmt;

#[derive(Debug)]
pub enum WorkbookError {
    /// Workbook could not be opened or read as a spreadsheet.
    Open { path: String, detail: String },
    /// A configured sheet is absent from the workbook.
    MissingSheet { name: String, available: Vec<String> },
    /// A required archive part (styles, worksheet XML, rels) is absent.
    MissingPart(String),
    /// Archive or XML structure the patcher cannot work with.
    Invalid(String),
    /// Failure writing the annotated archive back to disk.
    Save { path: String, detail: String },
}

impl fmt::Display for WorkbookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, detail } => write!(f, "cannot open workbook '{path}': {detail}"),
            Self::MissingSheet { name, available } => {
                write!(
                    f,
                    "sheet '{name}' not found; workbook has: {}",
                    available.join(", ")
                )
            }
            Self::MissingPart(part) => write!(f, "workbook archive is missing '{part}'"),
            Self::Invalid(msg) => write!(f, "malformed workbook: {msg}"),
            Self::Save { path, detail } => write!(f, "cannot save workbook '{path}': {detail}"),
        }
    }
}

impl std::error::Error for WorkbookError {}

impl From<zip::result::ZipError> for WorkbookError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Invalid(format!("zip error: {e}"))
    }
}

impl From<quick_xml::Error> for WorkbookError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Invalid(format!("xml error: {e}"))
    }
}

impl From<std::io::Error> for WorkbookError {
    fn from(e: std::io::Error) -> Self {
        Self::Invalid(format!("io error: {e}"))
    }
}
