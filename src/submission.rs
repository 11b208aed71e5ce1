use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value written to the "contacted" column of a new row
pub const DEFAULT_CONTACTED: &str = "Not yet";
/// Value written to the "status" column of a new row
pub const DEFAULT_STATUS: &str = "Pending";

/// Number of columns (A through J) a submission occupies
pub const COLUMN_COUNT: usize = 10;

/// Sequential submission ID
///
/// Displayed zero-padded to four digits (`7` becomes `"0007"`). Values past
/// 9999 simply grow wider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubmissionId(pub u32);

impl SubmissionId {
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl Serialize for SubmissionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The five client-supplied fields, after validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionForm {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub interest_type: String,
    pub message: String,
}

/// One persisted lead, as it appears in the backing sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: SubmissionId,
    pub submitted_at: NaiveDate,
    pub form: SubmissionForm,
    pub contacted: String,
    pub status: String,
    pub notes: String,
}

impl Submission {
    /// Create a fresh submission with the default follow-up columns.
    pub fn new(id: SubmissionId, submitted_at: NaiveDate, form: SubmissionForm) -> Self {
        Submission {
            id,
            submitted_at,
            form,
            contacted: DEFAULT_CONTACTED.to_string(),
            status: DEFAULT_STATUS.to_string(),
            notes: String::new(),
        }
    }

    /// Cells for columns A..J, in sheet order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.submitted_at.format("%Y-%m-%d").to_string(),
            self.form.full_name.clone(),
            self.form.phone.clone(),
            self.form.email.clone(),
            self.form.interest_type.clone(),
            self.form.message.clone(),
            self.contacted.clone(),
            self.status.clone(),
            self.notes.clone(),
        ]
    }
}
