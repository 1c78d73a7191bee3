/// Type-safe bet records
///
/// Records are validated once at construction time and are immutable afterwards,
/// so every later stage (batching, encoding) can rely on the field invariants.

use chrono::NaiveDate;
use thiserror::Error;

use crate::constants::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid birth date, must be in format YYYY-MM-DD (actual: {0})")]
    InvalidBirthDate(String),

    #[error("invalid number, must be an integer (actual: {0})")]
    InvalidNumber(String),

    #[error("field {field} contains a reserved character (actual: {value:?})")]
    ReservedCharacter { field: &'static str, value: String },

    #[error("wrong field count: expected {expected}, got {actual}")]
    FieldCount { expected: usize, actual: usize },
}

/// A single lottery bet, tagged with the agency (client) that placed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetRecord {
    client_id: String,
    first_name: String,
    last_name: String,
    document_number: String,
    birth_date: String,
    number: String,
}

impl BetRecord {
    /// Create a validated record
    pub fn new(
        client_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        document_number: impl Into<String>,
        birth_date: impl Into<String>,
        number: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let record = Self {
            client_id: client_id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            document_number: document_number.into(),
            birth_date: birth_date.into(),
            number: number.into(),
        };
        record.validate()?;
        Ok(record)
    }

    /// Build a record from the five CSV columns
    /// (first name, last name, document, birth date, number)
    pub fn from_columns<S: AsRef<str>>(client_id: &str, columns: &[S]) -> Result<Self, ValidationError> {
        match columns {
            [first_name, last_name, document_number, birth_date, number] => Self::new(
                client_id,
                first_name.as_ref().trim(),
                last_name.as_ref().trim(),
                document_number.as_ref().trim(),
                birth_date.as_ref().trim(),
                number.as_ref().trim(),
            ),
            _ => Err(ValidationError::FieldCount {
                expected: CSV_FIELD_COUNT,
                actual: columns.len(),
            }),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if NaiveDate::parse_from_str(&self.birth_date, BIRTH_DATE_FORMAT).is_err() {
            return Err(ValidationError::InvalidBirthDate(self.birth_date.clone()));
        }

        if self.number.parse::<i64>().is_err() {
            return Err(ValidationError::InvalidNumber(self.number.clone()));
        }

        for (field, value) in self.named_fields() {
            if value.contains(FIELD_SEPARATOR) || value.contains(LINE_TERMINATOR) {
                return Err(ValidationError::ReservedCharacter {
                    field,
                    value: value.to_string(),
                });
            }
        }

        Ok(())
    }

    fn named_fields(&self) -> [(&'static str, &str); 6] {
        [
            ("client_id", &self.client_id),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("document_number", &self.document_number),
            ("birth_date", &self.birth_date),
            ("number", &self.number),
        ]
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn document_number(&self) -> &str {
        &self.document_number
    }

    pub fn birth_date(&self) -> &str {
        &self.birth_date
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    /// Fields in wire order
    pub fn fields(&self) -> [&str; 6] {
        self.named_fields().map(|(_, value)| value)
    }

    /// Append the wire line for this record (fields joined by `|`, newline-terminated)
    pub fn write_line(&self, out: &mut String) {
        for (i, field) in self.fields().iter().enumerate() {
            if i > 0 {
                out.push(FIELD_SEPARATOR);
            }
            out.push_str(field);
        }
        out.push(LINE_TERMINATOR);
    }

    /// Number of bytes this record occupies inside a payload
    pub fn serialized_size(&self) -> usize {
        let separators = self.fields().len() - 1;
        self.fields().iter().map(|f| f.len()).sum::<usize>() + separators + 1
    }
}

impl std::fmt::Display for BetRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} (document {}, number {})",
            self.first_name, self.last_name, self.document_number, self.number
        )
    }
}
