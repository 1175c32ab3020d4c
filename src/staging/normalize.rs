//! Row normalization: raw CSV row to `CanonicalRecord`
//!
//! This is the only place columns are looked up by name. Everything downstream
//! works on the typed record.

use csv::{ByteRecord, StringRecord};
use tracing::{debug, trace};

use super::error::RowError;
use super::record::{CanonicalRecord, Field, FieldKind};

/// A row that survived normalization
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    /// The typed record
    pub record: CanonicalRecord,
    /// Number of fields whose raw value could not be coerced and became null
    pub coercion_failures: u32,
}

/// Maps raw rows onto the declared field set for one source
#[derive(Debug, Clone)]
pub struct RowNormalizer {
    /// Declared fields found in the header, with their column position
    columns: Vec<(Field, usize)>,
    source_file: String,
    processing_batch: String,
}

impl RowNormalizer {
    /// Resolve the declared fields against the source header
    pub fn new(
        headers: &StringRecord,
        source_file: impl Into<String>,
        processing_batch: impl Into<String>,
    ) -> Self {
        let mut columns: Vec<(Field, usize)> = Vec::new();
        for (index, name) in headers.iter().enumerate() {
            match Field::from_name(name) {
                Some(field) if !columns.iter().any(|(f, _)| *f == field) => {
                    columns.push((field, index));
                }
                Some(field) => debug!(column = %field, index, "Duplicate header ignored"),
                None => debug!(column = name, "Unknown column ignored"),
            }
        }

        let missing: Vec<&str> = Field::ALL
            .iter()
            .filter(|f| !columns.iter().any(|(c, _)| c == *f))
            .map(|f| f.name())
            .collect();
        if !missing.is_empty() {
            debug!(missing = ?missing, "Declared columns absent from source; they will be null");
        }

        Self {
            columns,
            source_file: source_file.into(),
            processing_batch: processing_batch.into(),
        }
    }

    /// Declared fields the source actually supplies. Nulls are tracked only here.
    pub fn tracked_fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.columns.iter().map(|(field, _)| *field)
    }

    /// Whether a record has a null in any tracked field
    pub fn has_tracked_null(&self, record: &CanonicalRecord) -> bool {
        self.tracked_fields().any(|field| record.get(field).is_null())
    }

    /// Normalize one raw row.
    ///
    /// A cell that is not valid UTF-8 becomes null and counts as a coercion
    /// failure. `line` is only used to identify the row in a rejection.
    pub fn normalize(&self, row: &ByteRecord, line: u64) -> Result<NormalizedRow, RowError> {
        let mut record = CanonicalRecord::new(&self.source_file, &self.processing_batch);
        let mut coercion_failures = 0;

        for (field, index) in &self.columns {
            let Some(bytes) = row.get(*index) else {
                continue;
            };
            let raw = match std::str::from_utf8(bytes) {
                Ok(text) => text.trim(),
                Err(e) => {
                    coercion_failures += 1;
                    trace!(line, column = %field, error = %e, "Cell is not UTF-8; storing null");
                    continue;
                }
            };
            if raw.is_empty() {
                continue;
            }

            let coerced = match field.kind() {
                FieldKind::Text => {
                    record.set_text(*field, Some(raw.to_string()));
                    true
                }
                FieldKind::Integer => {
                    let value = parse_integer(raw).filter(|v| {
                        // Counts cannot be negative
                        *field != Field::NumberOfReviews || *v >= 0
                    });
                    record.set_integer(*field, value);
                    value.is_some()
                }
                FieldKind::Decimal => {
                    let value = parse_decimal(raw);
                    record.set_decimal(*field, value);
                    value.is_some()
                }
                FieldKind::Flag => {
                    let value = parse_flag(raw);
                    record.is_free_shipping = value;
                    value.is_some()
                }
            };

            if !coerced {
                coercion_failures += 1;
                trace!(line, column = %field, raw, "Coercion failed; storing null");
            }
        }

        if !record.has_identifier() {
            return Err(RowError::MissingIdentifiers { line });
        }

        Ok(NormalizedRow {
            record,
            coercion_failures,
        })
    }
}

/// Largest magnitude up to which every integer has an exact `f64`
const MAX_EXACT_F64_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Parse a whole number, accepting float-formatted integers such as `123.0`
pub fn parse_integer(raw: &str) -> Option<i64> {
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }

    // `123.000` keeps full precision through the integer part
    if let Some((whole, fraction)) = raw.split_once('.') {
        if fraction.bytes().all(|b| b == b'0') {
            if let Ok(value) = whole.parse::<i64>() {
                return Some(value);
            }
        }
    }

    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT_F64_INTEGER {
        Some(value as i64)
    } else {
        None
    }
}

/// Parse a finite real number
pub fn parse_decimal(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a boolean flag from the spellings found in exported listings
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "false" | "f" | "no" | "n" => Some(false),
        other => match parse_decimal(other) {
            Some(v) if v == 1.0 => Some(true),
            Some(v) if v == 0.0 => Some(false),
            _ => None,
        },
    }
}
