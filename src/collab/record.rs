use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

pub const UNKNOWN: &str = "Unknown";

#[derive(Clone, Debug, PartialEq)]
pub struct Endpoint {
    pub id: String,
    pub name: String,
    pub category: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CollabRecord {
    pub first: Endpoint,
    pub second: Endpoint,
    pub count: u64,
    pub authors: u64,
}

/// One exported collaboration row, before coercion. Every field is optional so that
/// a malformed row can be defaulted field by field instead of failing the file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawRow {
    institution_1_id: Value,
    institution_1_name: Value,
    institution_1_country: Value,
    institution_1_lat: Value,
    institution_1_lon: Value,
    institution_2_id: Value,
    institution_2_name: Value,
    institution_2_country: Value,
    institution_2_lat: Value,
    institution_2_lon: Value,
    collaboration_count: Value,
    authors_involved: Value,
}

#[derive(Clone, Debug, Default)]
pub struct ParsedRecords {
    pub records: Vec<CollabRecord>,
    pub skipped_rows: usize,
    pub defaulted_fields: usize,
}

pub(super) fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Some(integer.to_string())
            } else {
                number
                    .as_f64()
                    .filter(|value| value.is_finite())
                    .map(|value| value.to_string())
            }
        }
        _ => None,
    }
}

pub(super) fn float_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

pub(super) fn count_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64)),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed.parse::<u64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .map(|v| v as u64)
            })
        }
        _ => None,
    }
}

impl RawRow {
    fn endpoint(
        id: &Value,
        name: &Value,
        category: &Value,
        lat: &Value,
        lon: &Value,
        defaulted: &mut usize,
    ) -> Option<Endpoint> {
        let id = text_value(id)?;

        let mut or_default = |value: Option<String>, fallback: &str| {
            value.unwrap_or_else(|| {
                *defaulted += 1;
                fallback.to_owned()
            })
        };
        let name = or_default(text_value(name), UNKNOWN);
        let category = or_default(text_value(category), UNKNOWN);

        let lat = float_value(lat).unwrap_or_else(|| {
            *defaulted += 1;
            0.0
        });
        let lon = float_value(lon).unwrap_or_else(|| {
            *defaulted += 1;
            0.0
        });

        Some(Endpoint {
            id,
            name,
            category,
            lat,
            lon,
        })
    }

    pub(super) fn into_record(self, defaulted: &mut usize) -> Option<CollabRecord> {
        let first = Self::endpoint(
            &self.institution_1_id,
            &self.institution_1_name,
            &self.institution_1_country,
            &self.institution_1_lat,
            &self.institution_1_lon,
            defaulted,
        )?;
        let second = Self::endpoint(
            &self.institution_2_id,
            &self.institution_2_name,
            &self.institution_2_country,
            &self.institution_2_lat,
            &self.institution_2_lon,
            defaulted,
        )?;

        let count = count_value(&self.collaboration_count).unwrap_or_else(|| {
            *defaulted += 1;
            0
        });
        let authors = count_value(&self.authors_involved).unwrap_or(0);

        Some(CollabRecord {
            first,
            second,
            count,
            authors,
        })
    }
}

pub fn parse_records(raw: &str) -> Result<ParsedRecords> {
    let parsed: Value = serde_json::from_str(raw).context("invalid JSON in records file")?;

    let rows = match &parsed {
        Value::Array(rows) => rows,
        Value::Object(object) => object
            .get("records")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("records file has no \"records\" array"))?,
        _ => return Err(anyhow!("unexpected JSON type in records file")),
    };

    let mut out = ParsedRecords::default();
    for (row_index, row) in rows.iter().enumerate() {
        let record = RawRow::deserialize(row)
            .ok()
            .and_then(|raw| raw.into_record(&mut out.defaulted_fields));

        match record {
            Some(record) => out.records.push(record),
            None => {
                out.skipped_rows += 1;
                warn!(row = row_index, "skipping collaboration row without institution ids");
            }
        }
    }

    if out.records.is_empty() {
        Err(anyhow!(
            "no usable collaboration rows found ({} skipped)",
            out.skipped_rows
        ))
    } else {
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_top_level_array() {
        let raw = r#"[
            {
                "institution_1_id": "I1", "institution_1_name": "Alpha", "institution_1_country": "US",
                "institution_1_lat": 40.0, "institution_1_lon": -74.0,
                "institution_2_id": 22, "institution_2_name": "Beta", "institution_2_country": "FR",
                "institution_2_lat": "48.8", "institution_2_lon": "2.3",
                "collaboration_count": 7, "authors_involved": "3"
            }
        ]"#;

        let parsed = parse_records(raw).expect("rows parse");
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.skipped_rows, 0);
        assert_eq!(parsed.defaulted_fields, 0);

        let record = &parsed.records[0];
        assert_eq!(record.first.id, "I1");
        assert_eq!(record.second.id, "22");
        assert_eq!(record.second.lat, 48.8);
        assert_eq!(record.count, 7);
        assert_eq!(record.authors, 3);
    }

    #[test]
    fn malformed_fields_fall_back_to_defaults() {
        let raw = r#"{"records": [
            {
                "institution_1_id": "A", "institution_1_country": null,
                "institution_2_id": "B", "institution_2_country": "NaN",
                "collaboration_count": "lots"
            }
        ]}"#;

        let parsed = parse_records(raw).expect("rows parse");
        let record = &parsed.records[0];
        assert_eq!(record.first.category, UNKNOWN);
        assert_eq!(record.second.category, UNKNOWN);
        assert_eq!(record.first.name, UNKNOWN);
        assert_eq!(record.count, 0);
        assert_eq!(record.first.lat, 0.0);
        assert!(parsed.defaulted_fields >= 5);
    }

    #[test]
    fn rows_without_ids_are_skipped() {
        let raw = r#"[
            {"institution_1_id": "A", "institution_2_id": "B", "collaboration_count": 2},
            {"institution_1_id": "A", "collaboration_count": 4},
            "not a row"
        ]"#;

        let parsed = parse_records(raw).expect("rows parse");
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.skipped_rows, 2);
    }

    #[test]
    fn file_without_usable_rows_is_an_error() {
        assert!(parse_records("[]").is_err());
        assert!(parse_records("{\"rows\": []}").is_err());
        assert!(parse_records("42").is_err());
        assert!(parse_records("not json").is_err());
    }

    #[test]
    fn fractional_counts_truncate() {
        let raw = r#"[{"institution_1_id": "A", "institution_2_id": "B", "collaboration_count": 3.0}]"#;
        let parsed = parse_records(raw).expect("rows parse");
        assert_eq!(parsed.records[0].count, 3);
    }
}
