use crate::error::{ReferralError, Result};
use crate::records::TableKind;
use csv::StringRecord;
use serde::de::DeserializeOwned;
use std::path::Path;

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Which text encoding a file was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf8Bom,
    Windows1252,
}

/// Windows-1252 code points for bytes 0x80..=0x9F. The five bytes the code
/// page leaves undefined map to the matching C1 control, as browsers do.
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

fn windows_1252_char(b: u8) -> char {
    match b {
        0x80..=0x9F => WINDOWS_1252_HIGH[usize::from(b - 0x80)],
        _ => char::from(b),
    }
}

/// Decode raw file bytes. UTF-8 (with or without BOM) is tried first; anything
/// else is read as Windows-1252, the code page spreadsheet exports on Windows
/// use. That decoding never fails.
pub fn decode(bytes: &[u8]) -> (String, Encoding) {
    const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
    if let Some(rest) = bytes.strip_prefix(BOM) {
        if let Ok(text) = std::str::from_utf8(rest) {
            return (text.to_string(), Encoding::Utf8Bom);
        }
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), Encoding::Utf8),
        Err(_) => (
            bytes.iter().copied().map(windows_1252_char).collect(),
            Encoding::Windows1252,
        ),
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A parsed CSV file: header row plus raw string rows.
#[derive(Debug, Clone)]
pub struct Table {
    pub source: String,
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

impl Table {
    /// Parse CSV text already decoded to a string.
    pub fn parse(source: impl Into<String>, text: &str) -> Result<Self> {
        let source = source.into();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers = reader.headers()?.clone();
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ReferralError::EmptyTable { path: source });
        }
        let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            source,
            headers,
            rows,
        })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.trim() == name)
    }

    /// Every required column of `kind` that this table lacks.
    pub fn missing_columns(&self, kind: TableKind) -> Vec<String> {
        kind.required_columns()
            .iter()
            .filter(|col| !self.has_column(col))
            .map(|col| col.to_string())
            .collect()
    }

    /// Schema gate: fail with the full list of missing columns for this file.
    pub fn require_columns(self, kind: TableKind) -> Result<Self> {
        let missing = self.missing_columns(kind);
        if !missing.is_empty() {
            return Err(ReferralError::MissingColumns {
                table: kind.label().to_string(),
                missing,
            });
        }
        Ok(self)
    }

    /// Deserialize every row into `T` by column name.
    pub fn records<T: DeserializeOwned>(&self, kind: TableKind) -> Result<Vec<T>> {
        let headers = trimmed_headers(&self.headers);
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.deserialize(Some(&headers))
                    .map_err(|e| ReferralError::InvalidRow {
                        table: kind.label().to_string(),
                        // 1-based, counting the header line
                        row: i + 2,
                        reason: e.to_string(),
                    })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn trimmed_headers(headers: &StringRecord) -> StringRecord {
    headers.iter().map(str::trim).collect()
}

/// Read, decode and parse a CSV file.
pub fn load_table(path: &Path) -> Result<Table> {
    let bytes = std::fs::read(path)?;
    let (text, encoding) = decode(&bytes);
    tracing::info!(path = %path.display(), ?encoding, "loaded table");
    Table::parse(path.display().to_string(), &text)
}

/// Load a file, run the schema gate for `kind`, and convert its rows.
pub fn load_records<T: DeserializeOwned>(path: &Path, kind: TableKind) -> Result<Vec<T>> {
    let table = load_table(path)?.require_columns(kind)?;
    let records = table.records(kind)?;
    tracing::debug!(table = %kind, rows = records.len(), "converted rows");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AppointmentRecord, ClientRecord, ReferralRecord};
    use tempfile::TempDir;

    const DEM: &str = "CLIENT_ID,STATUS,LASTNAME,FIRSTNAME,PREFERRED_NAME,USER_ADDRESS_ADDRESS1,USER_ADDRESS_CITY,USER_ADDRESS_STATE,USER_ADDRESS_ZIP\n\
42,Active,Doe,Jane,Janie,1 Main St,Charleston,SC,29401\n\
43,Active,Roe,Rick,,2 Main St,Charleston,SC,29401\n";

    #[test]
    fn decode_handles_bom_and_windows_1252() {
        let (text, enc) = decode(b"\xEF\xBB\xBFa,b");
        assert_eq!(text, "a,b");
        assert_eq!(enc, Encoding::Utf8Bom);

        let (text, enc) = decode(b"Jos\xE9");
        assert_eq!(text, "José");
        assert_eq!(enc, Encoding::Windows1252);

        let (_, enc) = decode("Zoë".as_bytes());
        assert_eq!(enc, Encoding::Utf8);
    }

    #[test]
    fn windows_1252_punctuation_is_not_left_as_control_chars() {
        let (text, enc) = decode(b"O\x92Brien \x96 \x93Dr\x94 \x80");
        assert_eq!(enc, Encoding::Windows1252);
        assert_eq!(text, "O\u{2019}Brien \u{2013} \u{201C}Dr\u{201D} \u{20AC}");
        assert!(!text.chars().any(|c| c.is_control()));
    }

    #[test]
    fn demographics_rows_deserialize() {
        let table = Table::parse("dem.csv", DEM)
            .unwrap()
            .require_columns(TableKind::Demographics)
            .unwrap();
        let clients: Vec<ClientRecord> = table.records(TableKind::Demographics).unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].client_id, "42");
        assert_eq!(clients[0].preferred(), Some("Janie"));
        assert_eq!(clients[1].preferred(), None);
        assert_eq!(clients[1].city.as_deref(), Some("Charleston"));
    }

    #[test]
    fn preferred_name_column_is_optional() {
        let text = "CLIENT_ID,STATUS,LASTNAME,FIRSTNAME,USER_ADDRESS_ADDRESS1,USER_ADDRESS_CITY,USER_ADDRESS_STATE,USER_ADDRESS_ZIP\n\
7,Active,Doe,Jane,,,,\n";
        let table = Table::parse("dem.csv", text).unwrap();
        let clients: Vec<ClientRecord> = table.records(TableKind::Demographics).unwrap();
        assert_eq!(clients[0].preferred_name, None);
    }

    #[test]
    fn missing_columns_are_all_reported() {
        let table = Table::parse("ref.csv", "Client Name,Referral Name\nJane Doe,Acme\n").unwrap();
        let err = table.require_columns(TableKind::Referral).unwrap_err();
        match err {
            ReferralError::MissingColumns { table, missing } => {
                assert_eq!(table, "Referral");
                assert_eq!(missing, vec!["Therapist Name", "Client Status"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn appointment_times_are_coerced() {
        let text = "CLIENT_ID,APPOINTMENT_ID,LASTNAME,FIRSTNAME,STARTTIME,ENDTIME,LOCATION,NAME\n\
42,A1,Doe,Jane,2031-03-04 09:00:00,2031-03-04 10:00:00,Main,CPT96136-Eval\n\
42,A2,Doe,Jane,not a date,,Main,\n";
        let table = Table::parse("app.csv", text).unwrap();
        let appts: Vec<AppointmentRecord> = table.records(TableKind::Appointments).unwrap();
        assert!(appts[0].start_time.is_some());
        assert_eq!(appts[0].procedure_label.as_deref(), Some("CPT96136-Eval"));
        assert_eq!(appts[1].start_time, None);
        assert_eq!(appts[1].procedure_label, None);
    }

    #[test]
    fn referral_rows_keep_client_name_verbatim() {
        let text = "Client Name,Therapist Name,Referral Name,Client Status\n\
\"Jane Doe \",Dr. X,\"Acme (fax: 1)\",Active\n";
        let table = Table::parse("ref.csv", text).unwrap();
        let refs: Vec<ReferralRecord> = table.records(TableKind::Referral).unwrap();
        assert_eq!(refs[0].client_name, "Jane Doe ");
        assert_eq!(refs[0].referral_name.as_deref(), Some("Acme (fax: 1)"));
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            load_table(&path),
            Err(ReferralError::EmptyTable { .. })
        ));
    }

    #[test]
    fn load_records_runs_schema_gate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dem.csv");
        std::fs::write(&path, b"CLIENT_ID,LASTNAME\n1,Doe\n").unwrap();
        let err = load_records::<ClientRecord>(&path, TableKind::Demographics).unwrap_err();
        assert!(err.to_string().contains("Demographics file is missing expected columns"));
    }
}
