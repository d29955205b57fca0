use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// TableKind
// ---------------------------------------------------------------------------

/// The three input tables and the column sets each one must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Demographics,
    Referral,
    Appointments,
}

pub const DEMOGRAPHICS_COLUMNS: &[&str] = &[
    "CLIENT_ID",
    "STATUS",
    "LASTNAME",
    "FIRSTNAME",
    "USER_ADDRESS_ADDRESS1",
    "USER_ADDRESS_CITY",
    "USER_ADDRESS_STATE",
    "USER_ADDRESS_ZIP",
];

pub const REFERRAL_COLUMNS: &[&str] = &[
    "Client Name",
    "Therapist Name",
    "Referral Name",
    "Client Status",
];

pub const APPOINTMENT_COLUMNS: &[&str] = &[
    "CLIENT_ID",
    "APPOINTMENT_ID",
    "LASTNAME",
    "FIRSTNAME",
    "STARTTIME",
    "ENDTIME",
    "LOCATION",
    "NAME",
];

impl TableKind {
    pub fn all() -> &'static [TableKind] {
        &[
            TableKind::Demographics,
            TableKind::Referral,
            TableKind::Appointments,
        ]
    }

    /// Human label used in log lines and error messages.
    pub fn label(self) -> &'static str {
        match self {
            TableKind::Demographics => "Demographics",
            TableKind::Referral => "Referral",
            TableKind::Appointments => "Appointments",
        }
    }

    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            TableKind::Demographics => DEMOGRAPHICS_COLUMNS,
            TableKind::Referral => REFERRAL_COLUMNS,
            TableKind::Appointments => APPOINTMENT_COLUMNS,
        }
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Row records
// ---------------------------------------------------------------------------

/// One row of the demographics export.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientRecord {
    #[serde(rename = "CLIENT_ID", deserialize_with = "trimmed")]
    pub client_id: String,
    #[serde(rename = "STATUS", default)]
    pub status: Option<String>,
    #[serde(rename = "LASTNAME", default)]
    pub last_name: String,
    #[serde(rename = "FIRSTNAME", default)]
    pub first_name: String,
    #[serde(rename = "PREFERRED_NAME", default)]
    pub preferred_name: Option<String>,
    #[serde(rename = "USER_ADDRESS_ADDRESS1", default)]
    pub address1: Option<String>,
    #[serde(rename = "USER_ADDRESS_CITY", default)]
    pub city: Option<String>,
    #[serde(rename = "USER_ADDRESS_STATE", default)]
    pub state: Option<String>,
    #[serde(rename = "USER_ADDRESS_ZIP", default)]
    pub zip: Option<String>,
}

impl ClientRecord {
    pub fn new(
        client_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            status: None,
            last_name: last_name.into(),
            first_name: first_name.into(),
            preferred_name: None,
            address1: None,
            city: None,
            state: None,
            zip: None,
        }
    }

    pub fn with_preferred_name(mut self, preferred: impl Into<String>) -> Self {
        self.preferred_name = Some(preferred.into());
        self
    }

    /// Preferred name, treating a blank cell as absent.
    pub fn preferred(&self) -> Option<&str> {
        self.preferred_name
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }
}

/// One row of the referral report. Not uniquely keyed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReferralRecord {
    #[serde(rename = "Client Name", default)]
    pub client_name: String,
    #[serde(rename = "Therapist Name", default)]
    pub therapist_name: Option<String>,
    #[serde(rename = "Referral Name", default)]
    pub referral_name: Option<String>,
    #[serde(rename = "Client Status", default)]
    pub client_status: Option<String>,
}

impl ReferralRecord {
    pub fn new(client_name: impl Into<String>, referral_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            therapist_name: None,
            referral_name: Some(referral_name.into()),
            client_status: None,
        }
    }
}

/// One row of the appointments export.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppointmentRecord {
    #[serde(rename = "CLIENT_ID", deserialize_with = "trimmed")]
    pub client_id: String,
    #[serde(rename = "APPOINTMENT_ID", default)]
    pub appointment_id: String,
    #[serde(
        rename = "STARTTIME",
        default,
        deserialize_with = "crate::timestamp::deserialize_lenient"
    )]
    pub start_time: Option<NaiveDateTime>,
    #[serde(
        rename = "ENDTIME",
        default,
        deserialize_with = "crate::timestamp::deserialize_lenient"
    )]
    pub end_time: Option<NaiveDateTime>,
    #[serde(rename = "LOCATION", default)]
    pub location: Option<String>,
    #[serde(rename = "NAME", default)]
    pub procedure_label: Option<String>,
}

impl AppointmentRecord {
    pub fn new(
        client_id: impl Into<String>,
        appointment_id: impl Into<String>,
        start_time: Option<NaiveDateTime>,
        procedure_label: Option<&str>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            appointment_id: appointment_id.into(),
            start_time,
            end_time: None,
            location: None,
            procedure_label: procedure_label.map(str::to_string),
        }
    }
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_string())
}

// ---------------------------------------------------------------------------
// MatchedClient
// ---------------------------------------------------------------------------

/// A qualifying appointment joined with its client and referral source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedClient {
    pub client_id: String,
    pub display_name: String,
    pub appointment_time: String,
    pub referral_source: String,
}
