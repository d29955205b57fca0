use crate::error::{ReferralError, Result};
use crate::records::{AppointmentRecord, ClientRecord, MatchedClient, ReferralRecord};
use crate::timestamp;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Referral source assigned when no referral row matches a client.
pub const UNKNOWN_SOURCE: &str = "Unknown";

// ---------------------------------------------------------------------------
// UnknownClientPolicy
// ---------------------------------------------------------------------------

/// What to do with an appointment whose CLIENT_ID is absent from demographics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownClientPolicy {
    /// Log a warning, count the appointment as skipped, keep going.
    #[default]
    Skip,
    /// Abort the run with [`ReferralError::UnknownClient`].
    Fail,
}

// ---------------------------------------------------------------------------
// MatchOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchOutcome {
    pub clients: Vec<MatchedClient>,
    /// Future, in-scope appointments dropped because their client is unknown.
    pub skipped_appointments: Vec<String>,
}

// ---------------------------------------------------------------------------
// Name helpers
// ---------------------------------------------------------------------------

/// "First Last" join key used against the referral report's "Client Name".
pub fn lookup_name(first: &str, last: &str) -> String {
    format!("{first} {last}")
}

/// Legal name, with the preferred name quoted after the first name when it
/// differs case-insensitively: `Jane "Janie" Doe`.
pub fn display_name(client: &ClientRecord) -> String {
    match client.preferred() {
        Some(pref) if pref.to_lowercase() != client.first_name.to_lowercase() => {
            format!("{} \"{}\" {}", client.first_name, pref, client.last_name)
        }
        _ => lookup_name(&client.first_name, &client.last_name),
    }
}

/// Referral source for `client`: legal-name lookup first, then preferred-name
/// lookup, then [`UNKNOWN_SOURCE`]. First matching row wins.
pub fn referral_source(client: &ClientRecord, referrals: &[ReferralRecord]) -> String {
    let by_legal = lookup_name(&client.first_name, &client.last_name);
    let found = find_referral(referrals, &by_legal).or_else(|| {
        client
            .preferred()
            .and_then(|pref| find_referral(referrals, &lookup_name(pref, &client.last_name)))
    });

    found
        .and_then(|r| r.referral_name.as_deref())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
}

fn find_referral<'a>(referrals: &'a [ReferralRecord], name: &str) -> Option<&'a ReferralRecord> {
    let mut hits = referrals.iter().filter(|r| r.client_name == name);
    let first = hits.next()?;
    let extra = hits.count();
    if extra > 0 {
        tracing::warn!(client_name = %name, duplicates = extra, "multiple referral rows; using the first");
    }
    Some(first)
}

fn find_client<'a>(clients: &'a [ClientRecord], client_id: &str) -> Option<&'a ClientRecord> {
    let mut hits = clients.iter().filter(|c| c.client_id == client_id);
    let first = hits.next()?;
    let extra = hits.count();
    if extra > 0 {
        tracing::warn!(client_id = %client_id, duplicates = extra, "duplicate demographics rows; using the first");
    }
    Some(first)
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Strictly after `now`. Absent start times never qualify.
pub fn is_future(appt: &AppointmentRecord, now: NaiveDateTime) -> bool {
    appt.start_time.is_some_and(|start| start > now)
}

/// Case-sensitive substring match on the procedure label. Absent labels never match.
pub fn has_procedure(appt: &AppointmentRecord, code: &str) -> bool {
    appt.procedure_label
        .as_deref()
        .is_some_and(|label| label.contains(code))
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Join future appointments for `code` against demographics and referrals.
///
/// Output order follows the appointments table. One [`MatchedClient`] is
/// produced per qualifying appointment, so a client with two qualifying
/// appointments appears twice.
pub fn match_clients(
    clients: &[ClientRecord],
    referrals: &[ReferralRecord],
    appointments: &[AppointmentRecord],
    code: &str,
    now: NaiveDateTime,
    policy: UnknownClientPolicy,
) -> Result<MatchOutcome> {
    tracing::info!(code = %code, appointments = appointments.len(), "fetching clients");

    let mut outcome = MatchOutcome::default();
    let targets = appointments
        .iter()
        .filter(|a| is_future(a, now))
        .filter(|a| has_procedure(a, code));

    for appt in targets {
        tracing::debug!(client_id = %appt.client_id, appointment_id = %appt.appointment_id, "processing appointment");

        let Some(client) = find_client(clients, &appt.client_id) else {
            match policy {
                UnknownClientPolicy::Fail => {
                    return Err(ReferralError::UnknownClient {
                        client_id: appt.client_id.clone(),
                        appointment_id: appt.appointment_id.clone(),
                    });
                }
                UnknownClientPolicy::Skip => {
                    tracing::warn!(
                        client_id = %appt.client_id,
                        appointment_id = %appt.appointment_id,
                        "appointment references unknown client; skipping"
                    );
                    outcome.skipped_appointments.push(appt.appointment_id.clone());
                    continue;
                }
            }
        };

        outcome.clients.push(MatchedClient {
            client_id: client.client_id.clone(),
            display_name: display_name(client),
            appointment_time: timestamp::display(appt.start_time),
            referral_source: referral_source(client, referrals),
        });
    }

    tracing::info!(code = %code, found = outcome.clients.len(), "matched clients");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn appt(client: &str, id: &str, offset_hours: i64, label: Option<&str>) -> AppointmentRecord {
        AppointmentRecord::new(
            client,
            id,
            Some(now() + Duration::hours(offset_hours)),
            label,
        )
    }

    fn run(
        clients: &[ClientRecord],
        referrals: &[ReferralRecord],
        appts: &[AppointmentRecord],
    ) -> Vec<MatchedClient> {
        match_clients(clients, referrals, appts, "96136", now(), UnknownClientPolicy::Skip)
            .unwrap()
            .clients
    }

    #[test]
    fn past_and_present_appointments_are_dropped() {
        let clients = vec![ClientRecord::new("1", "Ann", "Lee")];
        let appts = vec![
            appt("1", "past", -1, Some("96136")),
            appt("1", "now", 0, Some("96136")),
            AppointmentRecord::new("1", "absent", None, Some("96136")),
        ];
        assert!(run(&clients, &[], &appts).is_empty());
    }

    #[test]
    fn procedure_match_is_case_sensitive_substring() {
        let clients = vec![ClientRecord::new("1", "Ann", "Lee")];
        let appts = vec![
            appt("1", "a", 1, Some("CPT96136-Eval")),
            appt("1", "b", 2, Some("cpt9613")),
            appt("1", "c", 3, None),
        ];
        let out = match_clients(&clients, &[], &appts, "CPT96136", now(), UnknownClientPolicy::Skip)
            .unwrap()
            .clients;
        assert_eq!(out.len(), 1);

        let out = match_clients(&clients, &[], &appts, "cpt96136", now(), UnknownClientPolicy::Skip)
            .unwrap()
            .clients;
        assert!(out.is_empty());
    }

    #[test]
    fn preferred_name_fallback_finds_referral() {
        let clients = vec![ClientRecord::new("42", "Jane", "Doe").with_preferred_name("Janie")];
        let referrals = vec![ReferralRecord::new("Janie Doe", "X")];
        let appts = vec![appt("42", "a", 24, Some("CPT96136-Eval"))];

        let out = run(&clients, &referrals, &appts);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].display_name, "Jane \"Janie\" Doe");
        assert_eq!(out[0].referral_source, "X");
    }

    #[test]
    fn legal_name_lookup_wins_over_preferred() {
        let clients = vec![ClientRecord::new("42", "Jane", "Doe").with_preferred_name("Janie")];
        let referrals = vec![
            ReferralRecord::new("Janie Doe", "Preferred"),
            ReferralRecord::new("Jane Doe", "Legal"),
        ];
        let out = run(&clients, &referrals, &[appt("42", "a", 1, Some("96136"))]);
        assert_eq!(out[0].referral_source, "Legal");
    }

    #[test]
    fn no_referral_row_yields_unknown() {
        let clients = vec![ClientRecord::new("42", "Jane", "Doe").with_preferred_name("Janie")];
        let out = run(&clients, &[], &[appt("42", "a", 1, Some("96136"))]);
        assert_eq!(out[0].referral_source, UNKNOWN_SOURCE);
    }

    #[test]
    fn blank_referral_name_yields_unknown() {
        let clients = vec![ClientRecord::new("1", "Ann", "Lee")];
        let mut referral = ReferralRecord::new("Ann Lee", "");
        referral.referral_name = None;
        let out = run(&clients, &[referral], &[appt("1", "a", 1, Some("96136"))]);
        assert_eq!(out[0].referral_source, UNKNOWN_SOURCE);
    }

    #[test]
    fn preferred_name_equal_to_first_is_not_repeated() {
        let client = ClientRecord::new("1", "Jane", "Doe").with_preferred_name("JANE");
        assert_eq!(display_name(&client), "Jane Doe");
    }

    #[test]
    fn preferred_name_comparison_folds_non_ascii_case() {
        let client = ClientRecord::new("1", "José", "Doe").with_preferred_name("JOSÉ");
        assert_eq!(display_name(&client), "José Doe");

        let client = ClientRecord::new("2", "Zoë", "Roe").with_preferred_name("Zozo");
        assert_eq!(display_name(&client), "Zoë \"Zozo\" Roe");
    }

    #[test]
    fn first_referral_row_wins() {
        let clients = vec![ClientRecord::new("1", "Ann", "Lee")];
        let referrals = vec![
            ReferralRecord::new("Ann Lee", "First"),
            ReferralRecord::new("Ann Lee", "Second"),
        ];
        let out = run(&clients, &referrals, &[appt("1", "a", 1, Some("96136"))]);
        assert_eq!(out[0].referral_source, "First");
    }

    #[test]
    fn output_follows_appointment_order() {
        let clients = vec![
            ClientRecord::new("1", "Ann", "Lee"),
            ClientRecord::new("2", "Bob", "Ray"),
        ];
        let appts = vec![
            appt("2", "late", 48, Some("96136")),
            appt("1", "early", 2, Some("96136")),
        ];
        let out = run(&clients, &[], &appts);
        let ids: Vec<&str> = out.iter().map(|m| m.client_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn appointment_time_is_formatted() {
        let clients = vec![ClientRecord::new("1", "Ann", "Lee")];
        let out = run(&clients, &[], &[appt("1", "a", 2, Some("96136"))]);
        assert_eq!(out[0].appointment_time, "06/01/2030 02:00 PM");
    }

    #[test]
    fn unknown_client_is_skipped_under_skip_policy() {
        let appts = vec![appt("99", "orphan", 1, Some("96136"))];
        let outcome =
            match_clients(&[], &[], &appts, "96136", now(), UnknownClientPolicy::Skip).unwrap();
        assert!(outcome.clients.is_empty());
        assert_eq!(outcome.skipped_appointments, vec!["orphan".to_string()]);
    }

    #[test]
    fn unknown_client_fails_under_fail_policy() {
        let appts = vec![appt("99", "orphan", 1, Some("96136"))];
        let err = match_clients(&[], &[], &appts, "96136", now(), UnknownClientPolicy::Fail)
            .unwrap_err();
        assert!(matches!(err, ReferralError::UnknownClient { ref client_id, .. } if client_id == "99"));
    }
}
