use crate::records::MatchedClient;
use serde::Serialize;

/// Referral sources that never receive a notification, compared lowercased.
pub const DEFAULT_EXCLUDED_SOURCES: &[&str] = &["unknown", "no referral source", "", "babynet"];

/// Clients sharing one exact referral source, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferralGroup {
    pub referral_source: String,
    pub clients: Vec<MatchedClient>,
}

/// True when `source` (lowercased) is in `excluded` (also lowercased).
pub fn is_excluded(source: &str, excluded: &[String]) -> bool {
    let lowered = source.to_lowercase();
    excluded.iter().any(|e| e.to_lowercase() == lowered)
}

/// Partition `clients` by exact referral source, dropping excluded sources.
///
/// Group order is the order in which each source is first seen; within a
/// group, clients keep their input order. Empty groups are never produced.
pub fn group_by_referral(clients: &[MatchedClient], excluded: &[String]) -> Vec<ReferralGroup> {
    let mut groups: Vec<ReferralGroup> = Vec::new();
    for client in clients {
        if is_excluded(&client.referral_source, excluded) {
            tracing::debug!(client_id = %client.client_id, source = %client.referral_source, "referral source excluded");
            continue;
        }
        match groups
            .iter_mut()
            .find(|g| g.referral_source == client.referral_source)
        {
            Some(group) => group.clients.push(client.clone()),
            None => groups.push(ReferralGroup {
                referral_source: client.referral_source.clone(),
                clients: vec![client.clone()],
            }),
        }
    }
    groups
}

pub fn default_excluded() -> Vec<String> {
    DEFAULT_EXCLUDED_SOURCES.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(id: &str, source: &str) -> MatchedClient {
        MatchedClient {
            client_id: id.to_string(),
            display_name: format!("Client {id}"),
            appointment_time: "01/01/2031 09:00 AM".to_string(),
            referral_source: source.to_string(),
        }
    }

    #[test]
    fn exclusion_is_case_insensitive() {
        let excluded = default_excluded();
        let clients = vec![
            client("1", "BabyNet"),
            client("2", "babynet"),
            client("3", "BABYNET"),
            client("4", "Unknown"),
            client("5", "No Referral Source"),
            client("6", ""),
        ];
        assert!(group_by_referral(&clients, &excluded).is_empty());
    }

    #[test]
    fn groups_by_exact_source_preserving_order() {
        let excluded = default_excluded();
        let acme = "Acme Pediatrics (fax: 8035551234)";
        let clients = vec![
            client("1", acme),
            client("2", "Coastal Peds"),
            client("3", acme),
            client("4", "acme pediatrics (fax: 8035551234)"),
        ];
        let groups = group_by_referral(&clients, &excluded);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].referral_source, acme);
        let ids: Vec<&str> = groups[0].clients.iter().map(|c| c.client_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(groups[1].referral_source, "Coastal Peds");
        assert_eq!(groups[2].clients.len(), 1);
    }

    #[test]
    fn custom_exclusions_apply() {
        let excluded = vec!["Self".to_string()];
        let groups = group_by_referral(&[client("1", "SELF"), client("2", "Unknown")], &excluded);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].referral_source, "Unknown");
    }
}
