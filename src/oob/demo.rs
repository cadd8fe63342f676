//! Fixed demo DNS interactions shown before any real DNS callback arrives

use crate::models::{iso_timestamp, Body, FieldMap, Interaction, InteractionKind, DNS_QUERY_METHOD};
use chrono::Utc;

const DEMO_QUERIES: [(&str, &str); 2] = [("example.com", "A"), ("api.example.org", "AAAA")];

/// Builds the demo interactions, numbering IDs from `first_seq`
pub fn demo_interactions(first_seq: u64) -> Vec<Interaction> {
    let received_at = Utc::now();
    let timestamp = iso_timestamp(&received_at);

    DEMO_QUERIES
        .iter()
        .zip(first_seq..)
        .map(|(&(domain, query_type), seq)| {
            let mut headers = FieldMap::new();
            headers.insert("dns-type".to_string(), query_type.to_string());
            headers.insert("dns-class".to_string(), "IN".to_string());
            headers.insert("dns-query-type".to_string(), query_type.to_string());
            headers.insert("dns-domain".to_string(), domain.to_string());
            headers.insert("client-ip".to_string(), "unknown".to_string());
            headers.insert("dns-timestamp".to_string(), timestamp.clone());

            let mut query = FieldMap::new();
            query.insert("name".to_string(), domain.to_string());
            query.insert("type".to_string(), query_type.to_string());
            query.insert("resolved_domain".to_string(), domain.to_string());
            query.insert("query_type".to_string(), query_type.to_string());
            query.insert("client_ip".to_string(), "unknown".to_string());

            Interaction {
                id: format!("demo-dns-{seq}"),
                kind: InteractionKind::DnsSimulated,
                method: DNS_QUERY_METHOD.to_string(),
                target: format!("{domain} ({query_type})"),
                headers,
                query,
                body: Body::Absent,
                received_at,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_content() {
        let demos = demo_interactions(1);
        assert_eq!(demos.len(), 2);

        assert_eq!(demos[0].id, "demo-dns-1");
        assert_eq!(demos[0].target, "example.com (A)");
        assert_eq!(demos[1].id, "demo-dns-2");
        assert_eq!(demos[1].target, "api.example.org (AAAA)");

        for demo in &demos {
            assert!(demo.is_dns());
            assert_eq!(demo.method, DNS_QUERY_METHOD);
            assert!(demo.body.is_absent());
            assert_eq!(demo.headers["dns-class"], "IN");
        }
    }

    #[test]
    fn test_demo_numbering_offset() {
        let ids: Vec<String> = demo_interactions(5).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["demo-dns-5", "demo-dns-6"]);
    }
}
