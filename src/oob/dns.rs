//! Simulated DNS answers for the DNS-pingback endpoint
//!
//! No resolution happens: the answer only mirrors the shape of a DNS
//! response so tooling that expects one keeps working.

use serde::Serialize;

/// Answer returned for `A` queries
pub const SIMULATED_A_ANSWER: &str = "192.168.1.1";
/// Answer returned for every other query type
pub const SIMULATED_AAAA_ANSWER: &str = "2001:db8::1";
/// TTL reported with every simulated answer
pub const SIMULATED_TTL: u32 = 300;

/// Fake DNS response echoed back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulatedAnswer {
    pub status: &'static str,
    pub answer: Vec<String>,
    pub ttl: u32,
}

/// Builds the simulated answer for a query type
pub fn simulate_answer(query_type: &str) -> SimulatedAnswer {
    let address = if query_type == "A" {
        SIMULATED_A_ANSWER
    } else {
        SIMULATED_AAAA_ANSWER
    };

    SimulatedAnswer {
        status: "NOERROR",
        answer: vec![address.to_string()],
        ttl: SIMULATED_TTL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a_record() {
        let answer = simulate_answer("A");
        assert_eq!(answer.status, "NOERROR");
        assert_eq!(answer.answer, vec!["192.168.1.1"]);
        assert_eq!(answer.ttl, 300);
    }

    #[test]
    fn test_other_types_get_ipv6() {
        assert_eq!(simulate_answer("AAAA").answer, vec!["2001:db8::1"]);
        assert_eq!(simulate_answer("TXT").answer, vec!["2001:db8::1"]);
    }
}
