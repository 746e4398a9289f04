//! Help-desk assistant with offline fallback.
//!
//! Questions go to the backend chat endpoint first. If that call fails, the
//! answer comes from a fixed local Q/A table, matched by best keyword
//! overlap between the query and each entry's key.

use std::sync::Arc;

use crate::backend::OnboardingBackend;

/// Local knowledge table, keyed by the phrases users actually type.
const KNOWLEDGE: &[(&str, &str)] = &[
    (
        "what is nps",
        "The National Pension System is a regulated retirement scheme. Contributions are \
         managed by professional pension fund managers and invested across equity, corporate \
         bonds, and government securities.",
    ),
    (
        "how to open account",
        "You need an identity document (Aadhaar or PAN) for KYC, a bank account for \
         contributions, and nominee details. The whole flow completes digitally in a few \
         minutes.",
    ),
    (
        "tax benefits",
        "Contributions qualify for deductions under Section 80CCD(1) up to the 80C limit, an \
         additional exclusive 50,000 under 80CCD(1B), and employer contributions under \
         80CCD(2).",
    ),
    (
        "what is pran",
        "PRAN is your Permanent Retirement Account Number — a lifelong 12-digit identifier \
         for your pension account. Once generated it never changes.",
    ),
    (
        "minimum contribution",
        "The minimum contribution is 500 per transaction for a Tier I account, with an annual \
         minimum of 1,000. There is no upper limit.",
    ),
    (
        "tier 1 tier 2",
        "Tier I is the primary pension account with tax benefits and withdrawal restrictions. \
         Tier II is a voluntary savings account with full flexibility and no lock-in.",
    ),
    (
        "withdrawal",
        "At 60 you can withdraw up to 60% as a lump sum; the remaining 40% buys an annuity \
         for a monthly pension. Partial withdrawals of up to 25% are allowed after three \
         years for specific purposes.",
    ),
    (
        "kyc",
        "Identity verification can be completed via the CKYC registry, Aadhaar OTP, bank \
         record verification, AI document scan, or DigiLocker — all fully digital.",
    ),
    (
        "upi lite",
        "UPI Lite allows small contributions (under 1,000) without entering a PIN, and works \
         offline as well.",
    ),
    (
        "fund manager",
        "Several regulated pension fund managers are available; you choose one at sign-up and \
         may switch once per year.",
    ),
    (
        "risk",
        "Auto choice follows a lifecycle glide path that reduces equity with age. Active \
         choice lets you set your own allocation, with higher equity meaning higher potential \
         returns and more risk.",
    ),
    (
        "help",
        "You can ask about opening an account, KYC methods, tax benefits, contribution \
         amounts, Tier I vs Tier II, payment options, withdrawal rules, or fund managers.",
    ),
];

const FALLBACK_REPLY: &str = "I'm not sure about that, but I can help with accounts, KYC, tax \
    benefits, investments, and payments. Try asking 'what is NPS' or type 'help' for all topics.";

/// Answer a query from the local table.
///
/// Direct key match wins; otherwise the entry whose key shares the most
/// keywords with the query is chosen; ties go to the earlier entry.
pub fn local_answer(query: &str) -> &'static str {
    let q = query.to_lowercase();
    let q = q.trim();

    if let Some((_, answer)) = KNOWLEDGE.iter().find(|(key, _)| *key == q) {
        return answer;
    }

    let mut best: Option<&'static str> = None;
    let mut best_score = 0usize;
    for (key, answer) in KNOWLEDGE {
        let score = key.split(' ').filter(|kw| q.contains(kw)).count();
        if score > best_score {
            best_score = score;
            best = Some(answer);
        }
    }

    best.unwrap_or(FALLBACK_REPLY)
}

/// Remote-first assistant that degrades to the local table.
pub struct ChatAssistant {
    backend: Arc<dyn OnboardingBackend>,
}

impl ChatAssistant {
    pub fn new(backend: Arc<dyn OnboardingBackend>) -> Self {
        Self { backend }
    }

    /// Ask the backend; on any failure, answer locally.
    pub async fn ask(&self, query: &str) -> String {
        match self.backend.chat(query).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Remote chat failed, using local knowledge: {e}");
                local_answer(query).to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StubBackend;

    #[test]
    fn direct_match() {
        let answer = local_answer("what is pran");
        assert!(answer.contains("Permanent Retirement Account Number"));
    }

    #[test]
    fn direct_match_is_case_insensitive() {
        assert_eq!(local_answer("What Is PRAN  "), local_answer("what is pran"));
    }

    #[test]
    fn keyword_overlap_match() {
        // "contribution" overlaps the "minimum contribution" key.
        let answer = local_answer("what is the minimum contribution amount?");
        assert!(answer.contains("500"));
    }

    #[test]
    fn unknown_query_gets_fallback() {
        assert_eq!(local_answer("zzzz qqqq"), FALLBACK_REPLY);
    }

    #[test]
    fn help_lists_topics() {
        assert!(local_answer("help").contains("KYC methods"));
    }

    #[tokio::test]
    async fn assistant_falls_back_when_remote_fails() {
        // The stub backend's chat endpoint always fails.
        let assistant = ChatAssistant::new(Arc::new(StubBackend::new()));
        let reply = assistant.ask("what is pran").await;
        assert!(reply.contains("Permanent Retirement Account Number"));
    }
}
