//! Content moderation: the synchronous quick check and the asynchronous
//! extended check.
//!
//! The quick check is a whole-word prohibited-term scan run inline at task
//! creation; a hit rejects the request before anything is persisted. The
//! extended check re-runs the scan, layers heuristic detectors, and then
//! applies the poster's trust tier to decide between auto-approval and
//! manual review.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use crate::trust::TrustTier;
use crate::types::ModerationStatus;

/// Terms that reject a task outright, matched case-insensitively as whole
/// words. "therapeutic" must never trip the "rape" rule.
const PROHIBITED_TERMS: &[&str] = &[
    "hacking",
    "ddos",
    "doxxing",
    "malware",
    "ransomware",
    "phishing",
    "counterfeit",
    "rape",
    "hitman",
    "narcotics",
    "botnet",
];

/// Softer terms that do not reject but are pre-recorded on the task so the
/// extended pass routes it to review.
const REVIEW_TRIGGER_TERMS: &[&str] = &[
    "crypto",
    "gambling",
    "adult",
    "giveaway",
    "investment",
    "escort",
];

/// Spam and urgency phrasing, matched as case-insensitive substrings.
const SPAM_PHRASES: &[&str] = &[
    "act now",
    "limited time",
    "guaranteed income",
    "make money fast",
    "100% free",
    "click here",
    "risk free",
];

/// Discriminatory phrasing, matched as case-insensitive substrings.
const DISCRIMINATORY_PHRASES: &[&str] = &[
    "no women",
    "no men",
    "whites only",
    "males only",
    "females only",
    "no disabled",
    "natives only",
    "young people only",
];

/// Budgets above this are treated as far above norm.
const BUDGET_HARD_CEILING: u64 = 50_000_000;
/// Budgets below this for a substantial description are suspiciously low.
const BUDGET_SUSPICIOUS_FLOOR: u64 = 100;
const SUBSTANTIAL_DESCRIPTION_LEN: usize = 200;

/// A Rising-tier poster's clean task auto-approves only at or above this
/// reputation; below it the task still goes to manual review.
const RISING_AUTO_APPROVE_MIN_REPUTATION: f64 = 3.5;

fn word_list_regex(cell: &'static OnceLock<Regex>, terms: &[&str]) -> &'static Regex {
    cell.get_or_init(|| {
        let alternation = terms
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        RegexBuilder::new(&format!(r"\b({})\b", alternation))
            .case_insensitive(true)
            .build()
            .expect("static term list compiles")
    })
}

fn prohibited_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    word_list_regex(&RE, PROHIBITED_TERMS)
}

fn review_trigger_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    word_list_regex(&RE, REVIEW_TRIGGER_TERMS)
}

fn contact_info_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(
            r"([a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,})|(\+?\d[\d\s().-]{7,}\d)|(t\.me/|telegram\.me/|discord\.gg/|wa\.me/|whatsapp)",
        )
        .case_insensitive(true)
        .build()
        .expect("contact pattern compiles")
    })
}

fn distinct_matches(re: &Regex, text: &str) -> Vec<String> {
    let mut found = Vec::new();
    for m in re.find_iter(text) {
        let term = m.as_str().to_lowercase();
        if !found.contains(&term) {
            found.push(term);
        }
    }
    found
}

/// Synchronous creation-time scan. Returns the matched prohibited terms;
/// non-empty means reject.
pub fn quick_check(title: &str, description: &str) -> Vec<String> {
    let text = format!("{} {}", title, description);
    distinct_matches(prohibited_regex(), &text)
}

/// Review-trigger terms found in the text, recorded on the task at creation
/// for the extended pass to consider.
pub fn review_triggers(title: &str, description: &str) -> Vec<String> {
    let text = format!("{} {}", title, description);
    distinct_matches(review_trigger_regex(), &text)
        .into_iter()
        .map(|t| format!("review_trigger:{}", t))
        .collect()
}

/// Outcome of the extended check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationVerdict {
    pub status: ModerationStatus,
    pub issues: Vec<String>,
    pub note: Option<String>,
}

/// Inputs the extended check needs about the task under review.
#[derive(Debug, Clone)]
pub struct TaskContent<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub budget: u64,
    /// Issues already recorded at creation (review triggers).
    pub flagged_issues: &'a [String],
}

/// The asynchronous extended check. Pure: persistence and idempotency are
/// the engine's concern.
pub fn extended_check(
    task: &TaskContent<'_>,
    poster_completed: u32,
    poster_reputation: f64,
) -> ModerationVerdict {
    let prohibited = quick_check(task.title, task.description);
    if !prohibited.is_empty() {
        return ModerationVerdict {
            status: ModerationStatus::Rejected,
            issues: prohibited
                .iter()
                .map(|t| format!("prohibited_term:{}", t))
                .collect(),
            note: Some(format!("prohibited terms: {}", prohibited.join(", "))),
        };
    }

    let mut issues: Vec<String> = task.flagged_issues.to_vec();
    let text = format!("{} {}", task.title, task.description);
    let lowered = text.to_lowercase();

    if contact_info_regex().is_match(&text) {
        issues.push("contact_info".to_string());
    }
    if task.budget > BUDGET_HARD_CEILING {
        issues.push("unrealistic_budget:high".to_string());
    } else if task.budget < BUDGET_SUSPICIOUS_FLOOR
        && task.description.len() >= SUBSTANTIAL_DESCRIPTION_LEN
    {
        issues.push("unrealistic_budget:low".to_string());
    }
    if SPAM_PHRASES.iter().any(|p| lowered.contains(p)) {
        issues.push("spam_phrasing".to_string());
    }
    if DISCRIMINATORY_PHRASES.iter().any(|p| lowered.contains(p)) {
        issues.push("discriminatory_phrasing".to_string());
    }

    if !issues.is_empty() {
        return ModerationVerdict {
            status: ModerationStatus::PendingReview,
            note: Some(format!("flagged: {}", issues.join(", "))),
            issues,
        };
    }

    let tier = TrustTier::for_actor(poster_completed, poster_reputation);
    let auto_approve = match tier {
        TrustTier::Trusted | TrustTier::Verified => true,
        TrustTier::Rising => poster_reputation >= RISING_AUTO_APPROVE_MIN_REPUTATION,
        TrustTier::New => false,
    };

    if auto_approve {
        ModerationVerdict {
            status: ModerationStatus::Approved,
            issues: Vec::new(),
            note: Some(format!("auto-approved ({} tier)", tier.badge())),
        }
    } else {
        ModerationVerdict {
            status: ModerationStatus::PendingReview,
            issues: Vec::new(),
            note: Some(format!("manual review required ({} tier)", tier.badge())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_task<'a>(title: &'a str, description: &'a str) -> TaskContent<'a> {
        TaskContent {
            title,
            description,
            budget: 10_000,
            flagged_issues: &[],
        }
    }

    #[test]
    fn prohibited_terms_match_whole_words() {
        let matched = quick_check("Need hacking services", "urgent job");
        assert_eq!(matched, vec!["hacking".to_string()]);

        // Substrings must not match.
        assert!(quick_check("Therapeutic massage ad copy", "grape juice branding").is_empty());
    }

    #[test]
    fn prohibited_scan_is_case_insensitive() {
        let matched = quick_check("HACKING wanted", "");
        assert_eq!(matched, vec!["hacking".to_string()]);
    }

    #[test]
    fn prohibited_terms_are_deduplicated() {
        let matched = quick_check("hacking", "more Hacking please");
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn review_triggers_are_tagged() {
        let triggers = review_triggers("Crypto logo design", "");
        assert_eq!(triggers, vec!["review_trigger:crypto".to_string()]);
    }

    #[test]
    fn extended_rejects_prohibited() {
        let task = clean_task("write malware", "for my homework");
        let verdict = extended_check(&task, 20, 5.0);
        assert_eq!(verdict.status, ModerationStatus::Rejected);
        assert_eq!(verdict.issues, vec!["prohibited_term:malware".to_string()]);
    }

    #[test]
    fn contact_info_routes_to_review() {
        for description in [
            "reach me at someone@example.com for details",
            "call +1 (555) 123-4567 before applying",
            "dm on t.me/somechannel",
        ] {
            let task = clean_task("Logo design", description);
            let verdict = extended_check(&task, 20, 5.0);
            assert_eq!(verdict.status, ModerationStatus::PendingReview, "{}", description);
            assert!(verdict.issues.contains(&"contact_info".to_string()));
        }
    }

    #[test]
    fn unrealistic_budgets_route_to_review() {
        let mut task = clean_task("Logo design", "simple logo");
        task.budget = BUDGET_HARD_CEILING + 1;
        let verdict = extended_check(&task, 20, 5.0);
        assert!(verdict.issues.contains(&"unrealistic_budget:high".to_string()));

        let long_description = "detailed requirements ".repeat(20);
        let task = TaskContent {
            title: "Build a full site",
            description: &long_description,
            budget: 50,
            flagged_issues: &[],
        };
        let verdict = extended_check(&task, 20, 5.0);
        assert!(verdict.issues.contains(&"unrealistic_budget:low".to_string()));
    }

    #[test]
    fn spam_and_discrimination_route_to_review() {
        let task = clean_task("Make money fast, act now", "guaranteed income");
        let verdict = extended_check(&task, 20, 5.0);
        assert_eq!(verdict.status, ModerationStatus::PendingReview);
        assert!(verdict.issues.contains(&"spam_phrasing".to_string()));

        let task = clean_task("Copywriter needed", "males only please");
        let verdict = extended_check(&task, 20, 5.0);
        assert!(verdict
            .issues
            .contains(&"discriminatory_phrasing".to_string()));
    }

    #[test]
    fn creation_time_triggers_carry_into_the_verdict() {
        let triggers = vec!["review_trigger:crypto".to_string()];
        let task = TaskContent {
            title: "Exchange dashboard",
            description: "charts and order book",
            budget: 10_000,
            flagged_issues: &triggers,
        };
        let verdict = extended_check(&task, 20, 5.0);
        assert_eq!(verdict.status, ModerationStatus::PendingReview);
        assert_eq!(verdict.issues, triggers);
    }

    #[test]
    fn trust_tier_policy_for_clean_tasks() {
        let task = clean_task("Logo design", "vector logo with source files");

        // Trusted and Verified auto-approve.
        assert_eq!(extended_check(&task, 12, 4.8).status, ModerationStatus::Approved);
        assert_eq!(extended_check(&task, 4, 4.2).status, ModerationStatus::Approved);

        // Rising: reputation decides.
        assert_eq!(extended_check(&task, 1, 4.0).status, ModerationStatus::Approved);
        assert_eq!(
            extended_check(&task, 1, 2.0).status,
            ModerationStatus::PendingReview
        );

        // New posters always get manual review.
        assert_eq!(
            extended_check(&task, 0, 0.0).status,
            ModerationStatus::PendingReview
        );
    }
}
