const MEDIUM_KEYWORDS: [&str; 3] = ["explain", "roadmap", "detailed"];
const LARGE_KEYWORDS: [&str; 3] = ["series", "step-by-step", "complete"];

/// Upper bound on the length of a generated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenBudget {
    Short,
    Medium,
    Large,
}

impl TokenBudget {
    pub fn max_tokens(self) -> u64 {
        match self {
            TokenBudget::Short => 1024,
            TokenBudget::Medium => 4096,
            TokenBudget::Large => 8192,
        }
    }
}

/// Picks a reply budget from keywords in the user's message.
///
/// Rules run in order and the last match wins, so a large-tier keyword
/// outranks a medium-tier one in the same message.
pub fn select_budget(message: &str) -> TokenBudget {
    let text = message.to_lowercase();
    let mut budget = TokenBudget::Short;
    if MEDIUM_KEYWORDS.iter().any(|k| text.contains(k)) {
        budget = TokenBudget::Medium;
    }
    if LARGE_KEYWORDS.iter().any(|k| text.contains(k)) {
        budget = TokenBudget::Large;
    }
    budget
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_gets_short_budget() {
        assert_eq!(select_budget("thanks"), TokenBudget::Short);
        assert_eq!(select_budget(""), TokenBudget::Short);
    }

    #[test]
    fn medium_keywords() {
        assert_eq!(select_budget("Explain recursion"), TokenBudget::Medium);
        assert_eq!(select_budget("a ROADMAP for learning rust"), TokenBudget::Medium);
        assert_eq!(select_budget("give me a detailed answer"), TokenBudget::Medium);
    }

    #[test]
    fn large_keywords() {
        assert_eq!(select_budget("write a series of posts"), TokenBudget::Large);
        assert_eq!(select_budget("Step-By-Step guide"), TokenBudget::Large);
        assert_eq!(select_budget("the complete list"), TokenBudget::Large);
    }

    #[test]
    fn last_matching_rule_wins() {
        assert_eq!(
            select_budget("Give me a step-by-step explain"),
            TokenBudget::Large
        );
        assert_eq!(select_budget("explain the complete roadmap"), TokenBudget::Large);
    }

    #[test]
    fn selection_is_case_insensitive() {
        assert_eq!(select_budget("EXPLAIN"), select_budget("explain"));
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(TokenBudget::Short.max_tokens() < TokenBudget::Medium.max_tokens());
        assert!(TokenBudget::Medium.max_tokens() < TokenBudget::Large.max_tokens());
        assert_eq!(TokenBudget::Large.max_tokens(), 8192);
    }
}
