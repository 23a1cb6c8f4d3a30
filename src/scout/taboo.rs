use super::types::{TabooSeverity, TabooViolation};

/// One taboo rule: a phrase that must not appear in the subject, with the
/// severity of violating it.
#[derive(Debug, Clone)]
pub struct TabooRule {
    pub phrase: &'static str,
    pub severity: TabooSeverity,
    pub description: &'static str,
    pub source: &'static str,
}

/// Evaluate taboo rules against subject text with word-boundary matching.
///
/// Boundary matching is the load-bearing detail: the phrase "oriental" must
/// not fire inside "orientalism". A match counts only when both ends of the
/// occurrence sit against non-alphanumeric characters or the string edge.
pub fn evaluate(subject: &str, rules: &[TabooRule]) -> Vec<TabooViolation> {
    let haystack = subject.to_lowercase();
    let mut violations = Vec::new();

    for rule in rules {
        if let Some(matched) = find_bounded(&haystack, &rule.phrase.to_lowercase()) {
            violations.push(TabooViolation {
                description: rule.description.to_string(),
                severity: rule.severity,
                source: rule.source.to_string(),
                matched,
            });
        }
    }

    violations.sort_by(|a, b| b.severity.cmp(&a.severity));
    violations
}

/// First occurrence of `needle` in `haystack` bounded by non-word characters.
fn find_bounded(haystack: &str, needle: &str) -> Option<String> {
    if needle.is_empty() {
        return None;
    }

    let mut search_from = 0;
    while let Some(rel) = haystack[search_from..].find(needle) {
        let start = search_from + rel;
        let end = start + needle.len();

        let left_ok = start == 0
            || haystack[..start]
                .chars()
                .next_back()
                .is_some_and(|c| !c.is_alphanumeric());
        let right_ok = end == haystack.len()
            || haystack[end..].chars().next().is_some_and(|c| !c.is_alphanumeric());

        if left_ok && right_ok {
            return Some(needle.to_string());
        }
        search_from = start + needle.chars().next().map_or(1, char::len_utf8);
    }
    None
}

// ─── Rules ──────────────────────────────────────────────────────────────────

/// Rules that apply regardless of tradition.
pub fn universal_rules() -> Vec<TabooRule> {
    vec![
        TabooRule {
            phrase: "savage",
            severity: TabooSeverity::Critical,
            description: "dehumanizing colonial framing",
            source: "universal_ethics",
        },
        TabooRule {
            phrase: "primitive art",
            severity: TabooSeverity::High,
            description: "hierarchical framing of non-western art as undeveloped",
            source: "universal_ethics",
        },
        TabooRule {
            phrase: "tribal art",
            severity: TabooSeverity::High,
            description: "flattens distinct cultures into one exotic category",
            source: "universal_ethics",
        },
        TabooRule {
            phrase: "oriental",
            severity: TabooSeverity::High,
            description: "exoticizing label for east asian subjects",
            source: "universal_ethics",
        },
        TabooRule {
            phrase: "exotic",
            severity: TabooSeverity::Medium,
            description: "othering framing of the subject",
            source: "universal_ethics",
        },
    ]
}

/// Tradition-scoped rules layered on top of the universal set.
pub fn tradition_rules(tradition: &str) -> Vec<TabooRule> {
    match tradition {
        "chinese_xieyi" | "chinese_gongbi" => vec![TabooRule {
            phrase: "chinoiserie",
            severity: TabooSeverity::Medium,
            description: "european pastiche style, not the tradition itself",
            source: "chinese_tradition_rules",
        }],
        "islamic_geometric" => vec![TabooRule {
            phrase: "figurative prophet depiction",
            severity: TabooSeverity::Critical,
            description: "forbidden figurative depiction in sacred geometric context",
            source: "islamic_tradition_rules",
        }],
        _ => Vec::new(),
    }
}
