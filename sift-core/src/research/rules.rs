//! Rule tables for content classification and trigger thresholds.
//!
//! Classification is an ordered cascade: each category owns a list of weighted
//! signals and a minimum signal weight. Categories are tried in table order
//! and the first one whose matched weight reaches its minimum wins. Signals
//! overlap across categories, so the order of the table is significant.
//!
//! Tables are described by serializable specs and compiled once into
//! regex-backed rules; invalid patterns are dropped with a warning.

use crate::types::ContentType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// What a signal pattern is matched against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignalTarget {
    /// Lowercased page text.
    Text,
    /// Lowercased source domain.
    Domain,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalSpec {
    pub name: String,
    pub pattern: String,
    pub target: SignalTarget,
    pub weight: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryRuleSpec {
    pub content_type: ContentType,
    pub min_signals: usize,
    pub signals: Vec<SignalSpec>,
}

#[derive(Debug, Clone)]
struct Signal {
    name: String,
    pattern: Regex,
    target: SignalTarget,
    weight: usize,
}

#[derive(Debug, Clone)]
struct CategoryRule {
    content_type: ContentType,
    min_signals: usize,
    signals: Vec<Signal>,
}

/// Outcome of running one category rule.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMatch {
    pub content_type: ContentType,
    pub weight: usize,
    pub matched: Vec<String>,
}

/// Compiled, ordered content-type cascade.
#[derive(Debug, Clone)]
pub struct ContentRules {
    categories: Vec<CategoryRule>,
}

impl Default for ContentRules {
    fn default() -> Self {
        Self::from_specs(default_category_specs())
    }
}

impl ContentRules {
    /// Compile rule specs, keeping their order.
    pub fn from_specs(specs: Vec<CategoryRuleSpec>) -> Self {
        let categories = specs
            .into_iter()
            .map(|spec| CategoryRule {
                content_type: spec.content_type,
                min_signals: spec.min_signals,
                signals: spec
                    .signals
                    .into_iter()
                    .filter_map(|s| match Regex::new(&s.pattern) {
                        Ok(pattern) => Some(Signal {
                            name: s.name,
                            pattern,
                            target: s.target,
                            weight: s.weight,
                        }),
                        Err(e) => {
                            warn!(signal = %s.name, error = %e, "Dropping invalid signal pattern");
                            None
                        }
                    })
                    .collect(),
            })
            .collect();
        Self { categories }
    }

    /// Evaluate one category without regard to the cascade.
    pub fn evaluate(&self, content_type: ContentType, domain: &str, text: &str) -> Option<CategoryMatch> {
        let text = text.to_lowercase();
        let domain = domain.to_lowercase();
        self.categories
            .iter()
            .find(|c| c.content_type == content_type)
            .map(|rule| Self::score_rule(rule, &domain, &text))
    }

    /// First category in table order whose signals reach its minimum; `Article` otherwise.
    pub fn classify(&self, domain: &str, text: &str) -> ContentType {
        let text = text.to_lowercase();
        let domain = domain.to_lowercase();
        self.categories
            .iter()
            .map(|rule| Self::score_rule(rule, &domain, &text))
            .zip(self.categories.iter())
            .find(|(m, rule)| m.weight >= rule.min_signals && rule.min_signals > 0)
            .map(|(m, _)| m.content_type)
            .unwrap_or(ContentType::Article)
    }

    /// Category order of the cascade.
    pub fn order(&self) -> Vec<ContentType> {
        self.categories.iter().map(|c| c.content_type).collect()
    }

    fn score_rule(rule: &CategoryRule, domain: &str, text: &str) -> CategoryMatch {
        let mut weight = 0;
        let mut matched = Vec::new();
        for signal in &rule.signals {
            let haystack = match signal.target {
                SignalTarget::Text => text,
                SignalTarget::Domain => domain,
            };
            if signal.pattern.is_match(haystack) {
                weight += signal.weight;
                matched.push(signal.name.clone());
            }
        }
        CategoryMatch {
            content_type: rule.content_type,
            weight,
            matched,
        }
    }
}

fn text(name: &str, pattern: &str) -> SignalSpec {
    SignalSpec {
        name: name.to_string(),
        pattern: pattern.to_string(),
        target: SignalTarget::Text,
        weight: 1,
    }
}

fn domain(name: &str, pattern: &str) -> SignalSpec {
    SignalSpec {
        name: name.to_string(),
        pattern: pattern.to_string(),
        target: SignalTarget::Domain,
        weight: 1,
    }
}

fn rule(content_type: ContentType, min_signals: usize, signals: Vec<SignalSpec>) -> CategoryRuleSpec {
    CategoryRuleSpec {
        content_type,
        min_signals,
        signals,
    }
}

/// The built-in cascade, in priority order.
pub fn default_category_specs() -> Vec<CategoryRuleSpec> {
    vec![
        rule(
            ContentType::Academic,
            3,
            vec![
                text("abstract", r"\babstract\b"),
                text("methodology", r"\bmethod(s|ology)\b"),
                text("doi", r"\bdoi\b|10\.\d{4,}/"),
                text("references", r"\breferences\b|\bbibliography\b"),
                text("peer_review", r"peer[- ]reviewed|\bjournal of\b|\bproceedings\b"),
                text("et_al", r"\bet al\."),
                text("research_terms", r"\b(hypothesis|participants|statistically significant|findings suggest)\b"),
                domain("academic_domain", r"\.edu$|arxiv|nature\.com|sciencedirect|springer|ncbi|researchgate"),
            ],
        ),
        rule(
            ContentType::News,
            3,
            vec![
                text("reporting", r"\b(reported|according to|announced|breaking)\b"),
                text("weekday", r"\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b"),
                text("wire", r"\b(reuters|associated press|correspondent|press release)\b"),
                text("dateline", r"\b(published|updated):?\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)"),
                text("officials", r"\b(officials?|spokesperson|spokesman|spokeswoman)\b"),
                domain("news_domain", r"reuters|apnews|bbc|nytimes|cnn|theguardian|washingtonpost|npr\.org|news"),
            ],
        ),
        rule(
            ContentType::Recipe,
            3,
            vec![
                text("ingredients", r"\bingredients\b"),
                text("instructions", r"\b(instructions|directions)\b"),
                text("measurements", r"\b(cups?|tablespoons?|tbsp|teaspoons?|tsp|grams?|ounces?|oz)\b"),
                text("techniques", r"\b(preheat|bake|simmer|saute|sauté|whisk|stir)\b"),
                text("timings", r"\b(prep time|cook time|total time|servings|serves)\b"),
                domain("food_domain", r"allrecipes|seriouseats|foodnetwork|bonappetit|epicurious|budgetbytes|food|recipe|kitchn"),
            ],
        ),
        rule(
            ContentType::Review,
            3,
            vec![
                text("rating", r"\b(rating|rated|out of (5|10|five|ten))\b|\d(\.\d)?/(5|10)\b"),
                text("pros_cons", r"\b(pros|cons)\b"),
                text("verdict", r"\b(verdict|our take|bottom line)\b"),
                text("hands_on", r"\b(i tested|we tested|hands-on|after using)\b"),
                text("review_word", r"\breview(s|ed)?\b"),
            ],
        ),
        rule(
            ContentType::Commercial,
            3,
            vec![
                text("call_to_action", r"\b(buy now|add to cart|shop now|order now)\b"),
                text("price", r"\$\d+|\bprice\b|\bpricing\b"),
                text("promotion", r"\b(free shipping|discount|coupon|promo code|on sale)\b"),
                text("signup", r"\b(subscribe|sign up|free trial)\b"),
                text("sponsorship", r"\b(affiliate|sponsored)\b"),
            ],
        ),
        rule(
            ContentType::Tutorial,
            3,
            vec![
                text("steps", r"\bstep \d+\b|\bstep[- ]by[- ]step\b"),
                text("tutorial_word", r"\b(tutorial|walkthrough|how to)\b"),
                text("prerequisites", r"\b(prerequisites?|before you begin|you will need|requirements)\b"),
                text("sequencing", r"\b(first,|next,|finally,)"),
                text("code", r"```|\n\$ [a-z]"),
                text("learning_goal", r"\bin this (tutorial|guide|article),? (you|we)('ll| will) learn\b"),
            ],
        ),
        rule(
            ContentType::Documentation,
            3,
            vec![
                text("parameters", r"\b(parameters?|arguments?|returns)\b"),
                text("api_terms", r"\b(api reference|module|function|class|method|struct|trait)\b"),
                text("usage", r"\b(example|usage)\b"),
                text("code", r"```|\bfn |\bdef |function\("),
                text("versioning", r"\b(deprecated|since version|version \d)"),
                domain("docs_domain", r"^docs\.|developer\.|readthedocs|doc\.rust-lang|learn\.microsoft|docs\.rs"),
            ],
        ),
        rule(
            ContentType::Forum,
            2,
            vec![
                text("thread", r"\b(posted by|replies|reply|thread|upvotes?|downvotes?)\b"),
                text("age", r"\b(asked|answered|posted) \d+ (days?|months?|years?) ago\b|\b\d+ (points|votes)\b"),
                text("chatter", r"\b(edit:|update:|thanks in advance|anyone know)"),
                domain("forum_domain", r"reddit|stackoverflow|stackexchange|quora|forum|discourse|community"),
            ],
        ),
        rule(
            ContentType::Troubleshooting,
            3,
            vec![
                text("error", r"\b(error|exception|failed|failure|crash(es|ed)?)\b"),
                text("fix", r"\b(fix|fixed|solution|workaround|resolved?)\b"),
                text("issue", r"\b(issue|problem|bug)\b"),
                text("diagnostics", r"\b(stack trace|traceback|error code|logs?)\b"),
                text("attempts", r"\b(try|tried) (to|the following|this)\b"),
            ],
        ),
        rule(
            ContentType::Comparison,
            2,
            vec![
                text("versus", r"\b(vs\.?|versus|compared to|comparison)\b"),
                text("relative", r"\b(better than|worse than|difference between|differences)\b"),
                text("alternatives", r"\b(alternatives?|which is (better|best))\b"),
                text("table", r"\|[^\n]*\|[^\n]*\|"),
            ],
        ),
        rule(
            ContentType::Opinion,
            2,
            vec![
                text("first_person", r"\b(i think|i believe|in my opinion|imho|personally)\b"),
                text("opinion_label", r"\b(editorial|op-ed|opinion|column)\b"),
                text("stance", r"\b(i feel|i'd argue|my view|my take)\b"),
                text("certainty", r"\b(clearly|obviously|undeniably)\b"),
            ],
        ),
        rule(
            ContentType::Reference,
            2,
            vec![
                text("definition", r"\b(definition|defined as|refers to)\b"),
                text("see_also", r"\b(see also|further reading|external links)\b"),
                text("overview", r"\b(etymology|overview|history)\b"),
                text("aliases", r"\b(also known as|a\.k\.a\.)"),
                domain("reference_domain", r"wikipedia|britannica|dictionary|merriam-webster|encyclopedia"),
            ],
        ),
    ]
}

/// Thresholds used by the trigger detectors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TriggerRules {
    /// Domain authority below this raises `credibility_low`.
    pub low_credibility_authority: f64,
    /// Content older than this many years raises `outdated_info`.
    pub outdated_after_years: i32,
    /// Content shorter than this (chars) raises `insufficient_detail`.
    pub insufficient_chars: usize,
    /// Below this length `insufficient_detail` is high severity.
    pub severe_insufficient_chars: usize,
    /// Citations are only expected of content at least this long.
    pub citations_expected_chars: usize,
    /// Share of words drawn from the bias lexicon that raises `biased_language`.
    pub bias_density: f64,
    pub bias_terms: Vec<String>,
    /// Spread of reported durations (minutes) inside one page that is a conflict.
    pub time_conflict_minutes: f64,
    /// A tutorial whose newest year is older than this many years is a version mismatch.
    pub version_stale_years: i32,
}

impl Default for TriggerRules {
    fn default() -> Self {
        Self {
            low_credibility_authority: 40.0,
            outdated_after_years: 3,
            insufficient_chars: 500,
            severe_insufficient_chars: 200,
            citations_expected_chars: 800,
            bias_density: 0.02,
            bias_terms: [
                "amazing", "incredible", "unbelievable", "shocking", "miracle", "guaranteed",
                "best ever", "perfect", "always", "never", "everyone knows", "obviously",
                "secret", "must-have", "revolutionary", "insane",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            time_conflict_minutes: 30.0,
            version_stale_years: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_order_is_preserved() {
        let rules = ContentRules::default();
        assert_eq!(
            rules.order(),
            vec![
                ContentType::Academic,
                ContentType::News,
                ContentType::Recipe,
                ContentType::Review,
                ContentType::Commercial,
                ContentType::Tutorial,
                ContentType::Documentation,
                ContentType::Forum,
                ContentType::Troubleshooting,
                ContentType::Comparison,
                ContentType::Opinion,
                ContentType::Reference,
            ]
        );
    }

    #[test]
    fn test_classify_recipe() {
        let rules = ContentRules::default();
        let text = "Ingredients\n- 2 cups flour\n- 1 tsp salt\nInstructions\nPreheat the oven and bake.";
        assert_eq!(rules.classify("example.com", text), ContentType::Recipe);
    }

    #[test]
    fn test_single_signal_is_not_enough() {
        let rules = ContentRules::default();
        assert_eq!(
            rules.classify("example.com", "Here is an abstract thought about nothing."),
            ContentType::Article
        );
    }

    #[test]
    fn test_earlier_category_wins_on_overlap() {
        let rules = ContentRules::default();
        // Enough for both academic and reference; academic comes first.
        let text = "Abstract. Our methodology follows Smith et al. See also the overview and history. References";
        assert_eq!(rules.classify("wikipedia.org", text), ContentType::Academic);
    }

    #[test]
    fn test_forum_by_domain_and_thread() {
        let rules = ContentRules::default();
        let text = "Posted by u/someone. 12 replies in this thread.";
        assert_eq!(rules.classify("reddit.com", text), ContentType::Forum);
    }

    #[test]
    fn test_invalid_pattern_is_dropped() {
        let rules = ContentRules::from_specs(vec![rule(
            ContentType::News,
            1,
            vec![text("broken", r"(unclosed"), text("ok", r"\bbreaking\b")],
        )]);
        assert_eq!(rules.classify("x.com", "breaking story"), ContentType::News);
        let m = rules.evaluate(ContentType::News, "x.com", "breaking").unwrap();
        assert_eq!(m.matched, vec!["ok".to_string()]);
    }

    #[test]
    fn test_custom_threshold_is_tunable() {
        let mut specs = default_category_specs();
        for spec in &mut specs {
            if spec.content_type == ContentType::Recipe {
                spec.min_signals = 1;
            }
        }
        let rules = ContentRules::from_specs(specs);
        assert_eq!(rules.classify("example.com", "list of ingredients"), ContentType::Recipe);
    }
}
