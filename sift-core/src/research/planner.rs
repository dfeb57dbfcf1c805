//! Intent planning: turns a free-text query into a `SearchPlan`.
//!
//! Planning is a pure heuristic transform of the query. It never fails; a
//! query with no recognizable domain signal gets a generic plan.

use crate::text::extract_concepts;
use crate::types::{
    Complexity, ConditionalSearch, ConditionalTrigger, SearchDomain, SearchIntent, SearchPlan,
    SearchStep, StepPriority, SynthesisApproach,
};
use chrono::Datelike;
use regex::Regex;
use std::sync::LazyLock;

static TECHNICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(code|coding|programming|program|python|rust|javascript|typescript|java|golang|api|sdk|framework|library|compile[rd]?|install(ation)?|error|exception|bug|debug(ging)?|docker|kubernetes|linux|database|sql|git|server|deploy(ment)?|function|algorithm|regex|npm|cargo)\b",
    )
    .expect("technical pattern is valid")
});

static ACADEMIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(research|study|studies|paper|papers|journal|theory|hypothesis|peer[- ]reviewed|thesis|evidence|meta[- ]analysis|scientific|clinical|trial|literature review|citation)\b",
    )
    .expect("academic pattern is valid")
});

static CURRENT_EVENTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(news|latest|today|yesterday|this week|this month|breaking|current events|recent(ly)?|election|announced|headlines?)\b",
    )
    .expect("current events pattern is valid")
});

static SIMPLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(simple|easy|basic)\b").expect("simple pattern is valid"));

static COMPLEX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(advanced|comprehensive|expert)\b").expect("complex pattern is valid")
});

/// Builds search plans from queries.
#[derive(Debug, Clone, Default)]
pub struct IntentPlanner {
    /// Year used for date filters; the current year when unset.
    reference_year: Option<i32>,
}

impl IntentPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference_year(mut self, year: Option<i32>) -> Self {
        self.reference_year = year;
        self
    }

    /// Produce the full plan for a query.
    pub fn plan(&self, query: &str) -> SearchPlan {
        let intent = self.analyze_intent(query);
        let initial_search = self.initial_step(&intent);
        let parallel_searches = self.parallel_steps(&intent);
        let conditional_searches = self.conditional_steps(&intent);
        let synthesis_approach = choose_approach(&intent);

        SearchPlan {
            intent,
            initial_search,
            parallel_searches,
            conditional_searches,
            synthesis_approach,
        }
    }

    /// Read goal, concepts, complexity and domain from the query.
    pub fn analyze_intent(&self, query: &str) -> SearchIntent {
        SearchIntent {
            goal: query.split_whitespace().collect::<Vec<_>>().join(" "),
            concepts: extract_concepts(query),
            complexity: assess_complexity(query),
            domain: detect_domain(query),
        }
    }

    fn year(&self) -> i32 {
        self.reference_year
            .unwrap_or_else(|| chrono::Utc::now().year())
    }

    fn initial_step(&self, intent: &SearchIntent) -> SearchStep {
        let goal = &intent.goal;
        let (query, expected_sources, rationale) = match intent.domain {
            SearchDomain::Technical => (
                format!("{goal} (site:stackoverflow.com OR site:github.com OR site:docs.rs)"),
                vec!["official documentation", "Q&A sites", "code repositories"],
                "Technical query: favour documentation and developer communities",
            ),
            SearchDomain::Academic => (
                format!("{goal} (site:edu OR site:gov OR site:arxiv.org)"),
                vec!["peer-reviewed papers", "university sites", "government reports"],
                "Academic query: favour institutional and scholarly sources",
            ),
            SearchDomain::CurrentEvents => (
                format!("{goal} after:{}-01-01", self.year() - 1),
                vec!["news outlets", "wire services"],
                "Current events: restrict to recent coverage",
            ),
            SearchDomain::General if intent.is_recipe() => (
                format!("{goal} -site:pinterest.com -site:quora.com"),
                vec!["recipe sites", "food blogs", "cooking magazines"],
                "Recipe query: skip aggregator platforms",
            ),
            SearchDomain::General => (
                goal.clone(),
                vec!["reference sites", "general articles"],
                "General query: broad search",
            ),
        };

        SearchStep {
            query,
            rationale: rationale.to_string(),
            expected_sources: expected_sources.into_iter().map(String::from).collect(),
            priority: StepPriority::High,
        }
    }

    fn parallel_steps(&self, intent: &SearchIntent) -> Vec<SearchStep> {
        let core = core_subject(intent);
        if intent.is_recipe() {
            vec![
                step(
                    format!("common problems with {core}"),
                    "Surface pitfalls other cooks ran into",
                    &["cooking forums", "recipe comments"],
                    StepPriority::Medium,
                ),
                step(
                    format!("{core} tips and variations"),
                    "Collect technique tips and variations",
                    &["cooking magazines", "food blogs"],
                    StepPriority::Low,
                ),
            ]
        } else if intent.is_technical() {
            vec![
                step(
                    format!("common problems with {core}"),
                    "Find known issues and their fixes",
                    &["issue trackers", "Q&A sites"],
                    StepPriority::Medium,
                ),
                step(
                    format!("best practices for {core}"),
                    "Find recommended approaches",
                    &["official documentation", "engineering blogs"],
                    StepPriority::Low,
                ),
            ]
        } else {
            Vec::new()
        }
    }

    fn conditional_steps(&self, intent: &SearchIntent) -> Vec<ConditionalSearch> {
        let core = core_subject(intent);
        let mut out = Vec::new();

        if intent.is_recipe() {
            out.push(ConditionalSearch {
                trigger: ConditionalTrigger::UnusualIngredients,
                condition: "Results mention uncommon ingredients".to_string(),
                step: step(
                    format!("{core} ingredient substitutes"),
                    "Find substitutes for hard-to-source ingredients",
                    &["cooking Q&A", "ingredient guides"],
                    StepPriority::Medium,
                ),
            });
            out.push(ConditionalSearch {
                trigger: ConditionalTrigger::ConflictingInfo,
                condition: "Reported cooking times differ by more than 30 minutes".to_string(),
                step: step(
                    format!("how long to cook {core}"),
                    "Settle conflicting cooking times",
                    &["test kitchens", "cooking magazines"],
                    StepPriority::Medium,
                ),
            });
        }

        out.push(ConditionalSearch {
            trigger: ConditionalTrigger::InsufficientDepth,
            condition: "Average snippet length is under 100 characters".to_string(),
            step: step(
                format!("{core} detailed guide"),
                "Look for more in-depth coverage",
                &["long-form guides"],
                StepPriority::Low,
            ),
        });
        out.push(ConditionalSearch {
            trigger: ConditionalTrigger::CredibilityConcerns,
            condition: "More than 60% of results come from low-authority domains".to_string(),
            step: step(
                format!("{core} site:edu OR site:gov OR site:org"),
                "Find more authoritative sources",
                &["institutional sites"],
                StepPriority::High,
            ),
        });

        out
    }
}

fn step(query: String, rationale: &str, sources: &[&str], priority: StepPriority) -> SearchStep {
    SearchStep {
        query,
        rationale: rationale.to_string(),
        expected_sources: sources.iter().map(|s| s.to_string()).collect(),
        priority,
    }
}

/// Concepts joined into a search subject, falling back to the goal.
fn core_subject(intent: &SearchIntent) -> String {
    if intent.concepts.is_empty() {
        intent.goal.clone()
    } else {
        intent.concepts.join(" ")
    }
}

pub fn assess_complexity(query: &str) -> Complexity {
    if SIMPLE_RE.is_match(query) {
        Complexity::Simple
    } else if COMPLEX_RE.is_match(query) {
        Complexity::Complex
    } else {
        Complexity::Moderate
    }
}

pub fn detect_domain(query: &str) -> SearchDomain {
    if TECHNICAL_RE.is_match(query) {
        SearchDomain::Technical
    } else if ACADEMIC_RE.is_match(query) {
        SearchDomain::Academic
    } else if CURRENT_EVENTS_RE.is_match(query) {
        SearchDomain::CurrentEvents
    } else {
        SearchDomain::General
    }
}

pub fn choose_approach(intent: &SearchIntent) -> SynthesisApproach {
    if intent.complexity == Complexity::Complex || intent.domain == SearchDomain::Academic {
        SynthesisApproach::Triangulate
    } else if intent.domain == SearchDomain::Technical {
        SynthesisApproach::Prioritize
    } else {
        SynthesisApproach::Combine
    }
}
