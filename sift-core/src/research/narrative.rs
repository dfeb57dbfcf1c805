//! Category-specific answer templates.
//!
//! The template is chosen by the majority content type among the sources.
//! Templates only draw on high-confidence facts and high-reliability sources;
//! consensus findings, resolved conflicts and uncertainties are appended as
//! labelled sections.

use crate::types::{
    CategoryFields, ContentAnalysis, ContentType, FactTriangulation, RecipeDetails,
    SourceSummary, TutorialDetails, VerifiedFact,
};
use std::collections::HashMap;

const MAX_TEMPLATE_FACTS: usize = 6;
const MAX_LIST_ITEMS: usize = 15;

/// Which answer layout to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Recipe,
    Tutorial,
    Academic,
    News,
    General,
}

impl Template {
    pub fn for_content_type(content_type: Option<ContentType>) -> Self {
        match content_type {
            Some(ContentType::Recipe) => Template::Recipe,
            Some(ContentType::Tutorial | ContentType::Documentation) => Template::Tutorial,
            Some(ContentType::Academic) => Template::Academic,
            Some(ContentType::News) => Template::News,
            _ => Template::General,
        }
    }
}

/// Everything a template may draw on.
pub struct NarrativeInput<'a> {
    pub query: &'a str,
    pub triangulation: &'a FactTriangulation,
    pub sources: &'a [SourceSummary],
    pub analyses: &'a [ContentAnalysis],
    /// Facts must exceed this confidence to be used.
    pub high_confidence: f64,
    /// Sources must exceed this reliability to be used.
    pub high_reliability: f64,
}

impl NarrativeInput<'_> {
    fn strong_facts(&self) -> Vec<&VerifiedFact> {
        self.triangulation
            .verified_facts
            .iter()
            .filter(|f| f.confidence > self.high_confidence)
            .take(MAX_TEMPLATE_FACTS)
            .collect()
    }

    fn strong_sources(&self) -> Vec<&SourceSummary> {
        self.sources
            .iter()
            .filter(|s| s.reliability > self.high_reliability)
            .collect()
    }

    fn strong_analyses(&self) -> Vec<&ContentAnalysis> {
        self.analyses
            .iter()
            .filter(|a| a.reliability_score > self.high_reliability)
            .collect()
    }
}

/// Most common content type; ties go to the type seen first.
pub fn majority_content_type(sources: &[SourceSummary]) -> Option<ContentType> {
    let mut counts: HashMap<ContentType, usize> = HashMap::new();
    for source in sources {
        *counts.entry(source.content_type).or_default() += 1;
    }
    let best = counts.values().copied().max()?;
    sources
        .iter()
        .map(|s| s.content_type)
        .find(|t| counts.get(t) == Some(&best))
}

/// Render the final answer text.
pub fn compose(input: &NarrativeInput<'_>) -> String {
    if input.analyses.is_empty() {
        return format!(
            "I could not find reliable sources to answer \"{}\". Try rephrasing the query or searching again later.",
            input.query
        );
    }

    let template = Template::for_content_type(majority_content_type(input.sources));
    let mut out = match template {
        Template::Recipe => recipe(input),
        Template::Tutorial => tutorial(input),
        Template::Academic => academic(input),
        Template::News => news(input),
        Template::General => general(input),
    };
    append_sections(&mut out, input.triangulation);
    out.trim_end().to_string()
}

fn recipe(input: &NarrativeInput<'_>) -> String {
    let mut out = format!("## {}\n\n", title_case(input.query));
    let best = input
        .strong_analyses()
        .into_iter()
        .find_map(|a| match &a.structured_data.category_fields {
            CategoryFields::Recipe(r) if !r.ingredients.is_empty() || !r.instructions.is_empty() => {
                Some((a, r))
            }
            _ => None,
        });

    match best {
        Some((analysis, details)) => {
            out.push_str(&format!(
                "Based on {} ({:.0}/100 reliability).\n\n",
                analysis.domain, analysis.reliability_score
            ));
            push_recipe_details(&mut out, details);
        }
        None => out.push_str(
            "None of the highly reliable sources provided a complete recipe.\n\n",
        ),
    }
    push_fact_list(&mut out, "Tips", &input.strong_facts());
    out
}

fn push_recipe_details(out: &mut String, details: &RecipeDetails) {
    let times: Vec<String> = [
        ("Prep", details.prep_time_minutes),
        ("Cook", details.cook_time_minutes),
        ("Total", details.total_time_minutes),
    ]
    .iter()
    .filter_map(|(label, minutes)| minutes.map(|m| format!("{label}: {m} min")))
    .collect();
    if !times.is_empty() {
        out.push_str(&format!("**Time:** {}\n", times.join(" | ")));
    }
    if let Some(servings) = details.servings {
        out.push_str(&format!("**Serves:** {servings}\n"));
    }
    if !times.is_empty() || details.servings.is_some() {
        out.push('\n');
    }

    if !details.ingredients.is_empty() {
        out.push_str("### Ingredients\n");
        for item in details.ingredients.iter().take(MAX_LIST_ITEMS) {
            out.push_str(&format!("- {item}\n"));
        }
        out.push('\n');
    }
    if !details.instructions.is_empty() {
        out.push_str("### Instructions\n");
        for (i, item) in details.instructions.iter().take(MAX_LIST_ITEMS).enumerate() {
            out.push_str(&format!("{}. {item}\n", i + 1));
        }
        out.push('\n');
    }
}

fn tutorial(input: &NarrativeInput<'_>) -> String {
    let mut out = format!("## {}\n\n", title_case(input.query));
    let best: Option<(&ContentAnalysis, &TutorialDetails)> =
        input
            .strong_analyses()
            .into_iter()
            .find_map(|a| match &a.structured_data.category_fields {
                CategoryFields::Tutorial(t) if !t.steps.is_empty() => Some((a, t)),
                _ => None,
            });

    if let Some((analysis, details)) = best {
        out.push_str(&format!("Following {}.\n\n", analysis.domain));
        if !details.prerequisites.is_empty() {
            out.push_str("### Prerequisites\n");
            for item in &details.prerequisites {
                out.push_str(&format!("- {item}\n"));
            }
            out.push('\n');
        }
        out.push_str("### Steps\n");
        for (i, step) in details.steps.iter().take(MAX_LIST_ITEMS).enumerate() {
            out.push_str(&format!("{}. {step}\n", i + 1));
        }
        out.push('\n');
        if details.has_code_examples {
            out.push_str(&format!(
                "The guide at {} includes code examples.\n\n",
                analysis.url
            ));
        }
    }
    push_fact_list(&mut out, "Key points", &input.strong_facts());
    push_source_list(&mut out, "Documentation", &input.strong_sources());
    out
}

fn academic(input: &NarrativeInput<'_>) -> String {
    let strong = input.strong_sources();
    let mut out = format!(
        "## Research overview: {}\n\nThis summary draws on {} high-reliability source{}.\n\n",
        input.query,
        strong.len(),
        plural(strong.len())
    );
    push_fact_list(&mut out, "Key findings", &input.strong_facts());
    push_source_list(&mut out, "Sources", &strong);
    out
}

fn news(input: &NarrativeInput<'_>) -> String {
    let mut out = format!("## Latest on {}\n\n", input.query);
    let strong = input.strong_sources();
    if strong.is_empty() {
        out.push_str("No highly reliable outlets covered this yet.\n\n");
    } else {
        out.push_str("### Reports\n");
        for source in &strong {
            match source.key_points.first() {
                Some(point) => out.push_str(&format!("- **{}**: {point}\n", source.domain)),
                None => out.push_str(&format!("- **{}**: {}\n", source.domain, source.title)),
            }
        }
        out.push('\n');
    }
    push_fact_list(&mut out, "Key facts", &input.strong_facts());
    out
}

fn general(input: &NarrativeInput<'_>) -> String {
    let mut out = format!("## {}\n\n", title_case(input.query));
    let facts = input.strong_facts();
    if facts.is_empty() {
        let strong = input.strong_sources();
        let points: Vec<&str> = strong
            .iter()
            .flat_map(|s| s.key_points.iter().take(2))
            .map(String::as_str)
            .take(MAX_TEMPLATE_FACTS)
            .collect();
        if points.is_empty() {
            out.push_str("The sources found did not agree on any well-supported facts.\n\n");
        } else {
            out.push_str("### Highlights\n");
            for point in points {
                out.push_str(&format!("- {point}\n"));
            }
            out.push('\n');
        }
    } else {
        push_fact_list(&mut out, "Summary", &facts);
    }
    out
}

fn append_sections(out: &mut String, triangulation: &FactTriangulation) {
    if !triangulation.consensus_findings.is_empty() {
        out.push_str("### Consensus findings\n");
        for finding in &triangulation.consensus_findings {
            out.push_str(&format!("- {finding}\n"));
        }
        out.push('\n');
    }
    if !triangulation.conflicting_info.is_empty() {
        out.push_str("### Resolved conflicts\n");
        for conflict in &triangulation.conflicting_info {
            out.push_str(&format!("- **{}**: {}\n", conflict.topic, conflict.resolution));
        }
        out.push('\n');
    }
    if !triangulation.uncertainties.is_empty() {
        out.push_str("### Outstanding uncertainties\n");
        for item in &triangulation.uncertainties {
            out.push_str(&format!("- {item}\n"));
        }
        out.push('\n');
    }
}

fn push_fact_list(out: &mut String, heading: &str, facts: &[&VerifiedFact]) {
    if facts.is_empty() {
        return;
    }
    out.push_str(&format!("### {heading}\n"));
    for fact in facts {
        out.push_str(&format!("- {}\n", fact.statement));
    }
    out.push('\n');
}

fn push_source_list(out: &mut String, heading: &str, sources: &[&SourceSummary]) {
    if sources.is_empty() {
        return;
    }
    out.push_str(&format!("### {heading}\n"));
    for source in sources {
        out.push_str(&format!("- [{}]({})\n", source.title, source.url));
    }
    out.push('\n');
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
