//! Rendering of synthesized responses in multiple output formats.

use crate::error::SiftError;
use crate::types::{FactCategory, SynthesizedResponse};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output format for rendered responses.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Full report with facts, conflicts, sources and timings.
    #[default]
    Markdown,
    /// The answer plus a one-line confidence footer.
    Summary,
    /// The whole response as pretty-printed JSON.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Summary => write!(f, "summary"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "summary" => Ok(OutputFormat::Summary),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{other}'")),
        }
    }
}

/// Renders `SynthesizedResponse`s.
pub struct ResponseRenderer;

impl ResponseRenderer {
    /// Render a response in the given format.
    pub fn render(
        response: &SynthesizedResponse,
        format: OutputFormat,
    ) -> Result<String, SiftError> {
        match format {
            OutputFormat::Markdown => Ok(Self::render_markdown(response)),
            OutputFormat::Summary => Ok(Self::render_summary(response)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(response)?),
        }
    }

    fn render_summary(response: &SynthesizedResponse) -> String {
        format!(
            "{}\n\n**Confidence:** {:.0}% | **Sources:** {} | **Conflicts:** {}\n",
            response.final_answer,
            response.confidence,
            response.source_summaries.len(),
            response.fact_triangulation.conflicting_info.len(),
        )
    }

    fn render_markdown(response: &SynthesizedResponse) -> String {
        let mut out = format!("# {}\n\n", response.query);
        out.push_str(&response.final_answer);
        out.push_str(&format!(
            "\n\n**Overall confidence:** {:.0}%\n",
            response.confidence
        ));

        let facts = &response.fact_triangulation.verified_facts;
        if !facts.is_empty() {
            out.push_str("\n## Verified Facts\n\n");
            for (i, fact) in facts.iter().enumerate() {
                let label = match fact.category {
                    FactCategory::Confirmed => "confirmed",
                    FactCategory::Likely => "likely",
                    FactCategory::Disputed => "disputed",
                };
                out.push_str(&format!(
                    "{}. {} ({label}, {:.0}%, {} source{})\n",
                    i + 1,
                    fact.statement,
                    fact.confidence * 100.0,
                    fact.supporting_sources,
                    if fact.supporting_sources == 1 { "" } else { "s" },
                ));
            }
        }

        let conflicts = &response.fact_triangulation.conflicting_info;
        if !conflicts.is_empty() {
            out.push_str("\n## Conflicts\n\n");
            for conflict in conflicts {
                out.push_str(&format!("- **{}**\n", conflict.topic));
                for statement in &conflict.statements {
                    out.push_str(&format!(
                        "  - {} ({}, reliability: {:.0})\n",
                        statement.statement, statement.source, statement.reliability
                    ));
                }
                out.push_str(&format!("  **Resolution:** {}\n", conflict.resolution));
            }
        }

        if !response.source_summaries.is_empty() {
            out.push_str("\n## Sources\n\n");
            for source in &response.source_summaries {
                out.push_str(&format!(
                    "- **{}** ({}, reliability: {:.0}/100)\n  {}\n",
                    source.title, source.content_type, source.reliability, source.url,
                ));
                if source.trigger_count > 0 {
                    out.push_str(&format!(
                        "  {} quality flag{}\n",
                        source.trigger_count,
                        if source.trigger_count == 1 { "" } else { "s" }
                    ));
                }
            }
        }

        if !response.gaps.is_empty() {
            out.push_str("\n## Gaps\n\n");
            for gap in &response.gaps {
                out.push_str(&format!("- {gap}\n"));
            }
        }

        if !response.recommendations.is_empty() {
            out.push_str("\n## Recommendations\n\n");
            for rec in &response.recommendations {
                out.push_str(&format!("- {rec}\n"));
            }
        }

        let t = &response.timings;
        out.push_str(&format!(
            "\n---\nplanning {}ms | search {}ms | analysis {}ms | synthesis {}ms | total {}ms\n",
            t.planning_ms, t.search_ms, t.analysis_ms, t.synthesis_ms, t.total_ms
        ));

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ConflictingInfo, ConflictingStatement, ContentType, FactTriangulation, SourceSummary,
        StageTimings, VerifiedFact,
    };

    fn make_response() -> SynthesizedResponse {
        SynthesizedResponse {
            query: "easy vegan lasagna recipe".into(),
            final_answer: "Layer and bake.".into(),
            confidence: 72.4,
            fact_triangulation: FactTriangulation {
                verified_facts: vec![VerifiedFact {
                    statement: "Bake at 375F".into(),
                    confidence: 0.82,
                    supporting_sources: 2,
                    category: FactCategory::Likely,
                }],
                conflicting_info: vec![ConflictingInfo {
                    topic: "Cooking/Preparation Time".into(),
                    statements: vec![ConflictingStatement {
                        statement: "Reported time: 30 minutes".into(),
                        source: "https://a.com".into(),
                        reliability: 80.0,
                    }],
                    resolution: "About 45 minutes".into(),
                    confidence: 0.8,
                }],
                ..Default::default()
            },
            source_summaries: vec![SourceSummary {
                url: "https://a.com".into(),
                title: "A".into(),
                domain: "a.com".into(),
                reliability: 80.0,
                content_type: ContentType::Recipe,
                key_points: vec![],
                trigger_count: 1,
            }],
            recommendations: vec!["Check doneness".into()],
            gaps: vec![],
            timings: StageTimings {
                total_ms: 12,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_render_summary() {
        let text = ResponseRenderer::render(&make_response(), OutputFormat::Summary).unwrap();
        assert!(text.starts_with("Layer and bake."));
        assert!(text.contains("72%"));
        assert!(text.contains("**Conflicts:** 1"));
    }

    #[test]
    fn test_render_markdown() {
        let text = ResponseRenderer::render(&make_response(), OutputFormat::Markdown).unwrap();
        assert!(text.starts_with("# easy vegan lasagna recipe"));
        assert!(text.contains("## Verified Facts"));
        assert!(text.contains("Bake at 375F (likely, 82%, 2 sources)"));
        assert!(text.contains("**Resolution:** About 45 minutes"));
        assert!(text.contains("(recipe, reliability: 80/100)"));
        assert!(text.contains("1 quality flag\n"));
        assert!(!text.contains("## Gaps"));
        assert!(text.contains("total 12ms"));
    }

    #[test]
    fn test_render_json() {
        let text = ResponseRenderer::render(&make_response(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["fact_triangulation"]["verified_facts"][0]["category"], "likely");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("md".parse::<OutputFormat>(), Ok(OutputFormat::Markdown));
        assert!("pdf".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Summary.to_string(), "summary");
    }
}
