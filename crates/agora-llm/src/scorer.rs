//! Advisory scoring of speeches
//!
//! Scores are in `0.0..=10.0`. A scorer failure only means the speech never
//! gets feedback; it never holds up the debate.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use agora_core::{Speech, MAX_SCORE};

use crate::provider::{LlmError, LlmProvider, LlmRequest};

/// Speech to score plus the context it was given in
#[derive(Debug, Clone)]
pub struct ScoreRequest {
    pub motion: String,
    pub speech: Speech,
    /// The speech immediately before this one, if any
    pub previous: Option<Speech>,
}

/// A scorer's verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub score: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[async_trait]
pub trait FeedbackScorer: Send + Sync + std::fmt::Debug {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreCard, LlmError>;
}

const EVIDENCE_MARKERS: &[&str] = &[
    "because",
    "evidence",
    "study",
    "studies",
    "data",
    "research",
    "percent",
    "for example",
    "for instance",
    "according to",
];

const REBUTTAL_MARKERS: &[&str] = &[
    "however",
    "my opponent",
    "you claim",
    "they claim",
    "on the contrary",
    "disagree",
    "that ignores",
];

const STRUCTURE_MARKERS: &[&str] = &["first", "second", "finally", "in conclusion", "to sum up"];

fn numbered_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*(\d+[.)]|[-*])\s+\S").expect("numbered-line pattern is valid")
    })
}

fn significant_words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 4)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Deterministic rule-based scorer.
///
/// Starts at 5 and adjusts for length, evidence, engagement with the previous
/// speech and visible structure.
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, request: &ScoreRequest) -> ScoreCard {
        let text = request.speech.content.as_str();
        let lower = text.to_lowercase();
        let words = text.split_whitespace().count();
        let mut score: f64 = 5.0;
        let mut tags = Vec::new();

        if words < 20 {
            score -= 2.0;
            tags.push("too_short".to_string());
        } else if words <= 300 {
            score += 1.0;
            if words <= 150 {
                tags.push("concise".to_string());
            }
        }

        let evidence_hits = EVIDENCE_MARKERS
            .iter()
            .filter(|m| lower.contains(*m))
            .count()
            + usize::from(text.chars().any(|c| c.is_ascii_digit()));
        if evidence_hits > 0 {
            score += (evidence_hits as f64 * 0.5).min(2.0);
            tags.push("evidence".to_string());
        }

        let engages_previous = request
            .previous
            .as_ref()
            .filter(|p| p.role != request.speech.role)
            .map(|p| {
                significant_words(&p.content)
                    .intersection(&significant_words(text))
                    .count()
                    >= 2
            })
            .unwrap_or(false);
        if engages_previous || REBUTTAL_MARKERS.iter().any(|m| lower.contains(m)) {
            score += 1.5;
            tags.push("rebuttal".to_string());
        }

        let structure_hits = STRUCTURE_MARKERS
            .iter()
            .filter(|m| lower.contains(*m))
            .count();
        if structure_hits >= 2 || numbered_line().find_iter(text).count() >= 2 {
            score += 1.0;
            tags.push("structured".to_string());
        }

        let motion_overlap = significant_words(&request.motion)
            .intersection(&significant_words(text))
            .count();
        if motion_overlap == 0 && words >= 20 {
            score -= 1.0;
            tags.push("off_topic".to_string());
        }

        ScoreCard {
            score: (score.clamp(0.0, MAX_SCORE) * 10.0).round() / 10.0,
            tags,
        }
    }
}

#[async_trait]
impl FeedbackScorer for HeuristicScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreCard, LlmError> {
        Ok(self.evaluate(request))
    }
}

/// Scorer that asks an LLM for a strict JSON verdict
#[derive(Debug, Clone)]
pub struct LlmScorer {
    provider: Arc<dyn LlmProvider>,
}

impl LlmScorer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    fn prompt(request: &ScoreRequest) -> String {
        let previous = request
            .previous
            .as_ref()
            .map(|p| format!("[{}] {}", p.role, p.content))
            .unwrap_or_else(|| "(none)".to_string());
        format!(
            r#"Score one debate speech.

<motion>
{}
</motion>

<previous_speech>
{}
</previous_speech>

<speech role="{}">
{}
</speech>

Rate argument quality, use of evidence and engagement with the other side.
Output ONLY a JSON object of the form:
{{"score": 7.5, "tags": ["evidence", "rebuttal"]}}
where score is a number from 0 to 10."#,
            request.motion, previous, request.speech.role, request.speech.content
        )
    }

    /// Pull the JSON object out of a reply and validate it
    pub fn parse(response: &str) -> Result<ScoreCard, LlmError> {
        let json_str = match (response.find('{'), response.rfind('}')) {
            (Some(start), Some(end)) if start < end => &response[start..=end],
            _ => response,
        };
        let card: ScoreCard = serde_json::from_str(json_str)
            .map_err(|e| LlmError::InvalidResponse(format!("score is not JSON: {}", e)))?;
        if !card.score.is_finite() || !(0.0..=MAX_SCORE).contains(&card.score) {
            return Err(LlmError::InvalidResponse(format!(
                "score {} is outside 0..=10",
                card.score
            )));
        }
        Ok(card)
    }
}

#[async_trait]
impl FeedbackScorer for LlmScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoreCard, LlmError> {
        let llm_request = LlmRequest::with_role(
            "You are an impartial debate adjudicator. You answer in JSON only.",
            &Self::prompt(request),
        )
        .temperature(0.0)
        .max_tokens(120);
        let response = self.provider.complete(llm_request).await?;
        Self::parse(&response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockProvider;
    use agora_core::{ParticipantKind, Role};
    use chrono::Utc;
    use std::time::Duration;
    use uuid::Uuid;

    fn speech(role: Role, content: &str) -> Speech {
        Speech {
            id: Uuid::new_v4(),
            session_id: Uuid::nil(),
            speaker_id: role.to_string(),
            role,
            order: 1,
            content: content.to_string(),
            timestamp: Utc::now(),
            kind: ParticipantKind::Human,
        }
    }

    fn request(content: &str, previous: Option<&str>) -> ScoreRequest {
        ScoreRequest {
            motion: "Public transport should be free".to_string(),
            speech: speech(Role::opposition(), content),
            previous: previous.map(|p| speech(Role::proposition(), p)),
        }
    }

    #[test]
    fn test_short_speech_is_penalized() {
        let card = HeuristicScorer::new().evaluate(&request("Free is bad.", None));
        assert!(card.tags.contains(&"too_short".to_string()));
        assert!(card.score < 5.0);
    }

    #[test]
    fn test_strong_rebuttal_scores_high() {
        let text = "First, my opponent says free transport pays for itself. However, the data \
                    from Tallinn shows ridership rose only 14 percent while costs doubled. \
                    Second, public money spent on fares is money not spent on new routes. \
                    Finally, transport that is free but infrequent helps nobody, so the motion fails.";
        let previous = "Free public transport pays for itself through reduced congestion and cleaner air.";
        let card = HeuristicScorer::new().evaluate(&request(text, Some(previous)));
        for tag in ["evidence", "rebuttal", "structured", "concise"] {
            assert!(card.tags.contains(&tag.to_string()), "missing {}", tag);
        }
        assert!(card.score >= 8.0);
        assert!(card.score <= MAX_SCORE);
    }

    #[test]
    fn test_heuristic_is_deterministic() {
        let req = request("Buses should cost money because maintenance is expensive and fares fund it every single year in every single city we studied carefully.", None);
        let scorer = HeuristicScorer::new();
        assert_eq!(scorer.evaluate(&req), scorer.evaluate(&req));
    }

    #[test]
    fn test_parse_accepts_wrapped_json() {
        let card = LlmScorer::parse("Sure! {\"score\": 6.5, \"tags\": [\"evidence\"]} hope that helps").unwrap();
        assert_eq!(card.score, 6.5);
        assert_eq!(card.tags, vec!["evidence".to_string()]);
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(LlmScorer::parse("{\"score\": 11}").is_err());
        assert!(LlmScorer::parse("{\"score\": -1}").is_err());
        assert!(LlmScorer::parse("great speech, 9/10").is_err());
    }

    #[tokio::test]
    async fn test_llm_scorer_round_trip() {
        let provider = Arc::new(
            MockProvider::constant("{\"score\": 7, \"tags\": [\"rebuttal\"]}")
                .with_latency(Duration::ZERO),
        );
        let card = LlmScorer::new(provider)
            .score(&request("Fares fund maintenance.", None))
            .await
            .unwrap();
        assert_eq!(card.score, 7.0);
    }
}
