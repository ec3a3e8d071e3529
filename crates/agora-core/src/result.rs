//! Final ranked outcome of a debate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::session::{DebateSession, ParticipantId, ParticipantKind, Role};
use crate::speech::MAX_SCORE;

/// Messages needed for the [`Badge::Prolific`] badge
pub const PROLIFIC_MESSAGES: u32 = 10;

/// Letter grade derived from a participant's normalized final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    D,
}

impl Grade {
    /// Grade a score normalized to `0.0..=1.0`
    pub fn from_normalized(score: f64) -> Self {
        match score {
            s if s >= 0.9 => Self::APlus,
            s if s >= 0.8 => Self::A,
            s if s >= 0.7 => Self::BPlus,
            s if s >= 0.6 => Self::B,
            s if s >= 0.5 => Self::CPlus,
            s if s >= 0.4 => Self::C,
            _ => Self::D,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::D => "D",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    /// At least [`PROLIFIC_MESSAGES`] speeches
    Prolific,
    /// Scored the maximum on some speech
    PerfectScore,
    /// Ranked first
    Champion,
}

/// Overall quality band for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryBand {
    Excellent,
    Good,
    Fair,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
}

impl SummaryBand {
    pub fn from_normalized(score: f64) -> Self {
        match score {
            s if s >= 0.8 => Self::Excellent,
            s if s >= 0.6 => Self::Good,
            s if s >= 0.4 => Self::Fair,
            _ => Self::NeedsImprovement,
        }
    }
}

impl fmt::Display for SummaryBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::NeedsImprovement => "Needs Improvement",
        };
        f.write_str(s)
    }
}

/// Per-participant breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantResult {
    pub participant_id: ParticipantId,
    pub role: Role,
    pub kind: ParticipantKind,
    /// 1 = winner
    pub rank: usize,
    pub message_count: u32,
    /// Latest running average
    pub final_score: f64,
    pub best_score: f64,
    pub grade: Grade,
    pub badges: Vec<Badge>,
    pub joined_at: DateTime<Utc>,
}

/// Immutable outcome stored on a completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    /// Sorted by rank
    pub participants: Vec<ParticipantResult>,
    pub winner: Option<ParticipantId>,
    pub total_speeches: usize,
    /// Mean of every recorded feedback score
    pub average_score: f64,
    pub summary: SummaryBand,
    pub completed_at: DateTime<Utc>,
}

impl FinalResult {
    /// Aggregate a session into its final ranking.
    ///
    /// Ranking is by final score descending; ties go to whoever joined first.
    pub fn compute(session: &DebateSession, completed_at: DateTime<Utc>) -> Self {
        let mut rows: Vec<ParticipantResult> = session
            .participants
            .iter()
            .map(|p| {
                let entry = session.leaderboard.get(&p.id);
                let final_score = entry.map(|e| e.average_score).unwrap_or(0.0);
                ParticipantResult {
                    participant_id: p.id.clone(),
                    role: p.role.clone(),
                    kind: p.kind,
                    rank: 0,
                    message_count: session.speeches_by(&p.id).count() as u32,
                    final_score,
                    best_score: entry.map(|e| e.best_score).unwrap_or(0.0),
                    grade: Grade::from_normalized(final_score / MAX_SCORE),
                    badges: Vec::new(),
                    joined_at: p.joined_at,
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            b.final_score
                .total_cmp(&a.final_score)
                .then_with(|| a.joined_at.cmp(&b.joined_at))
        });

        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = i + 1;
            if row.message_count >= PROLIFIC_MESSAGES {
                row.badges.push(Badge::Prolific);
            }
            if row.best_score >= MAX_SCORE {
                row.badges.push(Badge::PerfectScore);
            }
            if row.rank == 1 {
                row.badges.push(Badge::Champion);
            }
        }

        let average_score = if session.feedback.is_empty() {
            0.0
        } else {
            session.feedback.iter().map(|f| f.score).sum::<f64>() / session.feedback.len() as f64
        };

        Self {
            winner: rows.first().map(|r| r.participant_id.clone()),
            participants: rows,
            total_speeches: session.speeches.len(),
            average_score,
            summary: SummaryBand::from_normalized(average_score / MAX_SCORE),
            completed_at,
        }
    }

    /// One-line human readable summary
    pub fn headline(&self) -> String {
        match &self.winner {
            Some(winner) => format!(
                "{} debate ({:.1}/10 average over {} speeches); winner: {}",
                self.summary, self.average_score, self.total_speeches, winner
            ),
            None => format!("{} debate with no participants", self.summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;
    use crate::session::Role;
    use crate::speech::Feedback;
    use crate::timing::TimingConfig;

    fn debate_with_scores(scores: &[(&str, f64)]) -> DebateSession {
        let mut s = DebateSession::new(
            "Remote work beats the office",
            vec![Role::proposition(), Role::opposition()],
            TimingConfig::default(),
        )
        .unwrap();
        s.join("alice", &Role::proposition(), ParticipantKind::Human)
            .unwrap();
        s.join("bot", &Role::opposition(), ParticipantKind::Agent)
            .unwrap();
        s.enter_phase(Phase::Debate, Utc::now());

        for (i, (speaker, score)) in scores.iter().enumerate() {
            s.advance_to(i);
            let speech = s.append_speech(speaker, "argument", Utc::now()).unwrap();
            s.record_feedback(Feedback::new(speech.id, *score, Vec::<String>::new()).unwrap())
                .unwrap();
        }
        s
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(Grade::from_normalized(0.95), Grade::APlus);
        assert_eq!(Grade::from_normalized(0.9), Grade::APlus);
        assert_eq!(Grade::from_normalized(0.85), Grade::A);
        assert_eq!(Grade::from_normalized(0.7), Grade::BPlus);
        assert_eq!(Grade::from_normalized(0.65), Grade::B);
        assert_eq!(Grade::from_normalized(0.5), Grade::CPlus);
        assert_eq!(Grade::from_normalized(0.4), Grade::C);
        assert_eq!(Grade::from_normalized(0.39), Grade::D);
        assert_eq!(Grade::APlus.to_string(), "A+");
    }

    #[test]
    fn test_ranking_and_badges() {
        let s = debate_with_scores(&[("alice", 6.0), ("bot", 9.0), ("alice", 8.0), ("bot", 10.0)]);
        let result = FinalResult::compute(&s, Utc::now());

        assert_eq!(result.winner.as_deref(), Some("bot"));
        let bot = &result.participants[0];
        assert_eq!(bot.rank, 1);
        assert_eq!(bot.final_score, 9.5);
        assert_eq!(bot.grade, Grade::APlus);
        assert!(bot.badges.contains(&Badge::Champion));
        assert!(bot.badges.contains(&Badge::PerfectScore));

        let alice = &result.participants[1];
        assert_eq!(alice.rank, 2);
        assert_eq!(alice.message_count, 2);
        assert_eq!(alice.final_score, 7.0);
        assert_eq!(alice.grade, Grade::BPlus);
        assert!(alice.badges.is_empty());

        assert_eq!(result.average_score, 8.25);
        assert_eq!(result.summary, SummaryBand::Excellent);
    }

    #[test]
    fn test_ties_go_to_earlier_join() {
        let s = debate_with_scores(&[("alice", 5.0), ("bot", 5.0)]);
        let result = FinalResult::compute(&s, Utc::now());
        assert_eq!(result.winner.as_deref(), Some("alice"));
        assert_eq!(result.summary, SummaryBand::Fair);
    }

    #[test]
    fn test_unscored_participants_rank_last() {
        let s = debate_with_scores(&[("alice", 3.0)]);
        let result = FinalResult::compute(&s, Utc::now());
        assert_eq!(result.winner.as_deref(), Some("alice"));
        assert_eq!(result.participants[1].participant_id, "bot");
        assert_eq!(result.participants[1].final_score, 0.0);
        assert_eq!(result.participants[1].grade, Grade::D);
        assert_eq!(result.summary, SummaryBand::NeedsImprovement);
        assert!(result.headline().contains("winner: alice"));
    }
}
