//! Running score aggregates per participant

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How many recent scores a leaderboard entry remembers
pub const RECENT_SCORES_WINDOW: usize = 5;

/// Running aggregate for one participant, updated once per scored speech
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Number of scored speeches
    pub message_count: u32,
    pub total_score: f64,
    pub average_score: f64,
    pub best_score: f64,
    /// Last [`RECENT_SCORES_WINDOW`] scores, oldest first
    pub recent_scores: VecDeque<f64>,
}

impl LeaderboardEntry {
    /// Fold one score into the aggregate
    pub fn record(&mut self, score: f64) {
        let old_count = self.message_count as f64;
        self.average_score = (self.total_score + score) / (old_count + 1.0);
        self.total_score += score;
        self.message_count += 1;
        self.best_score = if self.message_count == 1 {
            score
        } else {
            self.best_score.max(score)
        };

        self.recent_scores.push_back(score);
        while self.recent_scores.len() > RECENT_SCORES_WINDOW {
            self.recent_scores.pop_front();
        }
    }
}
