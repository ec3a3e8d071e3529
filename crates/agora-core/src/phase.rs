//! Phase lifecycle and transition rules

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DebateError;
use crate::session::{DebateSession, MIN_OCCUPIED_ROLES};

/// Coarse-grained stage of a debate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Preparation,
    Debate,
    Evaluation,
    Paused,
    Completed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Preparation => "preparation",
            Self::Debate => "debate",
            Self::Evaluation => "evaluation",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    /// Phases that run a clock and can be paused
    pub fn is_pausable(&self) -> bool {
        matches!(self, Self::Preparation | Self::Debate)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = DebateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "setup" => Ok(Self::Setup),
            "preparation" => Ok(Self::Preparation),
            "debate" => Ok(Self::Debate),
            "evaluation" => Ok(Self::Evaluation),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            other => Err(DebateError::InvalidSession(format!("unknown phase '{}'", other))),
        }
    }
}

/// What caused a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// A caller asked for it
    Manual,
    /// A timer or the turn scheduler decided it
    Automatic,
}

impl Trigger {
    pub fn is_automatic(&self) -> bool {
        matches!(self, Self::Automatic)
    }
}

/// A validated phase change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
    pub trigger: Trigger,
}

/// Outcome of checking a requested transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCheck {
    /// Apply this change
    Apply(Transition),
    /// Session is already in the requested phase
    NoOp,
}

/// The transition table.
///
/// ```text
/// setup ──manual──▶ preparation ──manual|timer──▶ debate ──manual|scheduler──▶ evaluation ──finalizer──▶ completed
///                        │  ▲                       │  ▲
///                        ▼  │ resume (no speeches)  ▼  │ resume (≥1 speech)
///                        paused ◀───────────────────┘  │
///                           └──────────────────────────┘
/// ```
pub struct PhaseRules;

impl PhaseRules {
    /// Validate moving `session` to `to`.
    pub fn check(
        session: &DebateSession,
        to: Phase,
        trigger: Trigger,
    ) -> Result<TransitionCheck, DebateError> {
        let from = session.phase;
        if from == to {
            return Ok(TransitionCheck::NoOp);
        }
        if from == Phase::Completed {
            return Err(DebateError::SessionCompleted);
        }

        let allowed = match (from, to) {
            (Phase::Setup, Phase::Preparation) => {
                if trigger.is_automatic() {
                    false
                } else {
                    let occupied = session.occupied_roles();
                    if occupied < MIN_OCCUPIED_ROLES {
                        return Err(DebateError::NotEnoughParticipants {
                            occupied,
                            required: MIN_OCCUPIED_ROLES,
                        });
                    }
                    true
                }
            }
            (Phase::Preparation, Phase::Debate) => true,
            (Phase::Debate, Phase::Evaluation) => true,
            (Phase::Evaluation, Phase::Completed) => true,
            (Phase::Preparation | Phase::Debate, Phase::Paused) => !trigger.is_automatic(),
            (Phase::Paused, target) => {
                !trigger.is_automatic() && target == session.resume_target()
            }
            _ => false,
        };

        if allowed {
            Ok(TransitionCheck::Apply(Transition { from, to, trigger }))
        } else {
            Err(DebateError::InvalidTransition { from, to })
        }
    }
}
