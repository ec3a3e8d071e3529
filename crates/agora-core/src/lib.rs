//! # Agora Core
//!
//! Core types for Agora debate sessions:
//! - [`DebateSession`]: the aggregate root (participants, phase, speeches, leaderboard)
//! - [`Speech`] / [`Feedback`]: one turn and its advisory score
//! - [`TurnScheduler`]: pure speaking-order arithmetic
//! - [`PhaseRules`]: which phase transitions are legal
//! - [`FinalResult`]: the ranked outcome of a completed session
//!
//! ## Quick Start
//!
//! ```rust
//! use agora_core::{DebateSession, ParticipantKind, Role, TimingConfig, TurnScheduler};
//!
//! let mut session = DebateSession::new(
//!     "This house would ban homework",
//!     vec![Role::proposition(), Role::opposition()],
//!     TimingConfig::default(),
//! ).unwrap();
//!
//! session.join("alice", &Role::proposition(), ParticipantKind::Human).unwrap();
//! session.join("bot-1", &Role::opposition(), ParticipantKind::Agent).unwrap();
//!
//! let order = &session.speaking_order;
//! assert_eq!(TurnScheduler::next(order, 0), Some(&Role::opposition()));
//! assert_eq!(TurnScheduler::next(order, 3), None);
//! ```

pub mod error;
pub mod leaderboard;
pub mod phase;
pub mod result;
pub mod scheduler;
pub mod session;
pub mod speech;
pub mod timing;

pub use error::DebateError;
pub use leaderboard::{LeaderboardEntry, RECENT_SCORES_WINDOW};
pub use phase::{Phase, PhaseRules, Transition, TransitionCheck, Trigger};
pub use result::{Badge, FinalResult, Grade, ParticipantResult, SummaryBand};
pub use scheduler::{TurnScheduler, SPEECHES_PER_ROLE};
pub use session::{
    DebateSession, JoinOutcome, Participant, ParticipantId, ParticipantKind, Role, SessionId,
};
pub use speech::{Feedback, Speech, MAX_SCORE};
pub use timing::{Bounds, TimingConfig};
