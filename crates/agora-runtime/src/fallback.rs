//! Deterministic speeches for when the generator cannot produce one

use std::collections::BTreeSet;

use agora_core::{session::MAX_SPEECH_CHARS, Role};
use agora_llm::TurnRequest;

/// Shared keywords mentioned in a fallback speech
const MAX_KEYWORDS: usize = 3;

/// Longest stretch of the motion quoted back in a fallback speech
const MAX_QUOTED_MOTION_CHARS: usize = 240;

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "also", "been", "being", "could", "does", "from", "have", "into",
    "just", "more", "most", "much", "only", "other", "over", "should", "some", "such", "than",
    "that", "their", "them", "then", "there", "these", "they", "this", "those", "very", "were",
    "what", "when", "which", "while", "will", "with", "would", "your", "house",
];

/// Which way a role leans on the motion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stance {
    Support,
    Oppose,
    Neutral,
}

impl Stance {
    pub fn of(role: &Role) -> Self {
        let key = role.as_str();
        if ["prop", "gov", "affirm", "for"]
            .iter()
            .any(|p| key.starts_with(p))
        {
            Self::Support
        } else if ["opp", "against", "neg"].iter().any(|p| key.starts_with(p)) {
            Self::Oppose
        } else {
            Self::Neutral
        }
    }
}

fn keywords(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 4 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Motion keywords that the most recent opposing speech also used
pub fn shared_keywords(request: &TurnRequest) -> Vec<String> {
    let Some(opposing) = request.history.iter().rev().find(|s| s.role != request.role) else {
        return Vec::new();
    };
    keywords(&request.motion)
        .intersection(&keywords(&opposing.content))
        .take(MAX_KEYWORDS)
        .cloned()
        .collect()
}

fn quoted_motion(motion: &str) -> String {
    let motion = motion.trim().trim_end_matches('.');
    if motion.chars().count() <= MAX_QUOTED_MOTION_CHARS {
        return motion.to_string();
    }
    let head: String = motion.chars().take(MAX_QUOTED_MOTION_CHARS).collect();
    format!("{}...", head.trim_end())
}

/// Compose a fallback speech. Pure: the same request always gives the same text,
/// and the text always fits within `MAX_SPEECH_CHARS`.
pub fn compose(request: &TurnRequest) -> String {
    let stance = Stance::of(&request.role);
    let shared = shared_keywords(request);
    let motion = quoted_motion(&request.motion);
    let position = match stance {
        Stance::Support => format!("We stand firmly in support of the motion: {}.", motion),
        Stance::Oppose => format!("We stand firmly against the motion: {}.", motion),
        Stance::Neutral => format!(
            "We want to weigh both sides of the motion carefully: {}.",
            motion
        ),
    };

    let body = match (request.is_rebuttal(), shared.is_empty()) {
        (false, _) => match stance {
            Stance::Support => "Adopting it delivers clear benefits and the risks are manageable with sensible safeguards. We will show that the status quo costs more than change.".to_string(),
            Stance::Oppose => "The proposal promises more than it can deliver, and its costs would fall on those least able to bear them. The burden of proof lies with the other side.".to_string(),
            Stance::Neutral => "The strongest case on either side rests on evidence, not assertion, and we will test each claim on that basis.".to_string(),
        },
        (true, false) => format!(
            "Our opponents spoke about {}, yet their account of it does not hold up. The same considerations, examined closely, point the other way, and nothing they said answers our central argument.",
            shared.join(", ")
        ),
        (true, true) => "Our opponents never engaged with the substance of the motion. They argued around it, and our central case stands unanswered.".to_string(),
    };

    let close = match stance {
        Stance::Support => "For these reasons we urge you to support the motion.",
        Stance::Oppose => "For these reasons we urge you to reject the motion.",
        Stance::Neutral => "We leave the judges to weigh which side met its burden.",
    };

    format!("{} {} {}", position, body, close)
        .chars()
        .take(MAX_SPEECH_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::{ParticipantKind, Speech};
    use chrono::Utc;
    use uuid::Uuid;

    fn speech(role: Role, content: &str, order: u32) -> Speech {
        Speech {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            speaker_id: format!("{}-speaker", role),
            role,
            order,
            content: content.to_string(),
            timestamp: Utc::now(),
            kind: ParticipantKind::Agent,
        }
    }

    fn request(role: Role, history: Vec<Speech>, speech_number: usize) -> TurnRequest {
        request_on(
            "Cities should ban private cars from downtown areas",
            role,
            history,
            speech_number,
        )
    }

    fn request_on(
        motion: &str,
        role: Role,
        history: Vec<Speech>,
        speech_number: usize,
    ) -> TurnRequest {
        TurnRequest {
            role,
            motion: motion.to_string(),
            history,
            speech_number,
            total_speeches: 4,
        }
    }

    #[test]
    fn test_stance_by_role() {
        assert_eq!(Stance::of(&Role::proposition()), Stance::Support);
        assert_eq!(Stance::of(&Role::opposition()), Stance::Oppose);
        assert_eq!(Stance::of(&Role::new("moderator")), Stance::Neutral);
    }

    #[test]
    fn test_opening_mentions_motion() {
        let text = compose(&request(Role::proposition(), vec![], 1));
        assert!(text.contains("Cities should ban private cars"));
        assert!(text.contains("support the motion"));
    }

    #[test]
    fn test_rebuttal_uses_shared_keywords() {
        let history = vec![
            speech(Role::proposition(), "Private cars clog downtown streets.", 1),
            speech(Role::opposition(), "Banning cars hurts downtown shops.", 2),
            speech(Role::proposition(), "Shops thrive on foot traffic.", 3),
        ];
        let req = request(Role::opposition(), history, 4);
        // The latest proposition speech shares nothing with the motion
        assert!(shared_keywords(&req).is_empty());

        let history = vec![
            speech(Role::proposition(), "Private cars clog downtown streets.", 1),
            speech(Role::opposition(), "Banning them hurts local shops.", 2),
        ];
        let req = request(Role::proposition(), history, 3);
        assert_eq!(shared_keywords(&req), Vec::<String>::new());

        let history = vec![speech(
            Role::proposition(),
            "Private cars clog downtown streets in every city.",
            1,
        )];
        let req = request(Role::opposition(), history, 3);
        assert_eq!(shared_keywords(&req), vec!["cars", "downtown", "private"]);
        assert!(compose(&req).contains("cars, downtown, private"));
    }

    #[test]
    fn test_compose_is_deterministic() {
        let history = vec![speech(Role::proposition(), "Cars pollute.", 1)];
        let req = request(Role::opposition(), history, 2);
        assert_eq!(compose(&req), compose(&req));
        assert!(!compose(&req).is_empty());
    }

    #[test]
    fn test_long_motion_stays_within_speech_limit() {
        let motion = "Cities should ban private cars ".repeat(300);
        let history = vec![speech(
            Role::proposition(),
            "Private cars clog downtown streets in every city.",
            1,
        )];
        for req in [
            request_on(&motion, Role::proposition(), vec![], 1),
            request_on(&motion, Role::opposition(), history, 2),
        ] {
            let text = compose(&req);
            assert!(text.chars().count() <= MAX_SPEECH_CHARS);
            assert!(text.chars().count() < 1_000);
            assert!(text.contains("Cities should ban private cars"));
            assert!(text.contains("..."));
        }

        // A speech-sized motion is still capped
        let huge = "x".repeat(MAX_SPEECH_CHARS * 2);
        let text = compose(&request_on(&huge, Role::new("moderator"), vec![], 1));
        assert!(text.chars().count() <= MAX_SPEECH_CHARS);
    }
}
