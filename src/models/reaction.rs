// src/models/reaction.rs

use serde::{Deserialize, Serialize};

/// A user's reaction to a post. At most one per (post, user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "like" => Some(ReactionKind::Like),
            "dislike" => Some(ReactionKind::Dislike),
            _ => None,
        }
    }
}

/// DTO for pressing a reaction button.
#[derive(Debug, Deserialize)]
pub struct ReactRequest {
    pub reaction: ReactionKind,
}

/// Row write needed to move from one reaction state to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionWrite {
    Insert(ReactionKind),
    Update(ReactionKind),
    Delete,
}

/// Outcome of pressing a reaction button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionChange {
    pub next: Option<ReactionKind>,
    pub write: ReactionWrite,
    pub like_delta: i32,
    pub dislike_delta: i32,
}

/// Pressing the current reaction removes it, pressing with none set adds it,
/// pressing the other one switches.
pub fn toggle(current: Option<ReactionKind>, pressed: ReactionKind) -> ReactionChange {
    let delta = |kind: ReactionKind, amount: i32| match kind {
        ReactionKind::Like => (amount, 0),
        ReactionKind::Dislike => (0, amount),
    };

    match current {
        Some(existing) if existing == pressed => {
            let (like_delta, dislike_delta) = delta(pressed, -1);
            ReactionChange {
                next: None,
                write: ReactionWrite::Delete,
                like_delta,
                dislike_delta,
            }
        }
        Some(existing) => {
            let (drop_like, drop_dislike) = delta(existing, -1);
            let (add_like, add_dislike) = delta(pressed, 1);
            ReactionChange {
                next: Some(pressed),
                write: ReactionWrite::Update(pressed),
                like_delta: drop_like + add_like,
                dislike_delta: drop_dislike + add_dislike,
            }
        }
        None => {
            let (like_delta, dislike_delta) = delta(pressed, 1);
            ReactionChange {
                next: Some(pressed),
                write: ReactionWrite::Insert(pressed),
                like_delta,
                dislike_delta,
            }
        }
    }
}

/// Response after a reaction toggle.
#[derive(Debug, Serialize)]
pub struct ReactionState {
    pub reaction: Option<ReactionKind>,
    pub likes: i32,
    pub dislikes: i32,
}
