use serde::{Deserialize, Serialize};

/// A block of trials. Every logged result belongs to exactly one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Block {
    Practice,
    Formal,
}

impl Block {
    pub fn as_str(&self) -> &'static str {
        match self {
            Block::Practice => "practice",
            Block::Formal => "formal",
        }
    }
}

/// Session-level phases, in the order a participant moves through them.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    #[default]
    Instructions,
    Practice,
    Break,
    Formal,
    Complete,
}

impl SessionPhase {
    /// The phase that follows this one. `skip_break` folds `Break` away so
    /// practice leads straight into the formal block.
    pub fn next(&self, skip_break: bool) -> Option<Self> {
        use SessionPhase::*;
        Some(match self {
            Instructions => Practice,
            Practice if skip_break => Formal,
            Practice => Break,
            Break => Formal,
            Formal => Complete,
            Complete => return None,
        })
    }

    /// The block whose trials run during this phase, if any.
    pub fn block(&self) -> Option<Block> {
        match self {
            SessionPhase::Practice => Some(Block::Practice),
            SessionPhase::Formal => Some(Block::Formal),
            _ => None,
        }
    }

    pub fn is_break(&self) -> bool {
        matches!(self, SessionPhase::Break)
    }
}
