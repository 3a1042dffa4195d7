use serde::{Deserialize, Serialize};

/// Whether the displayed character is drawn as-is or reflected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Normal,
    Mirrored,
}

impl Orientation {
    pub const BOTH: [Orientation; 2] = [Orientation::Normal, Orientation::Mirrored];

    pub fn is_normal(&self) -> bool {
        matches!(self, Orientation::Normal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Normal => "normal",
            Orientation::Mirrored => "mirrored",
        }
    }
}

/// One planned trial. Built once per block by the generator and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub character: char,
    pub orientation: Orientation,
    /// Rotation in degrees, one of the configured angles.
    pub angle: u16,
    /// Zero-based position inside the block.
    pub sequence_index: usize,
}

impl TrialSpec {
    /// Identity of the stimulus without its position, used for
    /// duplicate checks within a block.
    pub fn key(&self) -> (char, u16, Orientation) {
        (self.character, self.angle, self.orientation)
    }

    pub fn stimulus(&self) -> Stimulus {
        Stimulus {
            character: self.character,
            angle: self.angle,
            mirrored: !self.orientation.is_normal(),
        }
    }
}

/// What the presentation layer needs to draw a stimulus.
/// Mirroring is applied before the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stimulus {
    pub character: char,
    pub angle: u16,
    pub mirrored: bool,
}
