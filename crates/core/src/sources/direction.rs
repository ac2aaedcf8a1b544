use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One press of the stratagem input. Serialized as `"Up" | "Down" | "Left" | "Right"`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Direction::Up => "Up",
            Direction::Down => "Down",
            Direction::Left => "Left",
            Direction::Right => "Right",
        }
    }

    pub fn arrow(&self) -> char {
        match self {
            Direction::Up => '↑',
            Direction::Down => '↓',
            Direction::Left => '←',
            Direction::Right => '→',
        }
    }

    /// Read the direction out of a wiki arrow image's alt text, e.g. `"Arrow 4 Down"`.
    /// `None` unless exactly one direction word is present.
    pub fn from_alt_text(alt: &str) -> Option<Self> {
        let mut found = None;
        for word in alt.split(|c: char| !c.is_ascii_alphanumeric()) {
            if let Ok(d) = word.parse::<Direction>() {
                match found {
                    Some(prev) if prev != d => return None,
                    _ => found = Some(d),
                }
            }
        }
        found
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Direction {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err("expected one of: up, down, left, right"),
        }
    }
}
