//! Weighted interjection moods.

use std::collections::BTreeMap;

/// Mood name that repeats the message aloud instead of posting a GIF.
pub const ECHO_MOOD: &str = "echo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Repeat the message as text-to-speech.
    Echo(String),
    /// Post a GIF for this search term.
    Gif(String),
}

#[derive(Debug, Clone, Default)]
pub struct MoodTable {
    moods: Vec<(String, f64)>,
    total: f64,
}

impl MoodTable {
    pub fn new(weights: &BTreeMap<String, f64>) -> Self {
        let moods: Vec<_> = weights
            .iter()
            .filter(|(_, weight)| weight.is_finite() && **weight > 0.0)
            .map(|(mood, weight)| (mood.clone(), *weight))
            .collect();
        let total = moods.iter().map(|(_, weight)| weight).sum();
        Self { moods, total }
    }

    /// Mood for a roll in `[0, 1)`.
    pub fn pick(&self, roll: f64) -> Option<&str> {
        let mut target = roll.clamp(0.0, 1.0) * self.total;
        for (mood, weight) in &self.moods {
            if target < *weight {
                return Some(mood);
            }
            target -= weight;
        }
        self.moods.last().map(|(mood, _)| mood.as_str())
    }

    /// What to do about `message` for a given roll.
    pub fn react(&self, message: &str, roll: f64) -> Option<Reaction> {
        self.pick(roll).map(|mood| {
            if mood == ECHO_MOOD {
                Reaction::Echo(message.to_string())
            } else {
                Reaction::Gif(mood.to_string())
            }
        })
    }
}
