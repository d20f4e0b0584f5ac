// ============================================================================
// Alert scoring
// ============================================================================
//
// score = momentum (30 samples, up to +40) + bid imbalance above 0.60 (up to +40),
// clamped to 0..=100. Orange at `orange`, green at `green`, and each key is
// alerted at most once per cooldown.

use super::features::{Feature, Sample};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Window the alert engine reads from.
pub const ALERT_WINDOW: usize = 60;
/// Samples needed before a key can score.
pub const MIN_HISTORY: usize = 30;
/// Alerts kept for `/alerts`.
pub const ALERT_FEED_CAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Green,
    Orange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub key: String,
    pub score: u8,
    pub level: Level,
    pub snap: Feature,
    /// Epoch seconds.
    pub t: i64,
}

pub fn score(snap: &Feature, history: &VecDeque<Sample>) -> u8 {
    if history.len() < MIN_HISTORY {
        return 0;
    }
    let start = history[history.len() - MIN_HISTORY].mid;
    let ret = (snap.mid - start) / start.max(1e-9);

    let mut score = 0.0;
    if ret > 0.01 {
        score += (ret * 2000.0).min(40.0);
    }
    if snap.imb > 0.60 {
        score += (snap.imb - 0.60) * 100.0;
    }
    score.clamp(0.0, 100.0).round() as u8
}

#[derive(Debug)]
pub struct AlertEngine {
    orange: u8,
    green: u8,
    cooldown_secs: i64,
    last_sent: HashMap<String, i64>,
}

impl AlertEngine {
    pub fn new(orange: u8, green: u8, cooldown_secs: u64) -> Self {
        Self {
            orange,
            green,
            cooldown_secs: cooldown_secs as i64,
            last_sent: HashMap::new(),
        }
    }

    pub fn level(&self, score: u8) -> Option<Level> {
        if score >= self.orange {
            Some(Level::Orange)
        } else if score >= self.green {
            Some(Level::Green)
        } else {
            None
        }
    }

    /// Score one key at `now` (epoch seconds). Returns an alert unless the key
    /// is below threshold or still cooling down.
    pub fn evaluate(
        &mut self,
        key: &str,
        snap: &Feature,
        history: &VecDeque<Sample>,
        now: i64,
    ) -> Option<Alert> {
        let score = score(snap, history);
        let level = self.level(score)?;
        if let Some(last) = self.last_sent.get(key) {
            if now - last <= self.cooldown_secs {
                return None;
            }
        }
        self.last_sent.insert(key.to_string(), now);
        Some(Alert {
            key: key.to_string(),
            score,
            level,
            snap: *snap,
            t: now,
        })
    }
}
