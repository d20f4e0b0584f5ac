// ============================================================================
// Book features: mid price, top-of-book imbalance, rolling windows
// ============================================================================

use super::book::OrderBook;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Ring lengths in samples. One sample per second, so 1m, 5m and 15m.
pub const WINDOWS: [usize; 3] = [60, 300, 900];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Feature {
    pub mid: f64,
    pub imb: f64,
    pub bb: f64,
    pub ba: f64,
    pub ts: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub ts: i64,
    pub mid: f64,
    pub bid_size: f64,
    pub ask_size: f64,
    pub imb: f64,
}

/// Mid and imbalance for a book with both sides quoted.
pub fn compute(book: &OrderBook, now: i64) -> Option<(Feature, Sample)> {
    let bb = book.best_bid()?;
    let ba = book.best_ask()?;
    let mid = (bb + ba) / 2.0;
    let bid_size = book.bid_size();
    let ask_size = book.ask_size();
    let imb = bid_size / (bid_size + ask_size).max(1e-9);

    Some((
        Feature { mid, imb, bb, ba, ts: now },
        Sample { ts: now, mid, bid_size, ask_size, imb },
    ))
}

/// Fixed-length sample history per book key, one ring per window.
#[derive(Debug, Default)]
pub struct Rings {
    rings: HashMap<usize, HashMap<String, VecDeque<Sample>>>,
}

impl Rings {
    pub fn push(&mut self, key: &str, sample: Sample) {
        for window in WINDOWS {
            let ring = self
                .rings
                .entry(window)
                .or_default()
                .entry(key.to_string())
                .or_default();
            if ring.len() == window {
                ring.pop_front();
            }
            ring.push_back(sample);
        }
    }

    pub fn history(&self, window: usize, key: &str) -> Option<&VecDeque<Sample>> {
        self.rings.get(&window)?.get(key)
    }

    pub fn keys(&self, window: usize) -> impl Iterator<Item = &String> {
        self.rings.get(&window).into_iter().flat_map(|ring| ring.keys())
    }
}
