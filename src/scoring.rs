//! Chain scoring and the floating popups that bank it.

use crate::piece::Tile;

/// Points for one row at chain zero.
pub const SCORE_UNIT: u32 = 1;

/// `rows² · 2^chain` point units, saturating.
pub fn chain_points(rows: u32, chain: u32) -> u32 {
    let multiplier = 2u32.checked_pow(chain).unwrap_or(u32::MAX);
    rows.saturating_mul(rows)
        .saturating_mul(multiplier)
        .saturating_mul(SCORE_UNIT)
}

/// Points awarded by a clear, not yet added to the score.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Popup {
    pub value: u32,
    pub anchor: Tile,
    pub age: u32,
}

#[derive(Clone, Debug)]
pub struct ScoreTracker {
    score: u32,
    best: u32,
    chain: u32,
    popups: Vec<Popup>,
    popup_ticks: u32,
}

impl ScoreTracker {
    pub fn new(popup_ticks: u32) -> Self {
        Self {
            score: 0,
            best: 0,
            chain: 0,
            popups: Vec::new(),
            popup_ticks,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn best(&self) -> u32 {
        self.best
    }

    pub fn chain(&self) -> u32 {
        self.chain
    }

    pub fn popups(&self) -> &[Popup] {
        &self.popups
    }

    /// Scores one clear cycle at the current chain, then extends the chain.
    pub fn award(&mut self, rows: u32, anchor: Tile) -> u32 {
        let value = chain_points(rows, self.chain);
        self.popups.push(Popup {
            value,
            anchor,
            age: 0,
        });
        self.chain += 1;
        value
    }

    pub fn reset_chain(&mut self) {
        self.chain = 0;
    }

    /// Ages every popup by one frame and banks the expired ones.
    pub fn tick_popups(&mut self) -> u32 {
        for popup in &mut self.popups {
            popup.age += 1;
        }
        let lifetime = self.popup_ticks;
        let expired: u32 = self
            .popups
            .iter()
            .filter(|p| p.age >= lifetime)
            .fold(0u32, |sum, p| sum.saturating_add(p.value));
        self.popups.retain(|p| p.age < lifetime);
        self.credit(expired);
        expired
    }

    /// Banks every popup still in flight.
    pub fn flush(&mut self) -> u32 {
        let pending = self
            .popups
            .drain(..)
            .fold(0u32, |sum, p| sum.saturating_add(p.value));
        self.credit(pending);
        pending
    }

    fn credit(&mut self, points: u32) {
        self.score = self.score.saturating_add(points);
        self.best = self.best.max(self.score);
    }

    /// New round: everything but the session best.
    pub fn reset(&mut self) {
        self.score = 0;
        self.chain = 0;
        self.popups.clear();
    }
}
