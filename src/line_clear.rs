//! Post-lock sequence: let loose pieces fall, split full rows, repeat until
//! the pile is quiet.

use crate::pile::{Fall, Pile};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ClearPhase {
    /// Normal gravity owns the active piece; the pile is static.
    #[default]
    Settling,
    LooseFall,
    /// Rows were just split; the removed fragments are on display.
    Clearing,
}

/// What a single phase tick did.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Step {
    Fell { fall: Fall, loosened: usize },
    Cleared { rows: Vec<i32> },
    Revealed { dropped: usize, loosened: usize },
    /// Nothing left to do; gravity may resume.
    Quiescent,
}

#[derive(Clone, Debug, Default)]
pub struct LineClear {
    phase: ClearPhase,
}

impl LineClear {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ClearPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != ClearPhase::Settling
    }

    /// Hands the pile over to the machine after a lock left full rows.
    pub fn begin(&mut self) {
        self.phase = ClearPhase::LooseFall;
    }

    pub fn reset(&mut self) {
        self.phase = ClearPhase::Settling;
    }

    pub fn step(&mut self, pile: &mut Pile) -> Step {
        if pile.has_loose() {
            let fall = pile.fall_loose();
            let loosened = pile.find_loose();
            self.phase = ClearPhase::LooseFall;
            Step::Fell { fall, loosened }
        } else if pile.has_full_rows() {
            let rows = pile.clear_full_rows();
            self.phase = ClearPhase::Clearing;
            Step::Cleared { rows }
        } else if pile.has_pending() {
            let dropped = pile.drop_pending();
            let loosened = pile.find_loose();
            self.phase = ClearPhase::LooseFall;
            Step::Revealed { dropped, loosened }
        } else {
            self.phase = ClearPhase::Settling;
            Step::Quiescent
        }
    }

    /// Steps until the machine returns to settling. Returns every step taken,
    /// the final `Quiescent` included.
    pub fn run_to_quiescence(&mut self, pile: &mut Pile) -> Vec<Step> {
        let mut steps = Vec::new();
        loop {
            let step = self.step(pile);
            let done = step == Step::Quiescent;
            steps.push(step);
            if done {
                return steps;
            }
        }
    }
}
