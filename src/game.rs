use crate::config::Config;
use crate::controller::{Controller, PieceProvider, RandomPieceProvider, Side};
use crate::line_clear::{ClearPhase, LineClear, Step};
use crate::piece::{Motion, Tetrimino, Tile, FIELD_HEIGHT, FIELD_WIDTH};
use crate::pile::{Pile, Support};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::scoring::{Popup, ScoreTracker};

/// A lock that leaves anything on this row or above ends the round.
pub const LOCKOUT_ROW: i32 = 6;

// ============================================================================
// Types
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameState {
    Menu,
    Playing,
    Paused,
    Ended,
}

impl GameState {
    pub fn code(self) -> u8 {
        match self {
            GameState::Menu => 0,
            GameState::Playing => 1,
            GameState::Paused => 2,
            GameState::Ended => 3,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EndReason {
    Lockout,
    TimeUp,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Input {
    MoveLeft,
    MoveRight,
    ReleaseLeft,
    ReleaseRight,
    SoftDropStart,
    SoftDropStop,
    Rotate,
    Hold,
    TogglePause,
    Start,
    /// Pointer click in screen coordinates.
    Click { x: i32, y: i32 },
}

/// Periodic tick sources.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Tick {
    Gravity,
    SoftDrop,
    LineClear,
    Countdown,
    Frame,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum GameEvent {
    Started,
    PieceMoved,
    PieceRotated,
    PieceHeld,
    PieceLocked,
    LinesCleared { rows: u32, chain: u32, points: u32 },
    ChainEnded,
    ScoreCredited(u32),
    Paused,
    Resumed,
    GameOver(EndReason),
}

/// What a renderer draws in one field cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Cell {
    Empty,
    Settled(u8),
    Loose(u8),
    /// Fragment of a cleared row, shown until the next phase tick.
    Clearing(u8),
    Active(u8),
}

#[derive(Clone, Copy, Debug, Default)]
struct Timers {
    gravity: Option<TimerHandle>,
    line_clear: Option<TimerHandle>,
    countdown: Option<TimerHandle>,
    frame: Option<TimerHandle>,
}

// ============================================================================
// Game
// ============================================================================

/// The whole session: every handler works on this one object.
pub struct Game {
    config: Config,
    state: GameState,
    end_reason: Option<EndReason>,
    pile: Pile,
    controller: Controller,
    line_clear: LineClear,
    scores: ScoreTracker,
    time_left: u32,
    soft_drop: bool,
    scheduler: Scheduler<Tick>,
    timers: Timers,
    provider: Box<dyn PieceProvider>,
    events: Vec<GameEvent>,
}

impl Game {
    pub fn new(config: Config) -> Self {
        let provider: Box<dyn PieceProvider> = match config.seed {
            Some(seed) => Box::new(RandomPieceProvider::seeded(seed)),
            None => Box::new(RandomPieceProvider::new()),
        };
        Self::with_provider(config, provider)
    }

    /// A game waiting in the menu, drawing pieces from `provider`.
    pub fn with_provider(config: Config, provider: Box<dyn PieceProvider>) -> Self {
        Self {
            controller: Controller::new(config.repeat_period),
            scores: ScoreTracker::new(config.popup_ticks),
            time_left: config.session_secs,
            config,
            state: GameState::Menu,
            end_reason: None,
            pile: Pile::new(),
            line_clear: LineClear::new(),
            soft_drop: false,
            scheduler: Scheduler::new(),
            timers: Timers::default(),
            provider,
            events: Vec::new(),
        }
    }

    /// A round already in progress on top of `pile`.
    pub fn with_pile(config: Config, provider: Box<dyn PieceProvider>, pile: Pile) -> Self {
        let mut game = Self::with_provider(config, provider);
        game.start();
        game.pile = pile;
        game
    }

    // ------------------------------------------------------------------------
    // State machine
    // ------------------------------------------------------------------------

    /// Resets everything but the session best and starts the tick sources.
    pub fn start(&mut self) {
        self.scheduler.clear();
        self.timers = Timers::default();
        self.pile = Pile::new();
        self.controller.reset(self.provider.as_mut());
        self.line_clear.reset();
        self.scores.reset();
        self.time_left = self.config.session_secs;
        self.soft_drop = false;
        self.end_reason = None;
        self.state = GameState::Playing;
        self.events.clear();

        self.timers.countdown = Some(
            self.scheduler
                .register_periodic(self.config.countdown_ms, Tick::Countdown),
        );
        self.timers.frame = Some(self.scheduler.register_periodic(self.config.frame_ms, Tick::Frame));
        self.retime_gravity();

        log::info!("round started, {} s on the clock", self.time_left);
        self.events.push(GameEvent::Started);
    }

    fn end(&mut self, reason: EndReason) {
        if self.state == GameState::Ended {
            return;
        }
        self.state = GameState::Ended;
        self.end_reason = Some(reason);
        self.scheduler.clear();
        self.timers = Timers::default();
        self.controller.release_all();
        let banked = self.scores.flush();
        if banked > 0 {
            self.events.push(GameEvent::ScoreCredited(banked));
        }
        log::info!(
            "round over ({reason:?}): score {}, best {}",
            self.scores.score(),
            self.scores.best()
        );
        self.events.push(GameEvent::GameOver(reason));
    }

    fn accepts_piece_input(&self) -> bool {
        self.state == GameState::Playing && !self.line_clear.is_active()
    }

    /// Puts the gravity source matching the soft-drop key in place, or none
    /// while the line-clear machine owns the pile.
    fn retime_gravity(&mut self) {
        if let Some(handle) = self.timers.gravity.take() {
            self.scheduler.cancel(handle);
        }
        let running = matches!(self.state, GameState::Playing | GameState::Paused);
        if !running || self.line_clear.is_active() {
            return;
        }
        let (interval, tick) = if self.soft_drop {
            (self.config.soft_drop_ms, Tick::SoftDrop)
        } else {
            (self.config.gravity_ms, Tick::Gravity)
        };
        self.timers.gravity = Some(self.scheduler.register_periodic(interval, tick));
    }

    // ------------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------------

    pub fn handle_input(&mut self, input: Input) {
        match input {
            Input::Start => {
                if matches!(self.state, GameState::Menu | GameState::Ended) {
                    self.start();
                }
            }
            Input::Click { x, y } => {
                if matches!(self.state, GameState::Menu | GameState::Ended)
                    && self.config.play_region.contains(x, y)
                {
                    self.start();
                }
            }
            Input::TogglePause => self.toggle_pause(),
            Input::ReleaseLeft => self.controller.release(Side::Left),
            Input::ReleaseRight => self.controller.release(Side::Right),
            Input::SoftDropStop => {
                if self.soft_drop {
                    self.soft_drop = false;
                    self.retime_gravity();
                }
            }
            _ if !self.accepts_piece_input() => {}
            Input::MoveLeft => self.controller.press(Side::Left),
            Input::MoveRight => self.controller.press(Side::Right),
            Input::SoftDropStart => {
                if !self.soft_drop {
                    self.soft_drop = true;
                    self.retime_gravity();
                }
            }
            Input::Rotate => {
                if self.controller.rotate(&self.pile) {
                    self.events.push(GameEvent::PieceRotated);
                }
            }
            Input::Hold => {
                if self.controller.hold(self.provider.as_mut()) {
                    self.events.push(GameEvent::PieceHeld);
                }
            }
        }
    }

    pub fn toggle_pause(&mut self) {
        match self.state {
            GameState::Playing if !self.line_clear.is_active() => {
                self.state = GameState::Paused;
                self.events.push(GameEvent::Paused);
            }
            GameState::Paused => {
                self.state = GameState::Playing;
                self.events.push(GameEvent::Resumed);
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------------
    // Ticks
    // ------------------------------------------------------------------------

    /// Runs every tick source due up to `now` (host clock, milliseconds).
    pub fn advance(&mut self, now: u64) {
        while let Some((_, tick)) = self.scheduler.pop_due(now) {
            self.tick(tick);
        }
    }

    /// The clock and popups keep running through a pause; the pile and the
    /// falling piece only move while playing.
    pub fn tick(&mut self, tick: Tick) {
        match (self.state, tick) {
            (GameState::Playing, Tick::Gravity | Tick::SoftDrop) => self.gravity_step(),
            (GameState::Playing, Tick::LineClear) => self.line_clear_step(),
            (GameState::Playing | GameState::Paused, Tick::Countdown) => self.countdown_step(),
            (GameState::Playing | GameState::Paused, Tick::Frame) => self.frame_step(),
            _ => {}
        }
    }

    fn gravity_step(&mut self) {
        if self.line_clear.is_active() {
            return;
        }
        self.controller.ensure_next(self.provider.as_mut());
        if self.controller.active().is_none() {
            self.controller.promote_next(self.provider.as_mut());
        }
        if !self.controller.try_move(Motion::Down, &self.pile) {
            self.lock_active();
        }
    }

    fn lock_active(&mut self) {
        let Some(piece) = self.controller.take_active() else {
            return;
        };
        log::debug!("locked {:?} at {:?}", piece.shape(), piece.tiles());
        self.pile.insert(piece);
        self.events.push(GameEvent::PieceLocked);

        if self.pile.reaches(LOCKOUT_ROW) {
            self.end(EndReason::Lockout);
            return;
        }
        self.controller.promote_next(self.provider.as_mut());
        if self.controller.active_overlaps(&self.pile) {
            self.end(EndReason::Lockout);
            return;
        }
        if self.pile.has_full_rows() {
            log::debug!("full rows {:?}, gravity suspended", self.pile.full_rows());
            self.controller.release_all();
            self.line_clear.begin();
            self.retime_gravity();
            self.timers.line_clear = Some(
                self.scheduler
                    .register_periodic(self.config.clear_phase_ms, Tick::LineClear),
            );
        }
    }

    fn line_clear_step(&mut self) {
        if !self.line_clear.is_active() {
            return;
        }
        match self.line_clear.step(&mut self.pile) {
            Step::Cleared { rows } => {
                let top = rows.iter().copied().min().unwrap_or(0);
                let count = rows.len() as u32;
                let chain = self.scores.chain();
                let points = self.scores.award(count, Tile::new(FIELD_WIDTH / 2, top));
                log::debug!("cleared rows {rows:?} at chain {chain} for {points}");
                self.events.push(GameEvent::LinesCleared {
                    rows: count,
                    chain,
                    points,
                });
            }
            Step::Quiescent => {
                log::debug!("chain of {} ended", self.scores.chain());
                self.scores.reset_chain();
                if let Some(handle) = self.timers.line_clear.take() {
                    self.scheduler.cancel(handle);
                }
                self.retime_gravity();
                self.events.push(GameEvent::ChainEnded);
            }
            Step::Fell { .. } | Step::Revealed { .. } => {}
        }
    }

    fn countdown_step(&mut self) {
        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left == 0 {
            self.end(EndReason::TimeUp);
        }
    }

    fn frame_step(&mut self) {
        if self.accepts_piece_input() && self.controller.auto_repeat(&self.pile) > 0 {
            self.events.push(GameEvent::PieceMoved);
        }
        let banked = self.scores.tick_popups();
        if banked > 0 {
            self.events.push(GameEvent::ScoreCredited(banked));
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pile(&self) -> &Pile {
        &self.pile
    }

    pub fn active(&self) -> Option<&Tetrimino> {
        self.controller.active()
    }

    pub fn next(&self) -> Option<&Tetrimino> {
        self.controller.next()
    }

    pub fn held(&self) -> Option<&Tetrimino> {
        self.controller.held()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Replaces the falling piece, e.g. to stage a position.
    pub fn set_active(&mut self, piece: Tetrimino) {
        self.controller.set_active(piece);
    }

    pub fn clear_phase(&self) -> ClearPhase {
        self.line_clear.phase()
    }

    pub fn is_soft_dropping(&self) -> bool {
        self.soft_drop
    }

    pub fn score(&self) -> u32 {
        self.scores.score()
    }

    pub fn best(&self) -> u32 {
        self.scores.best()
    }

    pub fn chain(&self) -> u32 {
        self.scores.chain()
    }

    pub fn popups(&self) -> &[Popup] {
        self.scores.popups()
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn clock_text(&self) -> String {
        format_clock(self.time_left)
    }

    pub fn scheduler(&self) -> &Scheduler<Tick> {
        &self.scheduler
    }

    /// Takes and clears all pending events
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Field cells top to bottom, with the falling piece overlaid.
    pub fn render_grid(&self) -> Vec<Vec<Cell>> {
        let mut grid = vec![vec![Cell::Empty; FIELD_WIDTH as usize]; FIELD_HEIGHT as usize];
        let mut paint = |piece: &Tetrimino, cell: Cell| {
            for tile in piece.tiles() {
                if (0..FIELD_WIDTH).contains(&tile.x) && (0..FIELD_HEIGHT).contains(&tile.y) {
                    grid[tile.y as usize][tile.x as usize] = cell;
                }
            }
        };
        for (_, piece, support) in self.pile.pieces() {
            let cell = match support {
                Support::Rigid => Cell::Settled(piece.color()),
                Support::Loose => Cell::Loose(piece.color()),
            };
            paint(piece, cell);
        }
        for piece in self.pile.pending() {
            paint(piece, Cell::Clearing(piece.color()));
        }
        if let Some(piece) = self.controller.active() {
            paint(piece, Cell::Active(piece.color()));
        }
        grid
    }
}

/// `M:SS` for a number of seconds.
pub fn format_clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

// ============================================================================
// Test Helpers
// ============================================================================

pub mod test_helpers {
    use super::*;
    use crate::controller::{PieceDraw, SequencePieceProvider};
    use crate::piece::{Shape, FIELD_BOTTOM};

    pub fn single(x: i32, y: i32) -> Tetrimino {
        Tetrimino::from_tiles(vec![Tile::new(x, y)], Shape::O, 0)
    }

    /// Fills row `y` with one-tile pieces, skipping the `gaps` columns.
    pub fn fill_row_except(pile: &mut Pile, y: i32, gaps: &[i32]) {
        for x in 0..FIELD_WIDTH {
            if !gaps.contains(&x) {
                pile.insert(single(x, y));
            }
        }
    }

    pub fn fill_row(pile: &mut Pile, y: i32) {
        fill_row_except(pile, y, &[]);
    }

    pub fn bottom_row() -> i32 {
        FIELD_BOTTOM
    }

    pub fn provider(shapes: &[Shape]) -> Box<dyn PieceProvider> {
        Box::new(SequencePieceProvider::of_shapes(shapes))
    }

    pub fn provider_of(draws: Vec<PieceDraw>) -> Box<dyn PieceProvider> {
        Box::new(SequencePieceProvider::new(draws))
    }

    /// A playing game over `pile` whose pieces are all unrotated `shape`.
    pub fn game_on(pile: Pile, shape: Shape) -> Game {
        Game::with_pile(Config::default(), provider(&[shape]), pile)
    }

    /// Steps gravity until the current piece locks.
    pub fn drop_active(game: &mut Game) {
        for _ in 0..(FIELD_HEIGHT * 2) {
            if game.line_clear.is_active() || game.state() != GameState::Playing {
                return;
            }
            let before = game.pile.piece_count();
            game.tick(Tick::Gravity);
            if game.pile.piece_count() != before {
                return;
            }
        }
    }

    /// Runs line-clear ticks until gravity is back.
    pub fn settle(game: &mut Game) {
        while game.line_clear.is_active() && game.state() == GameState::Playing {
            game.tick(Tick::LineClear);
        }
    }
}
