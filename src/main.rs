use std::collections::HashSet;
use std::fs::File;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyboardEnhancementFlags, MouseButton, MouseEventKind, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame, Terminal,
};

use chain_tetris::config::{self, Config};
use chain_tetris::piece::{Tetrimino, FIELD_HEIGHT, FIELD_WIDTH};
use chain_tetris::{Cell, EndReason, Game, GameState, Input};

// ============================================================================
// Command Line
// ============================================================================

/// Falling-block puzzle where cleared rows cut pieces in two.
#[derive(Debug, Parser)]
#[command(
    name = "chain-tetris",
    version,
    about = "Falling-block puzzle where cleared rows cut pieces apart and chain reactions double the score.",
    long_about = "Clearing a row removes only the tiles on it: the rest of each piece falls on its own \
        and may complete more rows. Every link of such a chain doubles the points.\n\n\
        CONTROLS:\n  Left/Right or a/d  Move     Up or w     Rotate    Down or s  Soft drop\n  \
        h or c             Hold     Space or p  Pause     Enter      Start\n  q / Esc            Quit\n\n\
        Set RUST_LOG and --log-file to record engine logs."
)]
struct Args {
    /// Normal fall interval.
    #[arg(long, default_value_t = config::GRAVITY_MS, value_name = "MS")]
    gravity_ms: u64,

    /// Fall interval while soft drop is held.
    #[arg(long, default_value_t = config::SOFT_DROP_MS, value_name = "MS")]
    soft_drop_ms: u64,

    /// Interval between line-clear phases (falling fragments, row removal).
    #[arg(long, default_value_t = config::CLEAR_PHASE_MS, value_name = "MS")]
    clear_phase_ms: u64,

    /// Length of a round.
    #[arg(long, default_value_t = config::SESSION_SECS, value_name = "SECS")]
    session_secs: u32,

    /// Seed for the piece generator, for repeatable rounds.
    #[arg(long)]
    seed: Option<u64>,

    /// Write logs to this file (the terminal is busy drawing the game).
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Skip the menu and start playing immediately.
    #[arg(long)]
    no_menu: bool,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            gravity_ms: self.gravity_ms,
            soft_drop_ms: self.soft_drop_ms,
            clear_phase_ms: self.clear_phase_ms,
            session_secs: self.session_secs,
            seed: self.seed,
            ..Config::default()
        }
    }
}

fn init_logging(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path).with_context(|| format!("cannot create log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

// ============================================================================
// Visual Constants
// ============================================================================

const CELL_WIDTH: u16 = 2;
const SIDE_WIDTH: u16 = 14;
const BLOCK_CHAR: &str = "██";
const TILE_GLYPH: char = '█';
const LOOSE_GLYPH: char = '▓';
const CLEARING_CHAR: &str = "░░";
const EMPTY_CHAR: &str = "  ";

/// Pointer coordinates use a 20 px grid whose field column 0 is centered on x = 150.
const CANVAS_CELL_PX: i32 = 20;
const CANVAS_FIELD_LEFT_PX: i32 = 150;
const CANVAS_FIELD_TOP_PX: i32 = -10;

/// Popups rise one row per this many frames.
const POPUP_RISE_FRAMES: u32 = 10;

fn piece_color(color: u8) -> Color {
    match color {
        0 => Color::Rgb(255, 162, 179),
        1 => Color::Rgb(255, 98, 98),
        2 => Color::Rgb(255, 186, 59),
        3 => Color::Rgb(255, 255, 20),
        4 => Color::Rgb(157, 232, 57),
        5 => Color::Rgb(90, 214, 255),
        _ => Color::Rgb(169, 141, 210),
    }
}

/// Canvas point at the center of field cell `(column, row)`.
fn canvas_point(column: i32, row: i32) -> (i32, i32) {
    (
        CANVAS_FIELD_LEFT_PX + column * CANVAS_CELL_PX,
        CANVAS_FIELD_TOP_PX + row * CANVAS_CELL_PX,
    )
}

// ============================================================================
// Layout
// ============================================================================

struct Areas {
    hold: Rect,
    board: Rect,
    side: Rect,
}

fn layout(area: Rect) -> Areas {
    let board_width = FIELD_WIDTH as u16 * CELL_WIDTH + 2;
    let board_height = FIELD_HEIGHT as u16 + 2;
    let total = centered_rect(SIDE_WIDTH * 2 + board_width, board_height, area);
    let columns = Layout::horizontal([
        Constraint::Length(SIDE_WIDTH),
        Constraint::Length(board_width),
        Constraint::Length(SIDE_WIDTH),
    ])
    .split(total);
    Areas {
        hold: columns[0],
        board: columns[1],
        side: columns[2],
    }
}

fn board_inner(board: Rect) -> Rect {
    Block::default().borders(Borders::ALL).inner(board)
}

/// Field cell under a terminal position, if any.
fn field_cell(board: Rect, column: u16, row: u16) -> Option<(i32, i32)> {
    let inner = board_inner(board);
    if column < inner.x || row < inner.y || column >= inner.x + inner.width || row >= inner.y + inner.height {
        return None;
    }
    Some((((column - inner.x) / CELL_WIDTH) as i32, (row - inner.y) as i32))
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let horizontal = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(width.min(area.width)),
        Constraint::Fill(1),
    ])
    .split(area);

    let vertical = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height.min(area.height)),
        Constraint::Fill(1),
    ])
    .split(horizontal[1]);

    vertical[1]
}

// ============================================================================
// Rendering
// ============================================================================

fn render(frame: &mut Frame, game: &Game) {
    let areas = layout(frame.size());
    render_board(frame, game, areas.board);
    render_piece_box(frame, " Hold ", game.held(), areas.hold);
    render_side(frame, game, areas.side);

    match game.state() {
        GameState::Menu => render_banner(frame, game, areas.board, "CHAIN TETRIS", "Enter or click PLAY"),
        GameState::Paused => render_banner(frame, game, areas.board, "PAUSED", "Space to continue"),
        GameState::Ended => {
            let title = match game.end_reason() {
                Some(EndReason::TimeUp) => "TIME UP",
                _ => "GAME OVER",
            };
            render_banner(frame, game, areas.board, title, "Enter or click PLAY")
        }
        GameState::Playing => {}
    }
}

/// Cells whose tile is hinged to the tile on its right within one piece.
fn right_hinges(game: &Game) -> HashSet<(i32, i32)> {
    game.pile()
        .pieces()
        .map(|(_, piece, _)| piece)
        .chain(game.active())
        .flat_map(|piece| piece.hinges())
        .filter(|(a, b)| a.y == b.y)
        .map(|(a, b)| (a.x.min(b.x), a.y))
        .collect()
}

/// A tile fills the left half of its cell; the right half is the hinge to
/// its neighbour and stays blank between separate pieces.
fn tile_span(glyph: char, hinged: bool, style: Style) -> Span<'static> {
    let text = if hinged {
        format!("{glyph}{glyph}")
    } else {
        format!("{glyph} ")
    };
    Span::styled(text, style)
}

fn render_board(frame: &mut Frame, game: &Game, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Chain Tetris ")
        .title_alignment(Alignment::Center);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let show_play = matches!(game.state(), GameState::Menu | GameState::Ended);
    let region = game.config().play_region;
    let hinges = right_hinges(game);
    let mut lines: Vec<Line> = Vec::new();
    for (y, row) in game.render_grid().iter().enumerate() {
        let spans: Vec<Span> = row
            .iter()
            .enumerate()
            .map(|(x, cell)| {
                let (cx, cy) = canvas_point(x as i32, y as i32);
                if show_play && region.contains(cx, cy) {
                    return Span::styled(EMPTY_CHAR, Style::default().bg(Color::Green));
                }
                let hinged = hinges.contains(&(x as i32, y as i32));
                match *cell {
                    Cell::Empty => Span::raw(EMPTY_CHAR),
                    Cell::Settled(c) => tile_span(TILE_GLYPH, hinged, Style::default().fg(piece_color(c))),
                    Cell::Loose(c) => tile_span(LOOSE_GLYPH, hinged, Style::default().fg(piece_color(c))),
                    Cell::Clearing(_) => Span::styled(CLEARING_CHAR, Style::default().fg(Color::White)),
                    Cell::Active(c) => tile_span(
                        TILE_GLYPH,
                        hinged,
                        Style::default().fg(piece_color(c)).add_modifier(Modifier::BOLD),
                    ),
                }
            })
            .collect();
        lines.push(Line::from(spans));
    }
    frame.render_widget(Paragraph::new(lines), inner);

    for popup in game.popups() {
        let row = popup.anchor.y - (popup.age / POPUP_RISE_FRAMES) as i32;
        if row < 0 || row >= inner.height as i32 {
            continue;
        }
        let text = format!("+{}", popup.value);
        let x = inner.x + (popup.anchor.x as u16 * CELL_WIDTH).saturating_sub(text.len() as u16 / 2);
        let rect = Rect::new(x, inner.y + row as u16, text.len() as u16, 1).intersection(inner);
        frame.render_widget(
            Paragraph::new(text).style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
            rect,
        );
    }
}

fn piece_lines(piece: &Tetrimino) -> Vec<Line<'static>> {
    let tiles = piece.tiles();
    let (Some(min_x), Some(min_y)) = (tiles.iter().map(|t| t.x).min(), tiles.iter().map(|t| t.y).min()) else {
        return Vec::new();
    };
    let max_y = tiles.iter().map(|t| t.y).max().unwrap_or(min_y);
    let color = piece_color(piece.color());
    (min_y..=max_y)
        .map(|y| {
            let mut spans = vec![Span::raw(" ")];
            for x in min_x..min_x + 4 {
                if piece.contains(x, y) {
                    spans.push(Span::styled(BLOCK_CHAR, Style::default().fg(color)));
                } else {
                    spans.push(Span::raw(EMPTY_CHAR));
                }
            }
            Line::from(spans)
        })
        .collect()
}

fn render_piece_box(frame: &mut Frame, title: &str, piece: Option<&Tetrimino>, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .title_alignment(Alignment::Center);
    let rect = Rect::new(area.x, area.y, area.width, 7.min(area.height));
    let inner = block.inner(rect);
    frame.render_widget(block, rect);
    if let Some(piece) = piece {
        frame.render_widget(Paragraph::new(piece_lines(piece)), inner);
    }
}

fn render_side(frame: &mut Frame, game: &Game, area: Rect) {
    render_piece_box(frame, " Next ", game.next(), area);

    let info = Rect::new(area.x, area.y + 7, area.width, area.height.saturating_sub(7));
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Info ")
        .title_alignment(Alignment::Center);
    let inner = block.inner(info);
    frame.render_widget(block, info);

    let lines = vec![
        Line::from(Span::styled("Time", Style::default().fg(Color::Yellow))),
        Line::from(game.clock_text()),
        Line::from(""),
        Line::from(Span::styled("Score", Style::default().fg(Color::Yellow))),
        Line::from(format!("{}", game.score())),
        Line::from(""),
        Line::from(Span::styled("Best", Style::default().fg(Color::Cyan))),
        Line::from(format!("{}", game.best())),
        Line::from(""),
        Line::from(Span::styled("Chain", Style::default().fg(Color::Green))),
        Line::from(format!("x{}", 1u32 << game.chain().min(31))),
    ];
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}

fn render_banner(frame: &mut Frame, game: &Game, board: Rect, title: &str, hint: &str) {
    let text = vec![
        Line::from(Span::styled(title.to_string(), Style::default().fg(Color::Yellow))),
        Line::from(format!("Score {}  Best {}", game.score(), game.best())),
        Line::from(Span::styled(hint.to_string(), Style::default().fg(Color::DarkGray))),
    ];
    let rect = Rect::new(board.x + 1, board.y + 2, board.width.saturating_sub(2), 5);
    frame.render_widget(Clear, rect);
    frame.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL)),
        rect,
    );
}

// ============================================================================
// Input
// ============================================================================

/// How long a key counts as held after its last press when the terminal
/// does not report releases.
const RELEASE_GRACE: Duration = Duration::from_millis(100);

/// Held-key bookkeeping for move and soft-drop keys.
struct HeldKeys {
    reports_release: bool,
    /// Release input to send and the instant it becomes due.
    held: Vec<(Input, Instant)>,
}

impl HeldKeys {
    fn new(reports_release: bool) -> Self {
        Self {
            reports_release,
            held: Vec::new(),
        }
    }

    fn press(&mut self, game: &mut Game, press: Input, release: Input, now: Instant) {
        if self.reports_release {
            game.handle_input(press);
            return;
        }
        match self.held.iter_mut().find(|(r, _)| *r == release) {
            Some((_, due)) => *due = now + RELEASE_GRACE,
            None => {
                game.handle_input(press);
                self.held.push((release, now + RELEASE_GRACE));
            }
        }
    }

    fn release(&mut self, game: &mut Game, release: Input) {
        self.held.retain(|(r, _)| *r != release);
        game.handle_input(release);
    }

    fn expire(&mut self, game: &mut Game, now: Instant) {
        let (due, kept): (Vec<_>, Vec<_>) = self.held.drain(..).partition(|(_, at)| *at <= now);
        self.held = kept;
        for (release, _) in due {
            game.handle_input(release);
        }
    }
}

fn held_pair(code: KeyCode) -> Option<(Input, Input)> {
    match code {
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => Some((Input::MoveLeft, Input::ReleaseLeft)),
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => Some((Input::MoveRight, Input::ReleaseRight)),
        KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => {
            Some((Input::SoftDropStart, Input::SoftDropStop))
        }
        _ => None,
    }
}

fn tap_input(code: KeyCode) -> Option<Input> {
    match code {
        KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') => Some(Input::Rotate),
        KeyCode::Char('h') | KeyCode::Char('H') | KeyCode::Char('c') | KeyCode::Char('C') => Some(Input::Hold),
        KeyCode::Char(' ') | KeyCode::Char('p') | KeyCode::Char('P') => Some(Input::TogglePause),
        KeyCode::Enter => Some(Input::Start),
        _ => None,
    }
}

/// Returns false when the player asked to quit.
fn handle_key(game: &mut Game, keys: &mut HeldKeys, key: KeyEvent, now: Instant) -> bool {
    if matches!(key.code, KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q')) {
        return key.kind != KeyEventKind::Press;
    }
    if let Some((press, release)) = held_pair(key.code) {
        match key.kind {
            KeyEventKind::Press => keys.press(game, press, release, now),
            KeyEventKind::Release => keys.release(game, release),
            KeyEventKind::Repeat => {}
        }
    } else if key.kind == KeyEventKind::Press {
        if let Some(input) = tap_input(key.code) {
            game.handle_input(input);
        }
    }
    true
}

// ============================================================================
// Main Loop
// ============================================================================

fn run(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, game: &mut Game, keys: &mut HeldKeys) -> Result<()> {
    let origin = Instant::now();
    let frame_time = Duration::from_millis(game.config().frame_ms);

    loop {
        terminal.draw(|frame| render(frame, game))?;

        if event::poll(frame_time)? {
            while event::poll(Duration::ZERO)? {
                let now = Instant::now();
                match event::read()? {
                    Event::Key(key) => {
                        if !handle_key(game, keys, key, now) {
                            return Ok(());
                        }
                    }
                    Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                        let board = layout(terminal.size()?).board;
                        if let Some((column, row)) = field_cell(board, mouse.column, mouse.row) {
                            let (x, y) = canvas_point(column, row);
                            game.handle_input(Input::Click { x, y });
                        }
                    }
                    _ => {}
                }
            }
        }

        keys.expire(game, Instant::now());
        game.advance(origin.elapsed().as_millis() as u64);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;
    let config = args.config();
    config.validate().context("invalid game settings")?;

    let mut game = Game::new(config);
    if args.no_menu {
        game.handle_input(Input::Start);
    }

    // Setup terminal
    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;
    let reports_release = supports_keyboard_enhancement().unwrap_or(false);
    if reports_release {
        execute!(
            stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }
    log::info!("key release reporting: {reports_release}");
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut keys = HeldKeys::new(reports_release);

    let result = run(&mut terminal, &mut game, &mut keys);

    // Restore terminal
    if reports_release {
        let _ = execute!(stdout(), PopKeyboardEnhancementFlags);
    }
    execute!(stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
    disable_raw_mode()?;

    result
}
