//! Pong simulation state machine
//!
//! One [`Game::tick`] is one unit of simulation time: paddles move by at
//! most one step, the ball by exactly one cell per axis. Everything is
//! integer arithmetic, so a given input sequence always produces the same
//! frames.
//!
//! ```text
//! WaitingForStart --Start--> Playing --score reaches limit--> Finished
//! ```

use core::fmt::Write;

use crate::display::{Attribute, HEIGHT, Screen, Surface, WIDTH};
use crate::keyboard::scancode;

/// Lowest paddle position
pub const PADDLE_MIN: u8 = 1;
/// Highest paddle position
pub const PADDLE_MAX: u8 = 30;
/// Paddle length in rows
pub const PADDLE_HEIGHT: usize = 5;
/// Points needed to win
pub const WINNING_SCORE: u8 = 10;

/// Ball reflects off the walls on these rows
pub const TOP_ROW: i16 = 1;
pub const BOTTOM_ROW: i16 = HEIGHT as i16 - 2;
/// Columns on which a paddle can return the ball
pub const LEFT_RETURN_COLUMN: i16 = 1;
pub const RIGHT_RETURN_COLUMN: i16 = WIDTH as i16 - 2;
/// Columns past which a point is scored
pub const LEFT_GOAL_COLUMN: i16 = 0;
pub const RIGHT_GOAL_COLUMN: i16 = WIDTH as i16 - 1;

/// Serve position
pub const CENTER_X: i16 = WIDTH as i16 / 2;
pub const CENTER_Y: i16 = HEIGHT as i16 / 2;

/// Ball and paddles: white on white
pub const SOLID: Attribute = Attribute(0xFF);
/// Empty board: black on black
pub const BOARD: Attribute = Attribute(0x00);

/// Banner shown while waiting for the start key
pub const TITLE: &str = "PONG OS (Press Enter to Play)";
pub const TITLE_COLUMN: usize = 26;

/// Game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForStart,
    Playing,
    Finished,
}

/// A player, by paddle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    #[inline]
    const fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    /// Player number shown on screen
    pub const fn player(self) -> u8 {
        match self {
            Side::Left => 1,
            Side::Right => 2,
        }
    }
}

/// What one scan code asks the game to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Start,
    UpLeft,
    DownLeft,
    UpRight,
    DownRight,
    Idle,
}

impl Trigger {
    /// Translate a scan code set 1 make code
    pub const fn from_scan_code(code: u8) -> Trigger {
        match code {
            scancode::ENTER => Trigger::Start,
            scancode::W => Trigger::UpLeft,
            scancode::S => Trigger::DownLeft,
            scancode::UP => Trigger::UpRight,
            scancode::DOWN => Trigger::DownRight,
            _ => Trigger::Idle,
        }
    }

    /// Translate the result of a keyboard poll
    pub const fn from_poll(code: Option<u8>) -> Trigger {
        match code {
            Some(code) => Trigger::from_scan_code(code),
            None => Trigger::Idle,
        }
    }
}

/// Ball cell and per-axis velocity (each -1 or +1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ball {
    pub x: i16,
    pub y: i16,
    pub dx: i8,
    pub dy: i8,
}

impl Ball {
    /// Centered ball moving with (`dx`, `dy`)
    pub const fn serve(dx: i8, dy: i8) -> Ball {
        Ball { x: CENTER_X, y: CENTER_Y, dx, dy }
    }
}

/// First row covered by a paddle at `position`
///
/// Positions 1..=30 spread evenly over rows 0..=20.
pub const fn paddle_row(position: u8) -> usize {
    let position = clamp_paddle(position);
    (position - PADDLE_MIN) as usize * (HEIGHT - PADDLE_HEIGHT) / (PADDLE_MAX - PADDLE_MIN) as usize
}

const fn clamp_paddle(position: u8) -> u8 {
    if position < PADDLE_MIN {
        PADDLE_MIN
    } else if position > PADDLE_MAX {
        PADDLE_MAX
    } else {
        position
    }
}

/// Simulation state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    ball: Ball,
    paddles: [u8; 2],
    scores: [u8; 2],
    phase: Phase,
    winning_score: u8,
}

impl Default for Game {
    fn default() -> Self {
        Game::new(WINNING_SCORE)
    }
}

impl Game {
    /// Fresh game: centered ball heading down-right, centered paddles
    pub const fn new(winning_score: u8) -> Self {
        Game {
            ball: Ball::serve(1, 1),
            paddles: [15, 15],
            scores: [0, 0],
            phase: Phase::WaitingForStart,
            winning_score: if winning_score == 0 { 1 } else { winning_score },
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ball(&self) -> Ball {
        self.ball
    }

    pub fn paddle(&self, side: Side) -> u8 {
        self.paddles[side.index()]
    }

    pub fn score(&self, side: Side) -> u8 {
        self.scores[side.index()]
    }

    pub fn winning_score(&self) -> u8 {
        self.winning_score
    }

    /// The side that has reached the winning score, if any
    pub fn winner(&self) -> Option<Side> {
        [Side::Left, Side::Right]
            .into_iter()
            .find(|&side| self.score(side) >= self.winning_score)
    }

    /// Leave the waiting phase; returns whether anything changed
    pub fn start(&mut self) -> bool {
        if self.phase == Phase::WaitingForStart {
            self.phase = Phase::Playing;
            trace!(info, "game started");
            true
        } else {
            false
        }
    }

    /// Move a paddle for a paddle trigger; other triggers are ignored
    pub fn apply(&mut self, trigger: Trigger) {
        if self.phase != Phase::Playing {
            return;
        }
        match trigger {
            Trigger::UpLeft => self.nudge(Side::Left, -1),
            Trigger::DownLeft => self.nudge(Side::Left, 1),
            Trigger::UpRight => self.nudge(Side::Right, -1),
            Trigger::DownRight => self.nudge(Side::Right, 1),
            Trigger::Start | Trigger::Idle => {}
        }
    }

    /// Advance the ball one cell and resolve walls, paddles and goals
    ///
    /// Returns the side that scored. Does nothing outside [`Phase::Playing`].
    pub fn advance(&mut self) -> Option<Side> {
        if self.phase != Phase::Playing {
            return None;
        }

        let ball = &mut self.ball;
        ball.x += i16::from(ball.dx);
        ball.y += i16::from(ball.dy);

        if ball.y <= TOP_ROW || ball.y >= BOTTOM_ROW {
            ball.dy = -ball.dy;
        }

        let (x, y) = (ball.x, ball.y);
        let returned = (x <= LEFT_RETURN_COLUMN && self.covers(Side::Left, y))
            || (x >= RIGHT_RETURN_COLUMN && self.covers(Side::Right, y));
        if returned {
            self.ball.dx = -self.ball.dx;
            return None;
        }

        let scorer = if x <= LEFT_GOAL_COLUMN {
            self.ball = Ball::serve(1, 1);
            Side::Right
        } else if x >= RIGHT_GOAL_COLUMN {
            self.ball = Ball::serve(-1, -1);
            Side::Left
        } else {
            return None;
        };

        let score = &mut self.scores[scorer.index()];
        *score = score.saturating_add(1);
        trace!(info, player = scorer.player(), score = *score, "point scored");
        Some(scorer)
    }

    /// Run one frame: apply `trigger`, redraw the board and step the ball
    ///
    /// Draws into the screen's back grid only. When a score reaches the
    /// limit the board is replaced by the winner message and the game
    /// freezes in [`Phase::Finished`].
    pub fn tick<S, D>(&mut self, trigger: Trigger, screen: &mut Screen<S, D>) -> Phase
    where
        S: AsRef<[u8]> + AsMut<[u8]>,
        D: Surface,
    {
        if self.phase != Phase::Playing {
            return self.phase;
        }

        self.apply(trigger);

        screen.fill(BOARD);
        self.draw_ball(screen, BOARD);
        for (column, side) in [(0, Side::Left), (WIDTH - 1, Side::Right)] {
            screen.draw_vertical_bar(column, paddle_row(self.paddle(side)), PADDLE_HEIGHT, SOLID);
        }

        self.advance();
        self.draw_ball(screen, SOLID);
        self.draw_score(screen);

        if let Some(winner) = self.winner() {
            self.finish(winner, screen);
        }
        self.phase
    }

    /// Draw the title banner on a default-colored board
    pub fn render_title<S, D>(&self, screen: &mut Screen<S, D>)
    where
        S: AsRef<[u8]> + AsMut<[u8]>,
        D: Surface,
    {
        screen.fill(Attribute::DEFAULT);
        screen.write_str_at(TITLE_COLUMN, 0, TITLE, Attribute::DEFAULT);
    }

    fn finish<S, D>(&mut self, winner: Side, screen: &mut Screen<S, D>)
    where
        S: AsRef<[u8]> + AsMut<[u8]>,
        D: Surface,
    {
        self.phase = Phase::Finished;
        screen.fill(BOARD);
        let column = (WIDTH - "PLAYER 1 WINS".len()) / 2;
        let _ = write!(screen.text(column, HEIGHT / 2, Attribute::DEFAULT), "PLAYER {} WINS", winner.player());
        trace!(info, player = winner.player(), "game finished");
    }

    fn draw_score<S, D>(&self, screen: &mut Screen<S, D>)
    where
        S: AsRef<[u8]> + AsMut<[u8]>,
        D: Surface,
    {
        let text = Attribute::DEFAULT;
        screen.write_str_at(2, 0, "1: ", text);
        let _ = write!(screen.text(7, 0, text), "{}", self.score(Side::Left));
        screen.write_str_at(12, 0, "   2: ", text);
        let _ = write!(screen.text(18, 0, text), "{}", self.score(Side::Right));
    }

    fn draw_ball<S, D>(&self, screen: &mut Screen<S, D>, attribute: Attribute)
    where
        S: AsRef<[u8]> + AsMut<[u8]>,
        D: Surface,
    {
        let Ball { x, y, .. } = self.ball;
        if let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) {
            if x < WIDTH && y < HEIGHT {
                screen.set_cell(x, y, b' ', attribute);
            }
        }
    }

    fn covers(&self, side: Side, y: i16) -> bool {
        let top = paddle_row(self.paddle(side)) as i16;
        y >= top && y < top + PADDLE_HEIGHT as i16
    }

    fn nudge(&mut self, side: Side, delta: i8) {
        let paddle = &mut self.paddles[side.index()];
        *paddle = clamp_paddle(paddle.saturating_add_signed(delta));
    }
}
