//! Main loop
//!
//! [`Machine`] wires the keyboard, timer, screen and game together. One
//! call to [`Machine::iterate`] is one loop iteration: poll the keyboard
//! once, step the game if it is running, present the frame and wait out
//! the frame delay.

use crate::arena::Arena;
use crate::display::{Screen, Surface};
use crate::error::KernelResult;
use crate::game::{Game, Phase, Trigger, WINNING_SCORE};
use crate::keyboard::Keyboard;
use crate::port::PortIo;
use crate::timer::Pit;

/// Kernel settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Points needed to win
    pub winning_score: u8,
    /// Delay after each played frame, in milliseconds
    pub frame_delay_ms: u32,
    /// How long the winner message stays up before halting
    pub finish_delay_ms: u32,
    /// PIT tick rate in Hz
    pub tick_hz: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            winning_score: WINNING_SCORE,
            frame_delay_ms: 40,
            finish_delay_ms: 1000,
            tick_hz: 1000,
        }
    }
}

/// Result of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

/// The whole kernel
///
/// - `K` - keyboard controller ports
/// - `T` - timer ports
/// - `S` - arena storage
/// - `D` - display device
pub struct Machine<K, T, S, D> {
    keyboard: Keyboard<K>,
    timer: Pit<T>,
    screen: Screen<S, D>,
    game: Game,
    config: Config,
    iterations: u64,
}

impl<K, T, S, D> Machine<K, T, S, D>
where
    K: PortIo,
    T: PortIo,
    S: AsRef<[u8]> + AsMut<[u8]>,
    D: Surface,
{
    /// Bring up every device and show the title banner
    ///
    /// Fails if the arena cannot hold the back grid.
    pub fn boot(keyboard_ports: K, timer_ports: T, arena: Arena<S>, device: D, config: Config) -> KernelResult<Self> {
        let screen = Screen::new(arena, device)?;

        let mut keyboard = Keyboard::new(keyboard_ports);
        keyboard.enable_reporting();

        let mut timer = Pit::new(timer_ports);
        timer.configure(config.tick_hz);

        let mut machine = Machine {
            keyboard,
            timer,
            screen,
            game: Game::new(config.winning_score),
            config,
            iterations: 0,
        };
        machine.game.render_title(&mut machine.screen);
        machine.screen.present();
        trace!(info, winning_score = config.winning_score, "kernel booted");
        Ok(machine)
    }

    /// Run one loop iteration
    pub fn iterate(&mut self) -> Flow {
        let trigger = Trigger::from_poll(self.keyboard.poll());
        self.iterations += 1;

        match self.game.phase() {
            Phase::Finished => return Flow::Halt,
            Phase::WaitingForStart if trigger == Trigger::Start => {
                self.game.start();
            }
            Phase::WaitingForStart => return Flow::Continue,
            Phase::Playing => {}
        }

        let phase = self.game.tick(trigger, &mut self.screen);
        self.screen.present();

        if phase == Phase::Finished {
            self.timer.delay_ms(self.config.finish_delay_ms);
            return Flow::Halt;
        }
        self.timer.delay_ms(self.config.frame_delay_ms);
        Flow::Continue
    }

    /// Iterate until the game is over
    pub fn run(&mut self) {
        while self.iterate() == Flow::Continue {}
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn screen(&self) -> &Screen<S, D> {
        &self.screen
    }

    pub fn keyboard(&self) -> &Keyboard<K> {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut Keyboard<K> {
        &mut self.keyboard
    }

    pub fn timer(&self) -> &Pit<T> {
        &self.timer
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Loop iterations run so far
    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}
