//! Headless game sessions
//!
//! Boots the kernel against in-memory devices, feeds it a key script and
//! runs it until the kernel halts, the script runs dry before play
//! starts, or the iteration limit is hit.

use pongos::prelude::*;
use std::vec;

use crate::script::Script;

/// Machine wired to the simulated devices
pub type SimMachine = Machine<ScriptedPorts<vec::IntoIter<Option<u8>>>, ReadyPorts, Vec<u8>, MemorySurface>;

/// Session settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Maximum loop iterations
    pub frames: u64,
    /// Bytes of arena storage
    pub arena_size: usize,
    pub kernel: Config,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frames: 10_000,
            arena_size: 1024 * 1024,
            kernel: Config {
                frame_delay_ms: 0,
                finish_delay_ms: 0,
                ..Config::default()
            },
        }
    }
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The kernel halted after a win
    Halted,
    /// The script ended before the start key was pressed
    OutOfInput,
    /// The iteration limit was reached
    FrameLimit,
}

/// Final state of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub reason: StopReason,
    pub iterations: u64,
    pub presents: u64,
    pub phase: Phase,
    pub scores: [u8; 2],
    pub winner: Option<Side>,
}

/// A frame handed to the observer after each present
pub struct Frame<'a> {
    pub iteration: u64,
    pub surface: &'a MemorySurface,
    pub game: &'a Game,
}

/// Boot a machine for `script`
pub fn boot(script: Script, settings: &Settings) -> KernelResult<SimMachine> {
    let arena = Arena::new(vec![0u8; settings.arena_size])?;

    // The enable-scanning handshake polls the status port once; give it an
    // idle event of its own so the script starts at the first iteration
    let mut events = Vec::with_capacity(script.len() + 1);
    events.push(None);
    events.extend(script.into_events());
    let keyboard = ScriptedPorts::new(events.into_iter());

    Machine::boot(keyboard, ReadyPorts::new(), arena, MemorySurface::new(), settings.kernel)
}

/// Run a whole session, calling `on_frame` for every presented frame
///
/// The title screen shown at boot is reported as iteration 0.
pub fn simulate<F>(script: Script, settings: &Settings, mut on_frame: F) -> KernelResult<Summary>
where
    F: FnMut(&Frame<'_>),
{
    tracing::info!(events = script.len(), frames = settings.frames, "starting session");
    let mut machine = boot(script, settings)?;
    let mut presents = machine.screen().presents();
    let mut scores = [0u8; 2];

    on_frame(&Frame {
        iteration: 0,
        surface: machine.screen().device(),
        game: machine.game(),
    });

    let reason = loop {
        if machine.iterations() >= settings.frames {
            break StopReason::FrameLimit;
        }
        if machine.game().phase() == Phase::WaitingForStart && machine.keyboard_mut().ports_mut().is_exhausted() {
            break StopReason::OutOfInput;
        }

        let flow = machine.iterate();

        if machine.screen().presents() != presents {
            presents = machine.screen().presents();
            on_frame(&Frame {
                iteration: machine.iterations(),
                surface: machine.screen().device(),
                game: machine.game(),
            });
        }

        let now = current_scores(machine.game());
        if now != scores {
            tracing::debug!(left = now[0], right = now[1], iteration = machine.iterations(), "score");
            scores = now;
        }

        if flow == Flow::Halt {
            break StopReason::Halted;
        }
    };

    let game = machine.game();
    let summary = Summary {
        reason,
        iterations: machine.iterations(),
        presents,
        phase: game.phase(),
        scores: current_scores(game),
        winner: game.winner(),
    };
    tracing::info!(?summary.reason, iterations = summary.iterations, "session over");
    Ok(summary)
}

fn current_scores(game: &Game) -> [u8; 2] {
    [game.score(Side::Left), game.score(Side::Right)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pongos::error::{ArenaError, KernelError};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_script_stops_waiting() {
        let summary = simulate(Script::default(), &Settings::default(), |_| {}).unwrap();
        assert_eq!(summary.reason, StopReason::OutOfInput);
        assert_eq!(summary.phase, Phase::WaitingForStart);
        assert_eq!(summary.iterations, 0);
        assert_eq!(summary.presents, 1);
    }

    #[test]
    fn test_idle_keys_before_start_are_consumed() {
        let script = Script::parse(".*3 w").unwrap();
        let summary = simulate(script, &Settings::default(), |_| {}).unwrap();
        assert_eq!(summary.reason, StopReason::OutOfInput);
        assert_eq!(summary.iterations, 4);
    }

    #[test]
    fn test_frame_limit() {
        let settings = Settings { frames: 5, ..Settings::default() };
        let mut seen = Vec::new();
        let summary = simulate(Script::parse("enter").unwrap(), &settings, |frame| seen.push(frame.iteration)).unwrap();
        assert_eq!(summary.reason, StopReason::FrameLimit);
        assert_eq!(summary.phase, Phase::Playing);
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_plays_to_a_winner() {
        let mut settings = Settings::default();
        settings.kernel.winning_score = 2;
        let summary = simulate(Script::parse("enter").unwrap(), &settings, |_| {}).unwrap();

        assert_eq!(summary.reason, StopReason::Halted);
        assert_eq!(summary.phase, Phase::Finished);
        let winner = summary.winner.unwrap();
        assert_eq!(summary.scores[winner as usize], 2);
    }

    #[test]
    fn test_frames_carry_game_state() {
        let mut settings = Settings::default();
        settings.kernel.winning_score = 1;
        let mut phases = Vec::new();
        let mut last_scores = [0u8; 2];
        simulate(Script::parse("enter").unwrap(), &settings, |frame| {
            phases.push(frame.game.phase());
            last_scores = current_scores(frame.game);
        })
        .unwrap();

        assert_eq!(phases.first(), Some(&Phase::WaitingForStart));
        assert_eq!(phases.last(), Some(&Phase::Finished));
        assert_eq!(last_scores.iter().sum::<u8>(), 1);
    }

    #[test]
    fn test_small_arena_fails_to_boot() {
        let settings = Settings { arena_size: 2048, ..Settings::default() };
        let err = simulate(Script::parse("enter").unwrap(), &settings, |_| {}).err();
        assert_eq!(err, Some(KernelError::Arena(ArenaError::Exhausted { requested: 4000 })));
    }
}
