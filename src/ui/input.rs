/// Input sources.
///
/// Keyboard: tracks which keys are held so commands are edge-triggered
/// (one command per physical press, not per auto-repeat). Uses crossterm's
/// keyboard enhancement for Release events when available, and falls back
/// to timeout-based release detection on terminals that don't support it.
///
/// Directive feed: when stdin is not a terminal, a helper thread reads one
/// JSON directive per line and hands the lines over a channel. Keys still
/// arrive through the controlling terminal.

use std::collections::HashMap;
use std::io::{BufRead, IsTerminal};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{debug, warn};

use crate::domain::entity::GestureKind;
use crate::sim::directive::Directive;
use crate::sim::world::WorldState;

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

/// Tiles an arrow press moves the walk target.
const NUDGE_X: i32 = 8;
const NUDGE_Y: i32 = 3;

/// What a key press asks for, before it is tied to a particular actor.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KeyCommand {
    Quit,
    Nudge(i32, i32),
    Gesture(GestureKind),
    Stop,
    Join,
    Leave,
    ObserveNext,
}

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the most recent
    /// drain_events() call.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for modifier checks.
    pub raw_events: Vec<KeyEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before the simulation tick.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.record(key, Instant::now());
            }
        }

        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    fn record(&mut self, key: KeyEvent, now: Instant) {
        self.raw_events.push(key);
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            KeyEventKind::Release => {
                // Enhancement not confirmed; rely on timeout expiry.
            }
            _ => {
                let was_held = self.is_held_at(key.code, now);
                self.last_active.insert(key.code, now);
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
            }
        }
    }

    /// Was this key freshly pressed this frame? (edge trigger)
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    /// Check if any raw event this frame has Ctrl+C
    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    /// Commands for this frame's fresh presses, in press order.
    pub fn commands(&self) -> Vec<KeyCommand> {
        if self.ctrl_c_pressed() {
            return vec![KeyCommand::Quit];
        }
        self.fresh_presses.iter().filter_map(|&code| key_command(code)).collect()
    }

    fn is_held_at(&self, code: KeyCode, now: Instant) -> bool {
        self.last_active
            .get(&code)
            .map(|t| now.duration_since(*t) < HOLD_TIMEOUT)
            .unwrap_or(false)
    }
}

fn key_command(code: KeyCode) -> Option<KeyCommand> {
    Some(match code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => KeyCommand::Quit,
        KeyCode::Left => KeyCommand::Nudge(-NUDGE_X, 0),
        KeyCode::Right => KeyCommand::Nudge(NUDGE_X, 0),
        KeyCode::Up => KeyCommand::Nudge(0, -NUDGE_Y),
        KeyCode::Down => KeyCommand::Nudge(0, NUDGE_Y),
        KeyCode::Char('t') => KeyCommand::Gesture(GestureKind::Talk),
        KeyCode::Char('w') => KeyCommand::Gesture(GestureKind::Wave),
        KeyCode::Char(' ') => KeyCommand::Stop,
        KeyCode::Char('j') => KeyCommand::Join,
        KeyCode::Char('l') => KeyCommand::Leave,
        KeyCode::Tab => KeyCommand::ObserveNext,
        _ => return None,
    })
}

/// Resolve a key command against the observed actor. `Quit` and
/// `ObserveNext` are loop-level and produce no directive.
pub fn key_directive(cmd: KeyCommand, world: &WorldState) -> Option<Directive> {
    let observed = world.observed.and_then(|id| world.agent(id));
    match cmd {
        KeyCommand::Quit | KeyCommand::ObserveNext => None,
        KeyCommand::Nudge(dx, dy) => {
            let agent = observed?;
            // Walk on from the current goal so repeated presses accumulate.
            let (x, y) = agent.behavior.goal().unwrap_or_else(|| agent.actor.grid_pos());
            let max_x = world.grid.width as i32 - 1;
            let max_y = world.grid.height as i32 - 1;
            Some(Directive::MoveTo {
                actor: agent.actor.id,
                x: (x + dx).clamp(0, max_x.max(0)),
                y: (y + dy).clamp(0, max_y.max(0)),
            })
        }
        KeyCommand::Gesture(kind) => observed.map(|a| Directive::Gesture { actor: a.actor.id, kind }),
        KeyCommand::Stop => observed.map(|a| Directive::Stop { actor: a.actor.id }),
        KeyCommand::Join => Some(Directive::Join {
            name: format!("Guest{}", world.agents.len() + 1),
            seed: world.tick.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ world.agents.len() as u64,
        }),
        KeyCommand::Leave => world.newest().map(|actor| Directive::Leave { actor }),
    }
}

// ── Directive feed ──

/// Lines of directive JSON from stdin, read on a helper thread.
pub struct DirectiveFeed {
    rx: Receiver<String>,
    closed: bool,
}

impl DirectiveFeed {
    /// Start reading stdin when it is not a terminal. Returns `None` when
    /// stdin is interactive (the keyboard owns it).
    pub fn from_stdin() -> Option<Self> {
        let stdin = std::io::stdin();
        if stdin.is_terminal() {
            return None;
        }
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new().name("directive-feed".into()).spawn(move || {
            for line in stdin.lock().lines() {
                match line {
                    Ok(l) if l.trim().is_empty() => continue,
                    Ok(l) => {
                        if tx.send(l).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("stdin read failed: {e}");
                        break;
                    }
                }
            }
            debug!("directive feed closed");
        });
        match spawned {
            Ok(_) => Some(DirectiveFeed { rx, closed: false }),
            Err(e) => {
                warn!("could not start directive feed: {e}");
                None
            }
        }
    }

    /// Drain whatever has arrived since the last poll, decoding each line.
    /// Undecodable lines are logged and dropped.
    pub fn drain(&mut self) -> Vec<Directive> {
        let mut out = Vec::new();
        if self.closed {
            return out;
        }
        loop {
            match self.rx.try_recv() {
                Ok(line) => match Directive::parse(&line) {
                    Ok(d) => out.push(d),
                    Err(e) => warn!(line = %line, "ignoring directive: {e}"),
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::sim::level::parse_world;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn press_is_edge_triggered() {
        let mut input = InputState::new();
        let t0 = Instant::now();
        input.record(press(KeyCode::Char('t')), t0);
        assert!(input.was_pressed(KeyCode::Char('t')));

        input.fresh_presses.clear();
        input.record(press(KeyCode::Char('t')), t0 + Duration::from_millis(30));
        assert!(!input.was_pressed(KeyCode::Char('t')));
    }

    #[test]
    fn ctrl_c_quits() {
        let mut input = InputState::new();
        input.record(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), Instant::now());
        assert_eq!(input.commands(), vec![KeyCommand::Quit]);
    }

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(key_command(KeyCode::Esc), Some(KeyCommand::Quit));
        assert_eq!(key_command(KeyCode::Left), Some(KeyCommand::Nudge(-NUDGE_X, 0)));
        assert_eq!(key_command(KeyCode::Char('w')), Some(KeyCommand::Gesture(GestureKind::Wave)));
        assert_eq!(key_command(KeyCode::Char('z')), None);
    }

    #[test]
    fn nudge_targets_observed_actor_and_clamps() {
        let text = "map = \"\"\"\n..............\n..............\n..............\n\"\"\"\nspawns = [[0, 0]]\n[tiles.\".\"]\nglyph = \".\"\nwalkable = true\n";
        let mut w = WorldState::new(parse_world(text).unwrap(), AppConfig::default(), 1);
        assert_eq!(key_directive(KeyCommand::Stop, &w), None);
        let id = w.join("ada", 1);
        assert_eq!(
            key_directive(KeyCommand::Nudge(-NUDGE_X, 0), &w),
            Some(Directive::MoveTo { actor: id, x: 0, y: 2 })
        );
        assert_eq!(
            key_directive(KeyCommand::Nudge(0, NUDGE_Y), &w),
            Some(Directive::MoveTo { actor: id, x: 0, y: 2 })
        );
        assert_eq!(key_directive(KeyCommand::Leave, &w), Some(Directive::Leave { actor: id }));
    }
}
