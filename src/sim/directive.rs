/// Actor directives from external controllers.
///
/// One JSON object per directive, tagged by `"type"`:
///   {"type":"move_to","actor":1,"x":40,"y":12}
///   {"type":"gesture","actor":1,"kind":"wave"}
///   {"type":"stop","actor":1}
///   {"type":"join","name":"Quill","seed":77}
///   {"type":"leave","actor":1}
///
/// `move_to` coordinates are walk-grid coordinates: sprite column and
/// foot row. Each directive maps to one state transition applied between
/// ticks; directives naming unknown actors are dropped with a warning.

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::domain::entity::{ActorId, GestureKind};
use crate::sim::event::SimEvent;
use crate::sim::world::WorldState;

const KINDS: [&str; 5] = ["move_to", "gesture", "stop", "join", "leave"];

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum Directive {
    MoveTo { actor: ActorId, x: i32, y: i32 },
    Gesture { actor: ActorId, kind: GestureKind },
    Stop { actor: ActorId },
    Join { name: String, seed: u64 },
    Leave { actor: ActorId },
}

#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error("malformed directive: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("directive has no \"type\" tag")]
    MissingType,
    #[error("unknown directive type {0:?}")]
    UnknownKind(String),
}

impl Directive {
    /// Decode one JSON line.
    pub fn parse(line: &str) -> Result<Directive, DirectiveError> {
        let value: serde_json::Value = serde_json::from_str(line)?;
        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(DirectiveError::MissingType)?;
        if !KINDS.contains(&kind) {
            return Err(DirectiveError::UnknownKind(kind.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Apply a directive to the world. Returns the resulting event, if any.
pub fn apply(world: &mut WorldState, directive: Directive) -> Option<SimEvent> {
    match directive {
        Directive::MoveTo { actor, x, y } => {
            if world.agent(actor).is_none() {
                warn!(actor, "move_to for unknown actor");
                return None;
            }
            if !world.move_actor(actor, x, y) {
                warn!(actor, x, y, "move_to target unreachable");
            }
            None
        }
        Directive::Gesture { actor, kind } => {
            match world.agent_mut(actor) {
                Some(agent) => agent.actor.toggle_gesture(kind),
                None => warn!(actor, "gesture for unknown actor"),
            }
            None
        }
        Directive::Stop { actor } => {
            let cfg = world.cfg.behavior.clone();
            match world.agent_mut(actor) {
                Some(agent) => agent.behavior.stop(&cfg),
                None => warn!(actor, "stop for unknown actor"),
            }
            None
        }
        Directive::Join { name, seed } => {
            let id = world.join(&name, seed);
            Some(SimEvent::ActorJoined { id, name })
        }
        Directive::Leave { actor } => {
            if world.leave(actor) {
                Some(SimEvent::ActorLeft { id: actor })
            } else {
                warn!(actor, "leave for unknown actor");
                None
            }
        }
    }
}
