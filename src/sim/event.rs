/// Events emitted during a simulation step.
/// The loop logs these; nothing in the core depends on them.

use crate::domain::entity::ActorId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimEvent {
    ActorJoined { id: ActorId, name: String },
    ActorLeft { id: ActorId },
    ActorArrived { id: ActorId, x: i32, y: i32 },
    ActorGaveUp { id: ActorId, x: i32, y: i32 },
    ActorBackedOff { id: ActorId },
    DoorOpened { door: usize },
    DoorClosed { door: usize },
}
