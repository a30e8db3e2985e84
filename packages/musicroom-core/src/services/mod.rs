//! Application services layer.
//!
//! Services sit between the API layer and the room actors: the registry owns
//! room handles, the checkpoint store records timer liveness.

pub mod checkpoint_store;
pub mod room_registry;

pub use checkpoint_store::CheckpointStore;
pub use room_registry::{RoomRegistry, RoomSummary};
