//! Scene objects
//!
//! Drawable objects with a transform, a color and an optional shared mesh. Objects live
//! in a generational arena; their identity is the arena key, never a position in a
//! vector, and they are visited in the order they were created.

mod game_object;

pub use game_object::{GameObject, GameObjectId, GameObjectStore, TransformComponent};
