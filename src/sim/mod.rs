pub mod directive;
pub mod event;
pub mod level;
pub mod snapshot;
pub mod step;
pub mod world;
