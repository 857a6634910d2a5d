pub mod input;
pub mod output;
pub mod renderer;
pub mod sprite;
