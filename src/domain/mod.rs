pub mod behavior;
pub mod camera;
pub mod cell;
pub mod coord;
pub mod door;
pub mod entity;
pub mod overlay;
pub mod pathfind;
pub mod rooms;
pub mod tile;
pub mod tile_world;
pub mod walkgrid;
