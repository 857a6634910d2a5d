/// Read-only world snapshot for external observers.
///
/// Written as JSON every `snapshot_interval` ticks. Only the most recent
/// snapshot exists on disk; each write goes to `<file>.tmp` first and is
/// then renamed over the target, so readers never see a torn file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::coord::Rect;
use crate::domain::door::Orientation;
use crate::domain::entity::ActorId;
use crate::domain::rooms::{Building, BuildingDoor, WallMaterial};
use crate::sim::world::WorldState;

#[derive(Clone, Debug, Serialize)]
pub struct WorldSnapshot {
    pub world: String,
    pub tick: u64,
    pub actors: Vec<ActorSummary>,
    pub buildings: Vec<BuildingSummary>,
    pub doors: Vec<DoorSummary>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ActorSummary {
    pub id: ActorId,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub idle: bool,
    pub seed: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct BuildingSummary {
    pub id: usize,
    pub wall: WallMaterial,
    pub bounds: Rect,
    pub center: (i32, i32),
    pub floor_tiles: usize,
    pub doors: Vec<BuildingDoor>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DoorSummary {
    pub x: usize,
    pub y: usize,
    pub orientation: Orientation,
    pub length: usize,
    pub open_amount: u32,
}

impl From<&Building> for BuildingSummary {
    fn from(b: &Building) -> Self {
        BuildingSummary {
            id: b.id,
            wall: b.wall,
            bounds: b.bounds,
            center: b.center,
            floor_tiles: b.floor_tiles,
            doors: b.doors.clone(),
        }
    }
}

pub fn capture_snapshot(w: &WorldState) -> WorldSnapshot {
    WorldSnapshot {
        world: w.name.clone(),
        tick: w.tick,
        actors: w
            .agents
            .iter()
            .map(|a| ActorSummary {
                id: a.actor.id,
                name: a.actor.name.clone(),
                x: a.actor.x,
                y: a.actor.y,
                idle: a.behavior.is_idle(),
                seed: a.actor.seed,
            })
            .collect(),
        buildings: w.buildings.iter().map(BuildingSummary::from).collect(),
        doors: w
            .doors
            .doors
            .iter()
            .zip(&w.doors.states)
            .map(|(d, s)| DoorSummary {
                x: d.x,
                y: d.y,
                orientation: d.orientation,
                length: d.length,
                open_amount: s.open_amount,
            })
            .collect(),
    }
}

/// Serialize and atomically replace `path`.
pub fn write_snapshot(path: &Path, snap: &WorldSnapshot) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(snap).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    write_bytes_atomic(path, &bytes)
}

fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, bytes)?;
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("snapshot.json");
    let tmp_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}
