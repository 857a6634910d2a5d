/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory, the CWD, or
/// `~/.local/share/tiletown` (first hit wins).
/// Falls back to defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::PathBuf;

// ── Public Config Structs ──

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub speed: SpeedConfig,
    pub doors: DoorConfig,
    pub behavior: BehaviorConfig,
    pub paths: PathConfig,
    pub render: RenderConfig,
    pub world_file: Option<PathBuf>,
    pub npc_count: usize,
    pub seed: Option<u64>,
    pub log_file: Option<PathBuf>,
    pub snapshot_file: Option<PathBuf>,
    pub snapshot_interval: u64,
}

#[derive(Clone, Debug)]
pub struct SpeedConfig {
    pub tick_rate_ms: u64,
    /// Behavior runs every Nth tick; keeps walking speed independent of frame rate.
    pub behavior_interval: u64,
}

#[derive(Clone, Debug)]
pub struct DoorConfig {
    pub proximity_radius: u32,
    pub animate_interval: u32,
    pub close_delay: u32,
}

/// Behavior tunables. Counts are in behavior ticks.
#[derive(Clone, Debug)]
pub struct BehaviorConfig {
    pub idle_min: u32,
    pub idle_max: u32,
    pub target_tries: u32,
    pub max_failures: u32,
    pub backoff_multiplier: u32,
    pub stuck_wait: u32,
    pub stuck_give_up: u32,
    pub wait_chance_pct: u32,
    pub wait_min: u32,
    pub wait_max: u32,
}

#[derive(Clone, Debug)]
pub struct PathConfig {
    pub room_node_budget: usize,
    pub agent_node_budget: usize,
    pub room_padding: i32,
    pub goal_search_radius: i32,
}

#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub scale: usize,
    pub wind: f32,
    pub walk_mark_ticks: u64,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    doors: TomlDoors,
    #[serde(default)]
    behavior: TomlBehavior,
    #[serde(default)]
    pathfinding: TomlPaths,
    #[serde(default)]
    render: TomlRender,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_behavior_interval")]
    behavior_interval: u64,
}

#[derive(Deserialize, Debug)]
struct TomlDoors {
    #[serde(default = "default_proximity")]
    proximity_radius: u32,
    #[serde(default = "default_animate_interval")]
    animate_interval: u32,
    #[serde(default = "default_close_delay")]
    close_delay: u32,
}

#[derive(Deserialize, Debug)]
struct TomlBehavior {
    #[serde(default = "default_idle_min")]
    idle_min: u32,
    #[serde(default = "default_idle_max")]
    idle_max: u32,
    #[serde(default = "default_target_tries")]
    target_tries: u32,
    #[serde(default = "default_max_failures")]
    max_failures: u32,
    #[serde(default = "default_backoff")]
    backoff_multiplier: u32,
    #[serde(default = "default_stuck_wait")]
    stuck_wait: u32,
    #[serde(default = "default_stuck_give_up")]
    stuck_give_up: u32,
    #[serde(default = "default_wait_chance")]
    wait_chance_pct: u32,
    #[serde(default = "default_wait_min")]
    wait_min: u32,
    #[serde(default = "default_wait_max")]
    wait_max: u32,
}

#[derive(Deserialize, Debug)]
struct TomlPaths {
    #[serde(default = "default_room_budget")]
    room_node_budget: usize,
    #[serde(default = "default_agent_budget")]
    agent_node_budget: usize,
    #[serde(default = "default_room_padding")]
    room_padding: i32,
    #[serde(default = "default_goal_radius")]
    goal_search_radius: i32,
}

#[derive(Deserialize, Debug)]
struct TomlRender {
    #[serde(default = "default_scale")]
    scale: usize,
    #[serde(default = "default_wind")]
    wind: f32,
    #[serde(default = "default_walk_mark")]
    walk_mark_ticks: u64,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default)]
    world_file: Option<String>,
    #[serde(default = "default_npc_count")]
    npc_count: usize,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    log_file: Option<String>,
    #[serde(default)]
    snapshot_file: Option<String>,
    #[serde(default = "default_snapshot_interval")]
    snapshot_interval: u64,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 16 }          // ~60 steps/s
fn default_behavior_interval() -> u64 { 3 }   // ~20 tiles/s walking
fn default_proximity() -> u32 { 8 }
fn default_animate_interval() -> u32 { 4 }
fn default_close_delay() -> u32 { 30 }
fn default_idle_min() -> u32 { 20 }
fn default_idle_max() -> u32 { 90 }
fn default_target_tries() -> u32 { 15 }
fn default_max_failures() -> u32 { 3 }
fn default_backoff() -> u32 { 4 }
fn default_stuck_wait() -> u32 { 6 }
fn default_stuck_give_up() -> u32 { 20 }
fn default_wait_chance() -> u32 { 2 }
fn default_wait_min() -> u32 { 8 }
fn default_wait_max() -> u32 { 30 }
fn default_room_budget() -> usize { 2000 }
fn default_agent_budget() -> usize { 20_000 }
fn default_room_padding() -> i32 { 8 }
fn default_goal_radius() -> i32 { 5 }
fn default_scale() -> usize { 1 }
fn default_wind() -> f32 { 0.6 }
fn default_walk_mark() -> u64 { 240 }         // ~4s at 60 steps/s
fn default_npc_count() -> usize { 6 }
fn default_snapshot_interval() -> u64 { 60 }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed {
            tick_rate_ms: default_tick_rate(),
            behavior_interval: default_behavior_interval(),
        }
    }
}

impl Default for TomlDoors {
    fn default() -> Self {
        TomlDoors {
            proximity_radius: default_proximity(),
            animate_interval: default_animate_interval(),
            close_delay: default_close_delay(),
        }
    }
}

impl Default for TomlBehavior {
    fn default() -> Self {
        TomlBehavior {
            idle_min: default_idle_min(),
            idle_max: default_idle_max(),
            target_tries: default_target_tries(),
            max_failures: default_max_failures(),
            backoff_multiplier: default_backoff(),
            stuck_wait: default_stuck_wait(),
            stuck_give_up: default_stuck_give_up(),
            wait_chance_pct: default_wait_chance(),
            wait_min: default_wait_min(),
            wait_max: default_wait_max(),
        }
    }
}

impl Default for TomlPaths {
    fn default() -> Self {
        TomlPaths {
            room_node_budget: default_room_budget(),
            agent_node_budget: default_agent_budget(),
            room_padding: default_room_padding(),
            goal_search_radius: default_goal_radius(),
        }
    }
}

impl Default for TomlRender {
    fn default() -> Self {
        TomlRender {
            scale: default_scale(),
            wind: default_wind(),
            walk_mark_ticks: default_walk_mark(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            world_file: None,
            npc_count: default_npc_count(),
            seed: None,
            log_file: None,
            snapshot_file: None,
            snapshot_interval: default_snapshot_interval(),
        }
    }
}

// ── Loading ──

impl AppConfig {
    /// Load config from `config.toml`.
    /// Missing file or missing keys gracefully fall back to defaults.
    /// Problems found along the way come back as warnings, since logging
    /// is not set up until the config says where it goes.
    pub fn load() -> (Self, Vec<String>) {
        let search_dirs = candidate_dirs();
        let (toml_cfg, warnings) = load_toml(&search_dirs);
        (Self::from_toml(toml_cfg, &search_dirs), warnings)
    }

    /// Parse config text directly (no file search); relative paths stay relative.
    pub fn from_str(text: &str) -> Result<Self, toml::de::Error> {
        let toml_cfg = toml::from_str::<TomlConfig>(text)?;
        Ok(Self::from_toml(toml_cfg, &[]))
    }

    fn from_toml(t: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let b = t.behavior;
        AppConfig {
            speed: SpeedConfig {
                tick_rate_ms: t.speed.tick_rate_ms.max(1),
                behavior_interval: t.speed.behavior_interval.max(1),
            },
            doors: DoorConfig {
                proximity_radius: t.doors.proximity_radius,
                animate_interval: t.doors.animate_interval.max(1),
                close_delay: t.doors.close_delay,
            },
            behavior: BehaviorConfig {
                idle_min: b.idle_min,
                idle_max: b.idle_max.max(b.idle_min),
                target_tries: b.target_tries.max(1),
                max_failures: b.max_failures.max(1),
                backoff_multiplier: b.backoff_multiplier.max(1),
                stuck_wait: b.stuck_wait,
                stuck_give_up: b.stuck_give_up.max(b.stuck_wait),
                wait_chance_pct: b.wait_chance_pct.min(100),
                wait_min: b.wait_min,
                wait_max: b.wait_max.max(b.wait_min),
            },
            paths: PathConfig {
                room_node_budget: t.pathfinding.room_node_budget,
                agent_node_budget: t.pathfinding.agent_node_budget,
                room_padding: t.pathfinding.room_padding,
                goal_search_radius: t.pathfinding.goal_search_radius,
            },
            render: RenderConfig {
                scale: t.render.scale.clamp(1, 2),
                wind: t.render.wind.clamp(0.0, 1.0),
                walk_mark_ticks: t.render.walk_mark_ticks,
            },
            world_file: t.general.world_file.map(|p| resolve_path(&p, search_dirs)),
            npc_count: t.general.npc_count,
            seed: t.general.seed,
            log_file: t.general.log_file.map(PathBuf::from),
            snapshot_file: t.general.snapshot_file.map(PathBuf::from),
            snapshot_interval: t.general.snapshot_interval.max(1),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), &[])
    }
}

/// Absolute paths pass through; relative ones resolve against the first
/// candidate dir where they exist, else stay relative to the CWD.
fn resolve_path(raw: &str, search_dirs: &[PathBuf]) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return path;
    }
    search_dirs
        .iter()
        .map(|d| d.join(raw))
        .find(|p| p.exists())
        .unwrap_or(path)
}

/// Candidate directories to search: exe dir + CWD + XDG data home (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/tiletown");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> (TomlConfig, Vec<String>) {
    let mut warnings = Vec::new();
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return (cfg, warnings),
                    Err(e) => {
                        warnings.push(format!(
                            "{}: parse error, using defaults: {e}",
                            path.display()
                        ));
                        return (TomlConfig::default(), warnings);
                    }
                },
                Err(e) => {
                    warnings.push(format!("{}: could not read config: {e}", path.display()));
                }
            }
        }
    }
    (TomlConfig::default(), warnings)
}
