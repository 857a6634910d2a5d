/// Entry point and simulation loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossterm::terminal;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use sim::directive::{self, Directive};
use sim::event::SimEvent;
use sim::level::load_world;
use sim::snapshot::{capture_snapshot, write_snapshot};
use sim::step;
use sim::world::WorldState;
use ui::input::{key_directive, DirectiveFeed, InputState, KeyCommand};
use ui::output::FrameSink;
use ui::renderer::Renderer;

const FRAME_SLEEP: Duration = Duration::from_millis(2);
const LOG_ENV: &str = "TILETOWN_LOG";

fn main() {
    let (config, warnings) = AppConfig::load();
    init_tracing(config.log_file.as_deref());
    for w in &warnings {
        eprintln!("Warning: {w}");
        warn!("{w}");
    }

    let def = match load_world(config.world_file.as_deref()) {
        Ok(def) => def,
        Err(e) => {
            eprintln!("World load failed: {e}");
            std::process::exit(1);
        }
    };

    let seed = config.seed.unwrap_or_else(clock_seed);
    let mut world = WorldState::new(def, config.clone(), seed);
    info!(
        world = %world.name,
        width = world.tiles.width,
        height = world.tiles.height,
        buildings = world.buildings.len(),
        doors = world.doors.doors.len(),
        seed,
        "world loaded"
    );
    world.populate(config.npc_count);

    let mut renderer = Renderer::new();
    let enhanced = match renderer.init() {
        Ok(enhanced) => enhanced,
        Err(e) => {
            let _ = renderer.cleanup();
            eprintln!("Terminal init failed: {e}");
            return;
        }
    };

    let result = run(&mut world, &mut renderer, enhanced, &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    println!("Left {} after {} ticks.", world.name, world.tick);
}

fn run(
    world: &mut WorldState,
    renderer: &mut Renderer,
    enhanced: bool,
    config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut sink = FrameSink::spawn(io::stdout())?;
    let result = sim_loop(world, renderer, &mut sink, enhanced, config);
    let finished = sink.finish();
    result?;
    finished?;
    Ok(())
}

fn sim_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    sink: &mut FrameSink,
    enhanced: bool,
    config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    kb.honor_release = enhanced;
    let mut feed = DirectiveFeed::from_stdin();
    let tick_rate = Duration::from_millis(config.speed.tick_rate_ms);
    let mut last_tick = Instant::now();

    loop {
        kb.drain_events();
        for cmd in kb.commands() {
            match cmd {
                KeyCommand::Quit => return Ok(()),
                KeyCommand::ObserveNext => world.observe_next(),
                other => {
                    if let Some(d) = key_directive(other, world) {
                        apply_directive(world, d);
                    }
                }
            }
        }
        if let Some(feed) = feed.as_mut() {
            for d in feed.drain() {
                apply_directive(world, d);
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();

            for ev in step::step(world) {
                log_event(&ev);
            }

            if let Some(path) = &config.snapshot_file {
                if world.tick % config.snapshot_interval == 0 {
                    save_snapshot(world, path);
                }
            }

            // No buffer means the writer is still busy: skip this frame.
            if let Some(mut frame) = sink.try_acquire() {
                let (cols, rows) = terminal::size().unwrap_or((80, 24));
                renderer.render(world, cols as usize, rows as usize, &mut frame)?;
                sink.submit(frame)?;
            }
        }

        thread::sleep(FRAME_SLEEP);
    }
}

fn apply_directive(world: &mut WorldState, d: Directive) {
    debug!(?d, "directive");
    if let Some(ev) = directive::apply(world, d) {
        log_event(&ev);
    }
}

fn save_snapshot(world: &WorldState, path: &Path) {
    if let Err(e) = write_snapshot(path, &capture_snapshot(world)) {
        warn!(path = %path.display(), "snapshot write failed: {e}");
    }
}

fn log_event(ev: &SimEvent) {
    match ev {
        SimEvent::ActorJoined { id, name } => info!(actor = id, %name, "actor joined"),
        SimEvent::ActorLeft { id } => info!(actor = id, "actor left"),
        SimEvent::ActorArrived { id, x, y } => debug!(actor = id, x, y, "actor arrived"),
        SimEvent::ActorGaveUp { id, x, y } => debug!(actor = id, x, y, "actor gave up"),
        SimEvent::ActorBackedOff { id } => debug!(actor = id, "actor backed off"),
        SimEvent::DoorOpened { door } => info!(door, "door opened"),
        SimEvent::DoorClosed { door } => info!(door, "door closed"),
    }
}

/// Log to `path` when configured. The terminal belongs to the renderer, so
/// without a log file no subscriber is installed.
fn init_tracing(path: Option<&Path>) {
    let Some(path) = path else { return };
    let file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Could not open log file {}: {e}", path.display());
            return;
        }
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5EED)
}
