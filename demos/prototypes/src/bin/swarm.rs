//! Swarm prototype: an emitter sprays particles that fall, age and expire.
//!
//! The emitter spawns particles from inside its own update hook and the
//! particles destroy themselves from theirs, so every structural change
//! goes through the registry's pending queues. Each particle re-sorts
//! itself by height every frame.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use clap::Parser;
use glam::Vec2;
use tracing::{debug, info, warn};

use engine_runtime::{Behaviour, FrameDriver, HookContext, Registry};
use prototypes::{Canvas, LoopArgs, SeededRandom};

const WORLD: Vec2 = Vec2::new(80.0, 24.0);
/// Screen space: y grows downward.
const GRAVITY: Vec2 = Vec2::new(0.0, 9.0);

#[derive(Parser)]
#[command(name = "swarm", about = "Particle swarm driven by the entity runtime")]
struct Args {
    #[command(flatten)]
    run: LoopArgs,

    /// Particles emitted per frame
    #[arg(short = 'n', long, default_value_t = 3)]
    per_frame: u32,

    /// Frames the emitter keeps emitting before it destroys itself
    #[arg(long, default_value_t = 180)]
    emit_frames: u32,

    /// RNG seed
    #[arg(long, default_value_t = 0x5eed)]
    seed: u32,
}

#[derive(Debug, Default)]
struct Stats {
    emitted: u64,
    expired: u64,
    purged: u64,
}

type Shared<T> = Rc<RefCell<T>>;

fn set_depth(ctx: &mut HookContext<'_>, depth: f64) {
    if let Err(err) = ctx.set_depth(depth) {
        warn!(entity = %ctx.entity(), %err, "depth rejected");
    }
}

struct Emitter {
    origin: Vec2,
    per_frame: u32,
    remaining: u32,
    rng: SeededRandom,
    stats: Shared<Stats>,
    canvas: Shared<Canvas>,
}

impl Emitter {
    fn emit(&mut self, ctx: &mut HookContext<'_>) {
        let velocity = self.rng.unit() * self.rng.range(4.0, 14.0) - Vec2::new(0.0, 8.0);
        let particle = Particle {
            pos: self.origin,
            velocity,
            age: 0.0,
            lifetime: self.rng.range(1.5, 4.0),
            stats: Rc::clone(&self.stats),
            canvas: Rc::clone(&self.canvas),
        };
        let id = ctx.spawn(particle);

        let stats = Rc::clone(&self.stats);
        if let Err(err) = ctx
            .registry_mut()
            .add_destroy_trigger(id, move |_, _| stats.borrow_mut().expired += 1)
        {
            warn!(particle = %id, %err, "failed to attach expiry trigger");
        }
        self.stats.borrow_mut().emitted += 1;
    }
}

impl Behaviour for Emitter {
    fn start(&mut self, ctx: &mut HookContext<'_>) {
        // Behind every particle.
        set_depth(ctx, f64::from(WORLD.y) + 1.0);
        info!(emitter = %ctx.entity(), frames = self.remaining, "emitter started");
    }

    fn update(&mut self, ctx: &mut HookContext<'_>) {
        if self.remaining == 0 {
            ctx.destroy_self();
            return;
        }
        self.remaining -= 1;
        for _ in 0..self.per_frame {
            self.emit(ctx);
        }
    }

    fn render(&mut self, _ctx: &mut HookContext<'_>) {
        self.canvas.borrow_mut().plot(self.origin, '@');
    }
}

struct Particle {
    pos: Vec2,
    velocity: Vec2,
    age: f32,
    lifetime: f32,
    stats: Shared<Stats>,
    canvas: Shared<Canvas>,
}

impl Behaviour for Particle {
    fn update(&mut self, ctx: &mut HookContext<'_>) {
        let dt = ctx.dt() as f32;
        self.velocity += GRAVITY * dt;
        self.pos += self.velocity * dt;
        self.age += dt;

        let inside = self.pos.cmpge(Vec2::ZERO).all() && self.pos.cmplt(WORLD).all();
        if self.age >= self.lifetime || !inside {
            ctx.destroy_self();
            return;
        }
        // Lower on screen renders later, on top.
        set_depth(ctx, f64::from(WORLD.y - self.pos.y));
    }

    fn render(&mut self, _ctx: &mut HookContext<'_>) {
        let glyph = match self.age / self.lifetime {
            f if f < 0.33 => '*',
            f if f < 0.66 => '+',
            _ => '.',
        };
        self.canvas.borrow_mut().plot(self.pos, glyph);
    }

    fn on_remove(&mut self, _ctx: &mut HookContext<'_>) {
        self.stats.borrow_mut().purged += 1;
    }
}

fn main() -> Result<()> {
    prototypes::init_tracing("swarm")?;

    let args = Args::parse();
    let config = args.run.frame_config()?;

    let stats: Shared<Stats> = Rc::default();
    let canvas = Rc::new(RefCell::new(Canvas::new(80, 24, WORLD)));

    let mut registry = Registry::new();
    let emitter = registry.spawn(Emitter {
        origin: Vec2::new(WORLD.x / 2.0, 4.0),
        per_frame: args.per_frame,
        remaining: args.emit_frames,
        rng: SeededRandom::new(args.seed),
        stats: Rc::clone(&stats),
        canvas: Rc::clone(&canvas),
    });
    registry.add_destroy_trigger(emitter, |registry, emitter| {
        info!(%emitter, live = registry.len(), "emitter exhausted");
    })?;

    info!(
        registry = %registry.instance_id(),
        frame_rate = config.frame_rate,
        max_frames = config.max_frames,
        per_frame = args.per_frame,
        "swarm starting"
    );

    let mut driver = FrameDriver::new(config, registry);
    let frame_canvas = Rc::clone(&canvas);
    let mut frame = 0u64;
    let frames = driver.run_with(move |registry| {
        frame += 1;
        if frame % 60 == 0 {
            let (adding, removing) = registry.pending_counts();
            debug!(frame, live = registry.len(), adding, removing, "swarm status");
        }
        frame_canvas.borrow_mut().clear();
    })?;

    let stats = stats.borrow();
    info!(
        frames,
        emitted = stats.emitted,
        expired = stats.expired,
        purged = stats.purged,
        live = driver.registry().len(),
        "swarm finished"
    );
    for line in canvas.borrow().lines() {
        println!("{line}");
    }
    Ok(())
}
