//! Colony prototype: ants forage food around a nest.
//!
//! Ants find food through a spatial grid rebuilt between post-update and
//! render. Two ants may reach the same food in one frame; only the one
//! whose `destroy` call lands first carries it home. Delivered food buys
//! new ants, and the colony collapses once every ant has starved.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use clap::Parser;
use glam::Vec2;
use tracing::{debug, info, warn};

use engine_runtime::{Behaviour, EntityId, FrameDriver, HookContext, Registry};
use prototypes::{Canvas, LoopArgs, SeededRandom, SpatialGrid};

const WORLD: Vec2 = Vec2::new(80.0, 24.0);
const ANT_SPEED: f32 = 10.0;
/// Seconds an ant survives without delivering food.
const ANT_ENERGY: f32 = 12.0;
const ANT_COST: u32 = 3;
const SENSE_RADIUS: f32 = 8.0;
const BITE_RADIUS: f32 = 1.0;
const NEST_RADIUS: f32 = 1.5;
const REGROW_FRAMES: u64 = 20;

// Higher depth renders first; lower lands on top.
const NEST_DEPTH: f64 = 3.0;
const FOOD_DEPTH: f64 = 2.0;
const FORAGING_DEPTH: f64 = 1.0;
const CARRYING_DEPTH: f64 = 0.0;

#[derive(Parser)]
#[command(name = "colony", about = "Ant colony driven by the entity runtime")]
struct Args {
    #[command(flatten)]
    run: LoopArgs,

    /// Ants hatched when the nest starts
    #[arg(short = 'n', long, default_value_t = 12)]
    ants: u32,

    /// Food sources the nest keeps in the world
    #[arg(long, default_value_t = 8)]
    food: usize,

    /// RNG seed
    #[arg(long, default_value_t = 0xa17)]
    seed: u32,
}

#[derive(Debug, Default)]
struct Stats {
    hatched: u64,
    died: u64,
    planted: u64,
    eaten: u64,
    delivered: u64,
}

type Shared<T> = Rc<RefCell<T>>;

fn set_depth(ctx: &mut HookContext<'_>, depth: f64) {
    if let Err(err) = ctx.set_depth(depth) {
        warn!(entity = %ctx.entity(), %err, "depth rejected");
    }
}

struct Nest {
    pos: Vec2,
    initial_ants: u32,
    food_target: usize,
    stored: u32,
    rng: SeededRandom,
    stats: Shared<Stats>,
    grid: Shared<SpatialGrid>,
    canvas: Shared<Canvas>,
}

impl Nest {
    fn hatch(&mut self, ctx: &mut HookContext<'_>) {
        let ant = Ant {
            pos: self.pos,
            heading: self.rng.unit(),
            carrying: false,
            energy: ANT_ENERGY,
            nest: ctx.entity(),
            nest_pos: self.pos,
            rng: SeededRandom::new(self.rng.next_u32()),
            stats: Rc::clone(&self.stats),
            grid: Rc::clone(&self.grid),
            canvas: Rc::clone(&self.canvas),
        };
        let id = ctx.spawn(ant);

        let stats = Rc::clone(&self.stats);
        if let Err(err) = ctx
            .registry_mut()
            .add_destroy_trigger(id, move |_, _| stats.borrow_mut().died += 1)
        {
            warn!(ant = %id, %err, "failed to attach death trigger");
        }
        self.stats.borrow_mut().hatched += 1;
    }

    fn plant(&mut self, ctx: &mut HookContext<'_>) {
        let food = Food {
            pos: self.rng.point_in(WORLD),
            nest: ctx.entity(),
            canvas: Rc::clone(&self.canvas),
        };
        ctx.spawn(food);
        self.stats.borrow_mut().planted += 1;
    }
}

impl Behaviour for Nest {
    fn start(&mut self, ctx: &mut HookContext<'_>) {
        set_depth(ctx, NEST_DEPTH);
        for _ in 0..self.initial_ants {
            self.hatch(ctx);
        }
        for _ in 0..self.food_target {
            self.plant(ctx);
        }
        info!(
            nest = %ctx.entity(),
            ants = self.initial_ants,
            food = self.food_target,
            "nest founded"
        );
    }

    fn update(&mut self, ctx: &mut HookContext<'_>) {
        while self.stored >= ANT_COST {
            self.stored -= ANT_COST;
            self.hatch(ctx);
        }

        let alive = {
            let stats = self.stats.borrow();
            stats.hatched - stats.died
        };
        if alive == 0 {
            info!(nest = %ctx.entity(), frame = ctx.frame().id, "colony collapsed");
            ctx.destroy_self();
            return;
        }

        let regrow = ctx.frame().id % REGROW_FRAMES == 0;
        if regrow && ctx.registry().count_of::<Food>() < self.food_target {
            self.plant(ctx);
        }
    }

    fn render(&mut self, _ctx: &mut HookContext<'_>) {
        self.canvas.borrow_mut().plot(self.pos, '#');
    }
}

struct Food {
    pos: Vec2,
    nest: EntityId,
    canvas: Shared<Canvas>,
}

impl Behaviour for Food {
    fn start(&mut self, ctx: &mut HookContext<'_>) {
        set_depth(ctx, FOOD_DEPTH);
    }

    fn update(&mut self, ctx: &mut HookContext<'_>) {
        // Rots once the nest is gone.
        if ctx.registry().is_destroyed(self.nest) {
            ctx.destroy_self();
        }
    }

    fn render(&mut self, _ctx: &mut HookContext<'_>) {
        self.canvas.borrow_mut().plot(self.pos, '%');
    }
}

struct Ant {
    pos: Vec2,
    heading: Vec2,
    carrying: bool,
    energy: f32,
    nest: EntityId,
    nest_pos: Vec2,
    rng: SeededRandom,
    stats: Shared<Stats>,
    grid: Shared<SpatialGrid>,
    canvas: Shared<Canvas>,
}

impl Ant {
    fn forage(&mut self, ctx: &mut HookContext<'_>) {
        let nearest = self.grid.borrow().nearest(self.pos, SENSE_RADIUS);
        match nearest {
            Some((food, at)) if self.pos.distance(at) <= BITE_RADIUS => {
                // False if another ant claimed it earlier this frame.
                if ctx.registry_mut().destroy(food) {
                    self.carrying = true;
                    self.stats.borrow_mut().eaten += 1;
                    set_depth(ctx, CARRYING_DEPTH);
                }
            }
            Some((_, at)) => {
                let toward = (at - self.pos).normalize_or_zero();
                if toward != Vec2::ZERO {
                    self.heading = toward;
                }
            }
            None => {
                let turn = Vec2::from_angle(self.rng.range(-0.4, 0.4));
                self.heading = turn.rotate(self.heading);
            }
        }
    }

    fn deliver(&mut self, ctx: &mut HookContext<'_>) {
        match ctx.registry_mut().get_mut::<Nest>(self.nest) {
            Some(nest) => nest.stored += 1,
            None => {
                ctx.destroy_self();
                return;
            }
        }
        self.carrying = false;
        self.energy = ANT_ENERGY;
        self.heading = self.rng.unit();
        self.stats.borrow_mut().delivered += 1;
        set_depth(ctx, FORAGING_DEPTH);
    }
}

impl Behaviour for Ant {
    fn start(&mut self, ctx: &mut HookContext<'_>) {
        set_depth(ctx, FORAGING_DEPTH);
    }

    fn update(&mut self, ctx: &mut HookContext<'_>) {
        let dt = ctx.dt() as f32;
        self.energy -= dt;
        if self.energy <= 0.0 || ctx.registry().is_destroyed(self.nest) {
            ctx.destroy_self();
            return;
        }

        if self.carrying {
            if self.pos.distance(self.nest_pos) <= NEST_RADIUS {
                self.deliver(ctx);
            } else {
                self.heading = (self.nest_pos - self.pos).normalize_or_zero();
            }
        } else {
            self.forage(ctx);
        }

        let next = self.pos + self.heading * ANT_SPEED * dt;
        let bounded = next.clamp(Vec2::ZERO, WORLD - Vec2::splat(0.01));
        if bounded != next {
            self.heading = -self.heading;
        }
        self.pos = bounded;
    }

    fn render(&mut self, _ctx: &mut HookContext<'_>) {
        let glyph = if self.carrying { 'A' } else { 'a' };
        self.canvas.borrow_mut().plot(self.pos, glyph);
    }
}

fn main() -> Result<()> {
    prototypes::init_tracing("colony")?;

    let args = Args::parse();
    let config = args.run.frame_config()?;

    let stats: Shared<Stats> = Rc::default();
    let grid = Rc::new(RefCell::new(SpatialGrid::new(SENSE_RADIUS)));
    let canvas = Rc::new(RefCell::new(Canvas::new(80, 24, WORLD)));

    let mut registry = Registry::new();
    let nest = registry.spawn(Nest {
        pos: WORLD / 2.0,
        initial_ants: args.ants,
        food_target: args.food,
        stored: 0,
        rng: SeededRandom::new(args.seed),
        stats: Rc::clone(&stats),
        grid: Rc::clone(&grid),
        canvas: Rc::clone(&canvas),
    });
    let summary = Rc::clone(&stats);
    registry.add_destroy_trigger(nest, move |registry, nest| {
        let stats = summary.borrow();
        info!(%nest, delivered = stats.delivered, live = registry.len(), "nest destroyed");
    })?;

    info!(
        registry = %registry.instance_id(),
        frame_rate = config.frame_rate,
        max_frames = config.max_frames,
        ants = args.ants,
        food = args.food,
        "colony starting"
    );

    let mut driver = FrameDriver::new(config, registry);
    let (frame_grid, frame_canvas) = (Rc::clone(&grid), Rc::clone(&canvas));
    let mut frame = 0u64;
    let frames = driver.run_with(move |registry| {
        frame += 1;
        // Positions are final here; update hooks of the next frame query this.
        frame_grid.borrow_mut().rebuild(
            registry
                .entities_of::<Food>()
                .filter(|&id| !registry.is_destroyed(id))
                .filter_map(|id| registry.get::<Food>(id).map(|food| (id, food.pos))),
        );
        if frame % 60 == 0 {
            debug!(
                frame,
                live = registry.len(),
                ants = registry.count_of::<Ant>(),
                food = frame_grid.borrow().len(),
                "colony status"
            );
        }
        frame_canvas.borrow_mut().clear();
    })?;

    let stats = stats.borrow();
    info!(
        frames,
        hatched = stats.hatched,
        died = stats.died,
        planted = stats.planted,
        eaten = stats.eaten,
        delivered = stats.delivered,
        live = driver.registry().len(),
        "colony finished"
    );
    for line in canvas.borrow().lines() {
        println!("{line}");
    }
    Ok(())
}
