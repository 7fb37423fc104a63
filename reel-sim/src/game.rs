//! Small deterministic pixel games standing in for a browser simulator.

use crate::{
    action::InputEvent,
    spec::{EnvSpec, GameKind},
};
use anyhow::Result;
use rand::{Rng, SeedableRng, rngs::StdRng};
use reel_core::Frame;
use std::{collections::HashSet, time::Duration};

/// A game driven one frame at a time.
pub trait RawEnv: Send {
    fn reset(&mut self) -> Result<()>;

    /// Applies `events`, advances the game clock by `frame_time` and returns
    /// the reward gained along with whether the game ended.
    fn step(&mut self, frame_time: Duration, events: &[InputEvent]) -> Result<(f32, bool)>;

    fn observe(&self) -> Result<Frame>;
}

type Rgb = [u8; 3];

const FLOOR: Rgb = [96, 96, 104];
const LADDER: Rgb = [150, 100, 40];
const PLAYER: Rgb = [220, 40, 40];
const BALL: Rgb = [250, 210, 40];
const COLUMN: Rgb = [40, 160, 70];

fn fill_rect(frame: &mut Frame, x: i64, y: i64, w: i64, h: i64, color: Rgb) {
    let x0 = x.max(0) as usize;
    let y0 = y.max(0) as usize;
    let x1 = (x + w).clamp(0, frame.width() as i64) as usize;
    let y1 = (y + h).clamp(0, frame.height() as i64) as usize;
    for row in y0..y1 {
        for col in x0..x1 {
            frame.pixel_mut(row, col).copy_from_slice(&color);
        }
    }
}

fn sky(height: usize, width: usize) -> Frame {
    let mut frame = Frame::filled(height, width, 3, 0);
    for row in 0..height {
        let shade = (row * 120 / height.max(1)) as u8;
        let colour = [30 + shade / 3, 60 + shade, 130 + shade / 2];
        fill_rect(&mut frame, 0, row as i64, width as i64, 1, colour);
    }
    frame
}

const FLOORS: usize = 5;
const LADDER_WIDTH: f32 = 12.0;
const PLAYER_WIDTH: f32 = 8.0;
const PLAYER_HEIGHT: f32 = 10.0;
const RUN_SPEED: f32 = 80.0;
const CLIMB_SPEED: f32 = 60.0;

/// Climb a tower of floors connected by ladders. One point per floor
/// reached; the game ends at the top floor.
#[derive(Debug, Clone)]
pub struct ClimberGame {
    width: usize,
    height: usize,
    rng: StdRng,
    ladders: Vec<f32>,
    held: HashSet<String>,
    x: f32,
    level: usize,
    climb: f32,
}

impl ClimberGame {
    pub fn new(width: usize, height: usize, seed: u64) -> Self {
        Self {
            width,
            height,
            rng: StdRng::seed_from_u64(seed),
            ladders: Vec::new(),
            held: HashSet::new(),
            x: width as f32 / 2.0,
            level: 0,
            climb: 0.0,
        }
    }

    fn spacing(&self) -> f32 {
        (self.height.saturating_sub(8)) as f32 / (FLOORS - 1) as f32
    }

    fn floor_y(&self, level: usize) -> f32 {
        self.height as f32 - 4.0 - level as f32 * self.spacing()
    }

    fn on_ladder(&self) -> bool {
        self.ladders
            .get(self.level)
            .is_some_and(|ladder| (self.x - ladder).abs() <= LADDER_WIDTH / 2.0)
    }

    fn is_held(&self, key: &str) -> bool {
        self.held.contains(key)
    }
}

impl RawEnv for ClimberGame {
    fn reset(&mut self) -> Result<()> {
        let margin = LADDER_WIDTH;
        let max_x = (self.width as f32 - margin).max(margin + 1.0);
        self.ladders = (0..FLOORS - 1)
            .map(|_| self.rng.random_range(margin..max_x))
            .collect();
        self.held.clear();
        self.x = self.width as f32 / 2.0;
        self.level = 0;
        self.climb = 0.0;
        Ok(())
    }

    fn step(&mut self, frame_time: Duration, events: &[InputEvent]) -> Result<(f32, bool)> {
        for event in events {
            match event {
                InputEvent::KeyDown(key) => {
                    self.held.insert(key.clone());
                }
                InputEvent::KeyUp(key) => {
                    self.held.remove(key);
                }
                _ => {}
            }
        }
        let dt = frame_time.as_secs_f32();
        let up = self.is_held("ArrowUp");
        let down = self.is_held("ArrowDown");

        if self.climb > 0.0 {
            if up {
                self.climb += CLIMB_SPEED * dt;
            }
            if down {
                self.climb = (self.climb - CLIMB_SPEED * dt).max(0.0);
            }
        } else {
            let dir = self.is_held("ArrowRight") as i32 - self.is_held("ArrowLeft") as i32;
            self.x = (self.x + dir as f32 * RUN_SPEED * dt)
                .clamp(PLAYER_WIDTH / 2.0, self.width as f32 - PLAYER_WIDTH / 2.0);
            if up && self.on_ladder() {
                self.climb = CLIMB_SPEED * dt;
            }
        }

        let mut reward = 0.0;
        if self.climb >= self.spacing() {
            self.level += 1;
            self.climb = 0.0;
            reward = 1.0;
        }
        Ok((reward, self.level >= FLOORS - 1))
    }

    fn observe(&self) -> Result<Frame> {
        let mut frame = sky(self.height, self.width);
        for level in 0..FLOORS {
            let y = self.floor_y(level) as i64;
            fill_rect(&mut frame, 0, y, self.width as i64, 2, FLOOR);
        }
        for (level, ladder) in self.ladders.iter().enumerate() {
            let top = self.floor_y(level + 1) as i64;
            let bottom = self.floor_y(level) as i64;
            let left = (ladder - LADDER_WIDTH / 2.0) as i64;
            fill_rect(&mut frame, left, top, LADDER_WIDTH as i64, bottom - top, LADDER);
        }
        let feet = self.floor_y(self.level) - self.climb;
        fill_rect(
            &mut frame,
            (self.x - PLAYER_WIDTH / 2.0) as i64,
            (feet - PLAYER_HEIGHT) as i64,
            PLAYER_WIDTH as i64,
            PLAYER_HEIGHT as i64,
            PLAYER,
        );
        Ok(frame)
    }
}

const GRAVITY: f32 = 300.0;
const FLAP_SPEED: f32 = 140.0;
const SCROLL_SPEED: f32 = 60.0;
const COLUMN_WIDTH: f32 = 14.0;
const BALL_SIZE: f32 = 8.0;

#[derive(Debug, Clone, Copy)]
struct Column {
    x: f32,
    gap_top: f32,
    passed: bool,
}

/// Keep a falling ball in the air with taps while columns scroll past. One
/// point per column cleared; touching a column or the screen edge ends the
/// game.
#[derive(Debug, Clone)]
pub struct BouncerGame {
    width: usize,
    height: usize,
    rng: StdRng,
    y: f32,
    vy: f32,
    columns: Vec<Column>,
}

impl BouncerGame {
    pub fn new(width: usize, height: usize, seed: u64) -> Self {
        Self {
            width,
            height,
            rng: StdRng::seed_from_u64(seed),
            y: height as f32 / 2.0,
            vy: 0.0,
            columns: Vec::new(),
        }
    }

    fn gap(&self) -> f32 {
        self.height as f32 / 3.0
    }

    fn ball_x(&self) -> f32 {
        self.width as f32 / 4.0
    }

    fn spawn_column(&mut self, x: f32) {
        let max_top = (self.height as f32 - self.gap()).max(1.0);
        let gap_top = self.rng.random_range(0.0..max_top);
        self.columns.push(Column {
            x,
            gap_top,
            passed: false,
        });
    }

    fn hits_column(&self) -> bool {
        let (left, right) = (self.ball_x(), self.ball_x() + BALL_SIZE);
        let (top, bottom) = (self.y, self.y + BALL_SIZE);
        self.columns.iter().any(|column| {
            let overlaps = right > column.x && left < column.x + COLUMN_WIDTH;
            overlaps && (top < column.gap_top || bottom > column.gap_top + self.gap())
        })
    }
}

impl RawEnv for BouncerGame {
    fn reset(&mut self) -> Result<()> {
        self.y = self.height as f32 / 2.0;
        self.vy = 0.0;
        self.columns.clear();
        self.spawn_column(self.width as f32);
        Ok(())
    }

    fn step(&mut self, frame_time: Duration, events: &[InputEvent]) -> Result<(f32, bool)> {
        if events
            .iter()
            .any(|event| matches!(event, InputEvent::MousePressed { .. }))
        {
            self.vy = -FLAP_SPEED;
        }
        let dt = frame_time.as_secs_f32();
        self.vy += GRAVITY * dt;
        self.y += self.vy * dt;

        let ball_x = self.ball_x();
        let mut reward = 0.0;
        for column in &mut self.columns {
            column.x -= SCROLL_SPEED * dt;
            if !column.passed && column.x + COLUMN_WIDTH < ball_x {
                column.passed = true;
                reward += 1.0;
            }
        }
        self.columns.retain(|column| column.x + COLUMN_WIDTH > 0.0);
        let spacing = self.width as f32 / 2.0;
        if self
            .columns
            .last()
            .is_none_or(|column| column.x < self.width as f32 - spacing)
        {
            self.spawn_column(self.width as f32);
        }

        let out_of_bounds = self.y < 0.0 || self.y + BALL_SIZE > self.height as f32;
        Ok((reward, out_of_bounds || self.hits_column()))
    }

    fn observe(&self) -> Result<Frame> {
        let mut frame = sky(self.height, self.width);
        for column in &self.columns {
            let x = column.x as i64;
            let gap_bottom = column.gap_top + self.gap();
            fill_rect(&mut frame, x, 0, COLUMN_WIDTH as i64, column.gap_top as i64, COLUMN);
            fill_rect(
                &mut frame,
                x,
                gap_bottom as i64,
                COLUMN_WIDTH as i64,
                self.height as i64 - gap_bottom as i64,
                COLUMN,
            );
        }
        fill_rect(
            &mut frame,
            self.ball_x() as i64,
            self.y as i64,
            BALL_SIZE as i64,
            BALL_SIZE as i64,
            BALL,
        );
        Ok(frame)
    }
}

/// Game selected by an [`EnvSpec`].
#[derive(Debug, Clone)]
pub enum BuiltinGame {
    Climber(ClimberGame),
    Bouncer(BouncerGame),
}

impl BuiltinGame {
    pub fn for_spec(spec: &EnvSpec, seed: u64) -> Self {
        match spec.game {
            GameKind::Climber => Self::Climber(ClimberGame::new(spec.width, spec.height, seed)),
            GameKind::Bouncer => Self::Bouncer(BouncerGame::new(spec.width, spec.height, seed)),
        }
    }
}

impl RawEnv for BuiltinGame {
    fn reset(&mut self) -> Result<()> {
        match self {
            Self::Climber(game) => game.reset(),
            Self::Bouncer(game) => game.reset(),
        }
    }

    fn step(&mut self, frame_time: Duration, events: &[InputEvent]) -> Result<(f32, bool)> {
        match self {
            Self::Climber(game) => game.step(frame_time, events),
            Self::Bouncer(game) => game.step(frame_time, events),
        }
    }

    fn observe(&self) -> Result<Frame> {
        match self {
            Self::Climber(game) => game.observe(),
            Self::Bouncer(game) => game.observe(),
        }
    }
}
