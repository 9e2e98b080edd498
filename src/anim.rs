use crate::game::GameState;
use bevy::prelude::*;
use std::f32::consts::TAU;

pub struct AnimPlugin;

impl Plugin for AnimPlugin {
    fn build(&self, app: &mut App) {
        app.add_system(animate_menus)
            .add_system(blink)
            .add_system(swing_drop_shadows)
            .add_system(spin_rotators.run_if(not_paused));
    }
}

fn not_paused(state: Res<State<GameState>>) -> bool {
    !state.0.is_paused()
}

pub fn ease_in_cubic(p: f32) -> f32 {
    p * p * p
}

fn lerp_color(from: Color, to: Color, t: f32) -> Color {
    let [r0, g0, b0, a0] = from.as_rgba_f32();
    let [r1, g1, b1, a1] = to.as_rgba_f32();
    Color::rgba(
        r0 + (r1 - r0) * t,
        g0 + (g1 - g0) * t,
        b0 + (b1 - b0) * t,
        a0 + (a1 - a0) * t,
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TweenTarget {
    Position { from: Option<Vec3>, to: Vec3 },
    Colour { from: Option<Color>, to: Color },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    target: TweenTarget,
    duration: f32,
    delay: f32,
    progress: f32,
}

impl Tween {
    pub fn move_to(to: Vec3, duration: f32, delay: f32) -> Self {
        Self {
            target: TweenTarget::Position { from: None, to },
            duration,
            delay,
            progress: 0.0,
        }
    }

    pub fn fade_to(to: Color, duration: f32, delay: f32) -> Self {
        Self {
            target: TweenTarget::Colour { from: None, to },
            duration,
            delay,
            progress: 0.0,
        }
    }

    pub fn advance(&mut self, dt: f32) -> Option<f32> {
        self.delay -= dt;
        if self.delay > 0.0 {
            return None;
        }

        self.progress = (self.progress + dt / self.duration).min(1.0);
        Some(ease_in_cubic(self.progress))
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }
}

#[derive(Component, Debug, Default)]
pub struct MenuAnim {
    tweens: Vec<Tween>,
}

impl MenuAnim {
    pub fn push(&mut self, tween: Tween) {
        self.tweens.push(tween);
    }

    pub fn is_idle(&self) -> bool {
        self.tweens.is_empty()
    }
}

fn animate_menus(time: Res<Time>, mut query: Query<(&mut MenuAnim, &mut Transform, Option<&mut Sprite>)>) {
    let dt = time.delta_seconds();

    for (mut anim, mut transform, mut sprite) in &mut query {
        if anim.is_idle() {
            continue;
        }

        for tween in &mut anim.tweens {
            let Some(t) = tween.advance(dt) else {
                continue;
            };

            // start values are taken when the tween actually begins
            match &mut tween.target {
                TweenTarget::Position { from, to } => {
                    let start = *from.get_or_insert(transform.translation);
                    transform.translation = start.lerp(*to, t);
                }
                TweenTarget::Colour { from, to } => {
                    if let Some(sprite) = sprite.as_mut() {
                        let start = *from.get_or_insert(sprite.color);
                        sprite.color = lerp_color(start, *to, t);
                    }
                }
            }
        }

        anim.tweens.retain(|tween| !tween.is_complete());
    }
}

/// Toggles an element on and off: hidden for `blink_time`, shown for twice that.
#[derive(Component, Debug, Clone, Copy)]
pub struct Blink {
    pub blink_time: f32,
}

impl Default for Blink {
    fn default() -> Self {
        Self { blink_time: 0.6 }
    }
}

pub fn blink_visible(elapsed: f32, blink_time: f32) -> bool {
    elapsed.rem_euclid(3.0 * blink_time) > blink_time
}

fn blink(time: Res<Time>, mut query: Query<(&Blink, Option<&mut Text>, Option<&mut Sprite>)>) {
    let elapsed = time.elapsed_seconds();

    for (blink, text, sprite) in &mut query {
        let alpha = if blink_visible(elapsed, blink.blink_time) { 1.0 } else { 0.0 };
        if let Some(mut text) = text {
            for section in &mut text.sections {
                section.style.color.set_a(alpha);
            }
        }
        if let Some(mut sprite) = sprite {
            sprite.color.set_a(alpha);
        }
    }
}

#[derive(Component, Debug, Clone, Copy)]
pub struct DropShadow {
    pub radius: f32,
    // degrees
    pub max_angle: f32,
    pub period: f32,
}

impl Default for DropShadow {
    fn default() -> Self {
        Self {
            radius: 0.5,
            max_angle: 45.0,
            period: 2.0,
        }
    }
}

impl DropShadow {
    pub fn offset(&self, elapsed: f32) -> Vec2 {
        let phase = elapsed * TAU / self.period;
        let angle = phase.sin() * self.max_angle.to_radians();

        // (0, -radius) rotated by angle
        Vec2::new(self.radius * angle.sin(), -self.radius * angle.cos())
    }
}

fn swing_drop_shadows(time: Res<Time>, mut query: Query<(&DropShadow, &mut Transform)>) {
    let elapsed = time.elapsed_seconds();
    for (shadow, mut transform) in &mut query {
        let offset = shadow.offset(elapsed);
        transform.translation.x = offset.x;
        transform.translation.y = offset.y;
    }
}

#[derive(Component, Debug, Clone, Copy)]
pub struct Rotator {
    // revolutions per second
    pub speed: f32,
    angle: f32,
}

impl Rotator {
    pub fn new(speed: f32) -> Self {
        Self { speed, angle: 0.0 }
    }

    pub fn step(&mut self, dt: f32) -> f32 {
        self.angle = (self.angle + dt * self.speed * TAU).rem_euclid(TAU);
        self.angle
    }
}

fn spin_rotators(time: Res<Time>, mut query: Query<(&mut Rotator, &mut Transform)>) {
    let dt = time.delta_seconds();
    for (mut rotator, mut transform) in &mut query {
        transform.rotation = Quat::from_rotation_z(rotator.step(dt));
    }
}
