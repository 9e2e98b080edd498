use crate::config::GameConfig;
use crate::game::GameState;
use crate::level::Spikes;
use crate::scenery::ScreenBounds;
use crate::sound::SoundCommand;
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use bevy_tnua::{
    TnuaFreeFallBehavior, TnuaPlatformerBundle, TnuaPlatformerConfig, TnuaPlatformerControls,
};
use std::f32::consts::TAU;

const DEBRIS_COUNT: usize = 10;
const DEBRIS_LIFETIME: f32 = 2.0;
const DEBRIS_GRAVITY: f32 = 30.0;

pub struct PlayerPlugin;

impl Plugin for PlayerPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<JumpRequested>()
            .add_event::<PlayerHit>()
            .add_event::<PlayerDied>()
            .add_startup_system(setup_player)
            .add_systems(
                (
                    player_jump,
                    check_wall_crashes,
                    check_spike_hits,
                    check_offscreen,
                    kill_player,
                )
                    .chain()
                    .in_set(OnUpdate(GameState::Playing))
                    .in_set(PlayerSystems),
            )
            .add_system(spawn_debris.after(PlayerSystems))
            .add_system(update_debris);
    }
}

/// Jump and death checks, run while playing.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerSystems;

#[derive(Component)]
pub struct Player {
    start: Vec3,
    size: f32,
    dead: bool,
    jump_hold: Timer,
}

impl Player {
    pub(crate) fn new(start: Vec3, size: f32, jump_hold: f32) -> Self {
        let mut jump_hold = Timer::from_seconds(jump_hold, TimerMode::Once);
        // start released
        jump_hold.tick(jump_hold.duration());
        Self {
            start,
            size,
            dead: false,
            jump_hold,
        }
    }

    /// Fully below or left of the screen. The box check leaves some slack so the
    /// player is out of sight before it counts.
    pub fn is_offscreen(&self, position: Vec3, bounds: &ScreenBounds) -> bool {
        position.x + self.size < bounds.left || position.y + self.size < bounds.bottom
    }
}

/// The collider child of the player body.
#[derive(Component)]
pub struct PlayerCollider;

/// A tap that was not meant for a menu.
pub struct JumpRequested;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    Spikes,
    Wall,
    Fell,
}

pub struct PlayerHit(pub DeathCause);

/// Sent once per run, when the player dies.
pub struct PlayerDied(pub DeathCause);

#[derive(Component)]
struct Debris {
    velocity: Vec3,
    lifetime: Timer,
}

pub fn setup_player(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    config: Res<GameConfig>,
) {
    let size = config.player_size;
    let start = config.player_start();

    // player, hidden until the first run starts
    commands
        .spawn((
            PbrBundle {
                mesh: meshes.add(Mesh::from(shape::Cube { size })),
                material: materials.add(Color::rgb(0.95, 0.45, 0.2).into()),
                transform: Transform::from_translation(start),
                visibility: Visibility::Hidden,
                ..default()
            },
            Player::new(start, size, config.jump_hold),
        ))
        .insert(RigidBody::Fixed)
        .with_children(|c| {
            c.spawn(Collider::cuboid(0.5 * size, 0.5 * size, 0.5 * size))
                .insert(PlayerCollider)
                .insert(CollisionGroups::new(Group::GROUP_1, Group::GROUP_2))
                .insert(ActiveEvents::COLLISION_EVENTS | ActiveEvents::CONTACT_FORCE_EVENTS)
                .insert(TransformBundle::default());
        })
        .insert(TnuaPlatformerBundle::new_with_config(
            TnuaPlatformerConfig {
                up: Vec3::Y,
                forward: Vec3::X,
                full_speed: 0.0,
                full_jump_height: config.jump_height,
                float_height: 0.5 * size + 0.1,
                cling_distance: 0.2,
                spring_strengh: 400.0,
                spring_dampening: 1.2,
                acceleration: 60.0,
                air_acceleration: 20.0,
                coyote_time: 0.1,
                jump_start_extra_gravity: 0.0,
                jump_fall_extra_gravity: 20.0,
                jump_shorten_extra_gravity: 40.0,
                free_fall_behavior: TnuaFreeFallBehavior::LikeJumpShorten,
                tilt_offset_angvel: 0.0,
                tilt_offset_angacl: 0.0,
                turning_angvel: 10.0,
            },
        ))
        .insert(Velocity::default())
        .insert(
            LockedAxes::ROTATION_LOCKED
                | LockedAxes::TRANSLATION_LOCKED_X
                | LockedAxes::TRANSLATION_LOCKED_Z,
        );
}

/// Puts the player back at the start of a fresh run.
pub fn respawn_player(
    player: &mut Player,
    transform: &mut Transform,
    velocity: &mut Velocity,
    body: &mut RigidBody,
    visibility: &mut Visibility,
) {
    transform.translation = player.start;
    *velocity = Velocity::default();
    *body = RigidBody::Dynamic;
    *visibility = Visibility::Inherited;
    player.dead = false;
    let held = player.jump_hold.duration();
    player.jump_hold.tick(held);
}

pub fn player_jump(
    keyboard: Res<Input<KeyCode>>,
    time: Res<Time>,
    mut taps: EventReader<JumpRequested>,
    mut query: Query<(&mut TnuaPlatformerControls, &mut Player)>,
) {
    let Ok((mut controls, mut player)) = query.get_single_mut() else {
        return;
    };

    let tapped = taps.iter().count() > 0;
    if player.dead {
        return;
    }

    if tapped || keyboard.any_just_pressed([KeyCode::Space, KeyCode::Up, KeyCode::W]) {
        player.jump_hold.reset();
    } else {
        player.jump_hold.tick(time.delta());
    }

    // a tap is a single press, so keep the jump held briefly to get a full hop
    let jumping = !player.jump_hold.finished();

    *controls = TnuaPlatformerControls {
        desired_velocity: Vec3::ZERO,
        desired_forward: Vec3::X,
        jump: jumping.then(|| 1.0),
        float_height_offset: 0.0,
    };
}

pub fn check_wall_crashes(
    mut contact_force_events: EventReader<ContactForceEvent>,
    colliders: Query<(), With<PlayerCollider>>,
    mut hits: EventWriter<PlayerHit>,
) {
    for contact_force_event in contact_force_events.iter() {
        let involves_player = colliders.contains(contact_force_event.collider1)
            || colliders.contains(contact_force_event.collider2);
        if !involves_player {
            continue;
        }

        // ground pushes along y, a wall coming at the player pushes along x
        if contact_force_event.max_force_direction.x.abs() > 0.5 {
            hits.send(PlayerHit(DeathCause::Wall));
            break;
        }
    }
}

pub fn check_spike_hits(
    mut collision_events: EventReader<CollisionEvent>,
    colliders: Query<(), With<PlayerCollider>>,
    spikes: Query<(), With<Spikes>>,
    config: Res<GameConfig>,
    mut hits: EventWriter<PlayerHit>,
) {
    for event in collision_events.iter() {
        let (a, b) = match event {
            CollisionEvent::Started(a, b, _) => (*a, *b),
            _ => continue,
        };
        let touched = (colliders.contains(a) && spikes.contains(b))
            || (colliders.contains(b) && spikes.contains(a));
        if touched && !config.invincible {
            hits.send(PlayerHit(DeathCause::Spikes));
            break;
        }
    }
}

pub fn check_offscreen(
    bounds: Res<ScreenBounds>,
    query: Query<(&Player, &Transform)>,
    mut hits: EventWriter<PlayerHit>,
) {
    for (player, transform) in &query {
        if !player.dead && player.is_offscreen(transform.translation, &bounds) {
            hits.send(PlayerHit(DeathCause::Fell));
        }
    }
}

pub fn kill_player(
    mut hits: EventReader<PlayerHit>,
    mut query: Query<(&mut Player, &mut RigidBody, &mut Visibility)>,
    mut sounds: EventWriter<SoundCommand>,
    mut died: EventWriter<PlayerDied>,
) {
    let causes: Vec<DeathCause> = hits.iter().map(|hit| hit.0).collect();
    let Some(&cause) = causes.first() else {
        return;
    };

    let Ok((mut player, mut body, mut visibility)) = query.get_single_mut() else {
        return;
    };
    if player.dead {
        return;
    }

    info!("Player died: {:?}", cause);
    player.dead = true;
    *visibility = Visibility::Hidden;
    *body = RigidBody::Fixed;

    sounds.send(SoundCommand::sfx("Death"));
    died.send(PlayerDied(cause));
}

/// Bursts the player into pieces, unless it fell out of sight.
fn spawn_debris(
    mut commands: Commands,
    mut died: EventReader<PlayerDied>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    query: Query<(&Player, &Transform)>,
) {
    for PlayerDied(cause) in died.iter() {
        if *cause == DeathCause::Fell {
            continue;
        }
        let Ok((player, transform)) = query.get_single() else {
            continue;
        };

        let mesh = meshes.add(Mesh::from(shape::Cube {
            size: player.size * 0.25,
        }));
        let material = materials.add(Color::rgb(0.95, 0.45, 0.2).into());

        for i in 0..DEBRIS_COUNT {
            let angle = i as f32 / DEBRIS_COUNT as f32 * TAU;
            let speed = 4.0 + (i % 3) as f32 * 2.0;
            commands.spawn((
                PbrBundle {
                    mesh: mesh.clone(),
                    material: material.clone(),
                    transform: Transform::from_translation(transform.translation),
                    ..default()
                },
                Debris {
                    velocity: Vec3::new(angle.cos(), angle.sin() + 0.5, 0.0) * speed,
                    lifetime: Timer::from_seconds(DEBRIS_LIFETIME, TimerMode::Once),
                },
            ));
        }
    }
}

fn update_debris(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &mut Debris, &mut Transform)>,
) {
    let dt = time.delta_seconds();
    for (entity, mut debris, mut transform) in &mut query {
        if debris.lifetime.tick(time.delta()).finished() {
            commands.entity(entity).despawn();
            continue;
        }
        debris.velocity.y -= DEBRIS_GRAVITY * dt;
        transform.translation += debris.velocity * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> ScreenBounds {
        ScreenBounds::from_view(10.0, 16.0 / 9.0)
    }

    #[test]
    fn offscreen_only_once_fully_out() {
        let player = Player::new(Vec3::new(-4.0, -1.0, 0.0), 0.5, 0.2);
        assert!(!player.is_offscreen(Vec3::new(-4.0, -5.2, 0.0), &bounds()));
        assert!(player.is_offscreen(Vec3::new(-4.0, -5.6, 0.0), &bounds()));
        assert!(player.is_offscreen(Vec3::new(-10.0, 0.0, 0.0), &bounds()));
    }

    #[test]
    fn new_player_is_not_jumping() {
        let player = Player::new(Vec3::ZERO, 0.5, 0.2);
        assert!(player.jump_hold.finished());
        assert!(!player.dead);
    }

    #[test]
    fn respawn_resets_run_state() {
        let start = Vec3::new(-4.0, -1.0, 0.0);
        let mut player = Player::new(start, 0.5, 0.2);
        player.dead = true;
        player.jump_hold.reset();
        let mut transform = Transform::from_xyz(-4.0, -9.0, 0.0);
        let mut velocity = Velocity::linear(Vec3::new(0.0, -12.0, 0.0));
        let mut body = RigidBody::Fixed;
        let mut visibility = Visibility::Hidden;

        respawn_player(&mut player, &mut transform, &mut velocity, &mut body, &mut visibility);

        assert!(!player.dead);
        assert!(player.jump_hold.finished());
        assert_eq!(transform.translation, start);
        assert_eq!(velocity.linvel, Vec3::ZERO);
        assert_eq!(body, RigidBody::Dynamic);
        assert_eq!(visibility, Visibility::Inherited);
    }
}
