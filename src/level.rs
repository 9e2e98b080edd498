use crate::anim::Rotator;
use crate::config::GameConfig;
use crate::game::GameState;
use crate::layout::{ElementDef, ElementKind, SceneryLayout};
use crate::scenery::{BlockPicker, Handoff, NoisePicker, SceneryBlock, SceneryLayer, ScreenBounds};
use bevy::prelude::*;
use bevy::render::camera::ScalingMode;
use bevy::window::PrimaryWindow;
use bevy_rapier3d::prelude::*;
use std::f32::consts::PI;

/// Pooled blocks wait here, far below anything the player can reach.
const PARK_Y: f32 = -100.0;
const ELEMENT_DEPTH: f32 = 1.0;

/// Marks a hazard collider. Touching one kills the player.
#[derive(Component)]
pub struct Spikes;

/// Every scenery layer plus the distance the player has covered.
#[derive(Resource, Debug)]
pub struct Level {
    layers: Vec<SceneryLayer>,
    world_scroll_speed: f32,
    total_distance: f32,
}

impl Level {
    pub fn new(layers: Vec<SceneryLayer>, world_scroll_speed: f32) -> Self {
        let mut level = Self {
            layers,
            world_scroll_speed,
            total_distance: 0.0,
        };
        level.disable_chained_layers();
        level
    }

    pub fn layers(&self) -> &[SceneryLayer] {
        &self.layers
    }

    pub fn total_distance(&self) -> f32 {
        self.total_distance
    }

    /// Whole units run so far, which is what the player is scored on.
    pub fn in_progress_score(&self) -> u32 {
        self.total_distance.max(0.0) as u32
    }

    pub fn restart(&mut self) {
        self.total_distance = 0.0;
        for layer in &mut self.layers {
            layer.restart();
        }

        // only once everything is reset can layers waiting on a finite layer be parked
        self.disable_chained_layers();
    }

    fn disable_chained_layers(&mut self) {
        let waiting: Vec<usize> = self
            .layers
            .iter()
            .filter_map(SceneryLayer::disable_next_layer)
            .collect();
        for index in waiting {
            if let Some(layer) = self.layers.get_mut(index) {
                layer.disable_block_creation();
            }
        }
    }

    /// Advances the world by `dt` seconds. Scenery keeps filling the screen while
    /// stopped, it just does not move.
    pub fn update(&mut self, dt: f32, running: bool, bounds: &ScreenBounds, picker: &mut dyn BlockPicker) {
        let speed = if running { self.world_scroll_speed } else { 0.0 };
        self.total_distance += speed * dt;

        for index in 0..self.layers.len() {
            let handoff = self.layers[index].update_blocks(speed, dt, bounds, picker);
            self.apply_handoff(handoff, bounds, picker);
        }
    }

    fn apply_handoff(&mut self, mut handoff: Option<Handoff>, bounds: &ScreenBounds, picker: &mut dyn BlockPicker) {
        let mut hops = 0;
        while let Some(Handoff { next, start_x }) = handoff {
            hops += 1;
            if hops > self.layers.len() {
                warn!("Scenery layers chain into each other in a loop, stopping at layer {}", next);
                return;
            }
            let Some(layer) = self.layers.get_mut(next) else {
                warn!("Scenery layer {} does not exist", next);
                return;
            };
            handoff = layer.enable_block_creation(start_x, bounds, picker);
        }
    }
}

pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ScreenBounds>()
            .insert_resource(AmbientLight {
                color: Color::WHITE,
                brightness: 0.6,
            })
            .add_startup_system(setup_camera)
            .add_startup_system(setup_level)
            .add_systems((update_screen_bounds, scroll_scenery, sync_scenery_blocks).chain());
    }
}

fn setup_camera(mut commands: Commands, config: Res<GameConfig>) {
    commands.spawn(Camera3dBundle {
        projection: OrthographicProjection {
            scaling_mode: ScalingMode::FixedVertical(config.view_height),
            ..default()
        }
        .into(),
        transform: Transform::from_xyz(0.0, 0.0, 50.0).looking_at(Vec3::ZERO, Vec3::Y),
        ..default()
    });

    // light
    commands.spawn(DirectionalLightBundle {
        directional_light: DirectionalLight {
            illuminance: 20000.0,
            ..default()
        },
        transform: Transform {
            translation: Vec3::new(0.0, 2.0, 10.0),
            rotation: Quat::from_rotation_x(-PI / 8.),
            ..default()
        },
        ..default()
    });
}

pub fn setup_level(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    config: Res<GameConfig>,
    layout: Res<SceneryLayout>,
) {
    let mut layers = Vec::with_capacity(layout.layers.len());

    for (index, layer_def) in layout.layers.iter().enumerate() {
        let mut blocks = Vec::new();

        commands
            .spawn((
                SpatialBundle::from_transform(Transform::from_xyz(0.0, 0.0, layer_def.depth)),
                Name::new(format!("Layer {}", layer_def.name)),
            ))
            .with_children(|layer| {
                for block_def in &layer_def.blocks {
                    if block_def.elements.iter().any(|e| e.overhangs(block_def.width)) {
                        warn!(
                            "A block in layer {} has elements wider than its {} width, expect popping at the screen edge",
                            layer_def.name, block_def.width
                        );
                    }

                    for _ in 0..block_def.copies {
                        let block = SceneryBlock {
                            width: block_def.width,
                        };
                        let entity = layer
                            .spawn((
                                SpatialBundle {
                                    transform: Transform::from_xyz(0.0, PARK_Y, 0.0),
                                    visibility: Visibility::Hidden,
                                    ..default()
                                },
                                block,
                                RigidBody::KinematicPositionBased,
                            ))
                            .with_children(|parts| {
                                for (order, element) in block_def.elements.iter().enumerate() {
                                    spawn_element(parts, element, order, &mut meshes, &mut materials);
                                }
                            })
                            .id();
                        blocks.push((entity, block));
                    }
                }
            });

        info!(
            "Layer {} ready with {} pooled blocks",
            layer_def.name,
            blocks.len()
        );
        layers.push(SceneryLayer::new(
            layer_def.name.clone(),
            layer_def.parallax_speed,
            layout.chain_of(index),
            blocks,
        ));
    }

    commands.insert_resource(Level::new(layers, config.world_scroll_speed));
    commands.insert_resource(NoisePicker::new(config.noise_seed));
}

fn spawn_element(
    parent: &mut ChildBuilder,
    element: &ElementDef,
    order: usize,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) {
    let [width, height] = element.size;
    let [x, y] = element.offset;
    let [r, g, b] = element.color;

    let mut part = parent.spawn(PbrBundle {
        mesh: meshes.add(Mesh::from(shape::Box::new(width, height, ELEMENT_DEPTH))),
        material: materials.add(Color::rgb(r, g, b).into()),
        transform: Transform::from_xyz(x, y, order as f32 * 0.01),
        ..default()
    });

    let collider = Collider::cuboid(0.5 * width, 0.5 * height, 0.5 * ELEMENT_DEPTH);
    match element.kind {
        ElementKind::Ground => {
            part.insert(collider)
                .insert(CollisionGroups::new(Group::GROUP_2, Group::GROUP_1));
        }
        ElementKind::Spikes => {
            part.insert(collider)
                .insert(Sensor)
                .insert(Spikes)
                .insert(CollisionGroups::new(Group::GROUP_2, Group::GROUP_1));
        }
        ElementKind::Decor => {}
    }

    if let Some(speed) = element.spin {
        part.insert(Rotator::new(speed));
    }
}

fn update_screen_bounds(
    windows: Query<&Window, With<PrimaryWindow>>,
    config: Res<GameConfig>,
    mut bounds: ResMut<ScreenBounds>,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };
    if window.height() <= 0.0 {
        return;
    }

    let current = ScreenBounds::from_view(config.view_height, window.width() / window.height());
    if *bounds != current {
        *bounds = current;
    }
}

fn scroll_scenery(
    time: Res<Time>,
    state: Res<State<GameState>>,
    bounds: Res<ScreenBounds>,
    mut level: ResMut<Level>,
    mut picker: ResMut<NoisePicker>,
) {
    let running = state.0 == GameState::Playing;
    level.update(time.delta_seconds(), running, &bounds, &mut *picker);
}

fn sync_scenery_blocks(
    level: Res<Level>,
    mut blocks: Query<(&mut Transform, &mut Visibility), With<SceneryBlock>>,
) {
    for layer in level.layers() {
        for placed in layer.visible_blocks() {
            if let Ok((mut transform, mut visibility)) = blocks.get_mut(placed.entity) {
                transform.translation.x = placed.x;
                transform.translation.y = 0.0;
                if *visibility != Visibility::Inherited {
                    *visibility = Visibility::Inherited;
                }
            }
        }

        for entity in layer.pooled_blocks() {
            if let Ok((mut transform, mut visibility)) = blocks.get_mut(entity) {
                if *visibility != Visibility::Hidden {
                    *visibility = Visibility::Hidden;
                    transform.translation = Vec3::new(0.0, PARK_Y, 0.0);
                }
            }
        }
    }
}
