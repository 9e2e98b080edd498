//! Overall game flow: which screen is up, the run's score, and where taps go.

use crate::config::GameConfig;
use crate::level::Level;
use crate::menu::{hit_menu_item, ActivateMenu, MenuAction, MenuItem, OverlayCamera};
use crate::player::{respawn_player, JumpRequested, Player, PlayerDied, PlayerSystems};
use crate::save::SaveData;
use crate::sound::SoundCommand;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_rapier3d::prelude::*;
use std::time::Duration;

/// Delay between a finish-menu choice and the switch, so the screen is black first.
pub const MENU_SWITCH_DELAY: f32 = 0.7;

pub struct GamePlugin;

impl Plugin for GamePlugin {
    fn build(&self, app: &mut App) {
        app.add_state::<GameState>()
            .add_event::<GameCommand>()
            .add_event::<Tap>()
            .init_resource::<Scores>()
            .init_resource::<ScheduledCommands>()
            .add_startup_system(configure_physics)
            .add_startup_system(load_scores)
            .add_systems(
                (
                    read_taps,
                    dispatch_taps,
                    tick_scheduled_commands,
                    handle_game_commands,
                )
                    .chain(),
            )
            .add_system(record_death.after(PlayerSystems))
            .add_system(pause_physics);
    }
}

#[derive(States, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GameState {
    #[default]
    Title,
    Playing,
    Paused,
    GameOver,
}

impl GameState {
    /// The world is frozen on the title screen and the pause menu. It keeps
    /// ticking behind the finish menu.
    pub fn is_paused(self) -> bool {
        matches!(self, GameState::Title | GameState::Paused)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameCommand {
    /// Reset the world and start a run straight away.
    Restart,
    /// Reset the world and go back to the title screen.
    ShowTitleScreen,
}

/// Commands waiting on a real-time delay.
#[derive(Resource, Debug, Default)]
pub struct ScheduledCommands(Vec<(Timer, GameCommand)>);

impl ScheduledCommands {
    pub fn invoke(&mut self, command: GameCommand, delay: f32) {
        self.0.push((Timer::from_seconds(delay, TimerMode::Once), command));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn tick(&mut self, delta: Duration) -> Vec<GameCommand> {
        let mut due = Vec::new();
        self.0.retain_mut(|(timer, command)| {
            if timer.tick(delta).finished() {
                due.push(*command);
                false
            } else {
                true
            }
        });
        due
    }
}

#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Scores {
    /// Score of the last finished run.
    pub last: u32,
    pub best: u32,
}

impl Scores {
    /// Records a finished run. Returns true on a new best.
    pub fn record(&mut self, score: u32) -> bool {
        self.last = score;
        if score > self.best {
            self.best = score;
            true
        } else {
            false
        }
    }
}

fn configure_physics(config: Res<GameConfig>, mut rapier_config: ResMut<RapierConfiguration>) {
    rapier_config.gravity = Vec3::NEG_Y * config.gravity;
}

fn load_scores(config: Res<GameConfig>, mut scores: ResMut<Scores>) {
    match SaveData::load(&config.save_path) {
        Ok(data) => scores.best = data.best_score,
        Err(err) => warn!("Could not read the saved best score: {}", err),
    }
}

/// Physics only runs while the world is not frozen.
fn pause_physics(state: Res<State<GameState>>, mut rapier_config: ResMut<RapierConfiguration>) {
    if state.is_changed() {
        rapier_config.physics_pipeline_active = !state.0.is_paused();
    }
}

/// A click or new touch, in overlay world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tap(pub Vec2);

fn read_taps(
    mouse: Res<Input<MouseButton>>,
    touches: Res<Touches>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<OverlayCamera>>,
    mut taps: EventWriter<Tap>,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };

    let mut positions = Vec::new();
    if mouse.just_pressed(MouseButton::Left) {
        if let Some(cursor) = window.cursor_position() {
            positions.push(cursor);
        }
    }
    // touch positions are measured from the top of the window
    positions.extend(touches.iter_just_pressed().map(|touch| {
        let position = touch.position();
        Vec2::new(position.x, window.height() - position.y)
    }));
    if positions.is_empty() {
        return;
    }

    let Ok((camera, camera_transform)) = cameras.get_single() else {
        return;
    };
    for position in positions {
        if let Some(ray) = camera.viewport_to_world(camera_transform, position) {
            taps.send(Tap(ray.origin.truncate()));
        }
    }
}

/// Taps go to the menu item under them, or to the player when there is none.
fn dispatch_taps(
    mut taps: EventReader<Tap>,
    items: Query<(&MenuItem, &GlobalTransform)>,
    state: Res<State<GameState>>,
    scheduled: Res<ScheduledCommands>,
    mut actions: EventWriter<MenuAction>,
    mut sounds: EventWriter<SoundCommand>,
    mut jumps: EventWriter<JumpRequested>,
) {
    for Tap(point) in taps.iter() {
        match hit_menu_item(*point, state.0, items.iter()) {
            Some(item) => {
                // a screen switch is already on its way
                if !scheduled.is_empty() {
                    continue;
                }
                if let Some(sfx) = &item.sfx {
                    sounds.send(SoundCommand::sfx(sfx.clone()));
                }
                actions.send(item.action);
            }
            None if !state.0.is_paused() => jumps.send(JumpRequested),
            None => {}
        }
    }
}

fn tick_scheduled_commands(
    time: Res<Time>,
    mut scheduled: ResMut<ScheduledCommands>,
    mut commands: EventWriter<GameCommand>,
) {
    if scheduled.is_empty() {
        return;
    }
    for command in scheduled.tick(time.delta()) {
        commands.send(command);
    }
}

type PlayerParts<'a> = (
    &'a mut Player,
    &'a mut Transform,
    &'a mut Velocity,
    &'a mut RigidBody,
    &'a mut Visibility,
);

fn handle_game_commands(
    mut commands: EventReader<GameCommand>,
    mut level: ResMut<Level>,
    mut next_state: ResMut<NextState<GameState>>,
    mut players: Query<PlayerParts>,
    mut sounds: EventWriter<SoundCommand>,
    mut menus: EventWriter<ActivateMenu>,
) {
    for command in commands.iter() {
        match command {
            GameCommand::Restart => {
                level.restart();
                for (mut player, mut transform, mut velocity, mut body, mut visibility) in &mut players {
                    respawn_player(&mut player, &mut transform, &mut velocity, &mut body, &mut visibility);
                }
                next_state.set(GameState::Playing);
                sounds.send(SoundCommand::music("GameLoop"));
                info!("Run started");
            }
            GameCommand::ShowTitleScreen => {
                level.restart();
                next_state.set(GameState::Title);
                menus.send(ActivateMenu::Start);
            }
        }
    }
}

fn record_death(
    mut died: EventReader<PlayerDied>,
    level: Res<Level>,
    config: Res<GameConfig>,
    mut scores: ResMut<Scores>,
    mut next_state: ResMut<NextState<GameState>>,
    mut menus: EventWriter<ActivateMenu>,
) {
    if died.iter().count() == 0 {
        return;
    }

    let score = level.in_progress_score();
    if scores.record(score) {
        let data = SaveData {
            best_score: scores.best,
        };
        if let Err(err) = data.store(&config.save_path) {
            error!("Could not save the best score: {}", err);
        }
    }
    info!("Run over at {}m, best {}m", scores.last, scores.best);

    next_state.set(GameState::GameOver);
    menus.send(ActivateMenu::Finish);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{kill_player, DeathCause, PlayerHit};
    use crate::scenery::tests::{blocks, FirstPicker};
    use crate::scenery::{LayerChain, SceneryLayer, ScreenBounds};
    use bevy::ecs::event::Event;

    fn sent<T: Event + Clone>(app: &App) -> Vec<T> {
        let events = app.world.resource::<Events<T>>();
        events.get_reader().iter(events).cloned().collect()
    }

    fn count<T: Event>(app: &App) -> usize {
        let events = app.world.resource::<Events<T>>();
        events.get_reader().iter(events).count()
    }

    fn running_level(seconds: f32) -> Level {
        let mut level = Level::new(
            vec![SceneryLayer::new("ground", 1.0, LayerChain::Infinite, blocks(0, &[4.0; 6]))],
            8.0,
        );
        level.update(seconds, true, &ScreenBounds::from_view(10.0, 1.6), &mut FirstPicker);
        level
    }

    fn tap_app(state: GameState) -> App {
        let mut app = App::new();
        app.add_state::<GameState>()
            .add_event::<Tap>()
            .add_event::<MenuAction>()
            .add_event::<SoundCommand>()
            .add_event::<JumpRequested>()
            .init_resource::<ScheduledCommands>()
            .add_system(dispatch_taps);
        app.world.insert_resource(State(state));
        app.world.spawn((
            MenuItem {
                size: Vec2::ONE,
                action: MenuAction::Pause,
                active_in: GameState::Playing,
                sfx: Some("Select".to_string()),
            },
            GlobalTransform::from_translation(Vec3::new(7.5, 4.5, 20.0)),
        ));
        app
    }

    #[test]
    fn scores_track_last_and_best() {
        let mut scores = Scores { last: 0, best: 40 };
        assert!(!scores.record(12));
        assert_eq!(scores, Scores { last: 12, best: 40 });

        assert!(scores.record(55));
        assert_eq!(scores, Scores { last: 55, best: 55 });

        assert!(!scores.record(55));
    }

    #[test]
    fn paused_states() {
        assert!(GameState::Title.is_paused());
        assert!(GameState::Paused.is_paused());
        assert!(!GameState::Playing.is_paused());
        assert!(!GameState::GameOver.is_paused());
    }

    #[test]
    fn scheduled_commands_fire_once_due() {
        let mut scheduled = ScheduledCommands::default();
        scheduled.invoke(GameCommand::Restart, MENU_SWITCH_DELAY);
        scheduled.invoke(GameCommand::ShowTitleScreen, 1.5);

        assert!(scheduled.tick(Duration::from_secs_f32(0.5)).is_empty());
        assert_eq!(
            scheduled.tick(Duration::from_secs_f32(0.3)),
            vec![GameCommand::Restart]
        );
        assert!(!scheduled.is_empty());
        assert_eq!(
            scheduled.tick(Duration::from_secs(1)),
            vec![GameCommand::ShowTitleScreen]
        );
        assert!(scheduled.is_empty());
    }

    #[test]
    fn restart_command_starts_a_run() {
        let mut app = App::new();
        app.add_state::<GameState>()
            .add_event::<GameCommand>()
            .add_event::<SoundCommand>()
            .add_event::<ActivateMenu>()
            .insert_resource(Level::new(
                vec![SceneryLayer::new("ground", 1.0, LayerChain::Infinite, blocks(0, &[4.0; 6]))],
                8.0,
            ))
            .add_system(handle_game_commands);

        app.world.send_event(GameCommand::Restart);
        app.update();
        app.update();

        assert_eq!(app.world.resource::<State<GameState>>().0, GameState::Playing);
        assert_eq!(app.world.resource::<Level>().total_distance(), 0.0);
        let music = app.world.resource::<Events<SoundCommand>>();
        let mut reader = music.get_reader();
        assert_eq!(
            reader.iter(music).next(),
            Some(&SoundCommand::music("GameLoop"))
        );
    }

    #[test]
    fn tap_on_item_dispatches_its_action() {
        let mut app = tap_app(GameState::Playing);
        app.world.send_event(Tap(Vec2::new(7.3, 4.6)));
        app.update();

        assert_eq!(sent::<MenuAction>(&app), vec![MenuAction::Pause]);
        assert_eq!(sent::<SoundCommand>(&app), vec![SoundCommand::sfx("Select")]);
        assert_eq!(count::<JumpRequested>(&app), 0);
    }

    #[test]
    fn tap_elsewhere_jumps_while_playing() {
        let mut app = tap_app(GameState::Playing);
        app.world.send_event(Tap(Vec2::ZERO));
        app.update();

        assert_eq!(count::<JumpRequested>(&app), 1);
        assert!(sent::<MenuAction>(&app).is_empty());
        assert!(sent::<SoundCommand>(&app).is_empty());
    }

    #[test]
    fn taps_are_swallowed_while_paused() {
        let mut app = tap_app(GameState::Paused);
        app.world.send_event(Tap(Vec2::ZERO));
        // the pause button only answers while playing
        app.world.send_event(Tap(Vec2::new(7.5, 4.5)));
        app.update();

        assert_eq!(count::<JumpRequested>(&app), 0);
        assert!(sent::<MenuAction>(&app).is_empty());
    }

    #[test]
    fn menu_taps_wait_for_scheduled_switch() {
        let mut app = tap_app(GameState::Playing);
        app.world
            .resource_mut::<ScheduledCommands>()
            .invoke(GameCommand::Restart, MENU_SWITCH_DELAY);
        app.world.send_event(Tap(Vec2::new(7.5, 4.5)));
        app.update();

        assert!(sent::<MenuAction>(&app).is_empty());
        assert!(sent::<SoundCommand>(&app).is_empty());
        assert_eq!(count::<JumpRequested>(&app), 0);
    }

    #[test]
    fn death_records_score_and_shows_finish_menu() {
        let save_path = std::env::temp_dir().join(format!("pixel_runner_death_{}.ron", std::process::id()));
        let mut app = App::new();
        app.add_state::<GameState>()
            .add_event::<PlayerHit>()
            .add_event::<PlayerDied>()
            .add_event::<SoundCommand>()
            .add_event::<ActivateMenu>()
            .insert_resource(GameConfig {
                save_path: save_path.to_string_lossy().into_owned(),
                ..default()
            })
            .insert_resource(Scores { last: 0, best: 5 })
            .insert_resource(running_level(1.5))
            .add_systems((kill_player, record_death).chain());
        app.world.insert_resource(State(GameState::Playing));
        let player = app
            .world
            .spawn((
                Player::new(Vec3::ZERO, 0.8, 0.2),
                RigidBody::Dynamic,
                Visibility::Inherited,
            ))
            .id();
        let mut died = app.world.resource::<Events<PlayerDied>>().get_reader();

        // two hits in one frame still make a single death
        app.world.send_event(PlayerHit(DeathCause::Spikes));
        app.world.send_event(PlayerHit(DeathCause::Wall));
        app.update();

        let events = app.world.resource::<Events<PlayerDied>>();
        let causes: Vec<DeathCause> = died.iter(events).map(|death| death.0).collect();
        assert_eq!(causes, vec![DeathCause::Spikes]);
        assert_eq!(*app.world.resource::<Scores>(), Scores { last: 12, best: 12 });
        assert_eq!(sent::<ActivateMenu>(&app), vec![ActivateMenu::Finish]);
        assert_eq!(sent::<SoundCommand>(&app), vec![SoundCommand::sfx("Death")]);
        assert_eq!(app.world.get::<Visibility>(player), Some(&Visibility::Hidden));
        assert_eq!(app.world.get::<RigidBody>(player), Some(&RigidBody::Fixed));

        let saved = SaveData::load(&save_path);
        let _ = std::fs::remove_file(&save_path);
        assert_eq!(saved.unwrap().best_score, 12);

        // already dead, so a late hit is ignored
        app.world.send_event(PlayerHit(DeathCause::Fell));
        app.update();

        let events = app.world.resource::<Events<PlayerDied>>();
        assert_eq!(died.iter(events).count(), 0);
        assert_eq!(app.world.resource::<State<GameState>>().0, GameState::GameOver);
    }
}
