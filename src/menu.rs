use crate::anim::{Blink, DropShadow, MenuAnim, Tween};
use crate::config::{GameConfig, DEFAULT_FONT};
use crate::game::{GameCommand, GameState, ScheduledCommands, Scores, MENU_SWITCH_DELAY};
use crate::level::Level;
use crate::scenery::ScreenBounds;
use crate::sound::SoundCommand;
use bevy::core_pipeline::clear_color::ClearColorConfig;
use bevy::prelude::*;
use bevy::render::camera::ScalingMode;

const MENU_Z: f32 = 20.0;
const FADE_Z: f32 = 10.0;
// glyphs are rasterised at this size and scaled down to world units
const FONT_SIZE: f32 = 64.0;
const SELECT_SFX: &str = "Select";

const START_DIM: Color = Color::rgba(0.0, 0.0, 0.0, 0.25);
const MENU_DIM: Color = Color::rgba(0.0, 0.0, 0.0, 0.5);

pub struct MenuPlugin;

impl Plugin for MenuPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<MenuAction>()
            .add_event::<ActivateMenu>()
            .add_startup_system(setup_menus)
            .add_systems((handle_menu_actions, activate_menus, update_hud).chain());
    }
}

#[derive(Component)]
pub struct OverlayCamera;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    StartPressed,
    Pause,
    Resume,
    Restart,
    BackToMenu,
}

#[derive(Component, Debug, Clone)]
pub struct MenuItem {
    pub size: Vec2,
    pub action: MenuAction,
    pub active_in: GameState,
    pub sfx: Option<String>,
}

impl MenuItem {
    fn new(size: Vec2, action: MenuAction, active_in: GameState) -> Self {
        Self {
            size,
            action,
            active_in,
            sfx: Some(SELECT_SFX.to_string()),
        }
    }

    pub fn contains(&self, center: Vec2, point: Vec2) -> bool {
        let half = self.size * 0.5;
        (point - center).abs().cmple(half).all()
    }
}

/// The topmost item under `point` that is tappable in `state`.
pub fn hit_menu_item<'a>(
    point: Vec2,
    state: GameState,
    items: impl IntoIterator<Item = (&'a MenuItem, &'a GlobalTransform)>,
) -> Option<&'a MenuItem> {
    items
        .into_iter()
        .filter(|(item, transform)| {
            item.active_in == state && item.contains(transform.translation().truncate(), point)
        })
        .max_by(|(_, a), (_, b)| a.translation().z.total_cmp(&b.translation().z))
        .map(|(item, _)| item)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivateMenu {
    Start,
    Pause,
    Finish,
}

#[derive(Clone, Copy)]
struct Slide {
    shown: Vec2,
    hidden: Vec2,
}

impl Slide {
    const fn new(shown: Vec2, hidden: Vec2) -> Self {
        Self { shown, hidden }
    }
}

const TITLE: Slide = Slide::new(Vec2::new(1.0, 0.7), Vec2::new(12.0, 0.7));
const PLAYER_IMAGE: Slide = Slide::new(Vec2::new(-4.0, -1.0), Vec2::new(-12.0, -1.0));
const TAP_TO_START: Slide = Slide::new(Vec2::new(0.0, -2.5), Vec2::new(0.0, -10.0));
const PAUSED_TEXT: Slide = Slide::new(Vec2::new(0.0, 1.0), Vec2::new(-12.0, 1.0));
const TAP_TO_RESUME: Slide = Slide::new(Vec2::new(0.0, -1.0), Vec2::new(12.0, -1.0));
const GAME_OVER_TEXT: Slide = Slide::new(Vec2::new(0.0, 0.5), Vec2::new(0.0, 5.0));
const SCORE: Slide = Slide::new(Vec2::new(0.0, 0.0), Vec2::new(0.0, -4.0));
const EXIT_BUTTON: Slide = Slide::new(Vec2::new(-1.35, -1.5), Vec2::new(-10.0, -1.5));
const RESTART_BUTTON: Slide = Slide::new(Vec2::new(1.35, -1.5), Vec2::new(10.0, -1.5));

#[derive(Resource)]
pub struct MenuEntities {
    screen_fade: Entity,
    title: Entity,
    player_image: Entity,
    tap_to_start: Entity,
    paused_text: Entity,
    tap_to_resume: Entity,
    game_over_text: Entity,
    score: Entity,
    exit_button: Entity,
    restart_button: Entity,
    last_score_text: Entity,
    best_score_text: Entity,
}

#[derive(Component)]
struct PauseButton;

#[derive(Component)]
struct DistanceReadout;

fn label(font: &Handle<Font>, value: impl Into<String>, height: f32, color: Color) -> Text2dBundle {
    Text2dBundle {
        text: Text::from_section(
            value,
            TextStyle {
                font: font.clone(),
                font_size: FONT_SIZE,
                color,
            },
        ),
        transform: Transform::from_scale(Vec3::splat(height / FONT_SIZE)),
        ..default()
    }
}

fn quad(size: Vec2, color: Color, offset: Vec3) -> SpriteBundle {
    SpriteBundle {
        sprite: Sprite {
            color,
            custom_size: Some(size),
            ..default()
        },
        transform: Transform::from_translation(offset),
        ..default()
    }
}

fn element(position: Vec2) -> (SpatialBundle, MenuAnim) {
    (
        SpatialBundle::from_transform(Transform::from_translation(position.extend(MENU_Z))),
        MenuAnim::default(),
    )
}

fn button(parent: &mut ChildBuilder, font: &Handle<Font>, text: &str, color: Color) {
    parent.spawn(quad(Vec2::new(2.4, 1.0), color, Vec3::ZERO));
    parent.spawn(label(font, text, 0.5, Color::WHITE)).insert(Transform {
        translation: Vec3::new(0.0, 0.0, 0.1),
        scale: Vec3::splat(0.5 / FONT_SIZE),
        ..default()
    });
}

fn setup_menus(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    config: Res<GameConfig>,
    mut sounds: EventWriter<SoundCommand>,
) {
    commands.spawn((
        Camera2dBundle {
            camera: Camera {
                order: 1,
                ..default()
            },
            camera_2d: Camera2d {
                clear_color: ClearColorConfig::None,
            },
            projection: OrthographicProjection {
                scaling_mode: ScalingMode::FixedVertical(config.view_height),
                ..default()
            },
            ..default()
        },
        OverlayCamera,
    ));

    let font: Handle<Font> = asset_server.load(config.font.as_deref().unwrap_or(DEFAULT_FONT));

    let screen_fade = commands
        .spawn((quad(Vec2::splat(200.0), START_DIM, Vec3::new(0.0, 0.0, FADE_Z)), MenuAnim::default()))
        .id();

    // start menu, on screen from the beginning
    let title = commands
        .spawn(element(TITLE.shown))
        .with_children(|title| {
            title.spawn(label(&font, "PIXEL RUNNER", 1.2, Color::rgb(1.0, 0.85, 0.3)));
            // behind the title, swung around by swing_drop_shadows
            title
                .spawn(label(&font, "PIXEL RUNNER", 1.2, Color::rgba(0.0, 0.0, 0.0, 0.6)))
                .insert((
                    Transform {
                        translation: Vec3::new(0.0, -0.08, -0.1),
                        scale: Vec3::splat(1.2 / FONT_SIZE),
                        ..default()
                    },
                    DropShadow {
                        radius: 0.08,
                        ..default()
                    },
                ));
        })
        .id();
    let player_image = commands
        .spawn(element(PLAYER_IMAGE.shown))
        .with_children(|image| {
            image.spawn(quad(Vec2::splat(2.0), Color::rgb(0.95, 0.45, 0.2), Vec3::ZERO));
            image.spawn(quad(Vec2::splat(0.4), Color::WHITE, Vec3::new(0.4, 0.4, 0.1)));
        })
        .id();
    let tap_to_start = commands
        .spawn(element(TAP_TO_START.shown))
        .insert(MenuItem::new(
            Vec2::new(40.0, 9.0),
            MenuAction::StartPressed,
            GameState::Title,
        ))
        .with_children(|prompt| {
            prompt
                .spawn(label(&font, "TAP TO START", 0.6, Color::WHITE))
                .insert(Blink::default());
        })
        .id();

    // pause menu
    let paused_text = commands
        .spawn(element(PAUSED_TEXT.hidden))
        .with_children(|text| {
            text.spawn(label(&font, "PAUSED", 1.0, Color::WHITE));
        })
        .id();
    let tap_to_resume = commands
        .spawn(element(TAP_TO_RESUME.hidden))
        .insert(MenuItem::new(
            Vec2::new(40.0, 12.0),
            MenuAction::Resume,
            GameState::Paused,
        ))
        .with_children(|prompt| {
            prompt.spawn(label(&font, "TAP TO RESUME", 0.5, Color::WHITE));
        })
        .id();

    // finish menu
    let game_over_text = commands
        .spawn(element(GAME_OVER_TEXT.hidden))
        .with_children(|text| {
            text.spawn(label(&font, "GAME OVER", 1.0, Color::rgb(1.0, 0.3, 0.3)));
        })
        .id();
    let placed = |bundle: Text2dBundle, x: f32, y: f32, height: f32| Text2dBundle {
        transform: Transform {
            translation: Vec3::new(x, y, 0.0),
            scale: Vec3::splat(height / FONT_SIZE),
            ..default()
        },
        ..bundle
    };
    let distance_label = commands
        .spawn(placed(label(&font, "DISTANCE", 0.35, Color::WHITE), -1.35, 0.0, 0.35))
        .id();
    let best_label = commands
        .spawn(placed(label(&font, "BEST", 0.35, Color::WHITE), 1.35, 0.0, 0.35))
        .id();
    let last_score_text = commands
        .spawn(placed(label(&font, "0m", 0.5, Color::WHITE), -1.35, -0.5, 0.5))
        .id();
    let best_score_text = commands
        .spawn(placed(
            label(&font, "0m", 0.5, Color::rgb(1.0, 0.85, 0.3)),
            1.35,
            -0.5,
            0.5,
        ))
        .id();
    let score = commands
        .spawn(element(SCORE.hidden))
        .push_children(&[distance_label, best_label, last_score_text, best_score_text])
        .id();
    let exit_button = commands
        .spawn(element(EXIT_BUTTON.hidden))
        .insert(MenuItem::new(
            Vec2::new(2.4, 1.0),
            MenuAction::BackToMenu,
            GameState::GameOver,
        ))
        .with_children(|b| button(b, &font, "MENU", Color::rgb(0.3, 0.3, 0.45)))
        .id();
    let restart_button = commands
        .spawn(element(RESTART_BUTTON.hidden))
        .insert(MenuItem::new(
            Vec2::new(2.4, 1.0),
            MenuAction::Restart,
            GameState::GameOver,
        ))
        .with_children(|b| button(b, &font, "RETRY", Color::rgb(0.2, 0.55, 0.3)))
        .id();

    // hud, placed by update_hud
    commands
        .spawn((
            SpatialBundle {
                transform: Transform::from_xyz(0.0, 0.0, MENU_Z),
                visibility: Visibility::Hidden,
                ..default()
            },
            PauseButton,
            MenuItem::new(Vec2::splat(1.0), MenuAction::Pause, GameState::Playing),
        ))
        .with_children(|icon| {
            let bar = Vec2::new(0.15, 0.5);
            icon.spawn(quad(Vec2::splat(0.8), Color::rgba(0.0, 0.0, 0.0, 0.4), Vec3::ZERO));
            icon.spawn(quad(bar, Color::WHITE, Vec3::new(-0.12, 0.0, 0.1)));
            icon.spawn(quad(bar, Color::WHITE, Vec3::new(0.12, 0.0, 0.1)));
        });
    commands
        .spawn(label(&font, "0m", 0.5, Color::WHITE))
        .insert((DistanceReadout, Visibility::Hidden));

    commands.insert_resource(MenuEntities {
        screen_fade,
        title,
        player_image,
        tap_to_start,
        paused_text,
        tap_to_resume,
        game_over_text,
        score,
        exit_button,
        restart_button,
        last_score_text,
        best_score_text,
    });

    sounds.send(SoundCommand::music("Intro"));
}

fn move_to(anims: &mut Query<&mut MenuAnim>, entity: Entity, to: Vec2, duration: f32, delay: f32) {
    if let Ok(mut anim) = anims.get_mut(entity) {
        anim.push(Tween::move_to(to.extend(MENU_Z), duration, delay));
    }
}

fn fade_to(anims: &mut Query<&mut MenuAnim>, entity: Entity, to: Color, duration: f32, delay: f32) {
    if let Ok(mut anim) = anims.get_mut(entity) {
        anim.push(Tween::fade_to(to, duration, delay));
    }
}

fn activate_menus(
    mut requests: EventReader<ActivateMenu>,
    menus: Res<MenuEntities>,
    scores: Res<Scores>,
    mut anims: Query<&mut MenuAnim>,
    mut texts: Query<&mut Text>,
    mut sounds: EventWriter<SoundCommand>,
) {
    for request in requests.iter() {
        match request {
            ActivateMenu::Start => {
                sounds.send(SoundCommand::music("Intro"));
                move_to(&mut anims, menus.title, TITLE.shown, 0.5, 0.0);
                move_to(&mut anims, menus.player_image, PLAYER_IMAGE.shown, 0.5, 0.0);
                move_to(&mut anims, menus.tap_to_start, TAP_TO_START.shown, 0.3, 0.5);
                fade_to(&mut anims, menus.screen_fade, START_DIM, 0.3, 0.2);
            }
            ActivateMenu::Pause => {
                move_to(&mut anims, menus.paused_text, PAUSED_TEXT.shown, 0.4, 0.0);
                move_to(&mut anims, menus.tap_to_resume, TAP_TO_RESUME.shown, 0.4, 0.0);
                fade_to(&mut anims, menus.screen_fade, MENU_DIM, 0.3, 0.0);
                sounds.send(SoundCommand::PauseMusic { fade: 0.5 });
            }
            ActivateMenu::Finish => {
                for (entity, value) in [
                    (menus.last_score_text, scores.last),
                    (menus.best_score_text, scores.best),
                ] {
                    if let Ok(mut text) = texts.get_mut(entity) {
                        text.sections[0].value = format!("{}m", value);
                    }
                }

                fade_to(&mut anims, menus.screen_fade, MENU_DIM, 0.3, 0.0);
                move_to(&mut anims, menus.game_over_text, GAME_OVER_TEXT.shown, 0.4, 0.0);
                move_to(&mut anims, menus.score, SCORE.shown, 0.4, 0.1);
                move_to(&mut anims, menus.exit_button, EXIT_BUTTON.shown, 0.4, 0.3);
                move_to(&mut anims, menus.restart_button, RESTART_BUTTON.shown, 0.4, 0.3);
                sounds.send(SoundCommand::PauseMusic { fade: 0.5 });
            }
        }
    }
}

fn hide_finish_menu(anims: &mut Query<&mut MenuAnim>, menus: &MenuEntities) {
    move_to(anims, menus.game_over_text, GAME_OVER_TEXT.hidden, 0.4, 0.1);
    move_to(anims, menus.score, SCORE.hidden, 0.4, 0.1);
    move_to(anims, menus.exit_button, EXIT_BUTTON.hidden, 0.4, 0.0);
    move_to(anims, menus.restart_button, RESTART_BUTTON.hidden, 0.4, 0.0);
    fade_to(anims, menus.screen_fade, Color::BLACK, 0.3, 0.1);
}

#[allow(clippy::too_many_arguments)]
fn handle_menu_actions(
    mut actions: EventReader<MenuAction>,
    state: Res<State<GameState>>,
    menus: Res<MenuEntities>,
    mut anims: Query<&mut MenuAnim>,
    mut next_state: ResMut<NextState<GameState>>,
    mut scheduled: ResMut<ScheduledCommands>,
    mut game_commands: EventWriter<GameCommand>,
    mut activate: EventWriter<ActivateMenu>,
    mut sounds: EventWriter<SoundCommand>,
) {
    for action in actions.iter() {
        match (action, state.0) {
            (MenuAction::StartPressed, GameState::Title) => {
                move_to(&mut anims, menus.title, TITLE.hidden, 0.5, 0.0);
                move_to(&mut anims, menus.player_image, PLAYER_IMAGE.hidden, 0.5, 0.0);
                move_to(&mut anims, menus.tap_to_start, TAP_TO_START.hidden, 0.3, 0.0);
                fade_to(&mut anims, menus.screen_fade, Color::NONE, 0.3, 0.2);
                game_commands.send(GameCommand::Restart);
            }
            (MenuAction::Pause, GameState::Playing) => {
                next_state.set(GameState::Paused);
                activate.send(ActivateMenu::Pause);
            }
            (MenuAction::Resume, GameState::Paused) => {
                move_to(&mut anims, menus.paused_text, PAUSED_TEXT.hidden, 0.3, 0.0);
                move_to(&mut anims, menus.tap_to_resume, TAP_TO_RESUME.hidden, 0.3, 0.0);
                fade_to(&mut anims, menus.screen_fade, Color::NONE, 0.3, 0.1);
                sounds.send(SoundCommand::UnpauseMusic);
                next_state.set(GameState::Playing);
            }
            (MenuAction::Restart, GameState::GameOver) => {
                hide_finish_menu(&mut anims, &menus);
                scheduled.invoke(GameCommand::Restart, MENU_SWITCH_DELAY);
                // back in once the new run has started
                fade_to(&mut anims, menus.screen_fade, Color::NONE, 0.3, MENU_SWITCH_DELAY);
            }
            (MenuAction::BackToMenu, GameState::GameOver) => {
                hide_finish_menu(&mut anims, &menus);
                scheduled.invoke(GameCommand::ShowTitleScreen, MENU_SWITCH_DELAY);
            }
            (action, state) => debug!("Ignoring {:?} in {:?}", action, state),
        }
    }
}

fn update_hud(
    state: Res<State<GameState>>,
    bounds: Res<ScreenBounds>,
    level: Option<Res<Level>>,
    mut pause_button: Query<(&mut Transform, &mut Visibility), With<PauseButton>>,
    mut readout: Query<
        (&mut Text, &mut Transform, &mut Visibility),
        (With<DistanceReadout>, Without<PauseButton>),
    >,
) {
    let playing = state.0 == GameState::Playing;

    for (mut transform, mut visibility) in &mut pause_button {
        transform.translation.x = bounds.right - 0.5;
        transform.translation.y = bounds.top - 0.5;
        *visibility = if playing {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }

    let show_distance = matches!(state.0, GameState::Playing | GameState::Paused);
    for (mut text, mut transform, mut visibility) in &mut readout {
        transform.translation = Vec3::new(0.0, bounds.top - 0.5, MENU_Z);
        *visibility = if show_distance {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        if let Some(level) = &level {
            let value = format!("{}m", level.in_progress_score());
            if text.sections[0].value != value {
                text.sections[0].value = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(size: Vec2, action: MenuAction, active_in: GameState) -> MenuItem {
        MenuItem::new(size, action, active_in)
    }

    #[test]
    fn hit_box_is_centred() {
        let item = item(Vec2::new(2.4, 1.0), MenuAction::Restart, GameState::GameOver);
        let center = Vec2::new(1.35, -1.5);
        assert!(item.contains(center, Vec2::new(0.2, -1.1)));
        assert!(item.contains(center, Vec2::new(2.5, -1.9)));
        assert!(!item.contains(center, Vec2::new(0.1, -1.5)));
        assert!(!item.contains(center, Vec2::new(1.35, -0.9)));
    }

    #[test]
    fn hit_test_respects_state() {
        let restart = item(Vec2::new(2.4, 1.0), MenuAction::Restart, GameState::GameOver);
        let at = GlobalTransform::from_translation(Vec3::new(1.35, -1.5, MENU_Z));
        let point = Vec2::new(1.35, -1.5);

        assert!(hit_menu_item(point, GameState::Playing, [(&restart, &at)]).is_none());
        let hit = hit_menu_item(point, GameState::GameOver, [(&restart, &at)]);
        assert_eq!(hit.map(|item| item.action), Some(MenuAction::Restart));
    }

    #[test]
    fn hit_test_picks_topmost() {
        let backdrop = item(Vec2::new(40.0, 12.0), MenuAction::Resume, GameState::Paused);
        let small = item(Vec2::splat(1.0), MenuAction::BackToMenu, GameState::Paused);
        let low = GlobalTransform::from_translation(Vec3::new(0.0, 0.0, 1.0));
        let high = GlobalTransform::from_translation(Vec3::new(0.0, 0.0, 2.0));

        let hit = hit_menu_item(Vec2::ZERO, GameState::Paused, [(&backdrop, &low), (&small, &high)]);
        assert_eq!(hit.map(|item| item.action), Some(MenuAction::BackToMenu));

        let hit = hit_menu_item(Vec2::new(3.0, 0.0), GameState::Paused, [(&backdrop, &low), (&small, &high)]);
        assert_eq!(hit.map(|item| item.action), Some(MenuAction::Resume));
    }

    #[test]
    fn menu_items_play_select() {
        let item = item(Vec2::ONE, MenuAction::Pause, GameState::Playing);
        assert_eq!(item.sfx.as_deref(), Some(SELECT_SFX));
    }
}
