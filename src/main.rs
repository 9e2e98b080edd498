mod anim;
mod config;
mod game;
mod layout;
mod level;
mod menu;
mod player;
mod save;
mod scenery;
mod sound;

use crate::anim::AnimPlugin;
use crate::config::{GameConfig, CONFIG_PATH};
use crate::game::GamePlugin;
use crate::layout::SceneryLayout;
use crate::level::LevelPlugin;
use crate::menu::MenuPlugin;
use crate::player::PlayerPlugin;
use crate::sound::SoundPlugin;
use bevy::prelude::*;
use bevy::window::WindowResolution;
use bevy_rapier3d::prelude::*;
use bevy_tnua::{TnuaPlatformerPlugin, TnuaRapier3dPlugin};

fn main() {
    // the logger only exists once the app runs, so problems are reported from a startup system
    let mut problems = Vec::new();

    let config = GameConfig::load_or_default(CONFIG_PATH).unwrap_or_else(|err| {
        problems.push(format!("Using default settings, {}: {}", CONFIG_PATH, err));
        GameConfig::default()
    });

    let layout = SceneryLayout::load(&config.layout_path)
        .or_else(|err| {
            problems.push(format!(
                "Using the built-in scenery, {}: {}",
                config.layout_path, err
            ));
            SceneryLayout::builtin()
        })
        .unwrap_or_else(|err| {
            problems.push(format!("Built-in scenery is broken: {}", err));
            SceneryLayout::default()
        });

    let mut app = App::new();
    app.add_plugins(
        DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: config.window_title.clone(),
                    resolution: WindowResolution::new(1280.0, 720.0),
                    ..default()
                }),
                ..default()
            })
            .set(ImagePlugin::default_nearest()),
    )
    .add_plugin(RapierPhysicsPlugin::<NoUserData>::default());

    if config.debug_render {
        app.add_plugin(RapierDebugRenderPlugin::default());
    }

    app.add_plugin(TnuaRapier3dPlugin)
        .add_plugin(TnuaPlatformerPlugin)
        .insert_resource(config)
        .insert_resource(layout)
        .add_startup_system(move || {
            for problem in &problems {
                warn!("{}", problem);
            }
        })
        .add_plugin(GamePlugin)
        .add_plugin(SoundPlugin)
        .add_plugin(LevelPlugin)
        .add_plugin(PlayerPlugin)
        .add_plugin(MenuPlugin)
        .add_plugin(AnimPlugin)
        .run();
}
