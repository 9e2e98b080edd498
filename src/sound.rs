//! Named sound effects and a single looping music channel.

use crate::config::GameConfig;
use bevy::prelude::*;
use std::collections::HashMap;

pub struct SoundPlugin;

impl Plugin for SoundPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<SoundCommand>()
            .init_resource::<MusicChannel>()
            .add_startup_system(load_sounds)
            .add_systems((play_sounds, fade_music).chain());
    }
}

/// Requests for the sound manager. Anything may send these.
#[derive(Debug, Clone, PartialEq)]
pub enum SoundCommand {
    Sfx(String),
    /// Starts a track from the beginning at full volume, looping.
    Music(String),
    /// Pauses the music, fading out over `fade` seconds first if positive.
    PauseMusic { fade: f32 },
    UnpauseMusic,
}

impl SoundCommand {
    pub fn sfx(name: impl Into<String>) -> Self {
        Self::Sfx(name.into())
    }

    pub fn music(name: impl Into<String>) -> Self {
        Self::Music(name.into())
    }
}

#[derive(Resource, Debug, Default)]
pub struct SoundLibrary {
    sfx: HashMap<String, Handle<AudioSource>>,
    music: HashMap<String, Handle<AudioSource>>,
}

#[derive(Debug)]
struct MusicFade {
    timer: Timer,
    start_volume: f32,
}

impl MusicFade {
    fn volume(&self) -> f32 {
        (1.0 - self.timer.percent()) * self.start_volume
    }
}

#[derive(Resource, Debug, Default)]
pub struct MusicChannel {
    sink: Option<Handle<AudioSink>>,
    fade: Option<MusicFade>,
}

fn load_sounds(mut commands: Commands, asset_server: Res<AssetServer>, config: Res<GameConfig>) {
    let load_all = |clips: &std::collections::BTreeMap<String, String>| {
        clips
            .iter()
            .map(|(name, path)| (name.clone(), asset_server.load(path.as_str())))
            .collect::<HashMap<_, _>>()
    };

    let library = SoundLibrary {
        sfx: load_all(&config.sounds.sfx),
        music: load_all(&config.sounds.music),
    };
    info!(
        "Loaded {} sound effects and {} music tracks",
        library.sfx.len(),
        library.music.len()
    );
    commands.insert_resource(library);
}

fn play_sounds(
    mut commands: EventReader<SoundCommand>,
    library: Res<SoundLibrary>,
    audio: Res<Audio>,
    audio_sinks: Res<Assets<AudioSink>>,
    mut channel: ResMut<MusicChannel>,
) {
    for command in commands.iter() {
        match command {
            SoundCommand::Sfx(name) => match library.sfx.get(name) {
                Some(clip) => {
                    audio.play(clip.clone());
                }
                None => warn!("No sound clip found with name {}", name),
            },
            SoundCommand::Music(name) => {
                let Some(track) = library.music.get(name) else {
                    warn!("No sound clip found with name {}", name);
                    continue;
                };
                if let Some(sink) = channel.sink.as_ref().and_then(|handle| audio_sinks.get(handle)) {
                    sink.stop();
                }
                let sink = audio.play_with_settings(track.clone(), PlaybackSettings::LOOP.with_volume(1.0));
                channel.sink = Some(audio_sinks.get_handle(sink));
                channel.fade = None;
            }
            SoundCommand::PauseMusic { fade } => {
                let Some(sink) = channel.sink.as_ref().and_then(|handle| audio_sinks.get(handle)) else {
                    continue;
                };
                if *fade > 0.0 {
                    let start_volume = sink.volume();
                    channel.fade = Some(MusicFade {
                        timer: Timer::from_seconds(*fade, TimerMode::Once),
                        start_volume,
                    });
                } else {
                    channel.fade = None;
                    sink.pause();
                }
            }
            SoundCommand::UnpauseMusic => {
                channel.fade = None;
                if let Some(sink) = channel.sink.as_ref().and_then(|handle| audio_sinks.get(handle)) {
                    sink.set_volume(1.0);
                    sink.play();
                }
            }
        }
    }
}

fn fade_music(time: Res<Time>, audio_sinks: Res<Assets<AudioSink>>, mut channel: ResMut<MusicChannel>) {
    let MusicChannel { sink, fade } = &mut *channel;
    let Some(sink) = sink.as_ref().and_then(|handle| audio_sinks.get(handle)) else {
        *fade = None;
        return;
    };
    let Some(active) = fade.as_mut() else {
        return;
    };

    active.timer.tick(time.delta());
    if active.timer.finished() {
        sink.pause();
        *fade = None;
    } else {
        sink.set_volume(active.volume());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fade_is_linear_from_start_volume() {
        let mut fade = MusicFade {
            timer: Timer::from_seconds(0.5, TimerMode::Once),
            start_volume: 0.8,
        };
        assert!((fade.volume() - 0.8).abs() < 1e-6);

        fade.timer.tick(Duration::from_secs_f32(0.25));
        assert!((fade.volume() - 0.4).abs() < 1e-4);

        fade.timer.tick(Duration::from_secs_f32(0.5));
        assert!(fade.volume().abs() < 1e-6);
    }
}
