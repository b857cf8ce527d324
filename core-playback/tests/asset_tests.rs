//! Asset engine tests against local sources.
//!
//! Time is paused so fade and ticker intervals advance deterministically.

mod common;

use common::*;
use core_playback::{
    AssetOptions, AssetSource, Lifecycle, PlayOptions, PlaybackConfig, PlaybackError,
};
use core_runtime::events::PlaybackEvent;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_play_rotates_channels_round_robin() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let asset = context
        .preload(
            "beep",
            AssetSource::local(scratch.sound_file()),
            AssetOptions::default().with_channels(3),
        )
        .await
        .unwrap();

    assert_eq!(asset.channel_count().await.unwrap(), 3);

    let expected = [vec![1, 0, 0], vec![1, 1, 0], vec![1, 1, 1], vec![2, 1, 1]];
    for plays in expected {
        asset.play().await.unwrap();
        assert_eq!(factory.plays(), plays);
    }
}

#[tokio::test(start_paused = true)]
async fn test_pool_queries_return_neutral_defaults() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let asset = context
        .preload(
            "pool",
            AssetSource::local(scratch.sound_file()),
            AssetOptions::default().with_channels(2),
        )
        .await
        .unwrap();

    asset.play().await.unwrap();

    assert_eq!(asset.volume().await.unwrap(), 0.0);
    assert_eq!(asset.duration().await.unwrap(), 0.0);
    assert_eq!(asset.current_position().await.unwrap(), 0.0);
    assert!(!asset.is_playing().await.unwrap());
    asset.set_current_position(3.0).await.unwrap();
    assert!(factory.recorder(0).lock().unwrap().seeks.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_play_applies_time_and_volume() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let asset = context
        .preload("voice", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    asset
        .play_with(PlayOptions::new().at(2.0).with_volume(0.4))
        .await
        .unwrap();

    let recorder = factory.recorder(0);
    let state = recorder.lock().unwrap();
    assert_eq!(state.seeks, vec![Duration::from_secs(2)]);
    assert_eq!(state.volume, 0.4);
    assert!(state.playing);
    assert!(!state.looping);
}

#[tokio::test(start_paused = true)]
async fn test_loop_sets_repeat_on_claimed_channel() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let asset = context
        .preload(
            "music",
            AssetSource::local(scratch.sound_file()),
            AssetOptions::default().with_channels(2),
        )
        .await
        .unwrap();

    asset.loop_play().await.unwrap();

    assert!(factory.recorder(0).lock().unwrap().looping);
    assert!(!factory.recorder(1).lock().unwrap().looping);
}

#[tokio::test(start_paused = true)]
async fn test_fade_in_reaches_target_after_expected_ticks() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let asset = context
        .preload(
            "music",
            AssetSource::local(scratch.sound_file()),
            AssetOptions::default().with_volume(0.8),
        )
        .await
        .unwrap();

    asset
        .play_with(PlayOptions::new().with_fade_in(Duration::from_secs(1)))
        .await
        .unwrap();
    sleep_ms(2000).await;

    let volumes = factory.recorder(0).lock().unwrap().volumes.clone();
    // Initial volume, silence at start, then ceil(1000 / 80) = 13 steps
    assert_eq!(volumes.len(), 15);
    assert_eq!(volumes[1], 0.0);
    assert_eq!(*volumes.last().unwrap(), 0.8);
    assert!(volumes[1..].windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test(start_paused = true)]
async fn test_pause_cancels_running_fade() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let asset = context
        .preload("music", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    asset
        .play_with(PlayOptions::new().with_fade_in(Duration::from_secs(1)))
        .await
        .unwrap();
    sleep_ms(200).await;

    assert!(asset.pause().await.unwrap());
    let written = factory.recorder(0).lock().unwrap().volumes.len();
    assert!(written < 15);

    sleep_ms(1000).await;
    assert_eq!(factory.recorder(0).lock().unwrap().volumes.len(), written);
    assert_eq!(asset.state().await.unwrap(), Lifecycle::Paused);
}

#[tokio::test(start_paused = true)]
async fn test_new_fade_replaces_running_fade() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let asset = context
        .preload("music", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    asset
        .play_with(PlayOptions::new().with_fade_in(Duration::from_secs(2)))
        .await
        .unwrap();
    sleep_ms(300).await;
    asset
        .set_volume_with_fade(0.3, Duration::from_millis(400))
        .await
        .unwrap();
    sleep_ms(3000).await;

    // The fade-in never resumes once replaced
    assert_eq!(factory.recorder(0).lock().unwrap().volume, 0.3);
}

#[tokio::test(start_paused = true)]
async fn test_fade_to_lands_exactly_on_target() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let asset = context
        .preload("music", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    asset.play().await.unwrap();
    asset
        .set_volume_with_fade(0.25, Duration::from_millis(800))
        .await
        .unwrap();
    sleep_ms(1500).await;

    let volumes = factory.recorder(0).lock().unwrap().volumes.clone();
    // Initial volume, then ceil(800 / 80) = 10 steps
    assert_eq!(volumes.len(), 11);
    assert!(volumes.windows(2).all(|pair| pair[0] >= pair[1]));
    assert_eq!(*volumes.last().unwrap(), 0.25);
    assert_eq!(asset.volume().await.unwrap(), 0.25);
}

#[tokio::test(start_paused = true)]
async fn test_volume_fade_on_pool_applies_immediately() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let asset = context
        .preload(
            "pool",
            AssetSource::local(scratch.sound_file()),
            AssetOptions::default().with_channels(2),
        )
        .await
        .unwrap();

    asset.play().await.unwrap();
    asset
        .set_volume_with_fade(0.5, Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(factory.recorder(0).lock().unwrap().volume, 0.5);
    assert_eq!(factory.recorder(1).lock().unwrap().volume, 0.5);
}

#[tokio::test(start_paused = true)]
async fn test_set_volume_and_rate_clamp() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let asset = context
        .preload("voice", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    asset.set_volume(3.0).await.unwrap();
    assert_eq!(asset.volume().await.unwrap(), 1.0);

    asset.set_rate(10.0).await.unwrap();
    assert_eq!(factory.recorder(0).lock().unwrap().rate, 4.0);
    asset.set_rate(0.1).await.unwrap();
    assert_eq!(factory.recorder(0).lock().unwrap().rate, 0.25);
}

#[tokio::test(start_paused = true)]
async fn test_natural_end_completes_once() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let mut events = context.events().subscribe();
    let asset = context
        .preload("beep", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    asset.play().await.unwrap();
    sleep_ms(250).await;
    factory.recorder(0).lock().unwrap().playing = false;
    sleep_ms(500).await;

    asset.stop().await.unwrap();
    let events = drain(&mut events);
    assert_eq!(completions(&events), 1);
    assert_eq!(asset.state().await.unwrap(), Lifecycle::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_pause_never_completes() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let mut events = context.events().subscribe();
    let asset = context
        .preload("beep", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    asset.play().await.unwrap();
    sleep_ms(250).await;
    asset.pause().await.unwrap();
    sleep_ms(1000).await;

    assert_eq!(completions(&drain(&mut events)), 0);

    // Stopping the paused cycle completes it exactly once
    asset.stop().await.unwrap();
    asset.stop().await.unwrap();
    assert_eq!(completions(&drain(&mut events)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_each_play_cycle_completes_once() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let mut events = context.events().subscribe();
    let asset = context
        .preload("beep", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    for _ in 0..3 {
        asset.play().await.unwrap();
        sleep_ms(150).await;
        asset.stop().await.unwrap();
    }

    assert_eq!(completions(&drain(&mut events)), 3);
}

#[tokio::test(start_paused = true)]
async fn test_resume_after_stop_completes_again() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let mut events = context.events().subscribe();
    let asset = context
        .preload("music", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    asset.play().await.unwrap();
    asset.stop().await.unwrap();
    assert_eq!(completions(&drain(&mut events)), 1);

    asset.resume().await.unwrap();
    assert!(asset.is_playing().await.unwrap());
    sleep_ms(150).await;
    factory.recorder(0).lock().unwrap().playing = false;
    sleep_ms(500).await;

    assert_eq!(completions(&drain(&mut events)), 1);
    assert_eq!(asset.state().await.unwrap(), Lifecycle::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_position_reports_round_to_tenth() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let mut events = context.events().subscribe();
    let asset = context
        .preload("music", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    asset.play().await.unwrap();
    factory.recorder(0).lock().unwrap().position = Duration::from_millis(1260);
    sleep_ms(350).await;

    let reported = positions(&drain(&mut events));
    assert!(!reported.is_empty());
    assert!(reported.iter().all(|seconds| *seconds == 1.3));
}

#[tokio::test(start_paused = true)]
async fn test_seek_round_trip_and_clamping() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let asset = context
        .preload("music", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    assert_eq!(asset.duration().await.unwrap(), 10.0);

    asset.set_current_position(2.5).await.unwrap();
    assert_eq!(asset.current_position().await.unwrap(), 2.5);

    asset.set_current_position(99.0).await.unwrap();
    assert_eq!(asset.current_position().await.unwrap(), 10.0);

    let err = asset.set_current_position(-1.0).await.unwrap_err();
    assert!(matches!(err, PlaybackError::InvalidSeekTarget(_)));
    let err = asset.set_current_position(f64::NAN).await.unwrap_err();
    assert!(matches!(err, PlaybackError::InvalidSeekTarget(_)));
}

#[tokio::test(start_paused = true)]
async fn test_stop_with_fade_completes_after_ramp() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let config = PlaybackConfig::default().with_fade_on_stop(Duration::from_millis(400));
    let context = context_with(&factory, config);
    let mut events = context.events().subscribe();
    let asset = context
        .preload("music", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    asset.play().await.unwrap();
    asset.stop().await.unwrap();
    assert!(asset.is_playing().await.unwrap());

    sleep_ms(800).await;

    let recorder = factory.recorder(0);
    assert!(!recorder.lock().unwrap().playing);
    assert_eq!(recorder.lock().unwrap().volume, 0.0);
    assert_eq!(completions(&drain(&mut events)), 1);
    assert_eq!(asset.state().await.unwrap(), Lifecycle::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_pause_with_fade_pauses_without_completion() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let mut events = context.events().subscribe();
    let asset = context
        .preload("music", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    asset.play().await.unwrap();
    assert!(asset
        .pause_with_fade(Duration::from_millis(400))
        .await
        .unwrap());
    sleep_ms(800).await;

    assert_eq!(asset.state().await.unwrap(), Lifecycle::Paused);
    assert_eq!(completions(&drain(&mut events)), 0);

    asset.resume().await.unwrap();
    assert!(asset.is_playing().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_delayed_start_runs_after_delay() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let asset = context
        .preload("beep", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    asset
        .play_with(PlayOptions::new().with_delay(Duration::from_millis(300)))
        .await
        .unwrap();
    sleep_ms(100).await;
    assert_eq!(factory.plays(), vec![0]);

    sleep_ms(400).await;
    assert_eq!(factory.plays(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_pause_cancels_delayed_start() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let asset = context
        .preload("beep", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    asset
        .play_with(PlayOptions::new().with_delay(Duration::from_millis(500)))
        .await
        .unwrap();
    sleep_ms(100).await;
    assert!(!asset.pause().await.unwrap());

    sleep_ms(1000).await;
    assert_eq!(factory.plays(), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn test_unload_releases_channels_and_stops_ticks() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let mut events = context.events().subscribe();
    let asset = context
        .preload(
            "music",
            AssetSource::local(scratch.sound_file()),
            AssetOptions::default().with_channels(2),
        )
        .await
        .unwrap();

    asset.play().await.unwrap();
    sleep_ms(250).await;
    asset.unload().await.unwrap();
    drain(&mut events);

    sleep_ms(1000).await;
    assert!(drain(&mut events).is_empty());
    assert!(factory.recorder(0).lock().unwrap().released);
    assert!(factory.recorder(1).lock().unwrap().released);
    assert!(!context.contains("music").await.unwrap());

    let err = asset.play().await.unwrap_err();
    assert!(matches!(err, PlaybackError::NoUnderlyingPlayer(_)));
    asset.unload().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_play_once_unloads_itself_after_completion() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let mut events = context.events().subscribe();
    let path = scratch.sound_file();

    let asset = context
        .play_once(
            "ding",
            AssetSource::local(&path),
            AssetOptions::default().with_delete_after_play(true),
            PlayOptions::default(),
        )
        .await
        .unwrap();
    assert!(asset.is_playing().await.unwrap());

    sleep_ms(150).await;
    factory.recorder(0).lock().unwrap().playing = false;
    sleep_ms(300).await;

    assert_eq!(completions(&drain(&mut events)), 1);
    assert!(!context.contains("ding").await.unwrap());
    assert!(factory.recorder(0).lock().unwrap().released);
    assert!(!path.exists());
}

#[tokio::test(start_paused = true)]
async fn test_preload_failures() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);

    let err = context
        .preload(
            "ghost",
            AssetSource::local(scratch.path("missing.wav")),
            AssetOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PlaybackError::PreparationFailed { .. }));

    let path = scratch.sound_file();
    context
        .preload("dup", AssetSource::local(&path), AssetOptions::default())
        .await
        .unwrap();
    let err = context
        .preload("dup", AssetSource::local(&path), AssetOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PlaybackError::AssetAlreadyLoaded(_)));

    factory.fail_next_opens(1);
    let err = context
        .preload(
            "broken",
            AssetSource::local(&path),
            AssetOptions::default().with_channels(3),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PlaybackError::PreparationFailed { .. }));
    assert!(!context.contains("broken").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_local_driver_error_is_not_recoverable() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let mut events = context.events().subscribe();
    let asset = context
        .preload("beep", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    factory.sink(0).emit(bridge_traits::DriverEvent::Error {
        message: "device lost".into(),
    });
    asset.state().await.unwrap();

    let events = drain(&mut events);
    assert!(events.contains(&PlaybackEvent::Error {
        asset_id: "beep".into(),
        message: "device lost".into(),
        recoverable: false,
    }));
    assert_eq!(factory.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_handles() {
    let scratch = Scratch::new();
    let factory = FakeFactory::ready();
    let context = context(&factory);
    let asset = context
        .preload("beep", AssetSource::local(scratch.sound_file()), AssetOptions::default())
        .await
        .unwrap();

    assert_eq!(context.shutdown().await.unwrap(), 1);
    assert!(factory.recorder(0).lock().unwrap().released);
    let err = asset.play().await.unwrap_err();
    assert!(matches!(err, PlaybackError::ContextClosed));
}

#[test]
fn test_unload_blocking_outside_runtime() {
    let scratch = Scratch::new();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let factory = FakeFactory::ready();

    let (context, asset) = runtime.block_on(async {
        let context = context(&factory);
        let asset = context
            .preload("beep", AssetSource::local(scratch.sound_file()), AssetOptions::default())
            .await
            .unwrap();
        (context, asset)
    });

    asset.unload_blocking().unwrap();
    assert!(factory.recorder(0).lock().unwrap().released);
    assert!(!runtime.block_on(context.contains("beep")).unwrap());
}
