//! Playback integration tests
//!
//! Drive a player over the silent backend the way the application does:
//! speech events travel through a channel and are handed back to the
//! player one at a time.

use std::sync::mpsc::{self, Receiver};
use storyteller::speech::{
    EventSink, PlaybackState, PlaybackUpdate, Player, SilentSynth, SynthEvent, SynthLogHandle,
    VoiceDescriptor,
};

fn player(auto_complete: bool) -> (Player, SynthLogHandle, Receiver<SynthEvent>) {
    let (tx, rx) = mpsc::channel::<SynthEvent>();
    let synth = SilentSynth::new(EventSink::from_sender(tx))
        .auto_complete(auto_complete)
        .with_voices(vec![
            VoiceDescriptor::new("en-us", "English (America)", "en-US"),
            VoiceDescriptor::new("fr", "French", "fr-FR"),
        ]);
    let log = synth.log();
    let mut player = Player::new(Box::new(synth));
    player.refresh_voices().unwrap();
    (player, log, rx)
}

/// Feed queued events back to the player until the channel is empty
fn drain(player: &mut Player, rx: &Receiver<SynthEvent>) -> Vec<PlaybackUpdate> {
    let mut updates = Vec::new();
    while let Ok(event) = rx.try_recv() {
        updates.push(player.handle_event(event).unwrap());
    }
    updates
}

#[test]
fn test_reads_every_paragraph_in_order() {
    let (mut player, log, rx) = player(true);
    player
        .load_story("The fox woke.\n\nIt was hungry.\n   \nIt went hunting.\n")
        .unwrap();
    player.play().unwrap();

    let updates = drain(&mut player, &rx);
    assert_eq!(
        updates,
        vec![
            PlaybackUpdate::Advanced(1),
            PlaybackUpdate::Advanced(2),
            PlaybackUpdate::Finished
        ]
    );
    assert_eq!(
        log.texts(),
        vec!["The fox woke.", "It was hungry.", "It went hunting."]
    );
    assert_eq!(player.state(), PlaybackState::Idle);
    assert_eq!(player.cursor(), 0);
}

#[test]
fn test_stop_discards_late_completion() {
    let (mut player, log, rx) = player(false);
    player.load_story("One.\nTwo.\nThree.").unwrap();
    player.play().unwrap();
    let generation = log.last().unwrap().generation;

    player.stop().unwrap();
    assert_eq!(player.state(), PlaybackState::Idle);
    assert_eq!(player.cursor(), 0);

    // The platform reports the cancelled utterance after the fact
    let update = player.handle_event(SynthEvent::Finished(generation)).unwrap();
    assert_eq!(update, PlaybackUpdate::Ignored);
    assert_eq!(player.state(), PlaybackState::Idle);
    assert_eq!(player.cursor(), 0);
    assert_eq!(log.texts().len(), 1);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_stop_from_every_state() {
    let (mut player, log, _rx) = player(false);
    player.load_story("One.\nTwo.").unwrap();

    player.stop().unwrap();
    assert_eq!((player.state(), player.cursor()), (PlaybackState::Idle, 0));

    player.play().unwrap();
    let first = log.last().unwrap().generation;
    player.handle_event(SynthEvent::Finished(first)).unwrap();
    player.stop().unwrap();
    assert_eq!((player.state(), player.cursor()), (PlaybackState::Idle, 0));

    player.play().unwrap();
    player.pause().unwrap();
    player.stop().unwrap();
    assert_eq!((player.state(), player.cursor()), (PlaybackState::Idle, 0));
}

#[test]
fn test_voice_and_rate_change_applies_to_next_paragraph() {
    let (mut player, log, _rx) = player(false);
    player.load_story("One.\nTwo.").unwrap();
    player.play().unwrap();

    player.catalog_mut().select("French").unwrap();
    player.catalog_mut().set_rate(1.5).unwrap();

    let first = log.last().unwrap();
    assert_eq!(first.voice.as_ref().map(|v| v.id.as_str()), Some("en-us"));
    assert_eq!(first.rate.value(), 1.0);

    player.handle_event(SynthEvent::Finished(first.generation)).unwrap();
    let second = log.last().unwrap();
    assert_eq!(second.text, "Two.");
    assert_eq!(second.voice.as_ref().map(|v| v.id.as_str()), Some("fr"));
    assert_eq!(second.rate.value(), 1.5);
}

#[test]
fn test_invalid_settings_keep_previous_values() {
    let (mut player, _log, _rx) = player(false);

    assert!(player.catalog_mut().select("Klingon").is_err());
    assert_eq!(
        player.catalog().selected().map(|v| v.name.as_str()),
        Some("English (America)")
    );

    assert!(player.catalog_mut().set_rate(3.0).is_err());
    assert_eq!(player.catalog().rate().value(), 1.0);
}

#[test]
fn test_platform_default_voice() {
    let (mut player, log, _rx) = player(false);
    player.catalog_mut().select_platform_default();
    player.refresh_voices().unwrap();

    player.load_story("One.").unwrap();
    player.play().unwrap();
    assert_eq!(log.last().unwrap().voice, None);
}

#[test]
fn test_play_without_story_is_noop() {
    let (mut player, log, _rx) = player(true);
    player.play().unwrap();
    player.toggle().unwrap();

    assert_eq!(player.state(), PlaybackState::Idle);
    assert!(log.texts().is_empty());
}

#[test]
fn test_pause_then_resume_finishes_story() {
    let (mut player, log, rx) = player(false);
    player.load_story("One.\nTwo.").unwrap();
    player.play().unwrap();
    player.pause().unwrap();
    assert_eq!(player.current_paragraph(), Some((0, "One.")));

    player.resume().unwrap();
    let generation = log.last().unwrap().generation;
    assert_eq!(
        player.handle_event(SynthEvent::Finished(generation)).unwrap(),
        PlaybackUpdate::Advanced(1)
    );
    let generation = log.last().unwrap().generation;
    assert_eq!(
        player.handle_event(SynthEvent::Finished(generation)).unwrap(),
        PlaybackUpdate::Finished
    );
    assert_eq!(log.texts(), vec!["One.", "One.", "Two."]);
    assert!(rx.try_recv().is_err());
}
