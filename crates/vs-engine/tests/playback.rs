mod common;

use common::add_video;
use common::engine;
use common::live_rate;
use common::loaded_page;
use common::ok;
use core::time::Duration;
use vs_dom::DomHost;
use vs_dom::EventKind;
use vs_dom::MemoryDom;
use vs_dom::NodeId;
use vs_dom::PageEvent;
use vs_engine::Engine;
use vs_engine::Registration;
use vs_engine::enforcer::PREFERRED_RATE_ATTR;

fn registration(engine: &Engine<MemoryDom>, video: NodeId) -> Registration {
    engine
        .registry()
        .get(video)
        .cloned()
        .unwrap_or_else(|| unreachable!())
}

fn type_custom_rate(engine: &mut Engine<MemoryDom>, input: NodeId, text: &str) {
    ok(engine.host_mut().set_value(input, text));
}

#[test]
fn choosing_a_preset_sets_the_rate_and_mirrors_it() {
    let (mut engine, video) = loaded_page("example.com", None);
    let controls = registration(&engine, video);

    ok(engine.host_mut().set_value(controls.select, "2"));
    engine.handle(PageEvent::Change(controls.select));

    assert_eq!(live_rate(&engine, video), 2.0);
    assert_eq!(engine.preferred_rate(video), Some(2.0));
    assert_eq!(
        engine.host().attribute(video, PREFERRED_RATE_ATTR).as_deref(),
        Some("2")
    );
    assert_eq!(engine.host().value(controls.input).as_deref(), Some("2"));
}

#[test]
fn choosing_the_custom_entry_changes_nothing() {
    let (mut engine, video) = loaded_page("example.com", None);
    let controls = registration(&engine, video);

    ok(engine.host_mut().set_value(controls.select, "custom"));
    engine.handle(PageEvent::Change(controls.select));

    assert_eq!(live_rate(&engine, video), 1.0);
    assert_eq!(engine.preferred_rate(video), None);
}

#[test]
fn enter_in_the_custom_input_applies_the_rate() {
    let (mut engine, video) = loaded_page("example.com", None);
    let controls = registration(&engine, video);

    type_custom_rate(&mut engine, controls.input, "1.75");
    engine.handle(PageEvent::KeyUp {
        node: controls.input,
        key: "Enter".to_owned(),
    });

    assert_eq!(live_rate(&engine, video), 1.75);
    assert_eq!(
        engine.host().value(controls.select).as_deref(),
        Some("custom")
    );
}

#[test]
fn other_keys_in_the_custom_input_are_ignored() {
    let (mut engine, video) = loaded_page("example.com", None);
    let controls = registration(&engine, video);

    type_custom_rate(&mut engine, controls.input, "3");
    engine.handle(PageEvent::KeyUp {
        node: controls.input,
        key: "3".to_owned(),
    });

    assert_eq!(live_rate(&engine, video), 1.0);
}

#[test]
fn apply_button_submits_the_custom_input() {
    let (mut engine, video) = loaded_page("example.com", None);
    let controls = registration(&engine, video);

    type_custom_rate(&mut engine, controls.input, "3.25");
    engine.handle(PageEvent::Click(controls.apply_button));

    assert_eq!(live_rate(&engine, video), 3.25);
    assert_eq!(engine.preferred_rate(video), Some(3.25));
    assert_eq!(
        engine.host().value(controls.select).as_deref(),
        Some("custom")
    );
}

#[test]
fn non_positive_or_garbage_custom_input_is_rejected() {
    let (mut engine, video) = loaded_page("example.com", None);
    let controls = registration(&engine, video);

    for text in ["0", "-2", "fast", ""] {
        type_custom_rate(&mut engine, controls.input, text);
        engine.handle(PageEvent::Click(controls.apply_button));
        assert_eq!(live_rate(&engine, video), 1.0, "input {text:?}");
    }
    assert_eq!(engine.preferred_rate(video), None);
}

#[test]
fn rate_refused_by_the_host_leaves_state_untouched() {
    let (mut engine, video) = loaded_page("example.com", None);
    let controls = registration(&engine, video);

    assert!(!engine.apply_rate(video, 20.0));
    assert_eq!(live_rate(&engine, video), 1.0);
    assert_eq!(engine.preferred_rate(video), None);
    assert_eq!(engine.host().value(controls.select).as_deref(), Some("1"));
}

#[test]
fn enforcement_restores_the_preferred_rate_while_playing() {
    let (mut engine, video) = loaded_page("example.com", None);
    assert!(engine.apply_rate(video, 1.5));
    ok(engine.host_mut().set_paused(video, false));

    ok(engine.host_mut().set_playback_rate(video, 1.0));
    engine.advance(Duration::from_millis(1_000));

    assert_eq!(live_rate(&engine, video), 1.5);
}

#[test]
fn paused_videos_are_enforced_on_play_instead_of_on_tick() {
    let (mut engine, video) = loaded_page("example.com", None);
    assert!(engine.apply_rate(video, 1.5));

    ok(engine.host_mut().set_playback_rate(video, 1.0));
    engine.advance(Duration::from_millis(3_000));
    assert_eq!(live_rate(&engine, video), 1.0);

    ok(engine.host_mut().set_paused(video, false));
    engine.handle(PageEvent::Play(video));
    assert_eq!(live_rate(&engine, video), 1.5);
}

#[test]
fn a_page_set_rate_is_adopted_on_attach() {
    let mut engine = engine("example.com");
    let video = add_video(&mut engine, None);
    ok(engine.host_mut().set_playback_rate(video, 1.75));
    engine.handle(PageEvent::Load);

    let controls = registration(&engine, video);
    assert_eq!(engine.preferred_rate(video), Some(1.75));
    assert_eq!(
        engine.host().value(controls.select).as_deref(),
        Some("custom")
    );
    assert_eq!(engine.host().value(controls.input).as_deref(), Some("1.75"));
}

#[test]
fn a_stored_preference_wins_over_the_live_rate_on_attach() {
    let mut engine = engine("example.com");
    let video = add_video(&mut engine, None);
    ok(engine.host_mut().set_attribute(video, PREFERRED_RATE_ATTR, "0.5"));
    ok(engine.host_mut().set_playback_rate(video, 3.0));
    engine.handle(PageEvent::Load);

    let controls = registration(&engine, video);
    assert_eq!(live_rate(&engine, video), 0.5);
    assert_eq!(engine.host().value(controls.select).as_deref(), Some("0.5"));
}

#[test]
fn detached_videos_are_no_longer_enforced() {
    let (mut engine, video) = loaded_page("example.com", None);
    assert!(engine.apply_rate(video, 2.0));
    ok(engine.host_mut().set_paused(video, false));

    assert!(engine.detach(video));
    assert!(!engine.host().has_listener(video, EventKind::Play));
    ok(engine.host_mut().set_playback_rate(video, 1.0));
    engine.advance(Duration::from_millis(5_000));
    engine.handle(PageEvent::Play(video));

    assert_eq!(live_rate(&engine, video), 1.0);
}

#[test]
fn zero_submitted_with_enter_changes_nothing() {
    let (mut engine, video) = loaded_page("example.com", None);
    let controls = registration(&engine, video);

    type_custom_rate(&mut engine, controls.input, "0");
    engine.handle(PageEvent::KeyUp {
        node: controls.input,
        key: "Enter".to_owned(),
    });

    assert_eq!(live_rate(&engine, video), 1.0);
    assert_eq!(engine.preferred_rate(video), None);
}
