mod common;

use common::VIDEO_RECT;
use common::add_video;
use common::body;
use common::engine;
use common::live_rate;
use common::loaded_page;
use common::ok;
use common::panel_count;
use vs_dom::DomHost;
use vs_dom::EventKind;
use vs_dom::PageEvent;

#[test]
fn primevideo_attaches_only_to_blob_videos() {
    let mut engine = engine("www.primevideo.com");
    let stream = add_video(&mut engine, Some("blob:abc"));
    let preview = add_video(&mut engine, Some("https://cdn/x.mp4"));
    engine.handle(PageEvent::Load);

    assert!(engine.registry().contains(stream));
    assert!(!engine.registry().contains(preview));
    assert!(engine.is_enhanced(stream));
    assert!(engine.is_enhanced(preview));
    assert_eq!(panel_count(&engine), 1);
}

#[test]
fn default_site_attaches_to_every_video() {
    let mut engine = engine("example.com");
    let plain = add_video(&mut engine, None);
    let remote = add_video(&mut engine, Some("https://cdn/x.mp4"));
    engine.handle(PageEvent::Load);

    assert!(engine.registry().contains(plain));
    assert!(engine.registry().contains(remote));
    assert_eq!(panel_count(&engine), 2);
}

#[test]
fn attaching_twice_reuses_the_controller() {
    let (mut engine, video) = loaded_page("example.com", None);
    let first = engine.registry().get(video).map(|entry| entry.handle());

    let second = engine.attach(video);
    assert_eq!(first, second);
    assert_eq!(engine.scan(), 0);
    assert_eq!(panel_count(&engine), 1);
}

#[test]
fn attaching_a_rejected_video_builds_nothing() {
    let mut engine = engine("www.primevideo.com");
    let preview = add_video(&mut engine, Some("https://cdn/x.mp4"));
    engine.handle(PageEvent::Load);
    assert!(engine.is_enhanced(preview));

    assert_eq!(engine.attach(preview), None);
    assert!(!engine.registry().contains(preview));
    assert_eq!(panel_count(&engine), 0);
}

#[test]
fn attaching_an_unscanned_video_checks_the_site_rule() {
    let mut engine = engine("www.primevideo.com");
    let preview = add_video(&mut engine, Some("https://cdn/x.mp4"));
    let stream = add_video(&mut engine, Some("blob:abc"));

    assert_eq!(engine.attach(preview), None);
    assert!(engine.is_enhanced(preview));

    let handle = engine.attach(stream);
    assert!(handle.is_some());
    assert!(engine.is_enhanced(stream));
    assert_eq!(engine.registry().get(stream).map(|entry| entry.handle()), handle);
    assert_eq!(panel_count(&engine), 1);
}

#[test]
fn load_injects_styles_and_observes_once() {
    let (mut engine, _) = loaded_page("example.com", None);
    engine.handle(PageEvent::Load);

    assert!(engine.is_started());
    assert!(engine.host().is_observing());
    assert_eq!(engine.host().injected_styles().len(), 1);
    assert_eq!(panel_count(&engine), 1);
}

#[test]
fn panel_carries_presets_custom_input_and_listeners() {
    let (engine, video) = loaded_page("example.com", None);
    let registration = engine
        .registry()
        .get(video)
        .cloned()
        .unwrap_or_else(|| unreachable!());
    let host = engine.host();

    let options: Vec<Option<String>> = host
        .children(registration.select)
        .into_iter()
        .map(|option| host.attribute(option, "value"))
        .collect();
    let expected: Vec<Option<String>> = ["0.1", "0.5", "1", "1.5", "2", "2.5", "3", "4", "custom"]
        .into_iter()
        .map(|value| Some(value.to_owned()))
        .collect();
    assert_eq!(options, expected);
    assert_eq!(host.value(registration.select).as_deref(), Some("1"));

    assert_eq!(host.attribute(registration.input, "type").as_deref(), Some("number"));
    assert_eq!(host.attribute(registration.input, "min").as_deref(), Some("0.1"));
    assert_eq!(host.attribute(registration.input, "max").as_deref(), Some("16"));
    assert_eq!(host.attribute(registration.input, "step").as_deref(), Some("0.1"));
    assert_eq!(host.value(registration.input).as_deref(), Some("1.0"));
    assert_eq!(host.text(registration.apply_button), Some("Apply"));

    assert!(host.has_listener(registration.select, EventKind::Change));
    assert!(host.has_listener(registration.input, EventKind::KeyUp));
    assert!(host.has_listener(registration.apply_button, EventKind::Click));
    assert!(host.has_listener(registration.panel, EventKind::PointerEnter));
    assert!(host.has_listener(registration.panel, EventKind::PointerLeave));
    assert!(host.has_listener(video, EventKind::Play));
}

#[test]
fn detects_videos_inserted_after_load() {
    let (mut engine, _) = loaded_page("example.com", None);
    let late = add_video(&mut engine, None);
    assert!(!engine.registry().contains(late));

    engine.flush_mutations();
    assert!(engine.registry().contains(late));
    assert_eq!(panel_count(&engine), 2);
}

#[test]
fn detects_videos_nested_in_inserted_subtrees() {
    let (mut engine, _) = loaded_page("example.com", None);
    let wrapper = ok(engine.host_mut().create_element("div"));
    let nested = ok(engine.host_mut().insert_video(wrapper, None));
    let body = body(&engine);
    ok(engine.host_mut().append_child(body, wrapper));

    engine.flush_mutations();
    assert!(engine.registry().contains(nested));
}

#[test]
fn text_insertions_do_not_attach_anything() {
    let (mut engine, _) = loaded_page("example.com", None);
    let text = engine.host_mut().create_text("caption");
    let body = body(&engine);
    ok(engine.host_mut().append_child(body, text));

    engine.flush_mutations();
    assert_eq!(engine.registry().len(), 1);
}

#[test]
fn src_change_reclassifies_on_sites_with_rules() {
    let (mut engine, video) = loaded_page("www.primevideo.com", Some("https://cdn/x.mp4"));
    assert!(!engine.registry().contains(video));

    ok(engine.host_mut().set_attribute(video, "src", "blob:late"));
    engine.flush_mutations();
    assert!(engine.registry().contains(video));
    assert!(engine.is_enhanced(video));
    assert_eq!(panel_count(&engine), 1);

    ok(engine.host_mut().set_attribute(video, "src", "https://cdn/ad.mp4"));
    engine.flush_mutations();
    assert!(!engine.registry().contains(video));
    assert!(engine.is_enhanced(video));
    assert_eq!(panel_count(&engine), 0);
}

#[test]
fn src_change_is_ignored_without_site_rule() {
    let (mut engine, video) = loaded_page("example.com", Some("https://cdn/a.mp4"));
    ok(engine.host_mut().set_attribute(video, "src", "https://cdn/b.mp4"));
    engine.flush_mutations();
    assert!(engine.registry().contains(video));
    assert_eq!(panel_count(&engine), 1);
}

#[test]
fn removed_video_is_torn_down_and_reattached_on_return() {
    let (mut engine, video) = loaded_page("example.com", None);
    assert!(engine.apply_rate(video, 2.25));
    assert!(engine.host().active_timer_count() > 0);

    ok(engine.host_mut().remove_node(video));
    engine.flush_mutations();
    assert!(!engine.registry().contains(video));
    assert!(!engine.is_enhanced(video));
    assert_eq!(panel_count(&engine), 0);
    assert_eq!(engine.host().active_timer_count(), 0);

    ok(engine.host_mut().set_playback_rate(video, 1.0));
    let body = body(&engine);
    ok(engine.host_mut().append_child(body, video));
    ok(engine.host_mut().set_rect(video, VIDEO_RECT));
    engine.flush_mutations();

    assert!(engine.registry().contains(video));
    assert_eq!(live_rate(&engine, video), 2.25);
    let select = engine
        .registry()
        .get(video)
        .map(|entry| entry.select)
        .unwrap_or_else(|| unreachable!());
    assert_eq!(engine.host().value(select).as_deref(), Some("custom"));
}

#[test]
fn teardown_unbinds_the_video_play_listener() {
    let (mut engine, video) = loaded_page("example.com", None);
    assert!(engine.host().has_listener(video, EventKind::Play));

    ok(engine.host_mut().remove_node(video));
    engine.flush_mutations();
    assert!(!engine.host().has_listener(video, EventKind::Play));

    let body = body(&engine);
    ok(engine.host_mut().append_child(body, video));
    engine.flush_mutations();
    assert!(engine.host().has_listener(video, EventKind::Play));
}

#[test]
fn shutdown_removes_panels_and_cancels_timers() {
    let mut engine = engine("example.com");
    add_video(&mut engine, None);
    add_video(&mut engine, None);
    engine.handle(PageEvent::Load);
    assert_eq!(panel_count(&engine), 2);

    engine.shutdown();
    assert!(engine.registry().is_empty());
    assert_eq!(panel_count(&engine), 0);
    assert_eq!(engine.host().active_timer_count(), 0);
    assert!(!engine.is_started());
    assert!(engine.host().videos().iter().all(|video| !engine.is_enhanced(*video)));
}

#[test]
fn restarting_after_shutdown_attaches_again() {
    let (mut engine, video) = loaded_page("example.com", None);
    assert!(engine.apply_rate(video, 1.25));
    engine.shutdown();

    engine.handle(PageEvent::Load);
    assert!(engine.registry().contains(video));
    assert_eq!(panel_count(&engine), 1);
    assert_eq!(live_rate(&engine, video), 1.25);
}

#[test]
fn events_for_unknown_nodes_are_dropped() {
    let (mut engine, video) = loaded_page("example.com", None);
    engine.handle(PageEvent::Change(9_999));
    engine.handle(PageEvent::Click(video));
    engine.handle(PageEvent::PointerEnter(video));
    engine.handle(PageEvent::KeyUp {
        node: 9_999,
        key: "Enter".to_owned(),
    });
    assert_eq!(live_rate(&engine, video), 1.0);
    assert!(engine.registry().get(video).is_some_and(|entry| !entry.sticky));
}
