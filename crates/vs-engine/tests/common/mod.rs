#![allow(dead_code)]

use vs_core::EngineResult;
use vs_core::Rect;
use vs_dom::DomHost;
use vs_dom::MemoryDom;
use vs_dom::NodeId;
use vs_dom::PageEvent;
use vs_engine::Engine;
use vs_engine::EngineConfig;
use vs_sites::SiteRules;

pub const VIDEO_RECT: Rect = Rect::new(100.0, 50.0, 640.0, 360.0);

pub fn ok<T>(result: EngineResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic!("{error}"),
    }
}

pub fn engine(hostname: &str) -> Engine<MemoryDom> {
    Engine::new(
        MemoryDom::new(hostname),
        EngineConfig::default(),
        &SiteRules::builtin(),
    )
}

pub fn body(engine: &Engine<MemoryDom>) -> NodeId {
    engine.host().body().unwrap_or_else(|| unreachable!())
}

/// Inserts a video into the body with the shared test rectangle.
pub fn add_video(engine: &mut Engine<MemoryDom>, src: Option<&str>) -> NodeId {
    let body = body(engine);
    let video = ok(engine.host_mut().insert_video(body, src));
    ok(engine.host_mut().set_rect(video, VIDEO_RECT));
    video
}

/// A page with one video that has been through the load scan.
pub fn loaded_page(hostname: &str, src: Option<&str>) -> (Engine<MemoryDom>, NodeId) {
    let mut engine = engine(hostname);
    let video = add_video(&mut engine, src);
    engine.handle(PageEvent::Load);
    engine.flush_mutations();
    (engine, video)
}

pub fn panel_count(engine: &Engine<MemoryDom>) -> usize {
    let body = body(engine);
    engine
        .host()
        .children(body)
        .into_iter()
        .filter(|child| engine.host().has_class(*child, "vs-controller"))
        .count()
}

pub fn live_rate(engine: &Engine<MemoryDom>, video: NodeId) -> f64 {
    engine
        .host()
        .playback_rate(video)
        .unwrap_or_else(|| unreachable!())
}
