use crate::console_log;
use crate::dispatch::Dispatch;
use gloo_events::EventListener;
use gloo_events::EventListenerOptions;
use gloo_events::EventListenerPhase;
use js_sys::Reflect;
use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;
use vs_core::EngineError;
use vs_core::Point;
use vs_dom::PageEvent;
use vs_engine::EngineConfig;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::EventTarget;
use web_sys::MouseEvent;
use web_sys::Window;

thread_local! {
    static AUTO_STARTED: RefCell<Option<VidSpeed>> = const { RefCell::new(None) };
}

fn to_js(error: &EngineError) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn document_complete(window: &Window) -> bool {
    window
        .document()
        .and_then(|document| Reflect::get(&document, &JsValue::from_str("readyState")).ok())
        .and_then(|state| state.as_string())
        .is_some_and(|state| state == "complete")
}

fn forward(
    target: &EventTarget,
    name: &'static str,
    sink: &Weak<Dispatch>,
    event: PageEvent,
) -> EventListener {
    let sink = sink.clone();
    EventListener::new(target, name, move |_| {
        Dispatch::deliver(&sink, event.clone());
    })
}

fn page_listeners(window: &Window, sink: &Weak<Dispatch>) -> Vec<EventListener> {
    let pointer_sink = sink.clone();
    let pointer = EventListener::new(window, "mousemove", move |event| {
        let Some(event) = event.dyn_ref::<MouseEvent>() else {
            return;
        };
        let point = Point::new(f64::from(event.client_x()), f64::from(event.client_y()));
        Dispatch::deliver(&pointer_sink, PageEvent::PointerMove(point));
    });

    // Capture so scrolling inside nested containers also repositions panels.
    let scroll_sink = sink.clone();
    let scroll = EventListener::new_with_options(
        window,
        "scroll",
        EventListenerOptions {
            phase: EventListenerPhase::Capture,
            passive: true,
        },
        move |_| Dispatch::deliver(&scroll_sink, PageEvent::Scroll),
    );

    vec![
        pointer,
        scroll,
        forward(window, "resize", sink, PageEvent::Resize),
        forward(window, "load", sink, PageEvent::Load),
    ]
}

/// Video speed controllers for the current page.
///
/// ```js
/// const vidspeed = new VidSpeed('{"hide_delay_ms": 3000}');
/// vidspeed.start();
/// ```
#[wasm_bindgen]
pub struct VidSpeed {
    dispatch: Rc<Dispatch>,
    page_listeners: Vec<EventListener>,
}

#[wasm_bindgen]
impl VidSpeed {
    /// Creates an engine from optional JSON options; omitted fields keep
    /// their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(options_json: Option<String>) -> Result<VidSpeed, JsValue> {
        let config = match options_json.as_deref() {
            Some(json) => EngineConfig::from_json(json),
            None => Ok(EngineConfig::default()),
        }
        .map_err(|error| to_js(&error))?;

        console_log::install(config.log_level_filter());
        let dispatch = Dispatch::new(config).map_err(|error| to_js(&error))?;
        Ok(Self {
            dispatch,
            page_listeners: Vec::new(),
        })
    }

    /// Starts listening to the page. Scans right away when the document has
    /// already finished loading, otherwise on the window `load` event.
    pub fn start(&mut self) {
        if !self.page_listeners.is_empty() {
            return;
        }
        let Some(window) = web_sys::window() else {
            log::warn!("no global window; not starting");
            return;
        };

        self.page_listeners = page_listeners(&window, &Rc::downgrade(&self.dispatch));
        if document_complete(&window) {
            self.dispatch.push(PageEvent::Load);
        }
        log::debug!("vidspeed started");
    }

    /// Removes every controller and stops listening to the page.
    pub fn stop(&mut self) {
        self.page_listeners.clear();
        self.dispatch.shutdown();
    }

    #[wasm_bindgen(js_name = controllerCount)]
    pub fn controller_count(&self) -> usize {
        self.dispatch.controller_count()
    }
}

/// Stops the engine started when the module loaded, so an embedder can run
/// its own configured instance.
#[wasm_bindgen(js_name = stopAutoStart)]
pub fn stop_auto_start() {
    AUTO_STARTED.with(|slot| {
        if let Some(mut vidspeed) = slot.borrow_mut().take() {
            vidspeed.stop();
        }
    });
}

#[wasm_bindgen(start)]
pub fn run() {
    console_error_panic_hook::set_once();

    match VidSpeed::new(None) {
        Ok(mut vidspeed) => {
            vidspeed.start();
            AUTO_STARTED.with(|slot| *slot.borrow_mut() = Some(vidspeed));
        }
        Err(error) => web_sys::console::error_1(&error),
    }
}
