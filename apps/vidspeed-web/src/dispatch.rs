//! Serializes page events into the engine.
//!
//! Browser callbacks can fire while the engine is already handling an event
//! (a DOM call may synchronously trigger another listener). Every event goes
//! through a queue, and whoever holds the engine drains it, so each event runs
//! to completion before the next one starts.

use crate::web_dom::WebDom;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::rc::Weak;
use vs_core::EngineError;
use vs_core::EngineResult;
use vs_dom::PageEvent;
use vs_engine::Engine;
use vs_engine::EngineConfig;
use vs_sites::SiteRules;

pub(crate) struct Dispatch {
    engine: RefCell<Engine<WebDom>>,
    queue: RefCell<VecDeque<PageEvent>>,
}

impl Dispatch {
    pub(crate) fn new(config: EngineConfig) -> EngineResult<Rc<Self>> {
        let window = web_sys::window()
            .ok_or_else(|| EngineError::new("web.window.missing", "no global window"))?;
        let document = window
            .document()
            .ok_or_else(|| EngineError::new("web.document.missing", "window has no document"))?;

        Ok(Rc::new_cyclic(|sink| {
            let host = WebDom::new(window, document, sink.clone());
            Self {
                engine: RefCell::new(Engine::new(host, config, &SiteRules::builtin())),
                queue: RefCell::new(VecDeque::new()),
            }
        }))
    }

    /// Queues `event` on a dispatcher that may already be gone.
    pub(crate) fn deliver(sink: &Weak<Self>, event: PageEvent) {
        if let Some(dispatch) = sink.upgrade() {
            dispatch.push(event);
        }
    }

    pub(crate) fn push(&self, event: PageEvent) {
        self.queue.borrow_mut().push_back(event);
        self.pump();
    }

    pub(crate) fn controller_count(&self) -> usize {
        self.engine
            .try_borrow()
            .map(|engine| engine.registry().len())
            .unwrap_or(0)
    }

    /// Tears the engine down and releases every browser resource it holds.
    pub(crate) fn shutdown(&self) {
        let Ok(mut engine) = self.engine.try_borrow_mut() else {
            log::warn!("engine busy; shutdown skipped");
            return;
        };
        self.queue.borrow_mut().clear();
        engine.shutdown();
        engine.host_mut().disconnect();
    }

    fn pump(&self) {
        // Re-entrant delivery: the outer pump picks the event up.
        let Ok(mut engine) = self.engine.try_borrow_mut() else {
            return;
        };

        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };

            let fired = match &event {
                PageEvent::Timer(timer) => Some(*timer),
                _ => None,
            };
            engine.handle(event);

            let host = engine.host_mut();
            if let Some(timer) = fired {
                host.retire_timeout(timer);
            }
            host.release_transient();
        }
    }
}
