//! Drives an engine over [`MemoryDom`] with the manual clock.

use crate::Engine;
use core::time::Duration;
use vs_dom::MemoryDom;
use vs_dom::PageEvent;

impl Engine<MemoryDom> {
    /// Advances the clock by `elapsed`, firing due timers in order.
    pub fn advance(&mut self, elapsed: Duration) {
        let deadline = self.host.now().saturating_add(elapsed);
        while let Some(timer) = self.host.pop_due_timer(deadline) {
            self.handle(PageEvent::Timer(timer));
        }
        self.host.set_now(deadline);
    }

    /// Delivers the mutations recorded so far as one observer batch.
    pub fn flush_mutations(&mut self) {
        let batch = self.host.take_mutations();
        if !batch.is_empty() {
            self.handle(PageEvent::Mutations(batch));
        }
    }
}
