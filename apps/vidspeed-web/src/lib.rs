//! Browser binding for the VidSpeed engine.
//!
//! On wasm32 this crate implements the engine's host traits over `web-sys`,
//! forwards page events into the engine and exports a small JS API. Loading
//! the module starts an engine for the page automatically.

#[cfg(target_arch = "wasm32")]
mod console_log;
#[cfg(target_arch = "wasm32")]
mod dispatch;
pub mod node_table;
#[cfg(target_arch = "wasm32")]
mod wasm;
#[cfg(target_arch = "wasm32")]
mod web_dom;

#[cfg(target_arch = "wasm32")]
pub use wasm::VidSpeed;

/// Native builds compile this crate as a stub so workspace checks stay green
/// on non-wasm targets.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct VidSpeed;

#[cfg(not(target_arch = "wasm32"))]
impl VidSpeed {
    pub fn new() -> Self {
        Self
    }

    pub fn controller_count(&self) -> usize {
        0
    }
}
