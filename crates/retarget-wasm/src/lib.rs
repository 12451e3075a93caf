//! WebAssembly bindings for the difficulty retargeting engine.
//!
//! This crate provides JavaScript-accessible APIs for:
//! - Tracking a chain of block timestamps and targets
//! - Computing the target the next block must meet
//! - Checking proof of work and decoding compact targets

use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::prelude::*;

pub mod session;
pub mod state;

// Re-export main types for JS access
pub use session::ChainSession;

/// `log` backend writing to the browser console.
struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let message = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            Level::Error => web_sys::console::error_1(&message),
            Level::Warn => web_sys::console::warn_1(&message),
            Level::Info => web_sys::console::info_1(&message),
            Level::Debug | Level::Trace => web_sys::console::debug_1(&message),
        }
    }

    fn flush(&self) {}
}

/// Initialize the WASM module with better panic messages and console logging.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    // A logger may already be installed when init runs twice.
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}

/// Change how much the engine logs: "error", "warn", "info", "debug", "trace" or "off".
#[wasm_bindgen]
pub fn set_log_level(level: &str) -> Result<(), JsValue> {
    let filter: LevelFilter = level
        .parse()
        .map_err(|_| JsValue::from_str(&format!("Invalid log level: {}", level)))?;
    log::set_max_level(filter);
    Ok(())
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
