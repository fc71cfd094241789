mod inspector;
mod payload;

pub use inspector::WasmInspector;

#[cfg(feature = "debug_logs")]
pub(crate) fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
pub(crate) fn init_logger() {}
