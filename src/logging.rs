//! `log` backend setup. The browser build logs to the devtools console through
//! `console_log`; native builds (tests, tooling) go through `env_logger` and honour `RUST_LOG`.

#[cfg(target_arch = "wasm32")]
const DEFAULT_LEVEL: log::Level = log::Level::Info;

/// Installs the logger once; later calls are no-ops.
#[cfg(target_arch = "wasm32")]
pub fn init() {
    if console_log::init_with_level(DEFAULT_LEVEL).is_err() {
        log::debug!("logger already installed");
    }
}

/// Installs the logger once; later calls are no-ops.
#[cfg(not(target_arch = "wasm32"))]
pub fn init() {
    let env = env_logger::Env::default().default_filter_or("info");
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("logger already installed");
    }
}
