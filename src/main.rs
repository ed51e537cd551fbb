mod api;
mod app;
mod autosave;
mod browser;
mod cache;
mod config;
mod editor;
mod error;
mod logging;
mod models;
mod picker;
mod reference;
mod render;
mod resolver;

use app::*;
use config::ClientConfig;
use leptos::prelude::*;

fn main() {
    console_error_panic_hook::set_once();

    let (config, config_error) = match ClientConfig::load_stored() {
        Ok(stored) => (stored.unwrap_or_default(), None),
        Err(err) => (ClientConfig::default(), Some(err)),
    };
    if let Err(err) = logging::init_logging(&config.log_level) {
        web_sys::console::error_1(&err.into());
    }
    if let Some(err) = config_error {
        log::warn!("event=load_config module=main status=fallback error={err}");
    }

    mount_to_body(move || {
        view! {
            <App config=config />
        }
    })
}
