#![forbid(unsafe_code)]

//! Demo: two mock components sharing global state.
//!
//! A header reads the user name, a settings panel reads the theme. Writes
//! from either side re-render only the components that read the touched
//! keys; an asynchronous write shows that notification waits for the value.
//!
//! Run with `RUST_LOG=debug` to see the attach/commit/detach events.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use statehub::{Connected, GlobalStore, Lifecycle, Update};
use tracing::info;

struct Header;

impl Lifecycle for Header {
    fn on_attach(&mut self) {
        info!("header mounted");
    }

    fn on_detach(&mut self) {
        info!("header unmounted");
    }
}

struct SettingsPanel;

impl Lifecycle for SettingsPanel {
    fn on_attach(&mut self) {
        info!("settings panel mounted");
    }
}

fn render_counter(name: &'static str) -> (Box<dyn Fn() + Send + Sync>, Arc<AtomicUsize>) {
    let renders = Arc::new(AtomicUsize::new(0));
    let renders_clone = Arc::clone(&renders);
    let notify = move || {
        let n = renders_clone.fetch_add(1, Ordering::SeqCst) + 1;
        info!(component = name, render = n, "re-render");
    };
    (Box::new(notify), renders)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let store = GlobalStore::with_initial([
        ("user".to_string(), json!("ada")),
        ("theme".to_string(), json!("dark")),
    ]);

    let (header_notify, header_renders) = render_counter("header");
    let header = Connected::mount(&store, Header, header_notify);
    let (panel_notify, panel_renders) = render_counter("settings");
    let panel = Connected::mount(&store, SettingsPanel, panel_notify);

    // Reads decide who re-renders later.
    info!(user = %header.view().read("user").unwrap(), "header shows");
    info!(theme = %panel.view().read("theme").unwrap(), "panel shows");

    // Only the header reads "user".
    panel
        .set_state([("user".to_string(), Update::ready("grace"))])
        .await?;

    // An asynchronous value: nobody is notified until it resolves.
    panel
        .set_state([(
            "theme".to_string(),
            Update::pending(async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(json!("light"))
            }),
        )])
        .await?;

    info!(
        header = header_renders.load(Ordering::SeqCst),
        settings = panel_renders.load(Ordering::SeqCst),
        state = %json!(store.get_state()),
        "final"
    );

    header.unmount();
    panel.unmount();
    Ok(())
}
