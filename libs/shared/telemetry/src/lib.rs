//! Observability for the SPECTRA core: structured `tracing` setup plus
//! a credential-scrubbing layer every error message is filtered
//! through before it reaches a log sink.
//!
//! The source's "global logger with ad-hoc filters" pattern is
//! replaced here with a composition-root-owned subscriber wrapping a
//! scrubbing writer, rather than any ambient global filter list.

mod scrub;

pub use scrub::{scrub_line, Scrubber};

use std::panic;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as formatting_layer, EnvFilter};

/// Initialises the global `tracing` subscriber for `service_name`,
/// writing through the credential-scrubbing `MakeWriter` so no
/// api-hash, session token, bearer token or phone number ever reaches
/// a log sink in cleartext.
pub fn init_tracing(service_name: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{}={level},libsql=warn",
            service_name,
            level = if cfg!(debug_assertions) { "debug" } else { "info" }
        )
        .into()
    });

    let scrubbing_writer = scrub::ScrubbingMakeWriter::new(std::io::stdout);

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(formatting_layer::layer().with_target(false).with_writer(scrubbing_writer))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(formatting_layer::layer().json().flatten_event(true).with_writer(scrubbing_writer))
            .init();
    }

    let owned_service_name = service_name.to_string();
    panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("<no message>");
        error!(target: "panic", service = %owned_service_name, at = %location, "{}", scrub::scrub_line(message));
    }));

    info!("telemetry initialised for {}", service_name);
}
