//! Desktop-notification error reporting.
//!
//! Per-script and per-wallpaper failures are isolated rather than fatal, so
//! the user finds out about them through a notification instead of a crash.

use notify_rust::{Notification, Urgency};

pub fn report(summary: &str, err: &anyhow::Error) {
    log::error!("{summary}: {err:#}");
    let sent = Notification::new()
        .appname("wallgrid")
        .summary(summary)
        .body(&format!("{err:#}"))
        .urgency(Urgency::Normal)
        .show();
    if let Err(e) = sent {
        log::warn!("could not send notification: {e}");
    }
}
