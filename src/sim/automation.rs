use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use rdev::{simulate, EventType};
use tokio::task::spawn_blocking;

use crate::sim::types::MediaKey;

/// Host side effects of the controller. Every call is fire-and-forget.
pub trait Automation: Send + Sync {
    fn press_media_key(&self, key: MediaKey);

    fn launch_application(&self, path: &Path);

    fn play_sound_cue(&self, path: &Path);

    fn set_tray_tooltip(&self, text: &str);

    fn set_tray_icon(&self, path: &Path);
}

fn send(event_type: &EventType) {
    if let Err(err) = simulate(event_type) {
        warn!("Failed to simulate {:?}: {:?}", event_type, err);
    }
}

// open::that blocks until the launcher returns, keep it off the controller task
fn open_detached(what: &'static str, path: &Path) {
    let path: PathBuf = path.to_path_buf();

    spawn_blocking(move || {
        if let Err(err) = open::that(&path) {
            warn!("Failed to open {} {}: {}", what, path.to_string_lossy(), err);
        }
    });
}

/// Injects media keys with rdev and opens files with the platform launcher.
///
/// There is no tray on this side of the boundary; tooltip and icon changes are logged.
#[derive(Default)]
pub struct DesktopAutomation;

impl Automation for DesktopAutomation {
    fn press_media_key(&self, key: MediaKey) {
        match key.rdev_key() {
            Some(rdev_key) => {
                send(&EventType::KeyPress(rdev_key));
                send(&EventType::KeyRelease(rdev_key));
            },
            None => warn!("Media key {} is not supported on this platform", key),
        }
    }

    fn launch_application(&self, path: &Path) {
        info!("Launching {}", path.to_string_lossy());
        open_detached("application", path);
    }

    fn play_sound_cue(&self, path: &Path) {
        open_detached("sound cue", path);
    }

    fn set_tray_tooltip(&self, text: &str) {
        info!("{}", text.replace('\n', " | "));
    }

    fn set_tray_icon(&self, path: &Path) {
        debug!("Tray icon {}", path.to_string_lossy());
    }
}
