use rdev::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    PlayPause,
    NextTrack,
    PreviousTrack,
}

impl MediaKey {
    /// Platform key code for rdev; None where media keys are not regular key events (macOS).
    #[cfg(target_os = "windows")]
    pub fn rdev_key(&self) -> Option<Key> {
        // VK_MEDIA_*
        let code = match self {
            MediaKey::PlayPause => 0xB3,
            MediaKey::NextTrack => 0xB0,
            MediaKey::PreviousTrack => 0xB1,
        };
        Some(Key::Unknown(code))
    }

    #[cfg(target_os = "linux")]
    pub fn rdev_key(&self) -> Option<Key> {
        // X11 keycodes of XF86AudioPlay / XF86AudioNext / XF86AudioPrev
        let code = match self {
            MediaKey::PlayPause => 172,
            MediaKey::NextTrack => 171,
            MediaKey::PreviousTrack => 173,
        };
        Some(Key::Unknown(code))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    pub fn rdev_key(&self) -> Option<Key> {
        None
    }
}

impl std::fmt::Display for MediaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            MediaKey::PlayPause => "Media_Play_Pause",
            MediaKey::NextTrack => "Media_Next",
            MediaKey::PreviousTrack => "Media_Prev",
        };

        write!(f, "{}", result)
    }
}
