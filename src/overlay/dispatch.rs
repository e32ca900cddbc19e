//! Maps hotkey press/release edges onto driver transitions and fires the
//! optional per-action sound cues.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::overlay::driver::OverlayController;

/// The four controller actions, in hotkey order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyAction {
    Increase,
    Decrease,
    Sustain,
    Reset,
}

impl HotkeyAction {
    pub const ALL: [HotkeyAction; 4] = [
        HotkeyAction::Increase,
        HotkeyAction::Decrease,
        HotkeyAction::Sustain,
        HotkeyAction::Reset,
    ];

    /// Human-readable label, with the documented default binding.
    pub fn label(self) -> &'static str {
        match self {
            HotkeyAction::Increase => "Increase Level (ALT+1)",
            HotkeyAction::Decrease => "Decrease Level (ALT+2)",
            HotkeyAction::Sustain => "Sustain Visibility (ALT+3)",
            HotkeyAction::Reset => "Reset Progress (ALT+4)",
        }
    }
}

/// Optional media sources restarted as audio feedback. Empty/absent names
/// disable the cue.
#[derive(Debug, Clone, Default)]
pub struct CueSources {
    pub increase: Option<String>,
    pub decrease: Option<String>,
    pub reset: Option<String>,
    /// Played instead of `increase` when the bar is already full.
    pub full: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Cue {
    Increase,
    Decrease,
    Reset,
    Full,
}

impl OverlayController {
    /// Dispatcher entry point. Press edges first clear the sustained flag,
    /// then run the action; the only release edge that matters is
    /// sustain's. A press is dropped entirely when the overlay source does
    /// not resolve.
    pub async fn handle_hotkey(self: Arc<Self>, action: HotkeyAction, pressed: bool) {
        if !pressed {
            if action == HotkeyAction::Sustain {
                self.release_sustain();
            }
            return;
        }

        if !self.render().source_resolved() {
            trace!(?action, "hotkey ignored: overlay source not found");
            return;
        }

        self.release_sustain();
        debug!(?action, "hotkey pressed");

        match action {
            HotkeyAction::Increase => {
                let raised = {
                    let mut st = self.state.lock().unwrap();
                    if st.target < self.timing.max_levels {
                        let (value, target) = (st.value, st.target + 1);
                        st.set(value, target, self.timing.max_levels);
                        Some(st.target)
                    } else {
                        None
                    }
                };
                match raised {
                    Some(target) => {
                        self.clone()
                            .animate(target, self.timing.resize_duration)
                            .await;
                        self.play_cue(Cue::Increase);
                    }
                    // Already full: distinct feedback, no animation.
                    None => self.play_cue(Cue::Full),
                }
            }
            HotkeyAction::Decrease => {
                let lowered = {
                    let mut st = self.state.lock().unwrap();
                    if st.target > 0 {
                        let (value, target) = (st.value, st.target - 1);
                        st.set(value, target, self.timing.max_levels);
                        Some(st.target)
                    } else {
                        None
                    }
                };
                if let Some(target) = lowered {
                    self.clone()
                        .animate(target, self.timing.resize_duration)
                        .await;
                    self.play_cue(Cue::Decrease);
                }
            }
            HotkeyAction::Sustain => self.sustain().await,
            HotkeyAction::Reset => {
                self.play_cue(Cue::Reset);
                self.reset_to_zero().await;
            }
        }
    }

    fn play_cue(&self, cue: Cue) {
        let name = {
            let cues = self.cues.lock().unwrap();
            match cue {
                Cue::Increase => cues.increase.clone(),
                Cue::Decrease => cues.decrease.clone(),
                Cue::Reset => cues.reset.clone(),
                Cue::Full => cues.full.clone(),
            }
        };
        let Some(name) = name else { return };
        if name.is_empty() {
            return;
        }
        let host = self.render().host();
        // Restarting only makes sense for playable media kinds.
        if host.source_kind(&name).is_some_and(|k| k.is_playable()) {
            host.media_restart(&name);
        }
    }
}
