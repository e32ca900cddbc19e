use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::sync::Arc;

use crate::config::Config;
use crate::event::Event;
use crate::host::MockHost;
use crate::overlay::{HotkeyAction, OverlayController};

/// Simulator application state: the controller under test, the mock host
/// it drives, and enough bookkeeping to render a status line.
pub struct App {
    pub controller: Arc<OverlayController>,
    pub host: Arc<MockHost>,
    pub should_quit: bool,

    /// Whether the terminal delivers key release events. Without them,
    /// the sustain key degrades to press-to-toggle.
    pub release_edges: bool,
    /// Toggle state for the sustain fallback.
    sustain_held: bool,

    /// Last dispatched action, shown briefly in the status line.
    pub last_action: Option<HotkeyAction>,
    pub last_action_ticks: u8,

    keys: KeyMap,
    quit_key: char,
}

struct KeyMap {
    increase: char,
    decrease: char,
    sustain: char,
    reset: char,
}

fn first_char(s: &str, fallback: char) -> char {
    s.chars().next().unwrap_or(fallback)
}

impl App {
    pub fn new(
        controller: Arc<OverlayController>,
        host: Arc<MockHost>,
        config: &Config,
        release_edges: bool,
    ) -> Self {
        Self {
            controller,
            host,
            should_quit: false,
            release_edges,
            sustain_held: false,
            last_action: None,
            last_action_ticks: 0,
            keys: KeyMap {
                increase: first_char(&config.keys.increase, '1'),
                decrease: first_char(&config.keys.decrease, '2'),
                sustain: first_char(&config.keys.sustain, '3'),
                reset: first_char(&config.keys.reset, '4'),
            },
            quit_key: first_char(&config.keys.quit, 'q'),
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Tick => {
                self.last_action_ticks = self.last_action_ticks.saturating_sub(1);
                if self.last_action_ticks == 0 {
                    self.last_action = None;
                }
            }
            Event::Resize(_, _) => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let pressed = key.kind == KeyEventKind::Press;

        if pressed {
            if key.code == KeyCode::Char(self.quit_key)
                || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
            {
                self.should_quit = true;
                return;
            }
        }

        let Some(action) = self.action_for(key.code) else {
            return;
        };

        // Sustain is the one hold-style binding. With release edges the
        // edges map straight through; otherwise each press flips it.
        if action == HotkeyAction::Sustain && !self.release_edges {
            if !pressed {
                return;
            }
            self.sustain_held = !self.sustain_held;
            self.dispatch(HotkeyAction::Sustain, self.sustain_held);
            return;
        }

        if pressed || action == HotkeyAction::Sustain {
            self.dispatch(action, pressed);
        }
    }

    fn action_for(&self, code: KeyCode) -> Option<HotkeyAction> {
        let KeyCode::Char(c) = code else { return None };
        if c == self.keys.increase {
            Some(HotkeyAction::Increase)
        } else if c == self.keys.decrease {
            Some(HotkeyAction::Decrease)
        } else if c == self.keys.sustain {
            Some(HotkeyAction::Sustain)
        } else if c == self.keys.reset {
            Some(HotkeyAction::Reset)
        } else {
            None
        }
    }

    fn dispatch(&mut self, action: HotkeyAction, pressed: bool) {
        if pressed {
            self.last_action = Some(action);
            self.last_action_ticks = 90;
        }
        let controller = self.controller.clone();
        tokio::spawn(async move {
            controller.handle_hotkey(action, pressed).await;
        });
    }

    /// Key bound to an action, for the help line.
    pub fn key_for(&self, action: HotkeyAction) -> char {
        match action {
            HotkeyAction::Increase => self.keys.increase,
            HotkeyAction::Decrease => self.keys.decrease,
            HotkeyAction::Sustain => self.keys.sustain,
            HotkeyAction::Reset => self.keys.reset,
        }
    }

    pub fn quit_key(&self) -> char {
        self.quit_key
    }
}
