//! Binding engine: chord matching and prefix chains.
use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Modifier bits in the X11 wire encoding (`ModMask`): bit position matches
/// the protocol so a raw event's mask can be used directly.
bitflags::bitflags! {
    #[derive(Default, Serialize, Deserialize)]
    pub struct ModMask: u16 {
        const SHIFT    = 1 << 0;
        const LOCK     = 1 << 1; // CapsLock
        const CONTROL  = 1 << 2;
        const MOD1     = 1 << 3; // Alt
        const MOD2     = 1 << 4; // NumLock (typically)
        const MOD3     = 1 << 5; // ScrollLock (typically)
        const MOD4     = 1 << 6; // Super
        const MOD5     = 1 << 7;
    }
}

impl ModMask {
    /// Numlock/capslock/scrolllock are masked out of event modifiers before
    /// matching a binding, unless the binding explicitly names them.
    /// `numlock_mask`/`scrolllock_mask` are runtime-detected (they vary by
    /// keyboard mapping) and passed in by the caller.
    pub fn normalized(self, ignored: ModMask) -> ModMask {
        self & !ignored
    }
}

pub type KeyCodeValue = u8;

/// A key press: the normalized modifier mask plus the raw keycode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode {
    pub mask: ModMask,
    pub code: KeyCodeValue,
}

impl KeyCode {
    pub fn new(mask: ModMask, code: KeyCodeValue) -> Self {
        KeyCode { mask, code }
    }

    pub fn ignoring(&self, mask: ModMask) -> KeyCode {
        KeyCode { mask: self.mask & !mask, code: self.code }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    ScrollUp,
    ScrollDown,
}

impl From<MouseButton> for u8 {
    fn from(b: MouseButton) -> u8 {
        match b {
            MouseButton::Left => 1,
            MouseButton::Middle => 2,
            MouseButton::Right => 3,
            MouseButton::ScrollUp => 4,
            MouseButton::ScrollDown => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ButtonState {
    pub button: MouseButton,
    pub mask: ModMask,
}

/// A chord key as used to index into a [`Bindings`] map: either a keyboard
/// chord or a button chord, both normalized the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChordKey {
    Key(KeyCode),
    Button(ButtonState),
    /// Matches the release of the chord's last held modifier — used by
    /// focus-cycle to commit its target.
    ModifierRelease,
}

/// A node in a binding map: either a terminal callback, or a nested map
/// that becomes active as a "prefix chain".
pub enum BindingNode<A> {
    Callback(A),
    Prefix(HashMap<ChordKey, BindingNode<A>>),
}

/// The result of feeding one chord into the binding engine.
#[derive(Debug, PartialEq, Eq)]
pub enum PressOutcome<'a, A> {
    NoMatch,
    IntermediatePrefix,
    Terminal(&'a A),
}

/// How long an active prefix chain waits for its next chord before it
/// aborts and restores the main binding state.
pub const PREFIX_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug)]
pub struct Bindings<A> {
    root: HashMap<ChordKey, BindingNode<A>>,
    /// The chord path walked so far into `root` while a prefix chain is
    /// active, plus the deadline for the next chord.
    active_path: Vec<ChordKey>,
    deadline: Option<Instant>,
}

impl<A> Bindings<A> {
    pub fn new(root: HashMap<ChordKey, BindingNode<A>>) -> Self {
        Bindings { root, active_path: Vec::new(), deadline: None }
    }

    pub fn is_prefix_active(&self) -> bool {
        !self.active_path.is_empty()
    }

    /// Abort an in-progress prefix chain without running anything,
    /// restoring the main binding state.
    pub fn abort_prefix(&mut self) {
        self.active_path.clear();
        self.deadline = None;
    }

    /// Feed one chord into the engine. Returns `NoMatch` if nothing binds
    /// it, `IntermediatePrefix`
    /// if it entered or continued a nested map, or `Terminal(action)` if it
    /// resolved to a callback.
    pub fn press(&mut self, key: ChordKey) -> PressOutcome<'_, A> {
        if let Some(deadline) = self.deadline {
            if Instant::now() > deadline {
                self.abort_prefix();
            }
        }

        let mut candidate = self.active_path.clone();
        candidate.push(key);

        match lookup(&self.root, &candidate) {
            Some(BindingNode::Callback(a)) => {
                self.active_path.clear();
                self.deadline = None;
                PressOutcome::Terminal(a)
            }
            Some(BindingNode::Prefix(_)) => {
                self.active_path = candidate;
                self.deadline = Some(Instant::now() + PREFIX_TIMEOUT);
                PressOutcome::IntermediatePrefix
            }
            None => {
                self.abort_prefix();
                PressOutcome::NoMatch
            }
        }
    }
}

/// Walk `path` through nested `Prefix` maps starting at `root`, returning
/// the node reached at the end of the path, if any.
fn lookup<'a, A>(
    root: &'a HashMap<ChordKey, BindingNode<A>>,
    path: &[ChordKey],
) -> Option<&'a BindingNode<A>> {
    let (last, init) = path.split_last()?;
    let mut map = root;
    for key in init {
        match map.get(key)? {
            BindingNode::Prefix(next) => map = next,
            BindingNode::Callback(_) => return None,
        }
    }
    map.get(last)
}

/// Keypad motion/digit keysyms fall back to their non-keypad equivalent if
/// no binding matches the raw keypad symbol.
pub fn keypad_alias(keysym: &str) -> Option<&'static str> {
    Some(match keysym {
        "KP_Left" => "Left",
        "KP_Right" => "Right",
        "KP_Up" => "Up",
        "KP_Down" => "Down",
        "KP_Home" => "Home",
        "KP_End" => "End",
        "KP_Page_Up" | "KP_Prior" => "Page_Up",
        "KP_Page_Down" | "KP_Next" => "Page_Down",
        "KP_Insert" => "Insert",
        "KP_Delete" => "Delete",
        "KP_Enter" => "Return",
        "KP_0" => "0",
        "KP_1" => "1",
        "KP_2" => "2",
        "KP_3" => "3",
        "KP_4" => "4",
        "KP_5" => "5",
        "KP_6" => "6",
        "KP_7" => "7",
        "KP_8" => "8",
        "KP_9" => "9",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    fn key(code: u8) -> ChordKey {
        ChordKey::Key(KeyCode::new(ModMask::MOD4, code))
    }

    #[test]
    fn direct_match_is_terminal() {
        let mut map = HashMap::new();
        map.insert(key(1), BindingNode::Callback("focus-next"));
        let mut bindings = Bindings::new(map);

        assert_eq!(bindings.press(key(1)), PressOutcome::Terminal(&"focus-next"));
    }

    #[test]
    fn unbound_chord_is_no_match() {
        let mut bindings: Bindings<&str> = Bindings::new(HashMap::new());
        assert_eq!(bindings.press(key(99)), PressOutcome::NoMatch);
    }

    #[test]
    fn prefix_chain_resolves_nested_terminal() {
        let mut nested = HashMap::new();
        nested.insert(key(2), BindingNode::Callback("tag-work"));
        let mut root = HashMap::new();
        root.insert(key(1), BindingNode::Prefix(nested));
        let mut bindings = Bindings::new(root);

        assert_eq!(bindings.press(key(1)), PressOutcome::IntermediatePrefix);
        assert!(bindings.is_prefix_active());
        assert_eq!(bindings.press(key(2)), PressOutcome::Terminal(&"tag-work"));
        assert!(!bindings.is_prefix_active());
    }

    #[test]
    fn nonmatching_input_aborts_prefix() {
        let mut nested = HashMap::new();
        nested.insert(key(2), BindingNode::Callback("tag-work"));
        let mut root = HashMap::new();
        root.insert(key(1), BindingNode::Prefix(nested));
        let mut bindings = Bindings::new(root);

        bindings.press(key(1));
        assert_eq!(bindings.press(key(50)), PressOutcome::NoMatch);
        assert!(!bindings.is_prefix_active());
    }

    #[test_case("KP_5", Some("5"); "digit")]
    #[test_case("KP_Left", Some("Left"); "motion")]
    #[test_case("KP_Page_Up", Some("Page_Up"); "page up alt name")]
    #[test_case("KP_Prior", Some("Page_Up"); "page up legacy alias")]
    #[test_case("KP_Enter", Some("Return"); "enter")]
    #[test_case("a", None; "non keypad symbol has no alias")]
    #[test]
    fn keypad_aliases_resolve_to_their_plain_equivalent(keysym: &str, expected: Option<&str>) {
        assert_eq!(keypad_alias(keysym), expected);
    }
}
