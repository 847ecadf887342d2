#![forbid(unsafe_code)]

//! Simulated widgets.
//!
//! Each widget is a thin typed handle over a key-value coding [`Object`], so
//! bindings reach it through key paths while callers and tests use plain
//! methods. Colors are named strings.

use std::rc::Rc;

use rfx_runtime::{
    BindingError, KeyValueCoding, Object, ObjectRef, Result, Signal, Subject, Value,
};

/// Named colors used by the signup screen.
pub mod color {
    pub const BLACK: &str = "black";
    pub const LIGHT_GRAY: &str = "light_gray";
    pub const GREEN: &str = "green";
    pub const RED: &str = "red";
    pub const SYSTEM_BLUE: &str = "system_blue";
}

/// Control state names accepted by [`Button`]'s `set_title_color:for_state:`.
pub mod state {
    pub const NORMAL: &str = "normal";
    pub const HIGHLIGHTED: &str = "highlighted";
}

pub const TEXT: &str = "text";
pub const TEXT_COLOR: &str = "text_color";
pub const ENABLED: &str = "enabled";
pub const HIDDEN: &str = "hidden";
pub const TITLE_COLOR: &str = "title_color";
pub const HIGHLIGHTED_TITLE_COLOR: &str = "highlighted_title_color";
pub const NETWORK_ACTIVITY_INDICATOR_VISIBLE: &str = "network_activity_indicator_visible";

fn read_bool(object: &Object, key: &str) -> bool {
    object.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn read_string(object: &Object, key: &str) -> String {
    object
        .get(key)
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// TextField
// ---------------------------------------------------------------------------

/// Editable single-line text.
#[derive(Debug, Clone)]
pub struct TextField {
    object: Rc<Object>,
}

impl TextField {
    #[must_use]
    pub fn new() -> Self {
        Self {
            object: Object::builder("TextField")
                .property(TEXT, "")
                .property(TEXT_COLOR, color::BLACK)
                .property(ENABLED, true)
                .build(),
        }
    }

    /// Replace the text as if the user typed it. A disabled field ignores
    /// input and returns `false`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying write failure.
    pub fn type_text(&self, text: &str) -> Result<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }
        self.object.set(TEXT, text)?;
        Ok(true)
    }

    #[must_use]
    pub fn text(&self) -> String {
        read_string(&self.object, TEXT)
    }

    /// Current text on subscribe, then every edit.
    #[must_use]
    pub fn text_signal(&self) -> Signal<String> {
        self.object
            .observe_key(TEXT)
            .map(|value| value.as_str().map(str::to_owned).unwrap_or_default())
    }

    #[must_use]
    pub fn text_color(&self) -> String {
        read_string(&self.object, TEXT_COLOR)
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        read_bool(&self.object, ENABLED)
    }

    #[must_use]
    pub fn object(&self) -> ObjectRef {
        Rc::clone(&self.object) as ObjectRef
    }
}

impl Default for TextField {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Button
// ---------------------------------------------------------------------------

/// Push button with per-state title colors.
#[derive(Debug, Clone)]
pub struct Button {
    object: Rc<Object>,
    presses: Subject<()>,
}

impl Button {
    #[must_use]
    pub fn new() -> Self {
        let object = Object::builder("Button")
            .property(ENABLED, true)
            .property(TITLE_COLOR, color::SYSTEM_BLUE)
            .property(HIGHLIGHTED_TITLE_COLOR, color::SYSTEM_BLUE)
            .method("set_title_color:for_state:", 2, set_title_color)
            .build();
        Self {
            object,
            presses: Subject::new(),
        }
    }

    /// Simulate a tap. Disabled buttons swallow it and return `false`.
    pub fn press(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.presses.send_next(());
        true
    }

    /// Emits once per accepted [`press`](Self::press).
    #[must_use]
    pub fn pressed_signal(&self) -> Signal<()> {
        self.presses.signal()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        read_bool(&self.object, ENABLED)
    }

    /// Title color for the normal state.
    #[must_use]
    pub fn title_color(&self) -> String {
        read_string(&self.object, TITLE_COLOR)
    }

    #[must_use]
    pub fn object(&self) -> ObjectRef {
        Rc::clone(&self.object) as ObjectRef
    }
}

impl Default for Button {
    fn default() -> Self {
        Self::new()
    }
}

fn set_title_color(button: &Object, args: &[Value]) -> Result<Value> {
    let [color, for_state] = args else {
        return Err(BindingError::invalid_argument(
            "set_title_color:for_state:",
            "takes a color and a state",
        ));
    };
    let key = match for_state.as_str() {
        Some(state::NORMAL) => TITLE_COLOR,
        Some(state::HIGHLIGHTED) => HIGHLIGHTED_TITLE_COLOR,
        _ => {
            return Err(BindingError::Invocation {
                selector: "set_title_color:for_state:".into(),
                message: format!("unsupported control state {for_state}"),
            });
        }
    };
    button.set(key, color.clone())?;
    Ok(Value::Null)
}

// ---------------------------------------------------------------------------
// Label
// ---------------------------------------------------------------------------

/// Read-only text.
#[derive(Debug, Clone)]
pub struct Label {
    object: Rc<Object>,
}

impl Label {
    #[must_use]
    pub fn new() -> Self {
        Self {
            object: Object::builder("Label")
                .property(TEXT, "")
                .property(TEXT_COLOR, color::BLACK)
                .property(HIDDEN, false)
                .build(),
        }
    }

    #[must_use]
    pub fn text(&self) -> String {
        read_string(&self.object, TEXT)
    }

    #[must_use]
    pub fn text_color(&self) -> String {
        read_string(&self.object, TEXT_COLOR)
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        read_bool(&self.object, HIDDEN)
    }

    #[must_use]
    pub fn object(&self) -> ObjectRef {
        Rc::clone(&self.object) as ObjectRef
    }
}

impl Default for Label {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Process-wide chrome.
#[derive(Debug, Clone)]
pub struct Application {
    object: Rc<Object>,
}

impl Application {
    #[must_use]
    pub fn new() -> Self {
        Self {
            object: Object::builder("Application")
                .property(NETWORK_ACTIVITY_INDICATOR_VISIBLE, false)
                .build(),
        }
    }

    #[must_use]
    pub fn network_activity_indicator_visible(&self) -> bool {
        read_bool(&self.object, NETWORK_ACTIVITY_INDICATOR_VISIBLE)
    }

    #[must_use]
    pub fn object(&self) -> ObjectRef {
        Rc::clone(&self.object) as ObjectRef
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}
