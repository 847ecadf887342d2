#![forbid(unsafe_code)]

//! The signup screen: four fields, a create button, and a status label,
//! wired together with reactive bindings.
//!
//! # Wiring
//!
//! - The form is valid when every field is non-empty and both email fields
//!   match.
//! - A [`Command`] gated on form validity submits to the network. The create
//!   button is enabled exactly when the command can execute; its title color
//!   follows.
//! - While the command executes, every field is disabled and greyed out and
//!   the application's network activity indicator is visible.
//! - The status label stays hidden until the first submission ends, then
//!   reports the latest network answer.
//!
//! # Invariants
//!
//! 1. All bindings end when the screen is dropped.
//! 2. Executing state and network answers reach the widgets through the run
//!    loop; nothing changes on screen until it drains.

use std::rc::Rc;

use rfx_runtime::command::{CAN_EXECUTE_KEY, EXECUTING_KEY};
use rfx_runtime::{
    ArgValue, Argument, BindingError, BindingScope, Command, Lifetime, Object, ObjectRef,
    Observable, Reducer, RunLoop, Signal, Value, bind, bind_path, reduce_latest,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::network::SimulatedNetwork;
use crate::widgets::{
    Application, Button, ENABLED, HIDDEN, Label, NETWORK_ACTIVITY_INDICATOR_VISIBLE, TEXT,
    TEXT_COLOR, TextField, color, state,
};

/// Keys of the four text fields on the screen object, in form order.
pub const FIELD_KEYS: [&str; 4] = [
    "first_name_field",
    "last_name_field",
    "email_field",
    "re_email_field",
];
pub const STATUS_LABEL_KEY: &str = "status_label";
pub const CREATE_BUTTON_KEY: &str = "create_button";

pub const SUCCESS_TEXT: &str = "All good!";
pub const FAILURE_TEXT: &str = "An error occurred!";

/// The widgets a [`SignupScreen`] drives.
#[derive(Debug, Clone, Default)]
pub struct SignupWidgets {
    pub first_name: TextField,
    pub last_name: TextField,
    pub email: TextField,
    pub re_email: TextField,
    pub status_label: Label,
    pub create_button: Button,
}

impl SignupWidgets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn fields(&self) -> [&TextField; 4] {
        [&self.first_name, &self.last_name, &self.email, &self.re_email]
    }
}

/// Form validity over the four field texts.
#[must_use]
pub fn form_is_valid(first_name: &str, last_name: &str, email: &str, re_email: &str) -> bool {
    [first_name, last_name, email, re_email]
        .iter()
        .all(|text| !text.is_empty())
        && email == re_email
}

/// Serializable view of everything visible on the screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenSnapshot {
    pub fields: Vec<FieldSnapshot>,
    pub create_button_enabled: bool,
    pub create_button_title_color: String,
    pub status_hidden: bool,
    pub status_text: String,
    pub status_color: String,
    pub network_activity_indicator_visible: bool,
    pub executing: bool,
    pub submit_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSnapshot {
    pub key: &'static str,
    pub text: String,
    pub enabled: bool,
    pub text_color: String,
}

// ---------------------------------------------------------------------------
// SignupScreen
// ---------------------------------------------------------------------------

/// A loaded signup screen and the bindings that keep it consistent.
pub struct SignupScreen {
    widgets: SignupWidgets,
    app: Application,
    command: Command<(), bool>,
    submit_count: Observable<u32>,
    bindings: BindingScope,
    lifetime: Lifetime,
}

impl SignupScreen {
    /// Build the screen object graph and install every binding.
    ///
    /// # Errors
    ///
    /// Any [`BindingError`] from resolving a binding; nothing stays bound on
    /// failure.
    pub fn load(
        widgets: SignupWidgets,
        app: &Application,
        network: SimulatedNetwork,
        run_loop: &RunLoop,
    ) -> Result<Self, BindingError> {
        let lifetime = Lifetime::new("signup_screen");
        let mut bindings = BindingScope::new();
        let root = screen_object(&widgets);

        // Form validity is derived entirely from the field texts.
        let texts: Vec<Signal<String>> = widgets
            .fields()
            .iter()
            .map(|field| field.text_signal())
            .collect();
        let valid = Reducer::quaternary(
            |first: &String, last: &String, email: &String, re_email: &String| {
                form_is_valid(first, last, email, re_email)
            },
        );
        let form_valid = reduce_latest(texts, valid)?;

        let command: Command<(), bool> = Command::new(&form_valid);
        let network_results = command
            .add_action(move |()| network.submit())
            .switch_to_latest()
            .deliver_on(run_loop.clone());

        let submit = widgets.create_button.pressed_signal();
        let trigger = command.clone();
        bindings.hold(submit.subscribe_next(move |()| {
            let _ = trigger.execute(());
        }));

        let button_enabled = bind(command.as_object(), &lifetime)
            .property(CAN_EXECUTE_KEY)
            .observe()
            .boolean();
        bindings.hold(
            bind(Rc::clone(&root), &lifetime)
                .property(CREATE_BUTTON_KEY)
                .assign(ENABLED, &button_enabled)?,
        );

        let default_title_color = widgets.create_button.title_color();
        let button_text_color = button_enabled.flip_flop(
            Value::from(default_title_color),
            Value::from(color::LIGHT_GRAY),
        );
        bindings.hold(
            bind_path!(Rc::clone(&root), &lifetime; create_button).lift_call(
                "set_title_color",
                vec![
                    Argument::positional(ArgValue::Signal(button_text_color)),
                    Argument::keyword("for_state", Value::from(state::NORMAL)),
                ],
            )?,
        );

        let executing = bind(command.as_object(), &lifetime)
            .property(EXECUTING_KEY)
            .observe()
            .boolean()
            .deliver_on(run_loop.clone());
        let field_color =
            executing.flip_flop(Value::from(color::LIGHT_GRAY), Value::from(color::BLACK));
        let field_enabled = executing.negate();
        for key in FIELD_KEYS {
            bindings.hold(
                bind(Rc::clone(&root), &lifetime)
                    .property(key)
                    .assign(TEXT_COLOR, &field_color)?,
            );
            bindings.hold(
                bind(Rc::clone(&root), &lifetime)
                    .property(key)
                    .assign(ENABLED, &field_enabled)?,
            );
        }

        // A submission ends once the button was pressed and executing then
        // reads false.
        let submission_ended = submit
            .map_replace(executing.clone())
            .switch_to_latest()
            .filter(|processing| !processing);
        let submit_counts = submission_ended.scan_with_start(0u32, |running, _| running + 1);

        let submit_count = Observable::new(0u32);
        let count_sink = submit_count.clone();
        bindings.hold(submit_counts.subscribe_next(move |count| {
            count_sink.set(count);
        }));
        bindings.hold(
            bind(Rc::clone(&root), &lifetime)
                .property(STATUS_LABEL_KEY)
                .assign(HIDDEN, &submit_counts.start_with(0).map(|count| count < 1))?,
        );

        bindings.hold(
            bind(Rc::clone(&root), &lifetime)
                .property(STATUS_LABEL_KEY)
                .assign(
                    TEXT,
                    &network_results.flip_flop(SUCCESS_TEXT.to_owned(), FAILURE_TEXT.to_owned()),
                )?,
        );
        bindings.hold(
            bind(Rc::clone(&root), &lifetime)
                .property(STATUS_LABEL_KEY)
                .assign(
                    TEXT_COLOR,
                    &network_results.flip_flop(Value::from(color::GREEN), Value::from(color::RED)),
                )?,
        );

        bindings.hold(
            bind(app.object(), &lifetime)
                .assign(NETWORK_ACTIVITY_INDICATOR_VISIBLE, &executing)?,
        );

        info!(
            bindings = bindings.binding_count(),
            command = command.id(),
            "signup screen loaded"
        );
        Ok(Self {
            widgets,
            app: app.clone(),
            command,
            submit_count,
            bindings,
            lifetime,
        })
    }

    #[must_use]
    pub fn widgets(&self) -> &SignupWidgets {
        &self.widgets
    }

    #[must_use]
    pub fn command(&self) -> &Command<(), bool> {
        &self.command
    }

    /// Submissions that have ended so far.
    #[must_use]
    pub fn submit_count(&self) -> u32 {
        self.submit_count.get()
    }

    /// Current submit count on subscribe, then every change.
    #[must_use]
    pub fn submit_count_signal(&self) -> Signal<u32> {
        self.submit_count.signal()
    }

    /// Type `text` into the field at `index` in form order.
    ///
    /// # Errors
    ///
    /// [`BindingError::InvalidArgument`] for an index past the last field.
    pub fn type_into(&self, index: usize, text: &str) -> Result<bool, BindingError> {
        let field = self.widgets.fields().get(index).copied().ok_or_else(|| {
            BindingError::invalid_argument("type_into", format!("no field at index {index}"))
        })?;
        field.type_text(text)
    }

    /// Press the create button. Returns whether the press was accepted.
    pub fn press_create(&self) -> bool {
        let accepted = self.widgets.create_button.press();
        debug!(accepted, "create button pressed");
        accepted
    }

    #[must_use]
    pub fn snapshot(&self) -> ScreenSnapshot {
        let fields = FIELD_KEYS
            .iter()
            .zip(self.widgets.fields())
            .map(|(&key, field)| FieldSnapshot {
                key,
                text: field.text(),
                enabled: field.is_enabled(),
                text_color: field.text_color(),
            })
            .collect();
        let label = &self.widgets.status_label;
        ScreenSnapshot {
            fields,
            create_button_enabled: self.widgets.create_button.is_enabled(),
            create_button_title_color: self.widgets.create_button.title_color(),
            status_hidden: label.is_hidden(),
            status_text: label.text(),
            status_color: label.text_color(),
            network_activity_indicator_visible: self.app.network_activity_indicator_visible(),
            executing: self.command.is_executing(),
            submit_count: self.submit_count(),
        }
    }
}

impl std::fmt::Debug for SignupScreen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupScreen")
            .field("command", &self.command)
            .field("bindings", &self.bindings.binding_count())
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

/// The object bindings traverse: one key per widget.
fn screen_object(widgets: &SignupWidgets) -> ObjectRef {
    let mut builder = Object::builder("SignupScreen");
    for (key, field) in FIELD_KEYS.iter().zip(widgets.fields()) {
        builder = builder.property(*key, Value::Object(field.object()));
    }
    builder
        .property(STATUS_LABEL_KEY, Value::Object(widgets.status_label.object()))
        .property(CREATE_BUTTON_KEY, Value::Object(widgets.create_button.object()))
        .build()
}
