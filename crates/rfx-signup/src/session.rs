#![forbid(unsafe_code)]

//! One scripted signup run: load the screen, fill the form, submit.

use rfx_runtime::RunLoop;
use tracing::{info, warn};

use crate::config::SignupConfig;
use crate::error::{Result, SignupError};
use crate::network::SimulatedNetwork;
use crate::screen::{ScreenSnapshot, SignupScreen, SignupWidgets};
use crate::widgets::Application;

/// Run `config` to completion and return what the screen shows at the end.
///
/// # Errors
///
/// [`SignupError::InvalidConfig`], a binding failure while loading, or
/// [`SignupError::SubmitDisabled`] when the form never becomes valid.
pub fn run_session(config: &SignupConfig) -> Result<ScreenSnapshot> {
    config.validate()?;
    let run_loop = if config.lab_clock {
        RunLoop::lab()
    } else {
        RunLoop::new()
    };
    let network = SimulatedNetwork::new(
        &run_loop,
        config.network_delay(),
        config.success_probability,
        config.seed,
    );
    let app = Application::new();
    let screen = SignupScreen::load(SignupWidgets::new(), &app, network, &run_loop)?;

    let entries = [
        &config.first_name,
        &config.last_name,
        &config.email,
        &config.re_email,
    ];
    for (index, text) in entries.into_iter().enumerate() {
        screen.type_into(index, text)?;
    }
    run_loop.drain();

    for attempt in 1..=config.submissions {
        if !screen.press_create() {
            warn!(attempt, "create button is disabled");
            return Err(SignupError::SubmitDisabled);
        }
        run_loop.run_until_idle();
        let snapshot = screen.snapshot();
        info!(
            attempt,
            status = %snapshot.status_text,
            submit_count = snapshot.submit_count,
            "submission ended"
        );
    }
    Ok(screen.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn filled() -> SignupConfig {
        SignupConfig::default()
            .with_first_name("Ada")
            .with_last_name("Lovelace")
            .with_email("ada@example.com")
            .with_lab_clock(true)
    }

    #[test]
    fn invalid_config_is_rejected_before_loading() {
        let err = run_session(&filled().with_success_probability(-0.1)).expect_err("bad config");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    #[traced_test]
    fn incomplete_form_cannot_submit() {
        let err = run_session(&filled().with_last_name("")).expect_err("form invalid");
        assert!(matches!(err, SignupError::SubmitDisabled));
        assert!(logs_contain("create button is disabled"));
    }

    #[test]
    fn successful_run_reports_success() {
        let snapshot = run_session(&filled().with_success_probability(1.0)).expect("runs");
        assert_eq!(snapshot.submit_count, 1);
        assert_eq!(snapshot.status_text, crate::screen::SUCCESS_TEXT);
        assert!(!snapshot.executing);
        assert!(snapshot.create_button_enabled);
    }
}
