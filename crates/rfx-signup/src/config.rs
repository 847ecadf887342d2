#![forbid(unsafe_code)]

//! Resolved demo configuration.

use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::error::{Result, SignupError};

/// Everything a signup run needs, after CLI and environment resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignupConfig {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub re_email: String,
    /// Simulated network latency in milliseconds.
    pub network_delay_ms: u64,
    pub success_probability: f64,
    pub seed: u64,
    /// Drive time manually instead of sleeping on the wall clock.
    pub lab_clock: bool,
    /// How many times to press the submit button.
    pub submissions: u32,
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            re_email: String::new(),
            network_delay_ms: 3_000,
            success_probability: 0.5,
            seed: 0,
            lab_clock: false,
            submissions: 1,
        }
    }
}

impl SignupConfig {
    #[must_use]
    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self
    }

    #[must_use]
    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = last_name.into();
        self
    }

    /// Sets both the email and its confirmation.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self.re_email = self.email.clone();
        self
    }

    #[must_use]
    pub fn with_re_email(mut self, re_email: impl Into<String>) -> Self {
        self.re_email = re_email.into();
        self
    }

    #[must_use]
    pub fn with_network_delay(mut self, delay: Duration) -> Self {
        self.network_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_success_probability(mut self, probability: f64) -> Self {
        self.success_probability = probability;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_lab_clock(mut self, lab_clock: bool) -> Self {
        self.lab_clock = lab_clock;
        self
    }

    #[must_use]
    pub fn with_submissions(mut self, submissions: u32) -> Self {
        self.submissions = submissions;
        self
    }

    #[must_use]
    pub fn network_delay(&self) -> Duration {
        Duration::from_millis(self.network_delay_ms)
    }

    /// # Errors
    ///
    /// [`SignupError::InvalidConfig`] when the probability is outside
    /// `[0, 1]` or no submission is requested.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.success_probability) {
            return Err(SignupError::invalid_config(format!(
                "success probability must be within [0, 1], got {}",
                self.success_probability
            )));
        }
        if self.submissions == 0 {
            return Err(SignupError::invalid_config(
                "at least one submission is required",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_compose() {
        let config = SignupConfig::default()
            .with_first_name("Ada")
            .with_last_name("Lovelace")
            .with_email("ada@example.com")
            .with_network_delay(Duration::from_millis(250))
            .with_seed(9);
        assert_eq!(config.re_email, "ada@example.com");
        assert_eq!(config.network_delay(), Duration::from_millis(250));
        assert_eq!(config.seed, 9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn mismatched_confirmation_is_still_a_valid_config() {
        let config = SignupConfig::default()
            .with_email("a@example.com")
            .with_re_email("b@example.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_probability_and_zero_submissions() {
        let bad_probability = SignupConfig::default().with_success_probability(1.5);
        assert!(matches!(
            bad_probability.validate(),
            Err(SignupError::InvalidConfig { .. })
        ));
        let no_submissions = SignupConfig::default().with_submissions(0);
        assert!(no_submissions.validate().is_err());
    }

    #[test]
    fn json_round_trip_fills_defaults() {
        let config: SignupConfig =
            serde_json::from_str(r#"{"first_name":"Ada","lab_clock":true}"#).expect("parses");
        assert_eq!(config.first_name, "Ada");
        assert!(config.lab_clock);
        assert_eq!(config.network_delay_ms, 3_000);
        assert_eq!(config.submissions, 1);
    }
}
