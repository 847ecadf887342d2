use clap::Parser;

use crate::config::SignupConfig;
use crate::error::Result;
use crate::session::run_session;

#[derive(Debug, Parser)]
#[command(
    name = "rfx-signup",
    about = "Fill in and submit a simulated signup form driven by reactive bindings",
    version
)]
pub struct Cli {
    #[arg(long = "first-name", env = "RFX_SIGNUP_FIRST_NAME", default_value = "")]
    pub first_name: String,

    #[arg(long = "last-name", env = "RFX_SIGNUP_LAST_NAME", default_value = "")]
    pub last_name: String,

    #[arg(long, env = "RFX_SIGNUP_EMAIL", default_value = "")]
    pub email: String,

    /// Email confirmation. Defaults to `--email`.
    #[arg(long = "re-email", env = "RFX_SIGNUP_RE_EMAIL")]
    pub re_email: Option<String>,

    #[arg(
        long = "network-delay-ms",
        env = "RFX_SIGNUP_NETWORK_DELAY_MS",
        default_value_t = 3_000
    )]
    pub network_delay_ms: u64,

    #[arg(
        long = "success-probability",
        env = "RFX_SIGNUP_SUCCESS_PROBABILITY",
        default_value_t = 0.5
    )]
    pub success_probability: f64,

    /// Seed for the simulated network. Random when omitted.
    #[arg(long, env = "RFX_SIGNUP_SEED")]
    pub seed: Option<u64>,

    /// Advance a manual clock instead of sleeping through network delays.
    #[arg(long = "lab-clock", env = "RFX_SIGNUP_LAB_CLOCK")]
    pub lab_clock: bool,

    #[arg(long, env = "RFX_SIGNUP_SUBMISSIONS", default_value_t = 1)]
    pub submissions: u32,

    /// Print the resolved configuration as JSON and exit.
    #[arg(long = "print-config")]
    pub print_config: bool,
}

impl Cli {
    #[must_use]
    pub fn config(&self) -> SignupConfig {
        let re_email = self.re_email.clone().unwrap_or_else(|| self.email.clone());
        SignupConfig {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            re_email,
            network_delay_ms: self.network_delay_ms,
            success_probability: self.success_probability,
            seed: self.seed.unwrap_or_else(rand::random),
            lab_clock: self.lab_clock,
            submissions: self.submissions,
        }
    }
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let config = cli.config();
    if cli.print_config {
        config.validate()?;
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    let snapshot = run_session(&config)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
