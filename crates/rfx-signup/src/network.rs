#![forbid(unsafe_code)]

//! Simulated signup backend: answers after a fixed delay with a random
//! success flag.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rfx_runtime::{RunLoop, Signal};
use tracing::debug;
use web_time::{Duration, Instant};

/// Delay-then-coin-flip network.
///
/// Cloning shares the random number generator, so a seeded network yields the
/// same answer sequence however many handles submit through it.
#[derive(Clone)]
pub struct SimulatedNetwork {
    run_loop: RunLoop,
    delay: Duration,
    success_probability: f64,
    rng: Rc<RefCell<StdRng>>,
}

impl SimulatedNetwork {
    /// `success_probability` is clamped into `[0, 1]`.
    #[must_use]
    pub fn new(run_loop: &RunLoop, delay: Duration, success_probability: f64, seed: u64) -> Self {
        Self {
            run_loop: run_loop.clone(),
            delay,
            success_probability: success_probability.clamp(0.0, 1.0),
            rng: Rc::new(RefCell::new(StdRng::seed_from_u64(seed))),
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// One submission: waits `delay` on the run loop, emits whether it
    /// succeeded, then completes.
    #[must_use]
    pub fn submit(&self) -> Signal<bool> {
        let rng = Rc::clone(&self.rng);
        let probability = self.success_probability;
        Signal::<Instant>::interval(self.delay, self.run_loop.clone())
            .take(1)
            .sequence_many(move |_| {
                let success = rng.borrow_mut().gen_bool(probability);
                debug!(success, "simulated network answered");
                Signal::just(success)
            })
    }
}

impl std::fmt::Debug for SimulatedNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedNetwork")
            .field("delay", &self.delay)
            .field("success_probability", &self.success_probability)
            .finish_non_exhaustive()
    }
}
