use crate::config::Config;

#[derive(Clone, Debug)]
pub enum Termination {
    /// Terminate after a given number of iterations
    Iterations(u64),
    /// Maximum running time from `Instant`
    Timeout(std::time::Instant, std::time::Duration),
    /// Run until convergence
    Never,
    /// Terminate if either of the two termination criteria
    /// tells it to terminate
    Any(Box<Termination>, Box<Termination>),
}

impl Termination {
    /// The criterion described by the iteration and time limits of a config
    pub fn from_config(config: &Config) -> Termination {
        let iterations = config.max_iterations.map(Termination::Iterations);
        let timeout = config.timeout.map(|secs| {
            Termination::Timeout(
                std::time::Instant::now(),
                std::time::Duration::from_secs(secs),
            )
        });

        match (iterations, timeout) {
            (Some(one), Some(two)) => Termination::Any(Box::new(one), Box::new(two)),
            (Some(one), None) | (None, Some(one)) => one,
            (None, None) => Termination::Never,
        }
    }

    pub fn should_terminate(&mut self, iteration: u64) -> bool {
        match self {
            Termination::Timeout(from, duration) => (std::time::Instant::now() - *from) > *duration,
            Termination::Iterations(n) => iteration >= *n,
            Termination::Never => false,
            Termination::Any(one, two) => {
                one.should_terminate(iteration) || two.should_terminate(iteration)
            }
        }
    }
}

impl Default for Termination {
    fn default() -> Self {
        Termination::Never
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Iterations(n) => write!(f, "{n} iterations"),
            Termination::Timeout(_, dur) => write!(f, "{} timeout", dur.as_secs()),
            Termination::Never => write!(f, "never"),
            Termination::Any(lhs, rhs) => write!(f, "({lhs}) | ({rhs})"),
        }
    }
}
