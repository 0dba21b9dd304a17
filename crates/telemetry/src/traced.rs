//! Scoped timing and error logging around external calls.

use std::fmt::Display;
use std::future::Future;

use tokio::time::Instant;
use tracing::{debug, error};

/// Logs `"{description} ..."` on creation and the elapsed time on drop.
pub struct TracedScope {
    description: String,
    start: Instant,
}

impl TracedScope {
    pub fn enter(description: impl Into<String>) -> Self {
        let description = description.into();
        debug!("{} ...", description);
        Self {
            description,
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Drop for TracedScope {
    fn drop(&mut self) {
        debug!("{} ... done ({:.4} secs)", self.description, self.elapsed_secs());
    }
}

/// Await `future` inside a [`TracedScope`]. Errors are logged once and
/// returned unchanged.
pub async fn traced<F, T, E>(description: &str, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let _scope = TracedScope::enter(description);
    future.await.map_err(|err| {
        error!("Caught exception in {}: {}", description, err);
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_traced_passes_value_through() {
        let value: Result<u32, String> = traced("Adding numbers.", async { Ok(40 + 2) }).await;
        assert_eq!(value, Ok(42));
    }

    #[tokio::test]
    async fn test_traced_returns_error_unchanged() {
        let result: Result<(), String> =
            traced("Failing call.", async { Err("backend unavailable".to_string()) }).await;
        assert_eq!(result, Err("backend unavailable".to_string()));
    }

    #[test]
    fn test_scope_measures_elapsed_time() {
        let scope = TracedScope::enter("Sleeping.");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(scope.elapsed_secs() >= 0.005);
    }
}
