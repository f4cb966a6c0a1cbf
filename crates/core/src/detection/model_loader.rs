use std::time::Duration;

use thiserror::Error;

use super::domain::detection_provider::DetectionProvider;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("failed to load face models after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Bounded retry policy for model loading.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Loads the provider's models, retrying with a fixed backoff.
///
/// Stops as soon as a load succeeds; gives up after `max_attempts` (at least one).
pub fn load_models_with_retry(
    provider: &mut dyn DetectionProvider,
    policy: &RetryPolicy,
) -> Result<(), ModelLoadError> {
    if provider.is_loaded() {
        return Ok(());
    }

    let attempts = policy.max_attempts.max(1);
    let mut last = String::new();
    for attempt in 1..=attempts {
        match provider.load_models() {
            Ok(()) => {
                log::info!("Face models loaded (attempt {attempt}/{attempts})");
                return Ok(());
            }
            Err(e) => {
                log::warn!("Model load attempt {attempt}/{attempts} failed: {e}");
                last = e.to_string();
                if attempt < attempts && !policy.backoff.is_zero() {
                    std::thread::sleep(policy.backoff);
                }
            }
        }
    }

    Err(ModelLoadError::Exhausted { attempts, last })
}
