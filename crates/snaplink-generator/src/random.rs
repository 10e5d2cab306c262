use crate::Generator;
use rand::distr::Alphanumeric;
use rand::Rng;
use snaplink_core::{ShortId, SHORT_ID_LEN};

/// Generates short ids uniformly at random from `[A-Za-z0-9]`.
///
/// Every call draws [`SHORT_ID_LEN`] characters from the thread-local RNG, so
/// the generator carries no state and can be shared freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGenerator;

impl RandomGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for RandomGenerator {
    type Output = ShortId;

    fn generate(&self) -> Self::Output {
        let id: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SHORT_ID_LEN)
            .map(char::from)
            .collect();
        ShortId::new_unchecked(id)
    }
}
