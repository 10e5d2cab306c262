pub mod random;

pub use random::RandomGenerator;

use snaplink_core::ShortId;

/// Trait for generating candidate short ids.
///
/// Implementations are pure generators that don't interact with storage and
/// make no uniqueness promise. The store's uniqueness constraint decides
/// whether a candidate is accepted, so generation must stay cheap enough to
/// retry.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortId>;

    /// Produces the next candidate.
    fn generate(&self) -> Self::Output;
}
