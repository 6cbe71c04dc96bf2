//! Process-wide switches for diagnostics and shortcuts that do not affect consensus.

#![allow(
    unused_crate_dependencies,
    reason = "The `unused_crate_dependencies` lint checks every crate in a package separately. \
              See <https://github.com/rust-lang/rust/issues/57274>."
)]

use core::{
    fmt::Display,
    sync::atomic::{AtomicBool, Ordering},
};

use log::info;
use parse_display::{Display, FromStr};
use variant_count::VariantCount;

static FEATURES: [AtomicBool; Feature::VARIANT_COUNT] =
    [const { AtomicBool::new(false) }; Feature::VARIANT_COUNT];

#[derive(Clone, Copy, PartialEq, Eq, Debug, Display, FromStr, VariantCount)]
pub enum Feature {
    /// Log every block produced by the node.
    DebugBlockProducer,
    /// Log how long applying each block took.
    LogBlockProcessingTime,
    // Blocks produced by the node are validated like blocks from anyone else unless this is set.
    TrustOwnBlockSignatures,
}

impl Feature {
    const ALL: [Self; Self::VARIANT_COUNT] = [
        Self::DebugBlockProducer,
        Self::LogBlockProcessingTime,
        Self::TrustOwnBlockSignatures,
    ];

    // Weaker orderings would let threads observe features being enabled in different orders.
    const ORDERING: Ordering = Ordering::SeqCst;

    #[inline]
    #[must_use]
    pub fn is_enabled(self) -> bool {
        FEATURES[self as usize].load(Self::ORDERING)
    }

    #[inline]
    pub fn enable(self) {
        FEATURES[self as usize].store(true, Self::ORDERING);
    }

    pub fn enable_all(features: impl IntoIterator<Item = Self>) {
        features.into_iter().for_each(Self::enable);
    }

    pub fn enabled() -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(|feature| feature.is_enabled())
    }

    pub fn log(self, message: impl Display) {
        info!("[{self}] {message}");
    }
}

/// Logs a message tagged with a feature if the feature is enabled.
///
/// The message arguments are only evaluated if the feature is enabled.
#[macro_export]
macro_rules! log {
    ($feature: ident, $($message: tt)+) => {{
        let feature = $crate::Feature::$feature;
        if feature.is_enabled() {
            feature.log(format_args!($($message)+))
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_can_be_parsed_from_their_names() -> Result<(), parse_display::ParseError> {
        assert_eq!(
            "TrustOwnBlockSignatures".parse::<Feature>()?,
            Feature::TrustOwnBlockSignatures,
        );

        assert!("NoSuchFeature".parse::<Feature>().is_err());

        Ok(())
    }

    #[test]
    fn all_lists_every_variant_once() {
        for (index, feature) in Feature::ALL.into_iter().enumerate() {
            assert_eq!(feature as usize, index);
        }
    }
}
