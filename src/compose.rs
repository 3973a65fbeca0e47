//! Selection of the capability-exact decorator type for a wrapped object.
//!
//! Every tier decorator is a composite `Traced*<const CAPS: u8>`; its probe
//! methods answer `Some` for exactly the bits set in `CAPS`. [`compose!`]
//! expands into a binary decision over each capability bit of the tier, so
//! all `2^k` composites are listed at compile time and the probed mask picks
//! one of them.

/// `compose!(mask, core, make; BIT_A, BIT_B, ...)` evaluates to
/// `make!({ CAPS }, core)` where `CAPS` is the const mask equal to `mask`
/// restricted to the listed bits.
macro_rules! compose {
    (@step $mask:ident, $core:ident, $make:ident, $acc:expr; ) => {
        $make!({ $acc }, $core)
    };
    (@step $mask:ident, $core:ident, $make:ident, $acc:expr; $bit:path $(, $rest:path)*) => {
        if $mask & $bit != 0 {
            $crate::compose::compose!(@step $mask, $core, $make, $acc | $bit; $($rest),*)
        } else {
            $crate::compose::compose!(@step $mask, $core, $make, $acc; $($rest),*)
        }
    };
    ($mask:ident, $core:ident, $make:ident; $($bit:path),+ $(,)?) => {
        $crate::compose::compose!(@step $mask, $core, $make, 0u8; $($bit),+)
    };
}

pub(crate) use compose;

/// Fold a list of `(present, bit)` probe results into a mask.
pub(crate) fn mask(probes: &[(bool, u8)]) -> u8 {
    probes
        .iter()
        .filter(|(present, _)| *present)
        .fold(0, |acc, (_, bit)| acc | bit)
}
