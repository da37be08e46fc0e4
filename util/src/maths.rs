//! Small numeric helpers shared by the tracker modules

use num_traits::Float;

/// Linearly rescale `value` from `from` onto `to`.
///
/// A degenerate `from` range gives the start of `to` rather than a NaN.
pub fn lin_map<T: Float>(from: (T, T), to: (T, T), value: T) -> T {
    let span = from.1 - from.0;
    if span == T::zero() {
        return to.0;
    }

    to.0 + (value - from.0) / span * (to.1 - to.0)
}
