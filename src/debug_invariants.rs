//! Structural self-checks for grids and partition tables.
//!
//! [`debug_invariants!`] compiles to nothing unless `debug_assertions` or the
//! `strict-invariants` feature is on. [`DebugInvariants::validate_invariants`]
//! reports the same checks as an error in every build.

use crate::heat_error::HeatSimError;

pub trait DebugInvariants {
    /// Panic on a broken invariant when checks are compiled in.
    fn debug_assert_invariants(&self);

    /// First broken invariant, if any.
    fn validate_invariants(&self) -> Result<(), HeatSimError>;

    /// Hand `self` back only if its invariants hold.
    fn into_checked(self) -> Result<Self, HeatSimError>
    where
        Self: Sized,
    {
        self.validate_invariants()?;
        Ok(self)
    }
}

/// Run a `Result`-returning check and panic with `$what` in the message if it
/// fails. Expands to nothing when invariant checks are compiled out.
#[macro_export]
macro_rules! debug_invariants {
    ($check:expr, $what:literal) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants"))]
        if let Err(e) = $check {
            panic!(concat!("broken ", $what, " invariant: {}"), e);
        }
    };
}
