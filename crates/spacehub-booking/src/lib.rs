//! SpaceHub Booking - lifecycle of a single reservation
//!
//! Two pure components with no I/O:
//!
//! - [`state_machine`]: legal transitions, who may take them, and the
//!   construction-time derivations (`is_cancellable`, `cancellation_deadline`).
//! - [`policy`]: the refund a cancellation earns, shared by the preview and
//!   the cancellation itself.
//!
//! Every function takes `now` explicitly so callers control the clock.

pub mod policy;
pub mod state_machine;

pub use policy::{CancellationPolicy, RefundQuote};
pub use state_machine::{
    can_transition, CancellationPreview, NewBooking,
};
