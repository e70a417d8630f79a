//! Module interfaces
//!
//! Each state of an executable's system state machine shall implement the items in this module.

// ---------------------------------------------------------------------------
// MODULE STATE
// ---------------------------------------------------------------------------

/// A state of a cyclically processed state machine.
///
/// The owning state machine guarantees that for any transition the old state's `exit` runs before
/// the new state's `entry`, and both run in the same cycle as the `process` call which requested
/// the transition.
pub trait State {
    /// Data lent to the state on every call, for example the hardware collaborators.
    type Context;

    /// A request to move to another state.
    type Transition;

    /// Called once when the state becomes active.
    fn entry(&mut self, ctx: &mut Self::Context);

    /// Main state processing function, called once per cycle while the state is active.
    ///
    /// # Outputs
    /// - `Some(transition)` if the state machine shall leave this state.
    /// - `None` to stay in this state.
    fn process(&mut self, ctx: &mut Self::Context) -> Option<Self::Transition>;

    /// Called once when the state is left.
    fn exit(&mut self, ctx: &mut Self::Context);
}
