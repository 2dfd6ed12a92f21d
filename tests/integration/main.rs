//! End-to-end scenarios driving a [`CanServer`] over a [`LoopbackBus`], one
//! module per scenario group from the spec's testable-properties section.

mod capacity;
mod handshake;
mod routing;
mod support;
mod transfer;
