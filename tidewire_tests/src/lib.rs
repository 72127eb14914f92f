/*! # Tidewire Tests

Helpers to run two tidewire peers against each other over a simulated link.
*/

pub mod conditioner;
pub mod stepper;

#[cfg(test)]
mod channels;
#[cfg(test)]
mod packets;
