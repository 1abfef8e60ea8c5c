//! `flowbot-scheduler`: timer-driven maintenance sweeps.
//!
//! A [`SweepRunner`] owns a set of [`Sweep`]s and runs them all on a fixed
//! interval from one background task. [`SweepRunner::start`] returns a
//! [`SweepHandle`]; call [`SweepHandle::stop`] to end the loop and wait for
//! it. Every sweep must be idempotent: a pass that finds nothing to do
//! changes nothing.
//!
//! | Sweep               | Effect                                              |
//! |---------------------|-----------------------------------------------------|
//! | `SubscriptionSweep` | Suspends lapsed subscriptions and their deployments |

pub mod error;
pub mod runner;
pub mod subscription;

pub use error::{Result, SweepError};
pub use runner::{Sweep, SweepHandle, SweepRunner};
pub use subscription::SubscriptionSweep;
