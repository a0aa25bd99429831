mod lag;
mod reconcile;
mod tick;

pub use lag::{LagCompensationError, LagCompensator, LagSample, DEFAULT_LAG_WINDOW_SECS};
pub use reconcile::{Correction, ReconcileConfig, Reconciler};
pub use tick::FixedTimestep;
