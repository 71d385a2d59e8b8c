pub mod bkt;
pub mod fit;
pub mod tracker;

pub use fit::{fit_parameters, BktFit};
pub use tracker::MasteryTracker;
