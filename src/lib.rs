//! # showerscale
//!
//! Lookup-table engine for the shower reconstruction of imaging atmospheric
//! Cherenkov telescope (IACT) arrays.
//!
//! Simulated showers are used to fill 2D tables of the expected image width, image
//! length and true energy as a function of image size and core distance, for every
//! observing condition (zenith angle, wobble offset, azimuth sector, telescope type,
//! noise level). Observed events are then compared with these tables to obtain the
//! mean scaled width/length (mscw/mscl) used for gamma/hadron separation and an
//! energy estimate.
//!
//! ## Modules
//! -----------------
//! * [`tables`] – weighted per-bin statistics, single lookup tables, interpolation.
//! * [`grid`] – the multi-dimensional grid of tables, its filling and persistence.
//! * [`reconstruction`] – geometric stereo reconstruction of direction and core.
//! * [`estimator`] – per-event mscw/mscl/energy estimation.
//! * [`pipeline`] – event loops, cut statistics, run budget, CSV export.
//! * [`lookup_params`] – configuration shared by every stage.
pub mod constants;
pub mod estimator;
pub mod grid;
pub mod images;
pub mod lookup_params;
pub mod pipeline;
pub mod reconstruction;
pub mod showerscale_errors;
pub mod tables;
mod warning_counter;

pub use crate::estimator::{EventStatus, ShowerEstimate, ShowerParameterEstimator};
pub use crate::grid::table_grid::TableGrid;
pub use crate::lookup_params::{LookupParams, LookupParamsBuilder};
pub use crate::reconstruction::{ShowerGeometry, StereoReconstructor};
pub use crate::showerscale_errors::ShowerScaleError;
