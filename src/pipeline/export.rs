//! CSV export of per-event shower estimates.
//!
//! One row per event. Values that are not available for an event (invalid
//! status, no contributing telescope) are written as empty cells.
use std::io;

use camino::Utf8Path;
use serde::Serialize;

use crate::estimator::ShowerEstimate;
use crate::showerscale_errors::ShowerScaleError;

/// Flat CSV row of a [`ShowerEstimate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateRecord {
    pub event_id: u64,
    pub status: String,
    pub mscw: Option<f64>,
    pub mscl: Option<f64>,
    pub mwr: Option<f64>,
    pub mlr: Option<f64>,
    pub energy_tev: Option<f64>,
    pub log10_energy: Option<f64>,
    pub energy_chi2: Option<f64>,
    pub energy_resolution: Option<f64>,
    pub n_mscw: usize,
    pub n_mscl: usize,
    pub n_energy: usize,
    pub n_energy_rejected: usize,
    pub n_images: Option<usize>,
    pub offset_x: Option<f64>,
    pub offset_y: Option<f64>,
    pub core_x: Option<f64>,
    pub core_y: Option<f64>,
    pub clamped_lookups: usize,
}

impl From<&ShowerEstimate> for EstimateRecord {
    fn from(est: &ShowerEstimate) -> Self {
        let geometry = est.geometry.as_ref();
        Self {
            event_id: est.event_id,
            status: est.status.to_string(),
            mscw: est.mscw,
            mscl: est.mscl,
            mwr: est.mwr,
            mlr: est.mlr,
            energy_tev: est.energy,
            log10_energy: est.log10_energy,
            energy_chi2: est.energy_chi2,
            energy_resolution: est.energy_resolution,
            n_mscw: est.n_mscw,
            n_mscl: est.n_mscl,
            n_energy: est.n_energy,
            n_energy_rejected: est.n_energy_rejected,
            n_images: geometry.map(|g| g.n_images),
            offset_x: geometry.map(|g| g.offset_x),
            offset_y: geometry.map(|g| g.offset_y),
            core_x: geometry.map(|g| g.core_x),
            core_y: geometry.map(|g| g.core_y),
            clamped_lookups: est.clamped_lookups(),
        }
    }
}

/// Write one CSV row per estimate, with a header line.
///
/// Arguments
/// -----------------
/// * `writer`: destination (file, buffer, stdout, ...).
/// * `estimates`: events to export, in output order.
///
/// Return
/// ----------
/// * the number of rows written, or the first CSV/I-O error.
pub fn write_estimates<'e, W, I>(writer: W, estimates: I) -> Result<usize, ShowerScaleError>
where
    W: io::Write,
    I: IntoIterator<Item = &'e ShowerEstimate>,
{
    let mut wtr = csv::Writer::from_writer(writer);
    let mut rows = 0;
    for est in estimates {
        wtr.serialize(EstimateRecord::from(est))?;
        rows += 1;
    }
    wtr.flush()?;
    Ok(rows)
}

/// Write the estimates to a CSV file, replacing it if it exists.
pub fn write_estimates_csv<'e, I>(path: &Utf8Path, estimates: I) -> Result<usize, ShowerScaleError>
where
    I: IntoIterator<Item = &'e ShowerEstimate>,
{
    let file = std::fs::File::create(path)?;
    let rows = write_estimates(io::BufWriter::new(file), estimates)?;
    log::info!("Wrote {rows} shower estimates to {path}");
    Ok(rows)
}
