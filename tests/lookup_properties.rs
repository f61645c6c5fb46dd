use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use showerscale::constants::RADEG;
use showerscale::estimator::cell_interpolation::{interpolate_selection, wobble_stage};
use showerscale::estimator::fusion::{
    fuse_energy, fuse_mean_scaled, outlier_mask, EnergyTerm, ScaledTerm,
};
use showerscale::grid::grid_builder::GridBuilder;
use showerscale::images::{
    ArrayConfiguration, ArrayEvent, ImageMeasurement, Pointing, Telescope, TelescopeType,
};
use showerscale::lookup_params::MeanScaledWeighting;
use showerscale::reconstruction::ReconstructionFailure;
use showerscale::tables::bin_stat::BinnedStatAccumulator;
use showerscale::tables::table_builder::LookupTableBuilder;
use showerscale::tables::table_reader::BinReadout;
use showerscale::tables::{TableAxes, TableAxis, TableQuantity, ValueRange};
use showerscale::{LookupParams, StereoReconstructor};
use smallvec::smallvec;

mod common;
use common::{layout, params, Primary, ShowerSimulator};

fn width_axes() -> TableAxes {
    TableAxes {
        size: TableAxis::new(1.5, 0.1, 55).unwrap(),
        distance: TableAxis::new(0.0, 15.0, 80).unwrap(),
    }
}

#[test]
fn median_stays_within_the_samples() {
    let mut rng = StdRng::seed_from_u64(42);
    let spread = Normal::new(1.0, 0.3).unwrap();
    for n in 6..60 {
        let mut acc = BinnedStatAccumulator::new(ValueRange::new(-10.0, 10.0));
        let mut samples = Vec::with_capacity(n);
        for _ in 0..n {
            let v: f64 = spread.sample(&mut rng);
            let w: f64 = rng.random_range(0.1..2.0);
            acc.accumulate(v, w).unwrap();
            samples.push(v);
        }
        let stats = acc.finalize(5, (0.16, 0.84)).stats.unwrap();
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(stats.median >= min && stats.median <= max);
        assert!(stats.sigma >= 0.0);
    }
}

#[test]
fn scenario_ten_widths_in_one_bin() {
    let axes = width_axes();
    let mut table = LookupTableBuilder::new(TableQuantity::Width, axes, ValueRange::new(0.0, 2.0));
    for v in [0.8, 0.9, 0.9, 1.0, 1.0, 1.0, 1.0, 1.1, 1.1, 1.2] {
        table.fill(2.0, 50.0, v, 1.0).unwrap();
    }
    let reader = table.finalize(5, (0.16, 0.84));
    let filled: Vec<u64> = reader.cells().iter().map(|c| c.count).filter(|&c| c > 0).collect();
    assert_eq!(filled, vec![10]);

    let est = reader.query(2.0, 50.0).unwrap();
    assert_relative_eq!(est.value, 1.0, epsilon = 1e-12);
    assert_relative_eq!(est.sigma, 0.2, epsilon = 1e-12);
    assert!(!est.clamped);
}

#[test]
fn query_at_a_bin_center_reads_that_bin() {
    let axes = width_axes();
    let mut rng = StdRng::seed_from_u64(3);
    let mut table = LookupTableBuilder::new(TableQuantity::Width, axes, ValueRange::new(0.0, 2.0));
    for _ in 0..20_000 {
        let log_size: f64 = rng.random_range(2.0..3.0);
        let distance: f64 = rng.random_range(0.0..150.0);
        let width = 0.05 + 0.02 * log_size + 0.0003 * distance + rng.random_range(-0.01..0.01);
        table.fill(log_size, distance, width, 1.0).unwrap();
    }
    let reader = table.finalize(5, (0.16, 0.84));

    let mut checked = 0;
    for i in 0..axes.size.n_bins {
        for j in 0..axes.distance.n_bins {
            let Some(stats) = reader.cell(i, j).stats else {
                continue;
            };
            let est = reader
                .query(axes.size.bin_center(i), axes.distance.bin_center(j))
                .unwrap();
            assert_relative_eq!(est.value, stats.median, epsilon = 1e-12);
            assert_relative_eq!(est.sigma, stats.sigma, epsilon = 1e-12);
            checked += 1;
        }
    }
    assert!(checked > 50);
}

#[test]
fn mscw_does_not_depend_on_telescope_order() {
    let mut rng = StdRng::seed_from_u64(8);
    for _ in 0..50 {
        let mut terms: Vec<ScaledTerm> = (0..rng.random_range(2..9))
            .map(|_| ScaledTerm {
                measured: rng.random_range(0.05..0.3),
                expected: rng.random_range(0.05..0.3),
                sigma: rng.random_range(0.01..0.05),
            })
            .collect();
        let reference = fuse_mean_scaled(&terms, MeanScaledWeighting::RelativePrecision).unwrap();
        terms.shuffle(&mut rng);
        let shuffled = fuse_mean_scaled(&terms, MeanScaledWeighting::RelativePrecision).unwrap();
        assert_relative_eq!(reference.mean_scaled, shuffled.mean_scaled, epsilon = 1e-12);
        assert_relative_eq!(reference.mean_ratio, shuffled.mean_ratio, epsilon = 1e-12);
    }
}

#[test]
fn scenario_two_telescopes_cancel_out() {
    let terms = [
        ScaledTerm {
            measured: 1.0,
            expected: 0.9,
            sigma: 0.1,
        },
        ScaledTerm {
            measured: 1.0,
            expected: 1.1,
            sigma: 0.1,
        },
    ];
    let fused = fuse_mean_scaled(&terms, MeanScaledWeighting::Equal).unwrap();
    assert_relative_eq!(fused.mean_scaled, 0.0, epsilon = 1e-9);
    assert_eq!(fused.n_telescopes, 2);
}

#[test]
fn outlier_rejection_is_idempotent() {
    let mut rng = StdRng::seed_from_u64(5);
    let spread = Normal::new(0.0, 0.1).unwrap();
    for _ in 0..100 {
        let n = rng.random_range(5..12);
        let mut values: Vec<f64> = (0..n).map(|_| spread.sample(&mut rng)).collect();
        if rng.random_bool(0.5) {
            values[0] += 3.0;
        }
        let kept = outlier_mask(&values, 5.0, 5);
        let cleaned: Vec<f64> = values
            .iter()
            .zip(&kept)
            .filter_map(|(v, k)| k.then_some(*v))
            .collect();
        let again = outlier_mask(&cleaned, 5.0, 5);
        assert!(again.iter().all(|k| *k));
    }
}

#[test]
fn scenario_energy_outlier_is_rejected() {
    let terms: Vec<EnergyTerm> = [1.0, 1.0, 1.0, 1.0, 1.0, 100.0]
        .iter()
        .map(|e: &f64| EnergyTerm {
            log10_energy: e.log10(),
            sigma: 0.1,
        })
        .collect();
    let fused = fuse_energy(&terms, 5.0, 5).unwrap();
    assert_eq!(fused.n_used, 5);
    assert!(!fused.used[5]);
    assert_relative_eq!(fused.energy, 1.0, epsilon = 1e-9);
}

#[test]
fn scenario_near_parallel_axes_are_not_reconstructed() {
    let params = LookupParams::builder().min_axis_angle(5.0).build().unwrap();
    let reconstructor = StereoReconstructor::new(&params);
    let array = ArrayConfiguration::new(vec![
        Telescope::new(TelescopeType(1), -50.0, 0.0, 0.0),
        Telescope::new(TelescopeType(1), 50.0, 0.0, 0.0),
    ]);
    let image = |phi: f64, shift: f64| {
        let (s, c) = (phi * RADEG).sin_cos();
        ImageMeasurement {
            size: 300.0,
            centroid_x: 0.5 + shift * c,
            centroid_y: shift * s,
            cos_phi: c,
            sin_phi: s,
            width: 0.05,
            length: 0.2,
            noise: 100.0,
            valid: true,
        }
    };
    let event = ArrayEvent {
        event_id: 1,
        pointing: Pointing {
            azimuth: 0.0,
            zenith: 20.0,
        },
        wobble_offset: 0.5,
        images: smallvec![image(10.0, 0.6), image(12.0, 0.9)],
        truth: None,
        seed: None,
    };
    assert_eq!(
        reconstructor.reconstruct(&array, &event).unwrap_err(),
        ReconstructionFailure::NoUsablePairs { images: 2 }
    );
}

#[test]
fn catalogued_zenith_reads_its_own_wobble_stage() {
    let params = params();
    let reconstructor = StereoReconstructor::new(&params);
    let mut builder = GridBuilder::new(layout(&[20.0, 40.0], 0.5), &params).unwrap();
    for (seed, zenith) in [(21, 20.0), (22, 40.0)] {
        let mut sim = ShowerSimulator::new(seed, zenith, 0.0, 0.5);
        for event in sim.events(0, 800, Primary::Gamma) {
            let Ok(geometry) = reconstructor.reconstruct(&sim.array, &event) else {
                continue;
            };
            let energy = event.truth.unwrap().energy;
            builder
                .fill_event(&sim.array, &event, &geometry, energy, 1.0)
                .unwrap();
        }
    }
    let grid = builder.finalize().unwrap();

    let points = [(2.6, 60.0), (3.0, 130.0), (3.4, 90.0)];
    for quantity in TableQuantity::ALL {
        for (k, zenith) in [(0, 20.0), (1, 40.0)] {
            let sel = grid
                .select_cell(zenith, 0.5, 0.0, TelescopeType(1), 100.0)
                .unwrap();
            for &(log_size, distance) in &points {
                let full = interpolate_selection(&sel, quantity, log_size, distance, BinReadout::Median);
                let stage = wobble_stage(&sel, 0, quantity, log_size, distance, BinReadout::Median);
                assert_eq!(full, stage);
                // the bracket collapses onto the catalogued zenith angle
                assert_eq!(sel.zenith, [[20.0, 40.0][k]; 2]);
            }
        }

        let sel = grid
            .select_cell(30.0, 0.5, 0.0, TelescopeType(1), 100.0)
            .unwrap();
        for &(log_size, distance) in &points {
            let low = wobble_stage(&sel, 0, quantity, log_size, distance, BinReadout::Median);
            let high = wobble_stage(&sel, 1, quantity, log_size, distance, BinReadout::Median);
            let full = interpolate_selection(&sel, quantity, log_size, distance, BinReadout::Median);
            if let (Some(low), Some(high), Some(full)) = (low, high, full) {
                let (a, b) = (low.value.min(high.value), low.value.max(high.value));
                assert!(full.value >= a - 1e-12 && full.value <= b + 1e-12);
            }
        }
    }
}
