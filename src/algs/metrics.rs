//! Renumbering quality metrics and their log reports.
//!
//! These are diagnostics only: nothing here feeds back into the
//! renumbering. With several ranks, per-rank values are gathered through
//! the [`Communicator`] and summarized as histograms.

use std::fmt;

use itertools::{Itertools, MinMaxResult};
use num_traits::ToPrimitive;

use crate::algs::communicator::Communicator;
use crate::data::numbering::Numbering;
use crate::topology::mesh::FaceMesh;

/// Histogram subdivisions.
pub const N_SUBDIVISIONS: usize = 5;

/// Cell-matrix bandwidth and profile implied by interior face connectivity.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BandwidthStats {
    /// `max |c1 - c0|` over interior faces.
    pub bandwidth: u64,
    /// Integer mean over local cells of each cell's largest face distance.
    pub profile: u64,
}

/// Threading summary of one face kind.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ThreadingStats {
    pub n_threads: usize,
    pub n_groups: usize,
    pub imbalance: f64,
}

impl ThreadingStats {
    pub fn of(numbering: Option<&Numbering>) -> Self {
        match numbering {
            Some(n) => Self {
                n_threads: n.n_threads(),
                n_groups: n.n_groups(),
                imbalance: n.estimate_imbalance(),
            },
            None => Self {
                n_threads: 1,
                n_groups: 1,
                imbalance: 0.0,
            },
        }
    }
}

pub fn bandwidth_stats(mesh: &FaceMesh) -> BandwidthStats {
    let mut max_distance = vec![0usize; mesh.n_cells_with_ghosts];
    let mut bandwidth = 0;
    for &[c0, c1] in &mesh.i_face_cells {
        let d = c0.abs_diff(c1);
        bandwidth = bandwidth.max(d);
        max_distance[c0] = max_distance[c0].max(d);
        max_distance[c1] = max_distance[c1].max(d);
    }
    let profile = if mesh.n_cells > 0 {
        max_distance[..mesh.n_cells].iter().sum::<usize>() / mesh.n_cells
    } else {
        0
    };
    BandwidthStats {
        bandwidth: bandwidth as u64,
        profile: profile as u64,
    }
}

/// Equal-width histogram of a small set of values (one per rank).
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    /// Counts per subdivision of `[min, max]`; empty when `min == max`.
    pub counts: Vec<u64>,
    integral: bool,
}

impl Histogram {
    /// `None` when `values` is empty.
    pub fn new<T: ToPrimitive>(values: &[T]) -> Option<Self> {
        Self::build(values, false)
    }

    /// Same as [`Histogram::new`], rendered with integer bounds.
    pub fn of_counts<T: ToPrimitive>(values: &[T]) -> Option<Self> {
        Self::build(values, true)
    }

    fn build<T: ToPrimitive>(values: &[T], integral: bool) -> Option<Self> {
        let vals: Vec<f64> = values.iter().filter_map(ToPrimitive::to_f64).collect();
        let (min, max) = match vals.iter().copied().minmax_by(f64::total_cmp) {
            MinMaxResult::NoElements => return None,
            MinMaxResult::OneElement(v) => (v, v),
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
        };
        let mut counts = Vec::new();
        let span = max - min;
        if span > 0.0 {
            let n_steps = if span < N_SUBDIVISIONS as f64 {
                (span.floor() as usize).max(1)
            } else {
                N_SUBDIVISIONS
            };
            let step = span / n_steps as f64;
            counts = vec![0; n_steps];
            for v in vals {
                let bin = (1..n_steps)
                    .position(|k| v < min + k as f64 * step)
                    .unwrap_or(n_steps - 1);
                counts[bin] += 1;
            }
        }
        Some(Self {
            min,
            max,
            counts,
            integral,
        })
    }

    fn step(&self) -> f64 {
        (self.max - self.min) / self.counts.len().max(1) as f64
    }

    fn fmt_value(&self, v: f64) -> String {
        if self.integral {
            format!("{:>10}", v as u64)
        } else {
            format!("{:>10.5e}", v)
        }
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    minimum value =         {}", self.fmt_value(self.min))?;
        writeln!(f, "    maximum value =         {}", self.fmt_value(self.max))?;
        let n = self.counts.len();
        let step = self.step();
        for (i, count) in self.counts.iter().enumerate() {
            let lo = self.min + i as f64 * step;
            let (hi, close) = if i + 1 == n {
                (self.max, ']')
            } else {
                (self.min + (i + 1) as f64 * step, '[')
            };
            writeln!(
                f,
                "    {:>3} : [ {} ; {} {} = {:>10}",
                i + 1,
                self.fmt_value(lo),
                self.fmt_value(hi),
                close,
                count
            )?;
        }
        Ok(())
    }
}

fn render(histogram: Option<Histogram>) -> String {
    histogram.map_or_else(|| "    no value\n".to_string(), |h| h.to_string())
}

/// Log thread pool size, group count and imbalance for one face kind.
pub fn log_threading_info<C: Communicator>(elt_type_name: &str, stats: &ThreadingStats, comm: &C) {
    if comm.size() > 1 {
        let n_threads = comm.all_gather_u64(stats.n_threads as u64);
        let n_groups = comm.all_gather_u64(stats.n_groups as u64);
        let imbalance = comm.all_gather_f64(stats.imbalance);
        log::info!(
            "Histogram of thread pools size for {} per rank:\n{}",
            elt_type_name,
            render(Histogram::of_counts(&n_threads))
        );
        log::info!(
            "Histogram of threading groups count for {} per rank:\n{}",
            elt_type_name,
            render(Histogram::of_counts(&n_groups))
        );
        log::info!(
            "Histogram of thread imbalance for {} per rank:\n{}",
            elt_type_name,
            render(Histogram::new(&imbalance))
        );
    } else {
        log::info!(
            "Number of thread pools for {elt_type_name} : {}, threading groups : {}, estimated imbalance : {:10.5e}",
            stats.n_threads,
            stats.n_groups,
            stats.imbalance
        );
    }
}

/// Log matrix bandwidth and profile of the current cell numbering.
pub fn log_bandwidth_info<C: Communicator>(title: &str, stats: &BandwidthStats, comm: &C) {
    if comm.size() > 1 {
        let bandwidth = comm.all_gather_u64(stats.bandwidth);
        let profile = comm.all_gather_u64(stats.profile);
        log::info!(
            "Histogram of {} matrix bandwidth per rank:\n{}",
            title,
            render(Histogram::of_counts(&bandwidth))
        );
        log::info!(
            "Histogram of {} matrix profile/lines per rank:\n{}",
            title,
            render(Histogram::of_counts(&profile))
        );
    } else {
        log::info!(
            "{} matrix bandwidth : {}, profile/lines : {}",
            title,
            stats.bandwidth,
            stats.profile
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::numbering::GroupIndex;

    #[test]
    fn bandwidth_of_a_chain() {
        let mesh = FaceMesh::new(4, 1, vec![[0, 1], [1, 3], [3, 4], [0, 2]], vec![]).unwrap();
        let s = bandwidth_stats(&mesh);
        assert_eq!(s.bandwidth, 2);
        // per-cell maxima 2, 2, 2, 2 -> 8 / 4
        assert_eq!(s.profile, 2);
    }

    #[test]
    fn histogram_bins() {
        let h = Histogram::of_counts(&[0u64, 1, 2, 3, 4, 10]).unwrap();
        assert_eq!(h.min, 0.0);
        assert_eq!(h.max, 10.0);
        assert_eq!(h.counts, vec![2, 2, 1, 0, 1]);
        assert_eq!(h.counts.iter().sum::<u64>(), 6);
    }

    #[test]
    fn histogram_narrow_span_uses_fewer_bins() {
        let h = Histogram::new(&[1.0, 1.5, 3.0]).unwrap();
        assert_eq!(h.counts.len(), 2);
        assert_eq!(h.counts, vec![2, 1]);
    }

    #[test]
    fn histogram_degenerate_inputs() {
        assert!(Histogram::new::<f64>(&[]).is_none());
        let h = Histogram::of_counts(&[4u32, 4, 4]).unwrap();
        assert!(h.counts.is_empty());
        let text = h.to_string();
        assert!(text.contains("minimum value"));
        assert!(text.contains("         4"));
        assert_eq!(render(None), "    no value\n");
    }

    #[test]
    fn histogram_rendering_closes_last_bin() {
        let text = Histogram::of_counts(&[0u64, 10]).unwrap().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2 + N_SUBDIVISIONS);
        assert!(lines[2].ends_with("[ =          1"));
        assert!(lines.last().unwrap().contains("] ="));
    }

    #[test]
    fn threading_stats_of_numbering() {
        let mut gi = GroupIndex::new(2, 1);
        gi.set_range(0, 0, Some(0..3));
        gi.set_range(1, 0, Some(3..4));
        let n = Numbering::threaded(gi, 4).unwrap();
        let s = ThreadingStats::of(Some(&n));
        assert_eq!((s.n_threads, s.n_groups), (2, 1));
        assert!((s.imbalance - 0.5).abs() < 1e-12);
        assert_eq!(ThreadingStats::of(None).n_threads, 1);
    }
}
