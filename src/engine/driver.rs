//! The geometric driver loop.
//!
//! Single-threaded and strictly monotonic: all work for one tick
//! completes before time advances, so a stop request (polled once per
//! tick) can never observe a half-updated ledger. Per tick, in order:
//! births, TTL expiry, early-termination check, adjacency evaluation,
//! routing, delivery checks, then optional live-playback pacing.

use crate::clock::{Pacing, StopFlag, fmt_iso};
use crate::engine::adjacency::TickGeometry;
use crate::engine::config::ResolvedRun;
use crate::engine::routing;
use crate::error::SimError;
use crate::model::bundle::Outcome;
use crate::model::node::{NodeSet, PositionOracle};
use crate::report::{
    BundleReportEntry, DelayComponents, EventLog, GeometricRunReport, GeometricSummary,
};

pub struct GeometricEngine<'a> {
    nodes: &'a NodeSet,
    oracle: &'a dyn PositionOracle,
    run: ResolvedRun,
    stop: StopFlag,
}

impl<'a> GeometricEngine<'a> {
    pub fn new(nodes: &'a NodeSet, oracle: &'a dyn PositionOracle, run: ResolvedRun) -> Self {
        Self {
            nodes,
            oracle,
            run,
            stop: StopFlag::new(),
        }
    }

    /// Install an external cancellation handle.
    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    /// Execute the run to completion (or cancellation) and report.
    pub fn run(mut self, log: &mut EventLog) -> Result<GeometricRunReport, SimError> {
        let sim_start = self.run.sim_start;
        let end = self.run.end;
        let step = self.run.step_seconds;
        let pacing = Pacing::new(step, self.run.real_time_speed);
        let max_range_km = self.run.phy.max_range_km;
        let r_los_km = self.run.r_los_km;

        log::info!(
            "geometric run: {:?} routing, {} bundles, axis start {}, simulated window [{} .. {}], step {} s",
            self.run.routing,
            self.run.bundles.len(),
            fmt_iso(self.run.start),
            fmt_iso(sim_start),
            fmt_iso(end),
            step
        );

        let mut ticks_executed: u64 = 0;

        if end <= sim_start {
            log::warn!(
                "empty run: horizon ends at {} which is not after the simulation start {}; nothing simulated",
                fmt_iso(end),
                fmt_iso(sim_start)
            );
        } else {
            for k in 0u64.. {
                let t = sim_start + k as f64 * step;
                if t > end {
                    break;
                }
                if self.stop.is_set() {
                    log::warn!("stop requested at {}; finishing with summary", fmt_iso(t));
                    break;
                }

                // Births first: a bundle released by now takes custody at
                // its source. Then expiry, so a stale bundle never
                // forwards on its expiry tick.
                for bundle in &mut self.run.bundles {
                    if !bundle.born && !bundle.is_final() && t >= bundle.release_time {
                        bundle.birth();
                        log.released(t, bundle);
                    }
                }
                for bundle in &mut self.run.bundles {
                    if bundle.born && !bundle.is_final() && bundle.ttl_exceeded_at(t) {
                        bundle.mark_expired(t);
                        log.expired(t, bundle);
                    }
                }

                // Early termination: every bundle finalised or out of the
                // simulated window.
                if self
                    .run
                    .bundles
                    .iter()
                    .all(|b| b.is_final() || b.release_time > end)
                {
                    break;
                }

                let any_active = self.run.bundles.iter().any(|b| b.born && !b.is_final());
                if any_active {
                    // Adjacency is fully computed before any routing
                    // decision of this tick.
                    let geom =
                        TickGeometry::evaluate(self.oracle, self.nodes, t, max_range_km, r_los_km)?;
                    for bundle in &mut self.run.bundles {
                        if !bundle.born || bundle.is_final() {
                            continue;
                        }
                        let events = routing::advance(bundle, &geom);
                        for event in events {
                            log.forwarded(
                                t,
                                bundle.id,
                                self.nodes.name(event.from),
                                self.nodes.name(event.to),
                            );
                        }
                        if bundle.holders.contains(bundle.destination) && !bundle.delivered {
                            bundle.mark_delivered(t);
                            log.delivered(t, bundle);
                            log::debug!(
                                "bundle {} custody at delivery: {:?}",
                                bundle.id,
                                bundle
                                    .holders
                                    .iter()
                                    .map(|i| self.nodes.name(i))
                                    .collect::<Vec<_>>()
                            );
                        }
                    }
                }

                ticks_executed += 1;
                pacing.pause();
            }
        }

        Ok(self.build_report(ticks_executed))
    }

    fn build_report(&self, ticks_executed: u64) -> GeometricRunReport {
        let mut summary = GeometricSummary {
            ticks_executed,
            ..Default::default()
        };

        let mut entries = Vec::with_capacity(self.run.bundles.len());
        for bundle in &self.run.bundles {
            let outcome = if ticks_executed == 0 {
                Outcome::NotSimulated
            } else {
                bundle.outcome(self.run.end)
            };
            match outcome {
                Outcome::Delivered => summary.delivered += 1,
                Outcome::Expired => summary.expired += 1,
                Outcome::NotDelivered => summary.not_delivered += 1,
                Outcome::NotSimulated => {
                    summary.not_simulated += 1;
                    if bundle.release_time > self.run.end {
                        log::info!(
                            "bundle {} released at {} after the simulated window, not simulated",
                            bundle.id,
                            fmt_iso(bundle.release_time)
                        );
                    }
                }
            }

            let delay = bundle.delivered_at.map(|delivered_at| {
                let path_delay_s = delivered_at - bundle.release_time;
                let phy_extra_s =
                    bundle.hops as f64 * self.run.phy.per_hop_extra_seconds(bundle.size_bytes);
                DelayComponents {
                    path_delay_s,
                    phy_extra_s,
                    total_delay_s: path_delay_s + phy_extra_s,
                }
            });

            entries.push(BundleReportEntry {
                id: bundle.id,
                src: bundle.source_name.clone(),
                dst: bundle.destination_name.clone(),
                release_time: fmt_iso(bundle.release_time),
                outcome,
                delivered_at: bundle.delivered_at.map(fmt_iso),
                expired_at: bundle.expired_at.map(fmt_iso),
                hops: bundle.hops,
                delay,
            });
        }

        if summary.nothing_simulated() {
            log::warn!("run summary: nothing simulated");
        } else {
            log::info!(
                "run summary: {} delivered, {} expired, {} not delivered, {} not simulated over {} ticks",
                summary.delivered,
                summary.expired,
                summary.not_delivered,
                summary.not_simulated,
                summary.ticks_executed
            );
        }

        GeometricRunReport {
            phy_profile: self.run.phy.name.clone(),
            bit_error_rate: self.run.phy.bit_error_rate,
            summary,
            bundles: entries,
        }
    }
}
