//! Registry of heliostats with per-heliostat locking.
//!
//! Each heliostat's configuration sits behind its own `RwLock`. Navigation
//! takes the read lock; a calibration holds the write lock from the moment it
//! reads its prior until it commits, so navigation, manual commits and other
//! calibrations of that heliostat wait for it. Calibrations of different
//! heliostats run in parallel on scoped threads and never contend.

use crate::config::HeliostatConfig;
use crate::navigation::{navigate, NavigationCommand, Target};
use anyhow::{anyhow, Result};
use helio_core::{AxisAngles, CalibrationObservation, HamParameters};
use helio_optim::{solve_calibration, SolveResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;

pub type HeliostatId = String;

#[derive(Debug, Default)]
pub struct Fleet {
    heliostats: BTreeMap<HeliostatId, RwLock<HeliostatConfig>>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a heliostat, returning the configuration it replaces.
    pub fn insert(
        &mut self,
        id: impl Into<HeliostatId>,
        config: HeliostatConfig,
    ) -> Option<HeliostatConfig> {
        self.heliostats
            .insert(id.into(), RwLock::new(config))
            .and_then(|old| old.into_inner().ok())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.heliostats.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.heliostats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heliostats.is_empty()
    }

    fn slot(&self, id: &str) -> Result<&RwLock<HeliostatConfig>> {
        self.heliostats
            .get(id)
            .ok_or_else(|| anyhow!("unknown heliostat '{}'", id))
    }

    fn read(&self, id: &str) -> Result<RwLockReadGuard<'_, HeliostatConfig>> {
        self.slot(id)?
            .read()
            .map_err(|_| anyhow!("configuration lock of '{}' is poisoned", id))
    }

    fn write(&self, id: &str) -> Result<RwLockWriteGuard<'_, HeliostatConfig>> {
        self.slot(id)?
            .write()
            .map_err(|_| anyhow!("configuration lock of '{}' is poisoned", id))
    }

    /// Snapshot of a heliostat's configuration.
    pub fn config(&self, id: &str) -> Result<HeliostatConfig> {
        Ok(self.read(id)?.clone())
    }

    pub fn parameters(&self, id: &str) -> Result<HamParameters> {
        Ok(self.read(id)?.parameters.clone())
    }

    /// Replace a heliostat's model parameters.
    pub fn commit(&self, id: &str, parameters: HamParameters) -> Result<()> {
        self.write(id)?.parameters = parameters;
        log::info!("committed parameters for '{}'", id);
        Ok(())
    }

    /// Navigate one heliostat under its read lock.
    pub fn navigate(
        &self,
        id: &str,
        target: &Target,
        current: &AxisAngles,
    ) -> Result<SolveResult<NavigationCommand>> {
        let config = self.read(id)?;
        navigate(&config, target, current)
    }

    /// Calibrate one heliostat and commit the result if it converged.
    ///
    /// The write lock is held for the whole solve.
    pub fn calibrate(
        &self,
        id: &str,
        observations: &[CalibrationObservation],
    ) -> Result<SolveResult<HamParameters>> {
        let mut config = self.write(id)?;
        let result = solve_calibration(
            observations,
            &config.parameters,
            &config.calibration,
            &config.backend,
        )?;
        if result.converged {
            config.parameters = result.solution.clone();
            log::info!("committed calibrated parameters for '{}'", id);
        } else {
            log::warn!(
                "calibration of '{}' not committed: {}",
                id,
                result.error_message.as_deref().unwrap_or("did not converge")
            );
        }
        Ok(result)
    }

    /// Calibrate every heliostat that has a batch, one scoped thread each.
    ///
    /// Batches for unknown ids yield an error entry. Each heliostat's outcome
    /// is independent of the others.
    pub fn calibrate_all(
        &self,
        batches: &HashMap<HeliostatId, Vec<CalibrationObservation>>,
    ) -> BTreeMap<HeliostatId, Result<SolveResult<HamParameters>>> {
        thread::scope(|scope| {
            let handles: Vec<_> = batches
                .iter()
                .map(|(id, observations)| {
                    let handle = scope.spawn(move || self.calibrate(id, observations));
                    (id.clone(), handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(id, handle)| {
                    let outcome = handle
                        .join()
                        .unwrap_or_else(|_| Err(anyhow!("calibration thread of '{}' panicked", id)));
                    (id, outcome)
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helio_core::synthetic::{angle_grid, observations, reference_parameters};
    use helio_core::Vec3;

    fn batch(params: &HamParameters) -> Vec<CalibrationObservation> {
        let poses = angle_grid(&[-25.0, 0.0, 25.0], &[-20.0, 5.0, 30.0]);
        observations(params, &Vec3::new(0.4, -3.0, 1.0), &poses, 2.5)
    }

    fn shifted(params: &HamParameters, by: Vec3) -> HamParameters {
        let mut p = params.clone();
        p.position += by;
        p
    }

    #[test]
    fn calibrate_all_commits_each_heliostat() {
        let truth_a = reference_parameters();
        let truth_b = shifted(&truth_a, Vec3::new(2.0, 0.0, 1.0));

        let mut fleet = Fleet::new();
        fleet.insert("a", HeliostatConfig::new(shifted(&truth_a, Vec3::new(0.03, 0.02, -0.04))));
        fleet.insert("b", HeliostatConfig::new(shifted(&truth_b, Vec3::new(-0.05, 0.0, 0.02))));

        let batches = HashMap::from([
            ("a".to_string(), batch(&truth_a)),
            ("b".to_string(), batch(&truth_b)),
            ("missing".to_string(), batch(&truth_a)),
        ]);
        let outcomes = fleet.calibrate_all(&batches);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes["missing"].is_err());

        for (id, truth) in [("a", &truth_a), ("b", &truth_b)] {
            let result = outcomes[id].as_ref().unwrap();
            assert!(result.converged, "{id}: {:?}", result.error_message);
            let committed = fleet.parameters(id).unwrap();
            assert!((committed.position - truth.position).norm() < 1e-5, "{id}");
        }
    }

    #[test]
    fn failed_calibration_leaves_parameters_untouched() {
        let prior = reference_parameters();
        let mut fleet = Fleet::new();
        fleet.insert("a", HeliostatConfig::new(prior.clone()));

        let err = fleet.calibrate("a", &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<helio_core::HelioError>(),
            Some(helio_core::HelioError::NotEnoughData { .. })
        ));
        assert_eq!(fleet.parameters("a").unwrap(), prior);
    }

    #[test]
    fn commit_during_calibration_is_not_lost() {
        let truth = reference_parameters();
        let mut fleet = Fleet::new();
        fleet.insert("h", HeliostatConfig::new(shifted(&truth, Vec3::new(0.03, -0.02, 0.01))));
        let observations = batch(&truth);

        let mut edited = truth.clone();
        edited.mirror_offset = 0.5;
        thread::scope(|scope| {
            let calibration = scope.spawn(|| fleet.calibrate("h", &observations));
            thread::sleep(std::time::Duration::from_millis(5));
            fleet.commit("h", edited.clone()).unwrap();
            calibration.join().unwrap().unwrap();
        });

        // Either the edit waited for the calibration and replaced its result,
        // or the calibration started from the edit with the offset held fixed.
        assert_eq!(fleet.parameters("h").unwrap().mirror_offset, 0.5);
    }

    #[test]
    fn navigate_reads_current_parameters() {
        let mut fleet = Fleet::new();
        fleet.insert("a", HeliostatConfig::default());
        let target = Target::Normal {
            normal: Vec3::new(0.0, -1.0, 0.2),
        };
        let result = fleet.navigate("a", &target, &AxisAngles::default()).unwrap();
        assert!(result.converged, "{:?}", result.error_message);
        assert!(fleet.navigate("b", &target, &AxisAngles::default()).is_err());
    }

    #[test]
    fn insert_returns_replaced_config() {
        let mut fleet = Fleet::new();
        assert!(fleet.insert("a", HeliostatConfig::default()).is_none());
        let old = fleet.insert("a", HeliostatConfig::new(reference_parameters()));
        assert_eq!(old, Some(HeliostatConfig::default()));
        assert_eq!(fleet.ids().collect::<Vec<_>>(), vec!["a"]);
    }
}
