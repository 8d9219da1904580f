//! Experimental targets.
//!
//! A [`Target`] is a named, ordered set of restraints built once from
//! pre-parsed blocks and read-only afterwards. It is cloned only to produce
//! bootstrap resamples.

use crate::ensemble::Ensemble;
use crate::error::{FitError, Result};
use crate::plugin::{Block, PluginData, PluginRegistry, Restraint};
use rand::RngCore;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Block type that carries the target's name.
pub const NAME_BLOCK: &str = "NAME";

#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub restraints: Vec<Restraint>,
    /// Per restraint type, plugin-owned target-level state.
    pub plugin_data: BTreeMap<String, PluginData>,
}

impl Target {
    /// Builds a target from blocks read out of `source_name`.
    ///
    /// The `NAME` block is mandatory. Every other block must be handled by a
    /// registered plugin and carry a non-negative weighting as its second
    /// header token. Any failure aborts the load.
    #[instrument(skip_all, name = "target_load", fields(source = source_name))]
    pub fn load(source_name: &str, blocks: &[Block], registry: &PluginRegistry) -> Result<Self> {
        let mut name = String::new();
        let mut restraints = Vec::new();
        let mut plugin_data: BTreeMap<String, PluginData> = BTreeMap::new();

        for block in blocks {
            if block.kind == NAME_BLOCK {
                name = block.header.get(1).cloned().unwrap_or_default();
                continue;
            }

            let plugin = registry.resolve(&block.kind)?;

            let weight = block
                .header
                .get(1)
                .and_then(|token| token.parse::<f64>().ok())
                .filter(|w| w.is_finite() && *w >= 0.0)
                .ok_or_else(|| FitError::MissingWeight {
                    source_name: source_name.to_string(),
                    line: block.line_start,
                })?;

            let mut restraint = Restraint::new(weight, block.kind.clone(), plugin.clone());
            let target_data = plugin_data.entry(block.kind.clone()).or_default();

            let messages = plugin
                .load_restraint(&mut restraint, block, target_data)
                .map_err(|source| FitError::RestraintLoad {
                    plugin: plugin.name().to_string(),
                    source_name: source_name.to_string(),
                    line_start: block.line_start,
                    line_end: block.line_end,
                    source,
                })?;

            info!(
                plugin = plugin.name(),
                line_start = block.line_start,
                line_end = block.line_end,
                weight,
                kind = %block.kind,
                "Created restraint."
            );
            for message in messages {
                info!(plugin = plugin.name(), "{message}");
            }

            restraints.push(restraint);
        }

        if name.is_empty() {
            return Err(FitError::MissingTargetName(source_name.to_string()));
        }

        Ok(Self {
            name,
            restraints,
            plugin_data,
        })
    }

    /// Distinct restraint types in load order.
    pub fn restraint_types(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = Vec::new();
        for r in &self.restraints {
            if !kinds.contains(&r.kind.as_str()) {
                kinds.push(&r.kind);
            }
        }
        kinds
    }

    /// Creates an independent copy whose restraints are resampled by their
    /// plugins from `ensemble`'s accumulated plugin state for this target.
    pub fn make_bootstrap(&self, ensemble: &Ensemble, rng: &mut dyn RngCore) -> Result<Self> {
        let mut dupe = self.clone();
        let empty = PluginData::empty();

        for (source, bootstrap) in self.restraints.iter().zip(dupe.restraints.iter_mut()) {
            let ensemble_data = ensemble
                .plugin_data(&self.name, &source.kind)
                .unwrap_or(&empty);
            let target_data = dupe.plugin_data.entry(source.kind.clone()).or_default();

            let messages = source
                .plugin()
                .load_bootstrap(bootstrap, source, ensemble_data, target_data, rng)
                .map_err(|err| FitError::Bootstrap {
                    target: self.name.clone(),
                    restraint: source.kind.clone(),
                    source: err,
                })?;
            for message in messages {
                debug!(plugin = source.plugin().name(), "{message}");
            }
        }

        Ok(dupe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{profile_block, registry, target_blocks, ProfileRestraint};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_load_target() {
        let target = Target::load("t.txt", &target_blocks("T1", &[0.7, 0.3, 0.0, 1.0]), &registry())
            .unwrap();
        assert_eq!(target.name, "T1");
        assert_eq!(target.restraints.len(), 1);
        assert_eq!(target.restraints[0].kind, "PROF");
        assert!((target.restraints[0].weight - 1.0).abs() < 1e-12);
        assert_eq!(
            target.restraints[0]
                .data
                .downcast_ref::<ProfileRestraint>()
                .unwrap()
                .values,
            vec![0.7, 0.3, 0.0, 1.0]
        );
        assert_eq!(target.restraint_types(), vec!["PROF"]);
    }

    #[test]
    fn test_missing_name_fails() {
        let blocks = vec![profile_block("PROF 1.0", &[1.0, 2.0])];
        let err = Target::load("noname.txt", &blocks, &registry()).unwrap_err();
        assert!(matches!(err, FitError::MissingTargetName(s) if s == "noname.txt"));
    }

    #[test]
    fn test_missing_weight_fails() {
        let blocks = vec![
            Block::new("NAME T"),
            profile_block("PROF", &[1.0]).with_lines(4, 5),
        ];
        let err = Target::load("t.txt", &blocks, &registry()).unwrap_err();
        assert!(matches!(err, FitError::MissingWeight { line: 4, .. }));
    }

    #[test]
    fn test_negative_weight_fails() {
        let blocks = vec![Block::new("NAME T"), profile_block("PROF -1", &[1.0])];
        assert!(Target::load("t.txt", &blocks, &registry()).is_err());
    }

    #[test]
    fn test_unhandled_type_fails() {
        let blocks = vec![Block::new("NAME T"), Block::new("SAXS 1.0")];
        let err = Target::load("t.txt", &blocks, &registry()).unwrap_err();
        assert!(matches!(err, FitError::UnhandledRestraintType(k) if k == "SAXS"));
    }

    #[test]
    fn test_plugin_failure_carries_context() {
        let blocks = vec![
            Block::new("NAME T"),
            Block::new("PROF 1.0").with_content(["abc"]).with_lines(7, 8),
        ];
        let err = Target::load("bad.txt", &blocks, &registry()).unwrap_err();
        match err {
            FitError::RestraintLoad {
                plugin,
                source_name,
                line_start,
                line_end,
                ..
            } => {
                assert_eq!(plugin, "profile");
                assert_eq!(source_name, "bad.txt");
                assert_eq!((line_start, line_end), (7, 8));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bootstrap_is_independent_copy() {
        let target =
            Target::load("t.txt", &target_blocks("T1", &[0.7, 0.3, 0.0, 1.0]), &registry()).unwrap();
        let ensemble = Ensemble::new(&[target.clone()], vec!["A".into(), "B".into()]);
        let mut rng = StdRng::seed_from_u64(7);

        let boot = target.make_bootstrap(&ensemble, &mut rng).unwrap();
        assert_eq!(boot.name, target.name);
        assert_eq!(boot.restraints.len(), target.restraints.len());

        let original = target.restraints[0]
            .data
            .downcast_ref::<ProfileRestraint>()
            .unwrap();
        assert_eq!(original.values, vec![0.7, 0.3, 0.0, 1.0]);
    }
}
