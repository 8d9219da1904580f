//! Fixtures for unit tests: a linear-mixture profile plugin and a small
//! three-component library.
//!
//! The profile plugin treats every restraint as a vector `y` and every
//! component attribute as a vector `a_i`; the fitness of ratios `r` is
//! `weight * Σ (Σ_i r_i a_i / Σ r - y)^2`.

use crate::component::{Component, ComponentLibrary};
use crate::ensemble::Ensemble;
use crate::error::PluginError;
use crate::plugin::{Block, Plugin, PluginData, PluginRegistry, Restraint};
use crate::target::Target;
use rand::{Rng, RngCore};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Restraint payload of [`ProfilePlugin`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProfileRestraint {
    pub(crate) values: Vec<f64>,
}

#[derive(Debug)]
pub(crate) struct ProfilePlugin {
    types: Vec<String>,
}

impl ProfilePlugin {
    pub(crate) fn new(types: &[&str]) -> Self {
        Self {
            types: types.iter().map(|t| t.to_string()).collect(),
        }
    }
}

fn parse_values(block: &Block) -> Result<Vec<f64>, PluginError> {
    let values = block
        .content
        .iter()
        .flat_map(|line| line.split_whitespace())
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| PluginError::msg(format!("not a number: {token}")))
        })
        .collect::<Result<Vec<f64>, _>>()?;
    if values.is_empty() {
        return Err(PluginError::msg("empty profile"));
    }
    Ok(values)
}

impl Plugin for ProfilePlugin {
    fn name(&self) -> &str {
        "profile"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn types(&self) -> &[String] {
        &self.types
    }

    fn load_restraint(
        &self,
        restraint: &mut Restraint,
        block: &Block,
        _target_data: &mut PluginData,
    ) -> Result<Vec<String>, PluginError> {
        let values = parse_values(block)?;
        let n = values.len();
        restraint.data.set(ProfileRestraint { values });
        Ok(vec![format!("{n} points")])
    }

    fn load_attribute(
        &self,
        attribute: &mut PluginData,
        block: &Block,
    ) -> Result<Vec<String>, PluginError> {
        attribute.set(parse_values(block)?);
        Ok(Vec::new())
    }

    fn load_bootstrap(
        &self,
        bootstrap: &mut Restraint,
        source: &Restraint,
        ensemble_data: &PluginData,
        _target_data: &mut PluginData,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<String>, PluginError> {
        let y = &source
            .data
            .downcast_ref::<ProfileRestraint>()
            .ok_or_else(|| PluginError::msg("restraint has no profile"))?
            .values;
        let fit = ensemble_data
            .downcast_ref::<Vec<f64>>()
            .cloned()
            .unwrap_or_else(|| y.clone());

        let residuals: Vec<f64> = y.iter().zip(&fit).map(|(a, b)| a - b).collect();
        let values = fit
            .iter()
            .map(|f| f + residuals[rng.random_range(0..residuals.len())])
            .collect();
        bootstrap.data.set(ProfileRestraint { values });
        Ok(Vec::new())
    }

    fn calc_fitness(
        &self,
        restraint: &Restraint,
        _target_data: &PluginData,
        ensemble_data: &mut PluginData,
        attributes: &[&PluginData],
        ratios: &[f64],
    ) -> Result<f64, PluginError> {
        let y = &restraint
            .data
            .downcast_ref::<ProfileRestraint>()
            .ok_or_else(|| PluginError::msg("restraint has no profile"))?
            .values;
        let total: f64 = ratios.iter().sum();
        if !(total > 0.0) {
            return Ok(f64::INFINITY);
        }

        let mut mix = vec![0.0; y.len()];
        for (attr, r) in attributes.iter().zip(ratios) {
            let profile = attr
                .downcast_ref::<Vec<f64>>()
                .ok_or_else(|| PluginError::msg("attribute has no profile"))?;
            if profile.len() != mix.len() {
                return Err(PluginError::msg("profile length mismatch"));
            }
            for (m, a) in mix.iter_mut().zip(profile) {
                *m += r / total * a;
            }
        }

        let chi: f64 = mix.iter().zip(y).map(|(m, v)| (m - v).powi(2)).sum();
        ensemble_data.set(mix);
        Ok(restraint.weight * chi)
    }

    fn ensemble_state(
        &self,
        restraint: &Restraint,
        _target_data: &PluginData,
        ensembles: &[&PluginData],
    ) -> Result<Vec<String>, PluginError> {
        let fitted = ensembles.iter().filter(|d| !d.is_empty()).count();
        Ok(vec![format!(
            "{}: {fitted} of {} ensembles fitted",
            restraint.kind,
            ensembles.len()
        )])
    }
}

pub(crate) fn registry() -> PluginRegistry {
    PluginRegistry::new()
        .with_plugin(Arc::new(ProfilePlugin::new(&["PROF"])))
        .expect("fresh registry")
}

/// A block with one value per content line.
pub(crate) fn profile_block(header: &str, values: &[f64]) -> Block {
    Block::new(header).with_content(values.iter().map(|v| v.to_string()))
}

pub(crate) fn target_blocks(name: &str, values: &[f64]) -> Vec<Block> {
    vec![
        Block::new(&format!("NAME {name}")).with_lines(1, 1),
        profile_block("PROF 1.0", values).with_lines(2, 2 + values.len()),
    ]
}

/// Target `T1`, an exact `0.7 A + 0.3 B` mixture of [`components`].
pub(crate) fn targets() -> Vec<Target> {
    vec![Target::load("t1.txt", &target_blocks("T1", &[0.7, 0.3, 0.0, 1.0]), &registry())
        .expect("fixture target")]
}

/// Targets `T1` and `T2`; `T2` is a `0.2 A + 0.8 C` mixture.
pub(crate) fn two_targets() -> Vec<Target> {
    let mut t = targets();
    t.push(
        Target::load("t2.txt", &target_blocks("T2", &[0.2, 0.0, 0.8, 1.0]), &registry())
            .expect("fixture target"),
    );
    t
}

/// Components `A`, `B`, `C` with orthogonal `PROF` profiles.
pub(crate) fn components() -> ComponentLibrary {
    let mut lib = ComponentLibrary::new();
    for (name, profile) in [
        ("A", vec![1.0, 0.0, 0.0, 1.0]),
        ("B", vec![0.0, 1.0, 0.0, 1.0]),
        ("C", vec![0.0, 0.0, 1.0, 1.0]),
    ] {
        lib.insert(Component::new(name).with_attribute("PROF", PluginData::new(profile)));
    }
    lib
}

pub(crate) fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// An ensemble whose `PROF` fitness for every target is `score`.
pub(crate) fn scored(targets: &[Target], list: &[&str], score: f64) -> Ensemble {
    let mut e = Ensemble::new(targets, names(list));
    for t in targets {
        e.set_fitness(&t.name, BTreeMap::from([("PROF".to_string(), score)]));
    }
    e
}

/// An ensemble with `PROF` fitness `scores[k]` for `targets[k]`.
pub(crate) fn scored_each(targets: &[Target], list: &[&str], scores: &[f64]) -> Ensemble {
    let mut e = Ensemble::new(targets, names(list));
    for (t, &score) in targets.iter().zip(scores) {
        e.set_fitness(&t.name, BTreeMap::from([("PROF".to_string(), score)]));
    }
    e
}
