//! Properties of composite assembly and disassembly.
//!
//! These tests drive the registry through sequences of additions and removals
//! under both prefix policies and check that effective parameter names stay
//! unique and constraint expressions follow renamed parameters.

use lmcompose_rs::config::{LastComponentPolicy, PrefixPolicy, RegistryConfig};
use lmcompose_rs::error::Result;
use lmcompose_rs::model::CompositeModel;
use lmcompose_rs::models::{Component, ComponentArgs, ComponentKind};
use lmcompose_rs::parameters::expression::rewrite_references;
use lmcompose_rs::registry::CompositeModelRegistry;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet};

fn registry(policy: PrefixPolicy) -> CompositeModelRegistry {
    CompositeModelRegistry::new(RegistryConfig::default().with_prefix_policy(policy)).unwrap()
}

fn kinds() -> Vec<ComponentKind> {
    vec![
        ComponentKind::Gaussian,
        ComponentKind::Lorentzian,
        ComponentKind::PseudoVoigt,
        ComponentKind::Poisson,
        ComponentKind::Exponential,
        ComponentKind::PowerLaw,
        ComponentKind::Constant,
        ComponentKind::Linear,
        ComponentKind::Quadratic,
        ComponentKind::Polynomial { degree: 3 },
    ]
}

fn assert_disjoint(model: &CompositeModel) {
    let mut seen = BTreeSet::new();
    for component in model.components() {
        for name in component.effective_names() {
            assert!(seen.insert(name.clone()), "{} appears twice in {}", name, model);
        }
    }
}

/// Every constraint expression must only reference parameters of the composite.
fn assert_expressions_resolve(model: &CompositeModel) -> Result<()> {
    let mut params = model.make_default_parameters()?;
    params.update_expressions()?;
    Ok(())
}

#[test]
fn test_random_add_sequences_keep_names_unique() -> Result<()> {
    let kinds = kinds();
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    for policy in [PrefixPolicy::Minimal, PrefixPolicy::Symmetric] {
        let registry = registry(policy);

        for _ in 0..20 {
            let mut model = CompositeModel::new();
            let steps = rng.gen_range(1..8);
            for _ in 0..steps {
                let kind = kinds[rng.gen_range(0..kinds.len())];
                model = registry.add(&model, Component::new(kind))?;
                assert_disjoint(&model);
            }
            assert_expressions_resolve(&model)?;
        }
    }

    Ok(())
}

#[test]
fn test_random_removals_keep_names_unique() -> Result<()> {
    let kinds = kinds();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let registry = registry(PrefixPolicy::Symmetric);

    let mut model = CompositeModel::new();
    for _ in 0..6 {
        let kind = kinds[rng.gen_range(0..3)];
        model = registry.add(&model, Component::new(kind))?;
    }

    while model.len() > 1 {
        let index = rng.gen_range(0..model.len());
        let before = model.len();
        model = registry.remove_at(&model, index)?;
        assert_eq!(model.len(), before - 1);
        assert_disjoint(&model);
        assert_expressions_resolve(&model)?;
    }

    Ok(())
}

#[test]
fn test_two_gaussians_minimal_policy() -> Result<()> {
    let registry = registry(PrefixPolicy::Minimal);
    let model = registry.add(&CompositeModel::new(), Component::new(ComponentKind::Gaussian))?;
    assert_eq!(model.components(), &[Component::new(ComponentKind::Gaussian)]);

    let model = registry.add(&model, Component::new(ComponentKind::Gaussian))?;
    let prefixes: Vec<&str> = model.components().iter().map(|c| c.prefix()).collect();
    assert_eq!(prefixes, vec!["", "g0_"]);

    let non_empty = prefixes.iter().filter(|p| !p.is_empty()).count();
    assert_eq!(non_empty, 1);
    Ok(())
}

#[test]
fn test_two_gaussians_symmetric_policy() -> Result<()> {
    let registry = registry(PrefixPolicy::Symmetric);
    let model = registry.add(&CompositeModel::new(), Component::new(ComponentKind::Gaussian))?;
    let model = registry.add(&model, Component::new(ComponentKind::Gaussian))?;

    let prefixes: Vec<&str> = model.components().iter().map(|c| c.prefix()).collect();
    assert_eq!(prefixes, vec!["g0_", "g1_"]);

    let params = model.make_default_parameters()?;
    assert_eq!(params.get("g0_fwhm").unwrap().expr(), Some("2.35482 * g0_sigma"));
    assert_eq!(params.get("g1_fwhm").unwrap().expr(), Some("2.35482 * g1_sigma"));
    Ok(())
}

#[test]
fn test_three_poissons() -> Result<()> {
    for policy in [PrefixPolicy::Minimal, PrefixPolicy::Symmetric] {
        let registry = registry(policy);
        let mut model = CompositeModel::new();
        for _ in 0..3 {
            model = registry.add(&model, Component::new(ComponentKind::Poisson))?;
        }

        assert_disjoint(&model);
        let prefixes: BTreeSet<&str> = model
            .components()
            .iter()
            .map(|c| c.prefix())
            .filter(|p| !p.is_empty())
            .collect();
        assert!(prefixes.len() >= 2, "{:?} under {:?}", prefixes, policy);
        assert_eq!(model.parameter_names().len(), 6);
    }
    Ok(())
}

#[test]
fn test_add_then_remove_round_trip() -> Result<()> {
    let registry = registry(PrefixPolicy::Minimal);
    let a = Component::new(ComponentKind::Lorentzian);
    let single = registry.add(&CompositeModel::new(), a)?;

    let pair = registry.add(&single, Component::new(ComponentKind::Lorentzian))?;
    let added = pair.components()[1].clone();
    assert_eq!(registry.remove(&pair, &added)?, single);

    // Symmetric: the survivor keeps the prefix it was given
    let registry = self::registry(PrefixPolicy::Symmetric);
    let single = registry.add(&CompositeModel::new(), Component::new(ComponentKind::Lorentzian))?;
    let pair = registry.add(&single, Component::new(ComponentKind::Lorentzian))?;
    let added = pair.components()[1].clone();
    let removed = registry.remove(&pair, &added)?;
    assert_eq!(removed.components(), &pair.components()[..1]);
    assert_eq!(removed.components()[0].prefix(), "l0_");
    Ok(())
}

#[test]
fn test_remove_non_member_is_idempotent() -> Result<()> {
    let registry = registry(PrefixPolicy::Symmetric);
    let mut model = CompositeModel::new();
    for kind in [ComponentKind::Gaussian, ComponentKind::Gaussian, ComponentKind::Linear] {
        model = registry.add(&model, Component::new(kind))?;
    }

    let stranger = Component::new(ComponentKind::Exponential);
    let once = registry.remove(&model, &stranger)?;
    let twice = registry.remove(&once, &stranger)?;
    assert_eq!(once, model);
    assert_eq!(twice, model);
    Ok(())
}

#[test]
fn test_last_component_policy_from_json() -> Result<()> {
    let config = RegistryConfig::from_json(r#"{"last_component": "keep"}"#)?;
    assert_eq!(config.last_component, LastComponentPolicy::Keep);

    let registry = CompositeModelRegistry::new(config)?;
    let model = registry.add(&CompositeModel::new(), Component::new(ComponentKind::Constant))?;
    assert_eq!(registry.remove_at(&model, 0)?, model);
    Ok(())
}

#[test]
fn test_generate_prefix_is_deterministic() -> Result<()> {
    let registry = registry(PrefixPolicy::Minimal);
    let gaussian = Component::new(ComponentKind::Gaussian);
    let used = BTreeSet::from(["g0_".to_string()]);

    assert_eq!(registry.generate_prefix(&gaussian, &used)?, "g1_");
    assert_eq!(registry.generate_prefix(&gaussian, &used)?, "g1_");

    let poly = Component::from_args("polynomial", &ComponentArgs::from([("degree".to_string(), 2.0)]))?;
    assert_eq!(registry.generate_prefix(&poly, &BTreeSet::new())?, "p0_");
    Ok(())
}

#[test]
fn test_rewriting_leaves_longer_identifiers_alone() -> Result<()> {
    let renames = BTreeMap::from([("sigma".to_string(), "g0_sigma".to_string())]);
    assert_eq!(rewrite_references("sigma2 + sigma", &renames)?, "sigma2 + g0_sigma");
    assert_eq!(rewrite_references("sigma2 * 2", &renames)?, "sigma2 * 2");
    Ok(())
}

#[test]
fn test_missing_arguments_are_reported() {
    let err = Component::from_args("Polynomial", &ComponentArgs::new()).unwrap_err();
    match err {
        lmcompose_rs::ComposeError::InvalidComponentArguments { missing, .. } => {
            assert_eq!(missing, vec!["degree".to_string()]);
        }
        other => panic!("unexpected error: {}", other),
    }
}
