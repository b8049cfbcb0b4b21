//! Reference linking and hierarchical defaults resolution.
//!
//! Resolution is an explicit three-layer walk (Model over Component over
//! Document) into `Model::resolved`; there is no implicit inheritance at the
//! type level, so corner mixing stays auditable. Running the resolver twice
//! is a no-op.

use crate::error::ConfigError;
use lib_types::{
    Component, Defaults, Document, C_COMP_DEFAULT, RLOAD_DEFAULT, SIM_TIME_DEFAULT,
};

/// Link pins to models, validate references, and compute every model's
/// effective defaults.
pub fn resolve_document(doc: &mut Document) -> Result<(), ConfigError> {
    seed_builtin_defaults(&mut doc.defaults);

    for comp in &doc.components {
        validate_component(doc, comp)?;
    }

    // Walk the three layers per model. A model referenced from a component
    // inherits that component's overrides; the first referencing component
    // wins, matching declaration order.
    let comp_for_model: Vec<Option<usize>> = doc
        .models
        .iter()
        .map(|m| {
            doc.components.iter().position(|c| {
                c.pins
                    .iter()
                    .any(|p| p.needs_analysis() && p.model_name.eq_ignore_ascii_case(&m.name))
            })
        })
        .collect();

    for (model, comp_idx) in doc.models.iter_mut().zip(comp_for_model) {
        let mut resolved = model.overrides.clone();
        if let Some(idx) = comp_idx {
            resolved.inherit(&doc.components[idx].overrides);
        }
        resolved.inherit(&doc.defaults);
        derive_voltage_range(&mut resolved);
        model.resolved = resolved;
    }
    Ok(())
}

fn seed_builtin_defaults(defaults: &mut Defaults) {
    if defaults.r_load.is_none() {
        defaults.r_load = Some(RLOAD_DEFAULT);
    }
    if defaults.sim_time.is_none() {
        defaults.sim_time = Some(SIM_TIME_DEFAULT);
    }
    if defaults.c_comp.is_empty() {
        defaults.c_comp = lib_types::Corners::from_typ(C_COMP_DEFAULT);
    }
    if defaults.clamp_tol.is_none() {
        defaults.clamp_tol = Some(0.0);
    }
    if defaults.derate_vi_pct.is_none() {
        defaults.derate_vi_pct = Some(0.0);
    }
    if defaults.derate_ramp_pct.is_none() {
        defaults.derate_ramp_pct = Some(0.0);
    }
}

/// `[Voltage Range]` can be left out when both rail references are given;
/// the span is their difference, corner by corner.
fn derive_voltage_range(defaults: &mut Defaults) {
    if !defaults.voltage_range.is_empty() {
        return;
    }
    if defaults.pullup_ref.is_empty() || defaults.pulldown_ref.is_empty() {
        return;
    }
    defaults.voltage_range = lib_types::Corners {
        typ: sub(defaults.pullup_ref.typ, defaults.pulldown_ref.typ),
        min: sub(defaults.pullup_ref.min, defaults.pulldown_ref.min),
        max: sub(defaults.pullup_ref.max, defaults.pulldown_ref.max),
    };
}

fn sub(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a - b),
        _ => None,
    }
}

fn validate_component(doc: &Document, comp: &Component) -> Result<(), ConfigError> {
    for pin in &comp.pins {
        if pin.needs_analysis() && doc.find_model(&pin.model_name).is_none() {
            return Err(ConfigError::UnresolvedModel {
                pin: pin.name.clone(),
                model: pin.model_name.clone(),
            });
        }
        for (role, target) in [
            ("enable", &pin.enable_pin),
            ("input", &pin.input_pin),
            ("series", &pin.series_pin),
        ] {
            if let Some(target) = target {
                if comp.find_pin(target).is_none() {
                    return Err(ConfigError::UnresolvedPin {
                        pin: pin.name.clone(),
                        role,
                        target: target.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::{Corners, Model, ModelType, Pin};

    fn doc_with_model() -> Document {
        let mut doc = Document::default();
        doc.defaults.voltage_range = Corners::new(3.3, 3.0, 3.6);
        doc.models.push(Model {
            name: "driver".into(),
            model_type: ModelType::Output,
            ..Default::default()
        });
        doc.components.push(Component {
            name: "chip".into(),
            pins: vec![Pin {
                name: "pad".into(),
                signal: "sig".into(),
                model_name: "driver".into(),
                ..Default::default()
            }],
            ..Default::default()
        });
        doc
    }

    #[test]
    fn test_three_layer_walk() {
        let mut doc = doc_with_model();
        doc.components[0].overrides.voltage_range = Corners::from_typ(2.5);
        doc.models[0].overrides.sim_time = Some(5e-9);
        resolve_document(&mut doc).unwrap();

        let r = &doc.models[0].resolved;
        // model layer wins, then component, then document
        assert_eq!(r.sim_time, Some(5e-9));
        assert_eq!(r.voltage_range.typ, Some(2.5));
        assert_eq!(r.voltage_range.min, Some(3.0));
        assert_eq!(r.r_load, Some(RLOAD_DEFAULT));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut doc = doc_with_model();
        resolve_document(&mut doc).unwrap();
        let first = doc.clone();
        resolve_document(&mut doc).unwrap();
        assert_eq!(doc, first);
    }

    #[test]
    fn test_unresolved_model_is_fatal() {
        let mut doc = doc_with_model();
        doc.components[0].pins[0].model_name = "ghost".into();
        assert!(matches!(
            resolve_document(&mut doc),
            Err(ConfigError::UnresolvedModel { .. })
        ));
    }

    #[test]
    fn test_missing_enable_pin_is_fatal() {
        let mut doc = doc_with_model();
        doc.components[0].pins[0].enable_pin = Some("oe".into());
        assert!(matches!(
            resolve_document(&mut doc),
            Err(ConfigError::UnresolvedPin { role: "enable", .. })
        ));
    }

    #[test]
    fn test_voltage_range_derived_from_refs() {
        let mut doc = doc_with_model();
        doc.defaults.voltage_range = Corners::default();
        doc.defaults.pullup_ref = Corners::new(3.3, 3.0, 3.6);
        doc.defaults.pulldown_ref = Corners::new(0.0, 0.0, 0.0);
        resolve_document(&mut doc).unwrap();
        assert_eq!(doc.models[0].resolved.voltage_range, Corners::new(3.3, 3.0, 3.6));
    }
}
