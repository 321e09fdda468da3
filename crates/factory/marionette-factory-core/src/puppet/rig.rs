use indexmap::IndexMap;
use marionette_api_core::CoreModel;
use serde::{Deserialize, Serialize};

/// Fixed parameter values written after motions every frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PuppetPose {
    pub parameters: IndexMap<String, f32>,
}

impl PuppetPose {
    pub fn apply(&self, model: &mut dyn CoreModel) {
        for (id, value) in &self.parameters {
            model.set_parameter(id, *value);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsRule {
    pub source: String,
    pub target: String,
    #[serde(default = "unit_scale")]
    pub scale: f32,
}

fn unit_scale() -> f32 {
    1.0
}

/// `target = source * scale`, applied in rule order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PuppetPhysics {
    pub rules: Vec<PhysicsRule>,
}

impl PuppetPhysics {
    pub fn apply(&self, model: &mut dyn CoreModel) {
        for rule in &self.rules {
            if let Some(value) = model.parameter(&rule.source) {
                model.set_parameter(&rule.target, value * rule.scale);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marionette_api_core::ParameterTable;

    #[test]
    fn rules_chain_in_order() {
        let mut table = ParameterTable::new()
            .with("ParamAngleX", 10.0)
            .with("ParamHairFront", 0.0)
            .with("ParamHairBack", 0.0);
        let physics = PuppetPhysics {
            rules: vec![
                PhysicsRule {
                    source: "ParamAngleX".into(),
                    target: "ParamHairFront".into(),
                    scale: 0.5,
                },
                PhysicsRule {
                    source: "ParamHairFront".into(),
                    target: "ParamHairBack".into(),
                    scale: -1.0,
                },
                PhysicsRule {
                    source: "ParamMissing".into(),
                    target: "ParamAngleX".into(),
                    scale: 1.0,
                },
            ],
        };
        physics.apply(&mut table);
        assert_eq!(table.parameter("ParamHairFront"), Some(5.0));
        assert_eq!(table.parameter("ParamHairBack"), Some(-5.0));
        assert_eq!(table.parameter("ParamAngleX"), Some(10.0));
    }
}
