use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use marionette_api_core::CoreModel;

use crate::MotionError;

/// One parameter's keyframes as `[time, value]` pairs, ordered by time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub id: String,
    pub points: Vec<[f32; 2]>,
}

impl Curve {
    /// Linear interpolation, holding the first/last value outside the keys.
    pub fn sample(&self, t: f32) -> Option<f32> {
        let points = &self.points;
        let first = points.first()?;
        let last = points[points.len() - 1];
        if t <= first[0] {
            return Some(first[1]);
        }
        if t >= last[0] {
            return Some(last[1]);
        }
        // First key strictly after t; 1..len because of the guards above.
        let hi = points.partition_point(|p| p[0] <= t);
        let (a, b) = (points[hi - 1], points[hi]);
        let span = (b[0] - a[0]).max(f32::EPSILON);
        let lt = ((t - a[0]) / span).clamp(0.0, 1.0);
        Some(a[1] + (b[1] - a[1]) * lt)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurveMotion {
    /// Seconds. `None` means the clip never finishes on its own.
    #[serde(default)]
    pub duration: Option<f32>,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default)]
    pub curves: Vec<Curve>,
}

#[derive(Deserialize)]
struct FlatParameter {
    id: String,
    value: f32,
}

#[derive(Deserialize)]
struct FlatExpression {
    parameters: Vec<FlatParameter>,
}

impl CurveMotion {
    pub fn from_json(file: &str, json: &JsonValue) -> Result<Self, MotionError> {
        let clip: Self =
            serde_json::from_value(json.clone()).map_err(|e| MotionError::malformed(file, e))?;
        clip.validate(file)?;
        Ok(clip)
    }

    /// Accepts either the flat expression form or a full clip.
    pub fn from_expression_json(file: &str, json: &JsonValue) -> Result<Self, MotionError> {
        if json.get("parameters").is_some() {
            let flat: FlatExpression = serde_json::from_value(json.clone())
                .map_err(|e| MotionError::malformed(file, e))?;
            return Ok(Self {
                duration: None,
                looping: false,
                curves: flat
                    .parameters
                    .into_iter()
                    .map(|p| Curve {
                        id: p.id,
                        points: vec![[0.0, p.value]],
                    })
                    .collect(),
            });
        }
        Self::from_json(file, json)
    }

    fn validate(&self, file: &str) -> Result<(), MotionError> {
        if let Some(d) = self.duration {
            if !d.is_finite() || d <= 0.0 {
                return Err(MotionError::malformed(file, format!("invalid duration {d}")));
            }
        }
        if self.looping && self.duration.is_none() {
            return Err(MotionError::malformed(file, "looping clip needs a duration"));
        }
        for curve in &self.curves {
            if curve.points.is_empty() {
                return Err(MotionError::malformed(
                    file,
                    format!("curve {} has no points", curve.id),
                ));
            }
            if curve.points.windows(2).any(|w| w[1][0] < w[0][0]) {
                return Err(MotionError::malformed(
                    file,
                    format!("curve {} is not ordered by time", curve.id),
                ));
            }
        }
        Ok(())
    }

    /// Local clip time for `elapsed` seconds since the clip started.
    pub fn local_time(&self, elapsed: f32) -> f32 {
        match self.duration {
            Some(d) if self.looping => elapsed.rem_euclid(d),
            Some(d) => elapsed.min(d),
            None => elapsed,
        }
    }

    pub fn is_finished_at(&self, elapsed: f32) -> bool {
        match self.duration {
            Some(d) => !self.looping && elapsed >= d,
            None => false,
        }
    }

    /// Write every curve at local time `t`. Returns true if any parameter
    /// existed on the model.
    pub fn apply(&self, t: f32, model: &mut dyn CoreModel) -> bool {
        let mut wrote = false;
        for curve in &self.curves {
            if let Some(v) = curve.sample(t) {
                wrote |= model.set_parameter(&curve.id, v);
            }
        }
        wrote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marionette_api_core::ParameterTable;
    use serde_json::json;

    fn curve(points: &[[f32; 2]]) -> Curve {
        Curve {
            id: "p".into(),
            points: points.to_vec(),
        }
    }

    #[test]
    fn samples_linearly_and_clamps() {
        let c = curve(&[[0.0, 0.0], [1.0, 10.0], [3.0, 30.0]]);
        assert_eq!(c.sample(-1.0), Some(0.0));
        assert_eq!(c.sample(0.5), Some(5.0));
        assert_eq!(c.sample(1.0), Some(10.0));
        assert_eq!(c.sample(2.0), Some(20.0));
        assert_eq!(c.sample(9.0), Some(30.0));
        assert_eq!(curve(&[]).sample(0.0), None);
    }

    #[test]
    fn rejects_unordered_and_empty_curves() {
        let bad = json!({ "duration": 1.0, "curves": [{ "id": "p", "points": [[1.0, 0.0], [0.5, 1.0]] }] });
        assert!(matches!(
            CurveMotion::from_json("a.json", &bad),
            Err(MotionError::Malformed { .. })
        ));
        let empty = json!({ "curves": [{ "id": "p", "points": [] }] });
        assert!(CurveMotion::from_json("a.json", &empty).is_err());
        let looping = json!({ "loop": true, "curves": [] });
        assert!(CurveMotion::from_json("a.json", &looping).is_err());
    }

    #[test]
    fn flat_expression_holds_values() {
        let clip = CurveMotion::from_expression_json(
            "smile.exp.json",
            &json!({ "parameters": [{ "id": "ParamEyeLSmile", "value": 1.0 }] }),
        )
        .unwrap();
        assert_eq!(clip.duration, None);
        assert!(!clip.is_finished_at(1e6));

        let mut model = ParameterTable::new().with("ParamEyeLSmile", 0.0);
        assert!(clip.apply(clip.local_time(42.0), &mut model));
        assert_eq!(model.parameter("ParamEyeLSmile"), Some(1.0));
    }

    #[test]
    fn looping_wraps_local_time() {
        let clip = CurveMotion {
            duration: Some(2.0),
            looping: true,
            curves: vec![],
        };
        assert_eq!(clip.local_time(5.0), 1.0);
        assert!(!clip.is_finished_at(5.0));
    }
}
