use marionette_api_core::Payload;
use serde::{Deserialize, Serialize};

use super::{CurveMotion, CurveRuntime};
use crate::{ExpressionCodec, MotionCodec, MotionError};

/// Motion definition entry: `{ "file": "...", "name": "..." }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveMotionSpec {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CurveMotionSpec {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Expression definition entry: `{ "name": "...", "file": "..." }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveExpressionSpec {
    pub name: String,
    pub file: String,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct CurveCodec;

impl MotionCodec for CurveCodec {
    type Runtime = CurveRuntime;

    fn motion_file<'a>(&self, spec: &'a CurveMotionSpec) -> &'a str {
        &spec.file
    }

    fn create_motion(
        &self,
        data: &Payload,
        spec: &CurveMotionSpec,
    ) -> Result<CurveMotion, MotionError> {
        CurveMotion::from_json(&spec.file, data.as_json()?)
    }

    fn create_runtime(&self) -> CurveRuntime {
        CurveRuntime::new()
    }
}

impl ExpressionCodec for CurveCodec {
    type Spec = CurveExpressionSpec;
    type Runtime = CurveRuntime;

    fn expression_name<'a>(&self, spec: &'a CurveExpressionSpec) -> &'a str {
        &spec.name
    }

    fn expression_file<'a>(&self, spec: &'a CurveExpressionSpec) -> &'a str {
        &spec.file
    }

    fn create_expression(
        &self,
        data: &Payload,
        spec: &CurveExpressionSpec,
    ) -> Result<CurveMotion, MotionError> {
        CurveMotion::from_expression_json(&spec.file, data.as_json()?)
    }

    /// No curves and no end, so it holds whatever the frame already has.
    fn default_expression(&self) -> CurveMotion {
        CurveMotion::default()
    }

    fn expression_runtime(&self) -> CurveRuntime {
        CurveRuntime::new()
    }
}
