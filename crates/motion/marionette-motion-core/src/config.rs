//! Options for [`crate::MotionManager`].

use serde::{Deserialize, Serialize};

use crate::{MotionError, MotionPriority};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionManagerOptions {
    /// Number of playback lanes created up front. Parallel starts add more.
    pub lanes: usize,
    /// Priority used by convenience starts that do not name one.
    pub default_priority: MotionPriority,
    /// Group to draw from whenever lane 0 has nothing to play.
    pub idle_group: Option<String>,
}

impl Default for MotionManagerOptions {
    fn default() -> Self {
        Self {
            lanes: 1,
            default_priority: MotionPriority::Normal,
            idle_group: Some("idle".to_string()),
        }
    }
}

impl MotionManagerOptions {
    pub fn validate(&self) -> Result<(), MotionError> {
        if self.lanes == 0 {
            return Err(MotionError::InvalidOptions {
                reason: "at least one lane is required".into(),
            });
        }
        if self.default_priority == MotionPriority::None {
            return Err(MotionError::InvalidOptions {
                reason: "default priority cannot be none".into(),
            });
        }
        if self.idle_group.as_deref() == Some("") {
            return Err(MotionError::InvalidOptions {
                reason: "idle group name is empty".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(MotionManagerOptions::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_lanes_and_none_priority() {
        let opts = MotionManagerOptions {
            lanes: 0,
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        let opts = MotionManagerOptions {
            default_priority: MotionPriority::None,
            ..Default::default()
        };
        assert_eq!(opts.validate().unwrap_err().category(), "config");
    }

    #[test]
    fn deserializes_partial_json() {
        let opts: MotionManagerOptions =
            serde_json::from_str(r#"{ "lanes": 2, "default_priority": "force" }"#).unwrap();
        assert_eq!(opts.lanes, 2);
        assert_eq!(opts.default_priority, MotionPriority::Force);
        assert_eq!(opts.idle_group.as_deref(), Some("idle"));
    }
}
