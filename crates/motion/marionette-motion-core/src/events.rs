use marionette_api_core::Event;

/// Notifications emitted by motion lanes. All lanes of one
/// [`crate::MotionManager`] share a channel, so each carries its lane index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MotionEvent {
    Start {
        lane: usize,
        group: String,
        index: usize,
    },
    Finish {
        lane: usize,
    },
    Destroy {
        lane: usize,
    },
}

impl MotionEvent {
    pub const START: &'static str = "motionStart";
    pub const FINISH: &'static str = "motionFinish";
    pub const DESTROY: &'static str = "destroy";

    #[inline]
    pub fn lane(&self) -> usize {
        match self {
            Self::Start { lane, .. } | Self::Finish { lane } | Self::Destroy { lane } => *lane,
        }
    }
}

impl Event for MotionEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => Self::START,
            Self::Finish { .. } => Self::FINISH,
            Self::Destroy { .. } => Self::DESTROY,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpressionEvent {
    Set { index: usize },
    Reset,
    Destroy,
}

impl ExpressionEvent {
    pub const SET: &'static str = "expressionSet";
    pub const RESET: &'static str = "expressionReset";
    pub const DESTROY: &'static str = "destroy";
}

impl Event for ExpressionEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Set { .. } => Self::SET,
            Self::Reset => Self::RESET,
            Self::Destroy => Self::DESTROY,
        }
    }
}
