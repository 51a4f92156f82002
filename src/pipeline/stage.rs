//! Stages of one render, in the only order they may be visited.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Loaded,
    DefaultsApplied,
    ParamsMerged,
    LayoutApplied,
    ChildrenResolved,
    FunctionsBound,
    AttrsBuilt,
    TransformApplied,
    /// Terminal when the guard is false.
    RenderGuardEvaluated,
    MetadataApplied,
    ParametersFlattened,
    CacheChecked,
    Rendered,
    OutputTransformed,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Loaded => "loaded",
            Stage::DefaultsApplied => "defaults_applied",
            Stage::ParamsMerged => "params_merged",
            Stage::LayoutApplied => "layout_applied",
            Stage::ChildrenResolved => "children_resolved",
            Stage::FunctionsBound => "functions_bound",
            Stage::AttrsBuilt => "attrs_built",
            Stage::TransformApplied => "transform_applied",
            Stage::RenderGuardEvaluated => "render_guard_evaluated",
            Stage::MetadataApplied => "metadata_applied",
            Stage::ParametersFlattened => "parameters_flattened",
            Stage::CacheChecked => "cache_checked",
            Stage::Rendered => "rendered",
            Stage::OutputTransformed => "output_transformed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stage cursor of one render; only moves forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTracker {
    component: String,
    current: Stage,
}

impl StageTracker {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            current: Stage::Loaded,
        }
    }

    pub fn current(&self) -> Stage {
        self.current
    }

    pub fn advance(&mut self, next: Stage) {
        debug_assert!(
            next > self.current,
            "stage {} re-entered after {}",
            next,
            self.current
        );
        tracing::debug!("{}: {} -> {}", self.component, self.current, next);
        self.current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_are_ordered() {
        assert!(Stage::Loaded < Stage::DefaultsApplied);
        assert!(Stage::RenderGuardEvaluated < Stage::MetadataApplied);
        assert!(Stage::CacheChecked < Stage::OutputTransformed);
    }

    #[test]
    fn test_tracker_advances() {
        let mut tracker = StageTracker::new("card");
        tracker.advance(Stage::DefaultsApplied);
        tracker.advance(Stage::LayoutApplied);
        assert_eq!(tracker.current(), Stage::LayoutApplied);
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn test_tracker_rejects_going_back() {
        let mut tracker = StageTracker::new("card");
        tracker.advance(Stage::AttrsBuilt);
        tracker.advance(Stage::ParamsMerged);
    }
}
