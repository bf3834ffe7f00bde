//! Notification configuration.
//!
//! Every projection resolves an effective [`SelectorConfigs`] each time it
//! tracks, layering three levels of [`PartialSelectorConfigs`] overrides:
//! the ambient notifying context (set per batch), the projection's own
//! override, and the owning selector's defaults.

/// Animation hint forwarded to the owner-invalidation callback, for the view
/// layer to wrap the resulting re-render in a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationPreset {
    Default,
    Fast,
    Gentle,
}

/// Resolved notification configuration for one projection track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectorConfigs {
    /// Notify the owner even when the tracked value is unchanged.
    pub always_notify: bool,
    /// Bypass deferred coalescing and notify inline.
    pub sync_notify: bool,
    /// Animation to carry with the notification.
    pub animation: Option<AnimationPreset>,
}

/// Partial override; `None` fields defer to the next configuration level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartialSelectorConfigs {
    pub always_notify: Option<bool>,
    pub sync_notify: Option<bool>,
    pub animation: Option<Option<AnimationPreset>>,
}

impl PartialSelectorConfigs {
    /// Override forcing inline notification.
    pub fn sync() -> Self {
        Self {
            sync_notify: Some(true),
            ..Self::default()
        }
    }

    /// Override forcing notification on unchanged values.
    pub fn always() -> Self {
        Self {
            always_notify: Some(true),
            ..Self::default()
        }
    }

    /// Override attaching an animation to notifications.
    pub fn animated(preset: AnimationPreset) -> Self {
        Self {
            animation: Some(Some(preset)),
            ..Self::default()
        }
    }
}

impl SelectorConfigs {
    /// Layer the overrides: ambient notifying context first, then the
    /// projection's own override, then the selector defaults.
    pub(crate) fn resolved(
        ambient: Option<PartialSelectorConfigs>,
        projection: PartialSelectorConfigs,
        base: SelectorConfigs,
    ) -> SelectorConfigs {
        let ambient = ambient.unwrap_or_default();
        SelectorConfigs {
            always_notify: ambient
                .always_notify
                .or(projection.always_notify)
                .unwrap_or(base.always_notify),
            sync_notify: ambient
                .sync_notify
                .or(projection.sync_notify)
                .unwrap_or(base.sync_notify),
            animation: ambient
                .animation
                .or(projection.animation)
                .unwrap_or(base.animation),
        }
    }
}
