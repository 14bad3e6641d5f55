use chrono::{DateTime, Utc};

use crate::catalog::FormId;
use crate::host::SubscriptionId;

/// Event-loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelState {
    #[default]
    Idle,
    /// Routing and, if needed, swapping the form.
    Rendering,
    /// Writing field input back, or refreshing fields from their cells.
    Syncing,
    /// A selection event landed inside the cooldown window.
    RenderSuppressedByCooldown { until: DateTime<Utc> },
}

impl PanelState {
    /// A cycle is in flight; new triggers are dropped.
    pub fn is_busy(self) -> bool {
        matches!(self, PanelState::Rendering | PanelState::Syncing)
    }
}

/// A live per-sheet selection subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSubscription {
    pub sheet: String,
    pub id: SubscriptionId,
}

/// Render bookkeeping for the panel's lifetime. Owned by the event loop.
#[derive(Debug, Clone, Default)]
pub struct RenderState {
    pub last_rendered_form: Option<FormId>,
    pub last_render_at: Option<DateTime<Utc>>,
    /// Sheet the last cycle routed for.
    pub active_sheet: Option<String>,
    pub subscriptions: Vec<SelectionSubscription>,
}

impl RenderState {
    pub fn is_active_sheet(&self, sheet: &str) -> bool {
        self.active_sheet
            .as_deref()
            .is_some_and(|active| active.trim().eq_ignore_ascii_case(sheet.trim()))
    }

    pub fn subscription_for(&self, sheet: &str) -> Option<&SelectionSubscription> {
        self.subscriptions
            .iter()
            .find(|sub| sub.sheet.trim().eq_ignore_ascii_case(sheet.trim()))
    }
}
