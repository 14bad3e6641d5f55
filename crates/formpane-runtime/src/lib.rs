//! Formpane runtime.
//!
//! Drives a spreadsheet task panel from a validated
//! [`formpane_spec::Manifest`]: the [`router`] decides which form the
//! panel shows for the current sheet, hint cell and selection, and
//! [`PanelRuntime`] turns host notifications into guarded render, refresh
//! and write-back cycles against the collaborator traits in [`host`].

mod binding;
mod catalog;
mod clock;
mod context;
mod error;
pub mod host;
mod report;
pub mod router;
mod runtime;
mod state;
mod template;
mod throttle;

pub use binding::{BoundForm, PendingReads};
pub use catalog::{BindingSpec, CellRef, FormCatalog, FormDefinition, FormId, FormKind};
#[cfg(feature = "system-clock")]
pub use clock::SystemClock;
pub use clock::{Clock, ManualClock};
pub use context::RoutingSnapshot;
pub use error::{FetchError, FormpaneError, HostError};
pub use host::{
    FormSource, Grid, HostEvent, NamedItem, Notice, NoticeLevel, PanelEvent, PanelSurface,
    RangeTarget, SubscriptionId, Ticket, WorkbookHost,
};
pub use report::{DIAGNOSTICS_HEADER, DiagnosticsLog, ErrorReporter, ReportOutcome};
pub use router::{NameTable, RouteRule, RouteRules, extract_hint_directive, resolve_form_id};
pub use runtime::{EventOutcome, PanelRuntime};
pub use state::{PanelState, RenderState, SelectionSubscription};
pub use template::{TemplateCache, discover_bindings, merge_bindings};
pub use throttle::{Debouncer, TokenBucket};
