//! Meta crate that re-exports the Formpane building blocks with sensible
//! defaults. Downstream users can depend on this crate and opt into specific
//! layers via feature flags while keeping access to the underlying crates
//! when deeper integration is required.

#[cfg(feature = "common")]
pub use formpane_common as common;

#[cfg(feature = "spec")]
pub use formpane_spec as spec;

#[cfg(feature = "runtime")]
pub use formpane_runtime as runtime;

#[cfg(feature = "common")]
pub use formpane_common::{AddressSet, Area, CellAddress, CellValue, FieldValue, ValueKind};

#[cfg(feature = "spec")]
pub use formpane_spec::{Manifest, ManifestError, ValidationError};

#[cfg(feature = "runtime")]
pub use formpane_runtime::{
    Clock, EventOutcome, FormCatalog, FormId, FormSource, FormpaneError, HostEvent, ManualClock,
    PanelEvent, PanelRuntime, PanelState, PanelSurface, RouteRules, WorkbookHost,
    resolve_form_id,
};

#[cfg(feature = "system-clock")]
pub use formpane_runtime::SystemClock;

#[cfg(feature = "runtime")]
pub mod doc_examples;
