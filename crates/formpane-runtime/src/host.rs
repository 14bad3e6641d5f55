//! Collaborator seams: the workbook host, the template store and the panel.
//!
//! The workbook API is request/flush shaped. Every `load_*` call queues a
//! read and hands back a typed [`Ticket`]; writes and subscription changes
//! are queued too. Nothing is observable until [`WorkbookHost::sync`] runs,
//! after which tickets can be redeemed with [`WorkbookHost::take`]. `sync`
//! returns the notifications the flush itself produced (for example the
//! cell-change echo of a write) so the caller can decide what to do with
//! them.

use std::fmt;
use std::marker::PhantomData;

use formpane_common::{CellValue, FieldValue, split_sheet_qualifier};

use crate::catalog::FormId;
use crate::error::{FetchError, HostError};

/// Rectangular block of cell values, row-major.
pub type Grid = Vec<Vec<CellValue>>;

/// Handle for a queued read. Redeemable once, after the next sync.
pub struct Ticket<T> {
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Ticket<T> {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> fmt::Debug for Ticket<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ticket").field(&self.id).finish()
    }
}

/// Handle of a per-sheet selection subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Where a range read or write lands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RangeTarget {
    /// Address on a named sheet.
    Cells { sheet: String, address: String },
    /// Workbook-scoped defined name.
    Name(String),
}

impl RangeTarget {
    pub fn cells(sheet: impl Into<String>, address: impl Into<String>) -> Self {
        RangeTarget::Cells {
            sheet: sheet.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for RangeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeTarget::Cells { sheet, address } => write!(f, "{sheet}!{address}"),
            RangeTarget::Name(name) => f.write_str(name),
        }
    }
}

/// A resolved defined name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedItem {
    pub name: String,
    /// Sheet the name refers to; `None` for constants and formulas.
    pub sheet: Option<String>,
    /// Local address without the sheet qualifier.
    pub address: String,
}

impl NamedItem {
    /// Build from a sheet-qualified reference (`Orders!$B$2:$D$9`).
    pub fn from_reference(name: impl Into<String>, reference: &str) -> Self {
        let (sheet, local) = split_sheet_qualifier(reference);
        Self {
            name: name.into(),
            sheet,
            address: local.to_string(),
        }
    }
}

/// Notifications delivered by the workbook host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    SheetActivated { sheet: String },
    SelectionChanged { sheet: String, address: String },
    CellsChanged { sheet: String, address: String },
    SheetAdded { sheet: String },
}

/// Notifications delivered by the panel UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    /// The user changed a field; `raw` is the input's text.
    FieldEdited { field: String, raw: String },
    /// The form's submit action fired.
    Submitted,
    /// A navigator form asked to show a sheet.
    NavigateTo { sheet: String },
}

pub trait WorkbookHost {
    fn load_active_sheet(&mut self) -> Ticket<String>;

    /// Address of the current selection, possibly multi-area and
    /// sheet-qualified.
    fn load_selection(&mut self) -> Ticket<String>;

    fn load_values(&mut self, target: &RangeTarget) -> Ticket<Grid>;

    /// Values of a sheet's used range, anchored wherever the used range starts.
    fn load_used_range(&mut self, sheet: &str) -> Ticket<Grid>;

    /// Resolve a defined name. Missing names resolve to `None`.
    fn load_named_item(&mut self, name: &str) -> Ticket<Option<NamedItem>>;

    fn load_sheet_names(&mut self) -> Ticket<Vec<String>>;

    fn write_values(&mut self, target: &RangeTarget, values: Grid);

    fn append_table_row(&mut self, table: &str, row: Vec<CellValue>);

    fn add_sheet(&mut self, name: &str);

    fn activate_sheet(&mut self, name: &str);

    fn set_sheet_visibility(&mut self, name: &str, visible: bool);

    fn subscribe_selection(&mut self, sheet: &str) -> Ticket<SubscriptionId>;

    fn unsubscribe(&mut self, id: SubscriptionId);

    /// Flush every queued request, in order.
    fn sync(&mut self) -> Result<Vec<HostEvent>, HostError>;

    /// Redeem a ticket after the sync that answered it.
    fn take<T: 'static>(&mut self, ticket: Ticket<T>) -> Result<T, HostError>;
}

/// Static asset store holding form templates.
pub trait FormSource {
    fn fetch(&mut self, resource: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Transient, non-blocking message for the panel's toast area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// The task panel the forms are rendered into.
pub trait PanelSurface {
    /// Replace the panel content with a form template.
    fn show_form(&mut self, form: &FormId, html: &str);

    fn set_field(&mut self, field: &str, value: &FieldValue);

    fn notify(&mut self, notice: Notice);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_item_splits_reference() {
        let item = NamedItem::from_reference("OrderBlock", "'Q1 Orders'!$B$2:$D$9");
        assert_eq!(item.sheet.as_deref(), Some("Q1 Orders"));
        assert_eq!(item.address, "$B$2:$D$9");

        let constant = NamedItem::from_reference("Rate", "0.25");
        assert_eq!(constant.sheet, None);
    }

    #[test]
    fn range_target_display() {
        assert_eq!(RangeTarget::cells("Orders", "B2").to_string(), "Orders!B2");
        assert_eq!(RangeTarget::Name("Qty".into()).to_string(), "Qty");
    }
}
