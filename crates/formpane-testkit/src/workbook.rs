use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};

use formpane_common::{Area, CellAddress, CellValue, normalize_address, split_sheet_qualifier};
use formpane_runtime::{
    Grid, HostError, HostEvent, NamedItem, RangeTarget, SubscriptionId, Ticket, WorkbookHost,
};

#[derive(Debug)]
struct MemorySheet {
    name: String,
    visible: bool,
    /// Keyed by (row, col).
    cells: BTreeMap<(u32, u32), CellValue>,
}

impl MemorySheet {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            visible: true,
            cells: BTreeMap::new(),
        }
    }

    fn read(&self, area: &Area) -> Grid {
        let (start, end) = (area.start(), area.end());
        (start.row()..=end.row())
            .map(|row| {
                (start.col()..=end.col())
                    .map(|col| self.cells.get(&(row, col)).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    fn write(&mut self, origin: CellAddress, values: &Grid) {
        for (r, row) in values.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let key = (origin.row() + r as u32, origin.col() + c as u32);
                if value.is_empty() {
                    self.cells.remove(&key);
                } else {
                    self.cells.insert(key, value.clone());
                }
            }
        }
    }

    fn used_range(&self) -> Grid {
        if self.cells.is_empty() {
            return Vec::new();
        }
        let (mut r1, mut c1, mut r2, mut c2) = (u32::MAX, u32::MAX, 0, 0);
        for &(row, col) in self.cells.keys() {
            r1 = r1.min(row);
            c1 = c1.min(col);
            r2 = r2.max(row);
            c2 = c2.max(col);
        }
        self.read(&Area::new(CellAddress::new(c1, r1), CellAddress::new(c2, r2)))
    }
}

#[derive(Debug)]
struct MemoryTable {
    name: String,
    sheet: String,
    rows: Vec<Vec<CellValue>>,
}

#[derive(Debug)]
enum Request {
    ActiveSheet(u64),
    Selection(u64),
    Values(u64, RangeTarget),
    UsedRange(u64, String),
    NamedItem(u64, String),
    SheetNames(u64),
    Write(RangeTarget, Grid),
    Append(String, Vec<CellValue>),
    AddSheet(String),
    Activate(String),
    Visibility(String, bool),
    Subscribe(u64, String),
    Unsubscribe(SubscriptionId),
}

/// Workbook host kept entirely in memory.
///
/// Requests are queued and only applied by [`WorkbookHost::sync`], which
/// also reports the notifications a real host would raise for them:
/// writes echo as `CellsChanged`, new sheets as `SheetAdded` and
/// activations as `SheetActivated`. A failing request aborts the rest of
/// its batch.
#[derive(Default)]
pub struct MemoryWorkbook {
    sheets: Vec<MemorySheet>,
    names: BTreeMap<String, (String, String)>,
    tables: Vec<MemoryTable>,
    active: Option<String>,
    selection: String,
    subscriptions: BTreeMap<u64, String>,
    queue: Vec<Request>,
    ready: HashMap<u64, Box<dyn Any>>,
    pending: HashSet<u64>,
    next_id: u64,
    injected: Vec<HostEvent>,
    fail_next_sync: Option<HostError>,
    syncs: usize,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self {
            selection: "A1".to_string(),
            ..Self::default()
        }
    }

    /// Add a sheet; the first one added becomes active.
    pub fn with_sheet(mut self, name: &str) -> Self {
        self.insert_sheet(name);
        self
    }

    pub fn insert_sheet(&mut self, name: &str) {
        if self.sheet_index(name).is_none() {
            self.sheets.push(MemorySheet::new(name));
        }
        if self.active.is_none() {
            self.active = Some(name.to_string());
        }
    }

    pub fn set_cell(&mut self, sheet: &str, a1: &str, value: impl Into<CellValue>) {
        let addr = CellAddress::try_from_a1(a1).expect("test cell address");
        let idx = self.sheet_index(sheet).expect("test sheet exists");
        self.sheets[idx].write(addr, &vec![vec![value.into()]]);
    }

    pub fn cell(&self, sheet: &str, a1: &str) -> CellValue {
        let addr = CellAddress::try_from_a1(a1).expect("test cell address");
        self.sheet_index(sheet)
            .and_then(|idx| self.sheets[idx].cells.get(&(addr.row(), addr.col())).cloned())
            .unwrap_or_default()
    }

    /// Define a workbook-scoped name, e.g. `("Qty", "Orders!$C$2")`.
    pub fn define_name(&mut self, name: &str, reference: &str) {
        self.names.insert(
            name.to_ascii_lowercase(),
            (name.to_string(), reference.to_string()),
        );
    }

    pub fn add_table(&mut self, name: &str, sheet: &str) {
        self.tables.push(MemoryTable {
            name: name.to_string(),
            sheet: sheet.to_string(),
            rows: Vec::new(),
        });
    }

    pub fn table_rows(&self, name: &str) -> &[Vec<CellValue>] {
        self.tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
            .map(|table| table.rows.as_slice())
            .unwrap_or(&[])
    }

    /// User switches tabs. Returns the notification the host would raise.
    pub fn activate(&mut self, sheet: &str) -> HostEvent {
        self.active = Some(sheet.to_string());
        self.selection = "A1".to_string();
        HostEvent::SheetActivated {
            sheet: sheet.to_string(),
        }
    }

    /// User selects `address` on the active sheet.
    pub fn select(&mut self, address: &str) -> HostEvent {
        self.selection = address.to_string();
        HostEvent::SelectionChanged {
            sheet: self.active.clone().unwrap_or_default(),
            address: address.to_string(),
        }
    }

    /// Someone else edits a cell.
    pub fn edit_cell(&mut self, sheet: &str, a1: &str, value: impl Into<CellValue>) -> HostEvent {
        self.set_cell(sheet, a1, value);
        HostEvent::CellsChanged {
            sheet: sheet.to_string(),
            address: a1.to_string(),
        }
    }

    /// User adds a sheet.
    pub fn create_sheet(&mut self, name: &str) -> HostEvent {
        self.insert_sheet(name);
        HostEvent::SheetAdded {
            sheet: name.to_string(),
        }
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheet_index(name).is_some()
    }

    pub fn is_visible(&self, name: &str) -> Option<bool> {
        self.sheet_index(name).map(|idx| self.sheets[idx].visible)
    }

    pub fn active_sheet(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Sheets with a live selection subscription, in subscription order.
    pub fn subscribed_sheets(&self) -> Vec<String> {
        self.subscriptions.values().cloned().collect()
    }

    pub fn sync_count(&self) -> usize {
        self.syncs
    }

    pub fn queued_requests(&self) -> usize {
        self.queue.len()
    }

    /// Make the next sync fail with `err`, discarding its batch.
    pub fn fail_next_sync(&mut self, err: HostError) {
        self.fail_next_sync = Some(err);
    }

    /// Deliver `event` together with the next sync's own notifications, as
    /// if it had arrived while that batch was in flight.
    pub fn inject_on_next_sync(&mut self, event: HostEvent) {
        self.injected.push(event);
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.sheets
            .iter()
            .position(|sheet| sheet.name.eq_ignore_ascii_case(name))
    }

    fn ticket<T>(&mut self) -> (u64, Ticket<T>) {
        self.next_id += 1;
        self.pending.insert(self.next_id);
        (self.next_id, Ticket::new(self.next_id))
    }

    fn fulfil<T: 'static>(&mut self, id: u64, value: T) {
        self.pending.remove(&id);
        self.ready.insert(id, Box::new(value));
    }

    fn resolve(&self, target: &RangeTarget) -> Result<(usize, Area), HostError> {
        match target {
            RangeTarget::Cells { sheet, address } => {
                let idx = self
                    .sheet_index(sheet)
                    .ok_or_else(|| HostError::MissingSheet(sheet.clone()))?;
                let area = Area::try_from_a1(&normalize_address(address))
                    .map_err(|_| HostError::InvalidAddress(address.clone()))?;
                Ok((idx, area))
            }
            RangeTarget::Name(name) => {
                let (_, reference) = self
                    .names
                    .get(&name.trim().to_ascii_lowercase())
                    .ok_or_else(|| HostError::MissingName(name.clone()))?;
                let (sheet, local) = split_sheet_qualifier(reference);
                let sheet = sheet.ok_or_else(|| HostError::InvalidAddress(reference.clone()))?;
                self.resolve(&RangeTarget::cells(sheet, local))
            }
        }
    }

    fn apply(&mut self, request: Request, events: &mut Vec<HostEvent>) -> Result<(), HostError> {
        match request {
            Request::ActiveSheet(id) => {
                let active = self
                    .active
                    .clone()
                    .ok_or_else(|| HostError::Other("workbook has no sheets".to_string()))?;
                self.fulfil(id, active);
            }
            Request::Selection(id) => {
                let address = match &self.active {
                    Some(sheet) if sheet.contains(' ') => {
                        format!("'{}'!{}", sheet.replace('\'', "''"), self.selection)
                    }
                    Some(sheet) => format!("{sheet}!{}", self.selection),
                    None => self.selection.clone(),
                };
                self.fulfil(id, address);
            }
            Request::Values(id, target) => {
                let (idx, area) = self.resolve(&target)?;
                let grid = self.sheets[idx].read(&area);
                self.fulfil(id, grid);
            }
            Request::UsedRange(id, sheet) => {
                let idx = self
                    .sheet_index(&sheet)
                    .ok_or(HostError::MissingSheet(sheet))?;
                let grid = self.sheets[idx].used_range();
                self.fulfil(id, grid);
            }
            Request::NamedItem(id, name) => {
                let item = self
                    .names
                    .get(&name.trim().to_ascii_lowercase())
                    .map(|(declared, reference)| NamedItem::from_reference(declared, reference));
                self.fulfil(id, item);
            }
            Request::SheetNames(id) => {
                let names: Vec<String> = self.sheets.iter().map(|s| s.name.clone()).collect();
                self.fulfil(id, names);
            }
            Request::Write(target, values) => {
                let (idx, area) = self.resolve(&target)?;
                self.sheets[idx].write(area.start(), &values);
                events.push(HostEvent::CellsChanged {
                    sheet: self.sheets[idx].name.clone(),
                    address: area.to_string(),
                });
            }
            Request::Append(table, row) => {
                let entry = self
                    .tables
                    .iter_mut()
                    .find(|t| t.name.eq_ignore_ascii_case(&table))
                    .ok_or(HostError::MissingTable(table))?;
                entry.rows.push(row);
                events.push(HostEvent::CellsChanged {
                    sheet: entry.sheet.clone(),
                    address: entry.name.clone(),
                });
            }
            Request::AddSheet(name) => {
                if self.has_sheet(&name) {
                    return Err(HostError::Other(format!("sheet `{name}` already exists")));
                }
                self.insert_sheet(&name);
                events.push(HostEvent::SheetAdded { sheet: name });
            }
            Request::Activate(name) => {
                let idx = self
                    .sheet_index(&name)
                    .ok_or(HostError::MissingSheet(name))?;
                let sheet = self.sheets[idx].name.clone();
                events.push(self.activate(&sheet));
            }
            Request::Visibility(name, visible) => {
                let idx = self
                    .sheet_index(&name)
                    .ok_or(HostError::MissingSheet(name))?;
                self.sheets[idx].visible = visible;
            }
            Request::Subscribe(id, sheet) => {
                let idx = self
                    .sheet_index(&sheet)
                    .ok_or(HostError::MissingSheet(sheet))?;
                let name = self.sheets[idx].name.clone();
                self.subscriptions.insert(id, name);
                self.fulfil(id, SubscriptionId(id));
            }
            Request::Unsubscribe(sub) => {
                self.subscriptions.remove(&sub.0);
            }
        }
        Ok(())
    }
}

impl WorkbookHost for MemoryWorkbook {
    fn load_active_sheet(&mut self) -> Ticket<String> {
        let (id, ticket) = self.ticket();
        self.queue.push(Request::ActiveSheet(id));
        ticket
    }

    fn load_selection(&mut self) -> Ticket<String> {
        let (id, ticket) = self.ticket();
        self.queue.push(Request::Selection(id));
        ticket
    }

    fn load_values(&mut self, target: &RangeTarget) -> Ticket<Grid> {
        let (id, ticket) = self.ticket();
        self.queue.push(Request::Values(id, target.clone()));
        ticket
    }

    fn load_used_range(&mut self, sheet: &str) -> Ticket<Grid> {
        let (id, ticket) = self.ticket();
        self.queue.push(Request::UsedRange(id, sheet.to_string()));
        ticket
    }

    fn load_named_item(&mut self, name: &str) -> Ticket<Option<NamedItem>> {
        let (id, ticket) = self.ticket();
        self.queue.push(Request::NamedItem(id, name.to_string()));
        ticket
    }

    fn load_sheet_names(&mut self) -> Ticket<Vec<String>> {
        let (id, ticket) = self.ticket();
        self.queue.push(Request::SheetNames(id));
        ticket
    }

    fn write_values(&mut self, target: &RangeTarget, values: Grid) {
        self.queue.push(Request::Write(target.clone(), values));
    }

    fn append_table_row(&mut self, table: &str, row: Vec<CellValue>) {
        self.queue.push(Request::Append(table.to_string(), row));
    }

    fn add_sheet(&mut self, name: &str) {
        self.queue.push(Request::AddSheet(name.to_string()));
    }

    fn activate_sheet(&mut self, name: &str) {
        self.queue.push(Request::Activate(name.to_string()));
    }

    fn set_sheet_visibility(&mut self, name: &str, visible: bool) {
        self.queue.push(Request::Visibility(name.to_string(), visible));
    }

    fn subscribe_selection(&mut self, sheet: &str) -> Ticket<SubscriptionId> {
        let (id, ticket) = self.ticket();
        self.queue.push(Request::Subscribe(id, sheet.to_string()));
        ticket
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.queue.push(Request::Unsubscribe(id));
    }

    fn sync(&mut self) -> Result<Vec<HostEvent>, HostError> {
        self.syncs += 1;
        let queue = std::mem::take(&mut self.queue);
        if let Some(err) = self.fail_next_sync.take() {
            self.pending.clear();
            self.injected.clear();
            return Err(err);
        }
        let mut events = Vec::new();
        for request in queue {
            if let Err(err) = self.apply(request, &mut events) {
                self.pending.clear();
                return Err(err);
            }
        }
        events.append(&mut self.injected);
        Ok(events)
    }

    fn take<T: 'static>(&mut self, ticket: Ticket<T>) -> Result<T, HostError> {
        let id = ticket.id();
        if let Some(value) = self.ready.remove(&id) {
            return value
                .downcast::<T>()
                .map(|boxed| *boxed)
                .map_err(|_| HostError::Other("ticket redeemed as the wrong type".to_string()));
        }
        if self.pending.contains(&id) {
            Err(HostError::NotSynced)
        } else {
            Err(HostError::UnknownTicket)
        }
    }
}
