use formpane_common::CellAddress;

use crate::error::HostError;
use crate::host::{HostEvent, RangeTarget, WorkbookHost};
use crate::router::{NameTable, RouteRules};

/// Everything the router needs for one sheet, read in a single batch.
#[derive(Debug, Clone)]
pub struct RoutingSnapshot {
    pub sheet: String,
    pub hint_text: String,
    pub selection: String,
    pub names: NameTable,
}

impl RoutingSnapshot {
    /// Queue the hint cell, the selection and every defined name the
    /// sheet's rules use, flush once, then redeem. Notifications produced
    /// by the flush are returned alongside the snapshot.
    pub fn read<H: WorkbookHost + ?Sized>(
        host: &mut H,
        sheet: &str,
        hint_cell: CellAddress,
        rules: &RouteRules,
    ) -> Result<(Self, Vec<HostEvent>), HostError> {
        let hint = host.load_values(&RangeTarget::cells(sheet, hint_cell.to_string()));
        let selection = host.load_selection();
        let names: Vec<_> = rules
            .names_for_sheet(sheet)
            .into_iter()
            .map(|name| host.load_named_item(name))
            .collect();

        let echoes = host.sync()?;

        let hint_text = host
            .take(hint)?
            .first()
            .and_then(|row| row.first())
            .map(|cell| cell.to_string())
            .unwrap_or_default();
        let selection = host.take(selection)?;
        let mut table = NameTable::new();
        for ticket in names {
            if let Some(item) = host.take(ticket)? {
                table.insert(item);
            }
        }

        Ok((
            Self {
                sheet: sheet.to_string(),
                hint_text,
                selection,
                names: table,
            },
            echoes,
        ))
    }
}
