use formpane_common::{CellValue, FieldValue};
use rustc_hash::FxHashMap;

use crate::catalog::{BindingSpec, CellRef, FormDefinition, FormId, FormKind};
use crate::error::{FormpaneError, HostError};
use crate::host::{Grid, RangeTarget, Ticket, WorkbookHost};

/// The form currently instantiated in the panel, with its resolved
/// bindings and the last value each field showed.
#[derive(Debug, Clone)]
pub struct BoundForm {
    id: FormId,
    kind: FormKind,
    bindings: Vec<BindingSpec>,
    values: FxHashMap<String, FieldValue>,
}

/// Reads queued for every binding of a form, redeemable after one sync.
#[derive(Debug)]
pub struct PendingReads {
    tickets: Vec<(usize, Ticket<Grid>)>,
}

impl BoundForm {
    pub fn new(definition: &FormDefinition, bindings: Vec<BindingSpec>) -> Self {
        Self {
            id: definition.id.clone(),
            kind: definition.kind.clone(),
            bindings,
            values: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> &FormId {
        &self.id
    }

    pub fn kind(&self) -> &FormKind {
        &self.kind
    }

    pub fn bindings(&self) -> &[BindingSpec] {
        &self.bindings
    }

    pub fn binding(&self, field: &str) -> Option<&BindingSpec> {
        self.bindings.iter().find(|binding| binding.field == field)
    }

    pub fn value(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Where a binding lives when `sheet` is active.
    pub fn target(binding: &BindingSpec, sheet: &str) -> RangeTarget {
        match &binding.cell {
            CellRef::Address(addr) => RangeTarget::cells(sheet, addr.to_string()),
            CellRef::Name(name) => RangeTarget::Name(name.clone()),
        }
    }

    /// Queue one read per binding. Values are observable after the next sync.
    pub fn queue_reads<H: WorkbookHost + ?Sized>(&self, host: &mut H, sheet: &str) -> PendingReads {
        let tickets = self
            .bindings
            .iter()
            .enumerate()
            .map(|(idx, binding)| (idx, host.load_values(&Self::target(binding, sheet))))
            .collect();
        PendingReads { tickets }
    }

    /// Redeem queued reads and coerce each cell per its binding's kind.
    /// Nothing is stored until every read has been redeemed.
    pub fn collect_reads<H: WorkbookHost + ?Sized>(
        &self,
        host: &mut H,
        pending: PendingReads,
    ) -> Result<Vec<(String, FieldValue)>, HostError> {
        let mut out = Vec::with_capacity(pending.tickets.len());
        for (idx, ticket) in pending.tickets {
            let grid = host.take(ticket)?;
            let binding = &self.bindings[idx];
            let cell = first_cell(&grid);
            out.push((binding.field.clone(), FieldValue::from_cell(binding.kind, &cell)));
        }
        Ok(out)
    }

    /// Record the values a refresh or instantiation pushed to the panel.
    pub fn apply(&mut self, values: &[(String, FieldValue)]) {
        for (field, value) in values {
            self.values.insert(field.clone(), value.clone());
        }
    }

    /// Coerce panel input for `field` and queue the write-back. The
    /// returned value is what the cell receives once the host syncs.
    pub fn queue_write<H: WorkbookHost + ?Sized>(
        &mut self,
        host: &mut H,
        sheet: &str,
        field: &str,
        raw: &str,
    ) -> Result<FieldValue, FormpaneError> {
        let binding = self
            .binding(field)
            .ok_or_else(|| FormpaneError::UnboundField {
                form: self.id.clone(),
                field: field.to_string(),
            })?;
        let value = FieldValue::from_input(binding.kind, raw);
        host.write_values(&Self::target(binding, sheet), vec![vec![value.to_cell()]]);
        self.values.insert(field.to_string(), value.clone());
        Ok(value)
    }

    /// Current field values in binding declaration order, as table cells.
    /// Fields never shown or edited contribute an empty cell.
    pub fn row_values(&self) -> Vec<CellValue> {
        self.bindings
            .iter()
            .map(|binding| {
                self.values
                    .get(&binding.field)
                    .map(FieldValue::to_cell)
                    .unwrap_or_default()
            })
            .collect()
    }
}

fn first_cell(grid: &Grid) -> CellValue {
    grid.first()
        .and_then(|row| row.first())
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use formpane_common::ValueKind;

    fn form() -> BoundForm {
        let definition = FormDefinition {
            id: FormId::new("inventory"),
            kind: FormKind::TableEntry {
                table: "Stock".into(),
            },
            resource: "inventory.html".into(),
            bindings: Vec::new(),
        };
        BoundForm::new(
            &definition,
            vec![
                BindingSpec::new("sku", CellRef::parse("B2"), ValueKind::Text),
                BindingSpec::new("qty", CellRef::parse("Qty"), ValueKind::Number),
                BindingSpec::new("active", CellRef::parse("D2"), ValueKind::Boolean),
            ],
        )
    }

    #[test]
    fn targets_follow_the_active_sheet_for_addresses() {
        let form = form();
        assert_eq!(
            BoundForm::target(&form.bindings()[0], "Orders"),
            RangeTarget::cells("Orders", "B2")
        );
        assert_eq!(
            BoundForm::target(&form.bindings()[1], "Orders"),
            RangeTarget::Name("Qty".into())
        );
    }

    #[test]
    fn row_values_follow_declaration_order() {
        let mut form = form();
        form.apply(&[
            ("active".into(), FieldValue::Boolean(true)),
            ("sku".into(), FieldValue::Text("A-1".into())),
        ]);
        assert_eq!(
            form.row_values(),
            vec![
                CellValue::Text("A-1".into()),
                CellValue::Empty,
                CellValue::Boolean(true),
            ]
        );
    }

    #[test]
    fn first_cell_of_empty_grid_is_empty() {
        assert_eq!(first_cell(&Vec::new()), CellValue::Empty);
        assert_eq!(
            first_cell(&vec![vec![CellValue::Number(2.0), CellValue::Empty]]),
            CellValue::Number(2.0)
        );
    }
}
