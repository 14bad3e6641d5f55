use chrono::TimeDelta;
use formpane_common::CellAddress;
use formpane_spec::Manifest;

use crate::binding::BoundForm;
use crate::catalog::{FormCatalog, FormId, FormKind};
use crate::clock::Clock;
use crate::context::RoutingSnapshot;
use crate::error::{FormpaneError, HostError};
use crate::host::{FormSource, HostEvent, Notice, PanelEvent, PanelSurface, WorkbookHost};
use crate::report::{DiagnosticsLog, ErrorReporter};
use crate::router::{RouteRules, resolve_form_id};
use crate::state::{PanelState, RenderState, SelectionSubscription};
use crate::template::{TemplateCache, discover_bindings, merge_bindings};
use crate::throttle::{Debouncer, deadline_after, millis};

/// What the event loop did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A different form replaced the panel content.
    Swapped(FormId),
    /// Same form kept; bound fields re-read from their cells.
    Refreshed,
    /// Routing picked the form already showing.
    Unchanged,
    /// Selection event inside the cooldown window.
    Suppressed,
    /// Cell change recorded; a refresh is due after the debounce window.
    Debounced,
    /// Field input written back to its cell.
    Written,
    /// A table row was appended.
    Submitted,
    /// A selection subscription was attached to a new sheet.
    Subscribed,
    /// Arrived while a cycle was in flight.
    Dropped,
    /// Not relevant to the current panel.
    Ignored,
    /// The cycle failed; the error was reported and the panel left as it was.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Activation,
    Selection,
}

/// Single-owner controller for a task panel.
///
/// Host and panel notifications are fed in through
/// [`handle_host_event`](Self::handle_host_event) and
/// [`handle_panel_event`](Self::handle_panel_event); debounced refreshes
/// run from [`poll`](Self::poll). Each call runs at most one cycle, and
/// any notification produced while a cycle is in flight (including the
/// echoes of the cycle's own writes) is dropped rather than queued.
/// Failures never escape: they are reported and the loop stays usable.
pub struct PanelRuntime<H, F, P, C>
where
    H: WorkbookHost,
    F: FormSource,
    P: PanelSurface,
    C: Clock,
{
    host: H,
    forms: F,
    panel: P,
    clock: C,
    catalog: FormCatalog,
    rules: RouteRules,
    hint_cell: CellAddress,
    cooldown: TimeDelta,
    debouncer: Debouncer,
    state: PanelState,
    render: RenderState,
    templates: TemplateCache,
    bound: Option<BoundForm>,
    reporter: ErrorReporter,
    diagnostics: DiagnosticsLog,
    dropped: usize,
}

impl<H, F, P, C> PanelRuntime<H, F, P, C>
where
    H: WorkbookHost,
    F: FormSource,
    P: PanelSurface,
    C: Clock,
{
    /// Validate the manifest and build the catalog and rules. Nothing is
    /// read from the host until [`start`](Self::start) or the first event.
    pub fn new(
        manifest: &Manifest,
        host: H,
        forms: F,
        panel: P,
        clock: C,
    ) -> Result<Self, FormpaneError> {
        manifest.validate()?;
        let catalog = FormCatalog::from_manifest(manifest)?;
        let rules = RouteRules::from_manifest(manifest);
        let panel_config = &manifest.panel;
        Ok(Self {
            host,
            forms,
            panel,
            clock,
            catalog,
            rules,
            hint_cell: CellAddress::parse_lenient(&panel_config.hint_cell),
            cooldown: millis(panel_config.selection_cooldown_ms),
            debouncer: Debouncer::new(millis(panel_config.cell_change_debounce_ms)),
            state: PanelState::Idle,
            render: RenderState::default(),
            templates: TemplateCache::new(),
            bound: None,
            reporter: ErrorReporter::new(&manifest.notifications),
            diagnostics: DiagnosticsLog::new(&manifest.diagnostics),
            dropped: 0,
        })
    }

    /// Render for whichever sheet is active when the panel opens.
    pub fn start(&mut self) -> EventOutcome {
        if let Some(outcome) = self.guard(&"start") {
            return outcome;
        }
        self.run_cycle(PanelState::Rendering, "start", |rt| {
            let active = rt.host.load_active_sheet();
            rt.flush()?;
            let sheet = rt.host.take(active)?;
            rt.render_cycle(&sheet, Trigger::Activation)
        })
    }

    pub fn handle_host_event(&mut self, event: HostEvent) -> EventOutcome {
        if let Some(outcome) = self.guard(&event) {
            return outcome;
        }
        match event {
            HostEvent::SheetActivated { sheet } => self.on_activated(&sheet),
            HostEvent::SelectionChanged { sheet, address } => {
                self.on_selection_changed(&sheet, &address)
            }
            HostEvent::CellsChanged { sheet, address } => self.on_cells_changed(&sheet, &address),
            HostEvent::SheetAdded { sheet } => self.on_sheet_added(&sheet),
        }
    }

    pub fn handle_panel_event(&mut self, event: PanelEvent) -> EventOutcome {
        if let Some(outcome) = self.guard(&event) {
            return outcome;
        }
        match event {
            PanelEvent::FieldEdited { field, raw } => self.on_field_edited(&field, &raw),
            PanelEvent::Submitted => self.on_submitted(),
            PanelEvent::NavigateTo { sheet } => self.on_navigate(&sheet),
        }
    }

    /// Run the debounced field refresh once its deadline has passed.
    pub fn poll(&mut self) -> EventOutcome {
        if let Some(outcome) = self.guard(&"poll") {
            return outcome;
        }
        if !self.debouncer.fire(self.clock.now()) {
            return EventOutcome::Ignored;
        }
        let Some(sheet) = self.render.active_sheet.clone() else {
            return EventOutcome::Ignored;
        };
        self.run_cycle(PanelState::Syncing, "refresh", |rt| {
            rt.refresh_fields(&sheet)?;
            Ok(EventOutcome::Refreshed)
        })
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn render_state(&self) -> &RenderState {
        &self.render
    }

    pub fn bound_form(&self) -> Option<&BoundForm> {
        self.bound.as_ref()
    }

    pub fn catalog(&self) -> &FormCatalog {
        &self.catalog
    }

    pub fn rules(&self) -> &RouteRules {
        &self.rules
    }

    pub fn templates(&self) -> &TemplateCache {
        &self.templates
    }

    /// Events dropped because a cycle was in flight.
    pub fn dropped_events(&self) -> usize {
        self.dropped
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn forms(&self) -> &F {
        &self.forms
    }

    pub fn forms_mut(&mut self) -> &mut F {
        &mut self.forms
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn into_parts(self) -> (H, F, P, C) {
        (self.host, self.forms, self.panel, self.clock)
    }

    /// Busy guard shared by every entry point. Also lets an expired
    /// cooldown fall back to idle.
    fn guard(&mut self, trigger: &dyn std::fmt::Debug) -> Option<EventOutcome> {
        if self.state.is_busy() {
            self.dropped += 1;
            tracing::debug!(?trigger, state = ?self.state, "dropping trigger while busy");
            return Some(EventOutcome::Dropped);
        }
        if let PanelState::RenderSuppressedByCooldown { until } = self.state {
            if self.clock.now() >= until {
                self.state = PanelState::Idle;
            }
        }
        None
    }

    fn on_activated(&mut self, sheet: &str) -> EventOutcome {
        self.run_cycle(PanelState::Rendering, "activate", |rt| {
            rt.render_cycle(sheet, Trigger::Activation)
        })
    }

    fn on_selection_changed(&mut self, sheet: &str, address: &str) -> EventOutcome {
        if !self.render.is_active_sheet(sheet) {
            tracing::debug!(sheet, "selection on inactive sheet ignored");
            return EventOutcome::Ignored;
        }
        let now = self.clock.now();
        if let Some(last) = self.render.last_render_at {
            let until = deadline_after(last, self.cooldown);
            if now < until {
                self.state = PanelState::RenderSuppressedByCooldown { until };
                tracing::debug!(sheet, address, %until, "selection render suppressed by cooldown");
                return EventOutcome::Suppressed;
            }
        }
        self.run_cycle(PanelState::Rendering, "selection", |rt| {
            rt.render_cycle(sheet, Trigger::Selection)
        })
    }

    fn on_cells_changed(&mut self, sheet: &str, address: &str) -> EventOutcome {
        if self.bound.is_none() {
            return EventOutcome::Ignored;
        }
        if self.diagnostics.is_enabled() && sheet.trim().eq_ignore_ascii_case(self.diagnostics.sheet())
        {
            return EventOutcome::Ignored;
        }
        let deadline = self.debouncer.arm(self.clock.now());
        tracing::debug!(sheet, address, %deadline, "field refresh debounced");
        EventOutcome::Debounced
    }

    fn on_sheet_added(&mut self, sheet: &str) -> EventOutcome {
        if !self.rules.targets_sheet(sheet) || self.render.subscription_for(sheet).is_some() {
            return EventOutcome::Ignored;
        }
        self.run_cycle(PanelState::Syncing, "sheet-added", |rt| {
            let ticket = rt.host.subscribe_selection(sheet);
            rt.flush()?;
            let id = rt.host.take(ticket)?;
            rt.render.subscriptions.push(SelectionSubscription {
                sheet: sheet.to_string(),
                id,
            });
            Ok(EventOutcome::Subscribed)
        })
    }

    fn on_field_edited(&mut self, field: &str, raw: &str) -> EventOutcome {
        let Some(sheet) = self.render.active_sheet.clone() else {
            return EventOutcome::Ignored;
        };
        if self.bound.is_none() {
            return EventOutcome::Ignored;
        }
        self.run_cycle(PanelState::Syncing, "field-edit", |rt| {
            let Some(bound) = rt.bound.as_mut() else {
                return Ok(EventOutcome::Ignored);
            };
            let value = bound.queue_write(&mut rt.host, &sheet, field, raw)?;
            tracing::debug!(field, %value, "writing field back");
            rt.flush()?;
            Ok(EventOutcome::Written)
        })
    }

    fn on_submitted(&mut self) -> EventOutcome {
        let Some(FormKind::TableEntry { table }) = self.bound.as_ref().map(|b| b.kind().clone())
        else {
            return EventOutcome::Ignored;
        };
        self.run_cycle(PanelState::Syncing, "submit", |rt| {
            let row = match rt.bound.as_ref() {
                Some(bound) => bound.row_values(),
                None => return Ok(EventOutcome::Ignored),
            };
            rt.host.append_table_row(&table, row);
            rt.flush()?;
            rt.panel.notify(Notice::success(format!("Added a row to {table}")));
            Ok(EventOutcome::Submitted)
        })
    }

    fn on_navigate(&mut self, sheet: &str) -> EventOutcome {
        let Some(bound) = self.bound.as_ref() else {
            return EventOutcome::Ignored;
        };
        let form = bound.id().clone();
        let offered = bound.kind().offers_sheet(sheet);
        let mut landed = None;
        let outcome = self.run_cycle(PanelState::Syncing, "navigate", |rt| {
            if !offered {
                return Err(FormpaneError::SheetNotOffered {
                    form,
                    sheet: sheet.to_string(),
                });
            }
            let names = rt.host.load_sheet_names();
            rt.flush()?;
            let wanted = sheet.trim();
            let target = match rt
                .host
                .take(names)?
                .into_iter()
                .find(|name| name.eq_ignore_ascii_case(wanted))
            {
                Some(existing) => existing,
                None => {
                    tracing::info!(sheet = wanted, "creating sheet on first navigation");
                    rt.host.add_sheet(wanted);
                    wanted.to_string()
                }
            };
            rt.host.set_sheet_visibility(&target, true);
            rt.host.activate_sheet(&target);
            rt.flush()?;
            landed = Some(target);
            Ok(EventOutcome::Unchanged)
        });
        // The activation echo was dropped with the rest of the cycle's
        // notifications, so route for the new sheet directly.
        match landed {
            Some(target) => self.on_activated(&target),
            None => outcome,
        }
    }

    fn run_cycle(
        &mut self,
        state: PanelState,
        context: &'static str,
        cycle: impl FnOnce(&mut Self) -> Result<EventOutcome, FormpaneError>,
    ) -> EventOutcome {
        let _span = tracing::info_span!("panel_cycle", context).entered();
        self.state = state;
        let result = cycle(self);
        self.state = PanelState::Idle;
        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                self.report(context, &err);
                EventOutcome::Failed
            }
        }
    }

    fn report(&mut self, context: &str, err: &FormpaneError) {
        let now = self.clock.now();
        self.reporter.report(&mut self.panel, context, err, now);
        self.diagnostics.record(&mut self.host, context, err, now);
    }

    /// Sync the host and feed what the flush produced back through the
    /// event guard, which drops it while the cycle is running.
    fn flush(&mut self) -> Result<(), HostError> {
        let echoes = self.host.sync()?;
        self.absorb(echoes);
        Ok(())
    }

    fn absorb(&mut self, echoes: Vec<HostEvent>) {
        for event in echoes {
            self.handle_host_event(event);
        }
    }

    fn render_cycle(&mut self, sheet: &str, trigger: Trigger) -> Result<EventOutcome, FormpaneError> {
        if trigger == Trigger::Selection {
            return self.route_and_render(sheet, trigger);
        }
        self.render.active_sheet = Some(sheet.to_string());
        let rendered = self.route_and_render(sheet, trigger);
        // Subscriptions follow the active sheet even when its render failed.
        let reconciled = self.reconcile_subscriptions(sheet);
        let outcome = rendered?;
        reconciled?;
        Ok(outcome)
    }

    fn route_and_render(
        &mut self,
        sheet: &str,
        trigger: Trigger,
    ) -> Result<EventOutcome, FormpaneError> {
        let (snapshot, echoes) =
            RoutingSnapshot::read(&mut self.host, sheet, self.hint_cell, &self.rules)?;
        self.absorb(echoes);

        let target = resolve_form_id(
            &snapshot.sheet,
            &snapshot.hint_text,
            &snapshot.selection,
            &self.rules,
            &self.catalog,
            &snapshot.names,
        );
        let unchanged =
            self.bound.is_some() && self.render.last_rendered_form.as_ref() == Some(&target);

        let outcome = match (unchanged, trigger) {
            (true, Trigger::Activation) => {
                self.refresh_fields(sheet)?;
                EventOutcome::Refreshed
            }
            (true, Trigger::Selection) => EventOutcome::Unchanged,
            (false, _) => {
                self.swap(sheet, &target)?;
                EventOutcome::Swapped(target.clone())
            }
        };

        self.render.last_rendered_form = Some(target);
        self.render.last_render_at = Some(self.clock.now());
        Ok(outcome)
    }

    /// Fetch, bind and read everything first; the panel is only touched
    /// once nothing else can fail.
    fn swap(&mut self, sheet: &str, target: &FormId) -> Result<(), FormpaneError> {
        let definition = self
            .catalog
            .get(target.as_str())
            .cloned()
            .ok_or_else(|| FormpaneError::UnknownForm(target.to_string()))?;
        let html = self.templates.load(&mut self.forms, &definition)?;
        let mut bound = BoundForm::new(
            &definition,
            merge_bindings(&definition.bindings, discover_bindings(&html)),
        );

        let pending = bound.queue_reads(&mut self.host, sheet);
        self.flush()?;
        let values = bound.collect_reads(&mut self.host, pending)?;

        self.panel.show_form(&definition.id, &html);
        for (field, value) in &values {
            self.panel.set_field(field, value);
        }
        bound.apply(&values);
        tracing::info!(form = %definition.id, sheet, fields = values.len(), "form swapped");
        self.bound = Some(bound);
        Ok(())
    }

    /// One-way refresh of every bound field from its cell.
    fn refresh_fields(&mut self, sheet: &str) -> Result<(), FormpaneError> {
        let Some(bound) = self.bound.as_ref() else {
            return Ok(());
        };
        let pending = bound.queue_reads(&mut self.host, sheet);
        self.flush()?;
        let Some(bound) = self.bound.as_mut() else {
            return Ok(());
        };
        let values = bound.collect_reads(&mut self.host, pending)?;
        for (field, value) in &values {
            self.panel.set_field(field, value);
        }
        bound.apply(&values);
        Ok(())
    }

    /// Drop every selection subscription, then subscribe the active sheet
    /// when some rule targets it. The old handles are forgotten only once
    /// the host has applied the batch.
    fn reconcile_subscriptions(&mut self, sheet: &str) -> Result<(), FormpaneError> {
        let wanted = self.rules.targets_sheet(sheet);
        if self.render.subscriptions.is_empty() && !wanted {
            return Ok(());
        }
        for sub in &self.render.subscriptions {
            self.host.unsubscribe(sub.id);
        }
        let ticket = wanted.then(|| self.host.subscribe_selection(sheet));
        self.flush()?;
        self.render.subscriptions.clear();
        if let Some(ticket) = ticket {
            let id = self.host.take(ticket)?;
            self.render.subscriptions.push(SelectionSubscription {
                sheet: sheet.to_string(),
                id,
            });
        }
        Ok(())
    }
}
