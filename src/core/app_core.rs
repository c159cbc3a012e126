use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::coordinator::{Origin, Outcome, RequestCoordinator, RequestKind, Resolution, Ticket};
use crate::core::tasks::{DeferredAction, DeferredTask, TaskGuard, TaskQueue};
use crate::error::{PanelError, PanelResult};
use crate::host::{HostContext, HostEvent, UiHost, WindowKind};
use crate::panels::catalog::{Catalog, CatalogEntry};
use crate::panels::item_spawner::ItemSpawnerView;
use crate::panels::size_control::SizeControlView;
use crate::panels::{Generation, OverlayManager, PanelKind};

/// Called with every resolution that reaches the UI
pub type RefreshListener = Box<dyn FnMut(&Resolution)>;

/// Point-in-time view of one panel, for logs and the simulate command
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSnapshot {
    pub kind: PanelKind,
    pub live: bool,
    pub visible: bool,
    pub generation: Generation,
    pub status: String,
    /// What the panel's scroll region holds; empty when absent
    pub content: String,
}

/// Generations that are current right now
#[derive(Debug, Clone, Copy)]
struct LiveGenerations {
    size_control: Option<Generation>,
    item_spawner: Option<Generation>,
    session: Generation,
}

impl LiveGenerations {
    fn is_current(&self, origin: &Origin) -> bool {
        match origin {
            Origin::Panel { kind, generation } => {
                let live = match kind {
                    PanelKind::SizeControl => self.size_control,
                    PanelKind::ItemSpawner => self.item_spawner,
                };
                live == Some(*generation)
            }
            Origin::Session(generation) => *generation == self.session,
        }
    }
}

/// Panel core (host-agnostic)
///
/// PanelSystem owns both overlay panels, the item catalog, the request
/// coordinator and the deferred task queue. The integration layer feeds it
/// host events and user actions and calls [`PanelSystem::tick`] once per
/// frame; every host interaction goes through the [`HostContext`] passed in.
pub struct PanelSystem {
    /// Active configuration
    pub config: Config,

    /// Size control panel lifecycle
    size_control: OverlayManager<SizeControlView>,

    /// Item spawner panel lifecycle
    item_spawner: OverlayManager<ItemSpawnerView>,

    /// Process-wide spawnable item cache
    catalog: Catalog,

    /// Outstanding inventory requests
    coordinator: RequestCoordinator,

    /// Suspended workflows waiting for their due time
    tasks: TaskQueue,

    /// Bumped on every local player spawn and on unload
    session: Generation,

    /// Last status line per panel; survives the panel being rebuilt
    status: BTreeMap<PanelKind, String>,

    /// UI refresh callbacks
    listeners: Vec<RefreshListener>,
}

impl PanelSystem {
    pub fn new(config: Config, now: Instant) -> Self {
        let size_spec = config.layout.inventory_spec();
        let list_spec = config.layout.item_list_spec();
        let size_panel = &config.panels.size_control;
        let spawner_panel = &config.panels.item_spawner;

        let size_control = OverlayManager::new(
            PanelKind::SizeControl,
            size_panel.anchor_window,
            SizeControlView::frame(&size_spec),
            size_panel.visible_by_default,
        );
        let item_spawner = OverlayManager::new(
            PanelKind::ItemSpawner,
            spawner_panel.anchor_window,
            ItemSpawnerView::frame(&list_spec),
            spawner_panel.visible_by_default,
        );

        let mut tasks = TaskQueue::new();
        tasks.enqueue_at(
            DeferredTask {
                action: DeferredAction::WarmCatalog,
                guard: TaskGuard::None,
            },
            now + config.general.catalog_warmup_delay(),
        );

        Self {
            coordinator: RequestCoordinator::new(config.general.request_timeout()),
            config,
            size_control,
            item_spawner,
            catalog: Catalog::new(),
            tasks,
            session: Generation::default(),
            status: BTreeMap::new(),
            listeners: Vec::new(),
        }
    }

    /// Register a UI refresh callback
    pub fn on_refresh(&mut self, listener: RefreshListener) {
        self.listeners.push(listener);
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn coordinator(&self) -> &RequestCoordinator {
        &self.coordinator
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn session(&self) -> Generation {
        self.session
    }

    pub fn size_view(&self) -> Option<&SizeControlView> {
        self.size_control.view()
    }

    pub fn spawner_view(&self) -> Option<&ItemSpawnerView> {
        self.item_spawner.view()
    }

    pub fn is_live(&self, kind: PanelKind) -> bool {
        match kind {
            PanelKind::SizeControl => self.size_control.is_live(),
            PanelKind::ItemSpawner => self.item_spawner.is_live(),
        }
    }

    pub fn is_visible(&self, kind: PanelKind) -> bool {
        match kind {
            PanelKind::SizeControl => self.size_control.is_visible(),
            PanelKind::ItemSpawner => self.item_spawner.is_visible(),
        }
    }

    pub fn generation(&self, kind: PanelKind) -> Generation {
        match kind {
            PanelKind::SizeControl => self.size_control.generation(),
            PanelKind::ItemSpawner => self.item_spawner.generation(),
        }
    }

    fn live_generations(&self) -> LiveGenerations {
        LiveGenerations {
            size_control: self.size_control.live_generation(),
            item_spawner: self.item_spawner.live_generation(),
            session: self.session,
        }
    }

    pub fn status(&self, kind: PanelKind) -> &str {
        self.status.get(&kind).map(String::as_str).unwrap_or("")
    }

    pub fn snapshot(&self, kind: PanelKind) -> PanelSnapshot {
        PanelSnapshot {
            kind,
            live: self.is_live(kind),
            visible: self.is_visible(kind),
            generation: self.generation(kind),
            status: self.status(kind).to_string(),
            content: self.content_summary(kind),
        }
    }

    fn content_summary(&self, kind: PanelKind) -> String {
        let (held, region) = match kind {
            PanelKind::SizeControl => match self.size_view() {
                Some(view) => (format!("{} slots", view.slot_count()), view.grid()),
                None => return String::new(),
            },
            PanelKind::ItemSpawner => match self.spawner_view() {
                Some(view) if view.has_placeholder() => ("no items".to_string(), view.list()),
                Some(view) => (format!("{} items", view.row_count()), view.list()),
                None => return String::new(),
            },
        };
        if region.scrollbar().is_some() {
            format!("{}, scrolled {:.0}px", held, region.scroll_offset())
        } else {
            held
        }
    }

    fn set_status(&mut self, ui: &mut dyn UiHost, kind: PanelKind, text: String) {
        match kind {
            PanelKind::SizeControl => {
                if let Some(view) = self.size_control.view() {
                    view.set_status(ui, &text);
                }
            }
            PanelKind::ItemSpawner => {
                if let Some(view) = self.item_spawner.view() {
                    view.set_status(ui, &text);
                }
            }
        }
        self.status.insert(kind, text);
    }

    /// Create (or recreate) the panel. Failures are reported through the
    /// status line and returned; the panel stays absent.
    pub fn show(&mut self, ctx: &mut HostContext<'_>, kind: PanelKind) -> PanelResult<Generation> {
        let result = match kind {
            PanelKind::SizeControl => {
                let spec = self.config.layout.inventory_spec();
                let quantity = ctx.inventory.current_quantity();
                self.size_control.show(ctx.ui, |host, root| {
                    SizeControlView::build(host, root, spec, quantity)
                })
            }
            PanelKind::ItemSpawner => {
                let spec = self.config.layout.item_list_spec();
                self.catalog.ensure_populated(ctx.catalog);
                let entries = self.catalog.entries();
                self.item_spawner.show(ctx.ui, |host, root| {
                    ItemSpawnerView::build(host, root, spec, entries)
                })
            }
        };

        match result {
            Ok(generation) => {
                self.status.remove(&kind);
                Ok(generation)
            }
            Err(e) => {
                warn!("Could not create the {} panel: {}", kind, e);
                self.status.insert(kind, format!("ERROR: {}", e));
                Err(e)
            }
        }
    }

    fn hide(&mut self, ui: &mut dyn UiHost, kind: PanelKind, reason: &str) -> bool {
        match kind {
            PanelKind::SizeControl => self.size_control.hide(ui, reason),
            PanelKind::ItemSpawner => self.item_spawner.hide(ui, reason),
        }
    }

    fn anchor_window(&self, kind: PanelKind) -> WindowKind {
        self.config.panels.get(kind).anchor_window
    }

    /// React to one host lifecycle event.
    pub fn handle_event(&mut self, ctx: &mut HostContext<'_>, event: &HostEvent, now: Instant) {
        debug!("Host event {}: {:?}", event.name(), event);
        match event {
            HostEvent::WindowOpened { window } => {
                for kind in PanelKind::ALL {
                    let panel = self.config.panels.get(kind);
                    if panel.anchor_window == *window && panel.show_on_window_open {
                        // Failure is already on the status line
                        let _ = self.show(ctx, kind);
                    }
                }
            }
            HostEvent::WindowClosed { window } => {
                for kind in PanelKind::ALL {
                    if self.anchor_window(kind) == *window {
                        self.hide(ctx.ui, kind, "window closed");
                    }
                }
            }
            HostEvent::AllWindowsClosed => {
                for kind in PanelKind::ALL {
                    self.hide(ctx.ui, kind, "all windows closed");
                }
            }
            HostEvent::PlayerSpawned { local } => {
                if !*local {
                    debug!("Ignoring remote player spawn");
                    return;
                }
                self.session = self.session.next();
                info!("Local player spawned, session {}", self.session);
                if self.config.general.auto_set_on_spawn {
                    let due = now + self.config.general.auto_set_delay();
                    self.tasks.enqueue_at(
                        DeferredTask {
                            action: DeferredAction::ApplyDefaultQuantity,
                            guard: TaskGuard::Session(self.session),
                        },
                        due,
                    );
                    debug!(
                        "Default size {} scheduled in {:?}",
                        self.config.general.default_quantity,
                        self.config.general.auto_set_delay()
                    );
                }
            }
            HostEvent::InventoryRefreshed { slots } => {
                self.size_control.reconcile(ctx.ui);
                if let Some(view) = self.size_control.view_mut() {
                    if let Err(e) = view.sync_slots(ctx.ui, *slots) {
                        warn!("Slot grid refresh failed: {}", e);
                    }
                }
            }
            HostEvent::Unloading => {
                for kind in PanelKind::ALL {
                    self.hide(ctx.ui, kind, "unloading");
                }
                self.tasks.clear();
                self.session = self.session.next();
                info!("Panel system unloaded");
            }
        }
    }

    /// Lifecycle toggle: a live, visible panel is destroyed; anything else
    /// ends up live and visible. Returns whether the panel is now shown.
    pub fn toggle_panel(&mut self, ctx: &mut HostContext<'_>, kind: PanelKind) -> PanelResult<bool> {
        self.reconcile(ctx.ui);
        if self.is_live(kind) && self.is_visible(kind) {
            self.hide(ctx.ui, kind, "toggled off");
            self.set_visibility(ctx.ui, kind, false);
            return Ok(false);
        }

        self.set_visibility(ctx.ui, kind, true);
        if !self.is_live(kind) {
            self.show(ctx, kind)?;
        }
        Ok(true)
    }

    /// Visibility only; an absent panel remembers it for its next creation.
    pub fn set_visibility(&mut self, ui: &mut dyn UiHost, kind: PanelKind, visible: bool) {
        match kind {
            PanelKind::SizeControl => self.size_control.set_visibility(ui, visible),
            PanelKind::ItemSpawner => self.item_spawner.set_visibility(ui, visible),
        }
    }

    pub fn toggle_visibility(&mut self, ui: &mut dyn UiHost, kind: PanelKind) -> bool {
        match kind {
            PanelKind::SizeControl => self.size_control.toggle_visibility(ui),
            PanelKind::ItemSpawner => self.item_spawner.toggle_visibility(ui),
        }
    }

    /// Resolve a pressed key combination to a panel and flip its visibility.
    pub fn handle_shortcut(&mut self, ctx: &mut HostContext<'_>, pressed: &str) -> Option<PanelKind> {
        let kind = self.config.panels.panel_for_shortcut(pressed)?;
        self.reconcile(ctx.ui);
        let visible = self.toggle_visibility(ctx.ui, kind);
        debug!("Shortcut '{}' -> {} panel visible: {}", pressed, kind, visible);

        let list_empty = self.item_spawner.view().is_some_and(|v| v.row_count() == 0);
        if kind == PanelKind::ItemSpawner && visible && list_empty {
            if let Err(e) = self.refresh_catalog(ctx) {
                warn!("Catalog refresh on show failed: {}", e);
            }
        }
        Some(kind)
    }

    /// Re-read the catalog and repopulate a live item list in place.
    pub fn refresh_catalog(&mut self, ctx: &mut HostContext<'_>) -> PanelResult<usize> {
        let count = self.catalog.refresh(ctx.catalog);
        self.repopulate_list(ctx.ui)?;
        Ok(count)
    }

    /// Scroll a live panel's content by `delta` pixels. Returns the new offset.
    pub fn scroll(&mut self, ui: &mut dyn UiHost, kind: PanelKind, delta: f32) -> PanelResult<f32> {
        let offset = match kind {
            PanelKind::SizeControl => self.size_control.view_mut().map(|view| view.scroll_by(ui, delta)),
            PanelKind::ItemSpawner => self.item_spawner.view_mut().map(|view| view.scroll_by(ui, delta)),
        };
        offset.ok_or(PanelError::PanelNotLive(kind))
    }

    fn repopulate_list(&mut self, ui: &mut dyn UiHost) -> PanelResult<()> {
        let entries = self.catalog.entries();
        if let Some(view) = self.item_spawner.view_mut() {
            view.populate(ui, entries)?;
        }
        Ok(())
    }

    pub fn select_item(&mut self, ui: &mut dyn UiHost, item_id: &str) -> PanelResult<CatalogEntry> {
        let view = self
            .item_spawner
            .view_mut()
            .ok_or(PanelError::PanelNotLive(PanelKind::ItemSpawner))?;
        match view.select(ui, item_id) {
            Some(entry) => Ok(entry.clone()),
            None => {
                warn!("Item '{}' is not in the list", item_id);
                Err(PanelError::NoSelection)
            }
        }
    }

    fn panel_origin(&self, kind: PanelKind) -> PanelResult<Origin> {
        let generation = match kind {
            PanelKind::SizeControl => self.size_control.live_generation(),
            PanelKind::ItemSpawner => self.item_spawner.live_generation(),
        }
        .ok_or(PanelError::PanelNotLive(kind))?;
        Ok(Origin::Panel { kind, generation })
    }

    /// Resize the inventory to `target` on behalf of the `kind` panel.
    pub fn submit_quantity_change(
        &mut self,
        ctx: &mut HostContext<'_>,
        kind: PanelKind,
        target: i64,
        now: Instant,
    ) -> PanelResult<Ticket> {
        let origin = self.panel_origin(kind)?;
        let general = &self.config.general;
        if target < general.min_quantity || target > general.max_quantity {
            return Err(PanelError::QuantityOutOfRange {
                value: target,
                min: general.min_quantity,
                max: general.max_quantity,
            });
        }
        let current = ctx
            .inventory
            .current_quantity()
            .ok_or(PanelError::CollaboratorUnavailable("the player inventory"))?;

        let ticket = self
            .coordinator
            .submit_quantity_change(origin, current, target, ctx.inventory, now);
        if ticket.immediate.is_none() {
            self.set_status(ctx.ui, kind, format!("Resizing to {}...", target));
        }
        Ok(ticket)
    }

    /// Spawn `count` units of `item_id` on behalf of the `kind` panel.
    pub fn submit_spawn_batch(
        &mut self,
        ctx: &mut HostContext<'_>,
        kind: PanelKind,
        item_id: &str,
        count: usize,
        now: Instant,
    ) -> PanelResult<Ticket> {
        let origin = self.panel_origin(kind)?;
        let ticket = self
            .coordinator
            .submit_spawn_batch(origin, item_id, count, ctx.inventory, now);
        if ticket.immediate.is_none() {
            let label = self.item_label(item_id);
            self.set_status(ctx.ui, kind, format!("Spawning {}x {}...", count, label));
        }
        Ok(ticket)
    }

    fn item_label(&self, item_id: &str) -> String {
        self.catalog
            .get(item_id)
            .map(|e| e.label.clone())
            .unwrap_or_else(|| item_id.to_string())
    }

    /// "Set Size" button: validate the input and submit it.
    pub fn apply_size_from_input(&mut self, ctx: &mut HostContext<'_>, now: Instant) -> PanelResult<Ticket> {
        let view = self
            .size_control
            .view()
            .ok_or(PanelError::PanelNotLive(PanelKind::SizeControl))?;
        let general = &self.config.general;
        let target = match view.read_target(ctx.ui, general.min_quantity, general.max_quantity) {
            Ok(target) => target,
            Err(e) => {
                if let Some(current) = ctx.inventory.current_quantity() {
                    view.show_quantity(ctx.ui, current);
                }
                self.set_status(ctx.ui, PanelKind::SizeControl, format!("ERROR: {}", e));
                return Err(e);
            }
        };

        match self.submit_quantity_change(ctx, PanelKind::SizeControl, target, now) {
            Ok(ticket) => Ok(ticket),
            Err(e) => {
                warn!("Resize to {} rejected: {}", target, e);
                if let (Some(view), Some(current)) =
                    (self.size_control.view(), ctx.inventory.current_quantity())
                {
                    view.show_quantity(ctx.ui, current);
                }
                self.set_status(ctx.ui, PanelKind::SizeControl, format!("ERROR: {}", e));
                Err(e)
            }
        }
    }

    /// Type into the size input, as the user would.
    pub fn enter_size_text(&mut self, ui: &mut dyn UiHost, text: &str) -> PanelResult<()> {
        let view = self
            .size_control
            .view()
            .ok_or(PanelError::PanelNotLive(PanelKind::SizeControl))?;
        view.set_input(ui, text);
        Ok(())
    }

    /// Type into the spawn quantity input.
    pub fn enter_spawn_quantity(&mut self, ui: &mut dyn UiHost, text: &str) -> PanelResult<()> {
        let view = self
            .item_spawner
            .view()
            .ok_or(PanelError::PanelNotLive(PanelKind::ItemSpawner))?;
        view.set_quantity(ui, text);
        Ok(())
    }

    /// "Spawn" button: spawn the selected item in the requested quantity.
    pub fn spawn_from_input(&mut self, ctx: &mut HostContext<'_>, now: Instant) -> PanelResult<Ticket> {
        let view = self
            .item_spawner
            .view()
            .ok_or(PanelError::PanelNotLive(PanelKind::ItemSpawner))?;
        let Some(entry) = view.selected().cloned() else {
            self.set_status(
                ctx.ui,
                PanelKind::ItemSpawner,
                "ERROR: Select an item first!".to_string(),
            );
            return Err(PanelError::NoSelection);
        };
        let max = usize::try_from(self.config.general.max_quantity).unwrap_or(1);
        let count = view.read_quantity(ctx.ui, max);

        self.submit_spawn_batch(ctx, PanelKind::ItemSpawner, &entry.id, count, now)
    }

    fn reconcile(&mut self, ui: &dyn UiHost) {
        self.size_control.reconcile(ui);
        self.item_spawner.reconcile(ui);
    }

    /// Per-frame work: resume due tasks, then deliver request resolutions.
    pub fn tick(&mut self, ctx: &mut HostContext<'_>, now: Instant) -> Vec<Resolution> {
        self.reconcile(ctx.ui);
        self.run_due_tasks(ctx, now);

        let live = self.live_generations();
        let resolutions = self.coordinator.process(now, |origin| live.is_current(origin));
        for resolution in &resolutions {
            self.apply_resolution(ctx, resolution);
            for listener in self.listeners.iter_mut() {
                listener(resolution);
            }
        }
        resolutions
    }

    fn run_due_tasks(&mut self, ctx: &mut HostContext<'_>, now: Instant) {
        if self.tasks.is_empty() {
            return;
        }
        let mut due = VecDeque::new();
        self.tasks.retrieve_due(now, &mut due);

        for task in due {
            if let TaskGuard::Session(session) = task.guard {
                if session != self.session {
                    debug!(
                        "Skipping {:?}: session {} ended (now {})",
                        task.action, session, self.session
                    );
                    continue;
                }
            }

            match task.action {
                DeferredAction::ApplyDefaultQuantity => {
                    let Some(current) = ctx.inventory.current_quantity() else {
                        warn!("No inventory loaded, default size not applied");
                        continue;
                    };
                    let target = self.config.general.default_quantity;
                    info!("Applying default inventory size {} (was {})", target, current);
                    self.coordinator.submit_quantity_change(
                        Origin::Session(self.session),
                        current,
                        target,
                        ctx.inventory,
                        now,
                    );
                }
                DeferredAction::WarmCatalog => {
                    if self.catalog.is_populated() {
                        debug!("Catalog already read, skipping warm-up");
                    } else if self.catalog.ensure_populated(ctx.catalog) {
                        if let Err(e) = self.repopulate_list(ctx.ui) {
                            warn!("Item list refresh after warm-up failed: {}", e);
                        }
                    }
                }
            }
        }
    }

    fn apply_resolution(&mut self, ctx: &mut HostContext<'_>, resolution: &Resolution) {
        let kind = match resolution.origin {
            Origin::Panel { kind, .. } => kind,
            Origin::Session(_) => PanelKind::SizeControl,
        };

        match (&resolution.kind, &resolution.outcome) {
            (RequestKind::QuantityChange { .. }, Outcome::Succeeded(size)) => {
                if let Some(view) = self.size_control.view_mut() {
                    view.show_quantity(ctx.ui, *size);
                    let slots = usize::try_from(*size).unwrap_or(0);
                    if let Err(e) = view.sync_slots(ctx.ui, slots) {
                        warn!("Slot grid refresh failed: {}", e);
                    }
                }
                self.set_status(ctx.ui, kind, format!("Backpack size set to {}", size));
            }
            (RequestKind::QuantityChange { .. }, Outcome::Failed(reason)) => {
                if let (Some(view), Some(current)) =
                    (self.size_control.view(), ctx.inventory.current_quantity())
                {
                    view.show_quantity(ctx.ui, current);
                }
                let error = PanelError::RequestFailed(reason.clone());
                self.set_status(ctx.ui, kind, format!("ERROR: {}", error));
            }
            (RequestKind::SpawnBatch { item_id, .. }, Outcome::Batch(tally)) => {
                let label = self.item_label(item_id);
                let text = if tally.all_succeeded() {
                    format!("Spawned {}x {}", tally.succeeded, label)
                } else {
                    format!(
                        "Spawned {}/{} {} ({} failed)",
                        tally.succeeded, tally.requested, label, tally.failed
                    )
                };
                info!("{}: {}", resolution.id, text);
                self.set_status(ctx.ui, kind, text);
            }
            (request, outcome) => {
                warn!("Unexpected outcome {:?} for {:?}", outcome, request);
            }
        }
    }
}
