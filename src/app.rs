use crate::api::{EVENT_TIMESTAMP_COLUMN, FetchPayload};
use crate::error::{ActionError, FetchError};
use crate::input::Action;
use crate::loader::{Completion, STARTUP_BATCH};
use crate::model::{
    FetchRequest, PodAction, PodActionKind, PodDescription, PodRef, Region, RenderedTable,
};
use crate::session::{GateState, SessionGate};
use crate::sort::SortableTable;
use chrono::{DateTime, Local};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, info, warn};

const PAGE_STEP: isize = 10;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InputMode {
    Normal,
    Path,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Screen {
    Upload,
    Dashboard,
    Events,
    PodDetail,
}

/// Version token handed to a fetch. Only the latest token of a region may apply its result.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct FetchTicket {
    pub region: Region,
    pub version: u64,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PlannedFetch {
    pub ticket: FetchTicket,
    pub request: FetchRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    None,
    Fetch(Vec<PlannedFetch>),
    Upload { path: PathBuf },
    RunAction(PodAction),
}

#[derive(Debug, Clone)]
struct PendingConfirmation {
    prompt: String,
    command: AppCommand,
}

#[derive(Debug, Clone, Default)]
struct RegionHandle {
    version: u64,
    refreshed_at: Option<DateTime<Local>>,
    error: Option<String>,
}

/// A rendered table plus the row the cursor is on.
#[derive(Debug, Clone, Default)]
pub struct TableView {
    pub table: RenderedTable,
    selected: usize,
}

impl TableView {
    pub fn selected(&self) -> Option<usize> {
        if self.table.is_empty() {
            None
        } else {
            Some(self.selected.min(self.table.len() - 1))
        }
    }

    fn replace(&mut self, table: RenderedTable) {
        self.table = table;
        self.selected = self.selected.min(self.table.len().saturating_sub(1));
    }

    fn move_by(&mut self, delta: isize) {
        self.selected = shifted(self.selected, delta, self.table.len());
    }

    fn select_last(&mut self) {
        self.selected = self.table.len().saturating_sub(1);
    }
}

fn shifted(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let max_index = len.saturating_sub(1) as isize;
    let current = current.min(max_index as usize) as isize;
    (current + delta).clamp(0, max_index) as usize
}

pub struct App {
    running: bool,
    mode: InputMode,
    screen: Screen,
    gate: SessionGate,
    status: String,
    show_help: bool,
    input: String,
    pending_confirmation: Option<PendingConfirmation>,
    handles: HashMap<Region, RegionHandle>,
    cluster_version: Option<String>,
    namespaces: Vec<String>,
    namespace: String,
    nodes: TableView,
    pods: TableView,
    volumes: TableView,
    events: SortableTable,
    events_selected: usize,
    events_requested: bool,
    pod_detail: Option<PodDescription>,
    detail_target: Option<PodRef>,
    detail_scroll: u16,
    pods_visible: bool,
    volumes_visible: bool,
    focus: Region,
    in_flight: HashSet<PodRef>,
}

impl App {
    pub fn new(gate: SessionGate, namespace: impl Into<String>) -> Self {
        let screen = if gate.is_unlocked() {
            Screen::Dashboard
        } else {
            Screen::Upload
        };
        let handles = Region::ALL
            .iter()
            .copied()
            .map(|region| (region, RegionHandle::default()))
            .collect::<HashMap<_, _>>();

        Self {
            running: true,
            mode: InputMode::Normal,
            screen,
            gate,
            status: "Ready".to_string(),
            show_help: false,
            input: String::new(),
            pending_confirmation: None,
            handles,
            cluster_version: None,
            namespaces: Vec::new(),
            namespace: namespace.into(),
            nodes: TableView::default(),
            pods: TableView::default(),
            volumes: TableView::default(),
            events: SortableTable::new(EVENT_TIMESTAMP_COLUMN),
            events_selected: 0,
            events_requested: false,
            pod_detail: None,
            detail_target: None,
            detail_scroll: 0,
            pods_visible: false,
            volumes_visible: false,
            focus: Region::Nodes,
            in_flight: HashSet::new(),
        }
    }

    /// Loads the cluster views when a prior session already unlocked the gate.
    pub fn startup(&mut self) -> AppCommand {
        if self.gate.is_unlocked() {
            self.screen = Screen::Dashboard;
            self.status = "Loading cluster overview".to_string();
            self.startup_batch()
        } else {
            self.screen = Screen::Upload;
            self.status = "Session locked: press u to upload a kubeconfig file".to_string();
            AppCommand::None
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn pending_confirmation_prompt(&self) -> Option<&str> {
        self.pending_confirmation
            .as_ref()
            .map(|pending| pending.prompt.as_str())
    }

    pub fn has_pending_confirmation(&self) -> bool {
        self.pending_confirmation.is_some()
    }

    pub fn cluster_version(&self) -> Option<&str> {
        self.cluster_version.as_deref()
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn nodes(&self) -> &TableView {
        &self.nodes
    }

    pub fn pods(&self) -> &TableView {
        &self.pods
    }

    pub fn volumes(&self) -> &TableView {
        &self.volumes
    }

    pub fn events(&self) -> &SortableTable {
        &self.events
    }

    pub fn events_selected(&self) -> Option<usize> {
        let len = self.events.table().len();
        if len == 0 {
            None
        } else {
            Some(self.events_selected.min(len - 1))
        }
    }

    pub fn pod_detail(&self) -> Option<&PodDescription> {
        self.pod_detail.as_ref()
    }

    pub fn detail_target(&self) -> Option<&PodRef> {
        self.detail_target.as_ref()
    }

    pub fn detail_scroll(&self) -> u16 {
        self.detail_scroll
    }

    pub fn pods_visible(&self) -> bool {
        self.pods_visible
    }

    pub fn volumes_visible(&self) -> bool {
        self.volumes_visible
    }

    pub fn focus(&self) -> Region {
        self.focus
    }

    pub fn region_error(&self, region: Region) -> Option<&str> {
        self.handles
            .get(&region)
            .and_then(|handle| handle.error.as_deref())
    }

    pub fn last_refresh(&self, region: Region) -> Option<String> {
        self.handles
            .get(&region)
            .and_then(|handle| handle.refreshed_at)
            .map(|instant| instant.format("%H:%M:%S").to_string())
    }

    pub fn is_in_flight(&self, pod: &PodRef) -> bool {
        self.in_flight.contains(pod)
    }

    /// Pod under the cursor in the pods table, falling back to the selected namespace.
    pub fn selected_pod(&self) -> Option<PodRef> {
        let row = self.pods.selected()?;
        let name = self.pods.table.cell(row, "name").filter(|name| !name.is_empty())?;
        let namespace = self
            .pods
            .table
            .cell(row, "namespace")
            .filter(|namespace| !namespace.is_empty())
            .unwrap_or(self.namespace.as_str());
        Some(PodRef::new(namespace, name))
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Starts a credential upload of `path`, as if it had been typed at the upload prompt.
    pub fn upload_file(&mut self, path: PathBuf) -> AppCommand {
        self.mode = InputMode::Normal;
        self.input.clear();
        self.status = format!("Uploading {}", path.display());
        info!("uploading kubeconfig from {}", path.display());
        AppCommand::Upload { path }
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        if let Some(pending) = self.pending_confirmation.take() {
            match action {
                Action::ConfirmYes => {
                    self.status = format!("Confirmed: {}", pending.prompt);
                    return self.dispatch_confirmed(pending.command);
                }
                Action::ConfirmNo | Action::CancelInput | Action::Back => {
                    self.status = "Action cancelled".to_string();
                    return AppCommand::None;
                }
                _ => {
                    self.pending_confirmation = Some(pending);
                    self.status =
                        "Pending confirmation: press y to confirm or n to cancel".to_string();
                    return AppCommand::None;
                }
            }
        }

        if self.show_help && !matches!(action, Action::ToggleHelp) {
            self.show_help = false;
        }

        if !self.gate.is_unlocked() && !allowed_while_locked(&action) {
            self.status = "Upload a kubeconfig file to unlock cluster views (press u)".to_string();
            return AppCommand::None;
        }

        match action {
            Action::Quit => {
                self.running = false;
                self.status = "Exit requested".to_string();
                AppCommand::None
            }
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                AppCommand::None
            }
            Action::Down => {
                self.move_cursor(1);
                AppCommand::None
            }
            Action::Up => {
                self.move_cursor(-1);
                AppCommand::None
            }
            Action::PageDown => {
                self.move_cursor(PAGE_STEP);
                AppCommand::None
            }
            Action::PageUp => {
                self.move_cursor(-PAGE_STEP);
                AppCommand::None
            }
            Action::Top => {
                match self.screen {
                    Screen::Events => self.events_selected = 0,
                    Screen::Dashboard => {
                        if let Some(view) = self.focused_view_mut() {
                            view.selected = 0;
                        }
                    }
                    Screen::PodDetail => self.detail_scroll = 0,
                    Screen::Upload => {}
                }
                AppCommand::None
            }
            Action::Bottom => {
                match self.screen {
                    Screen::Events => {
                        self.events_selected = self.events.table().len().saturating_sub(1)
                    }
                    Screen::Dashboard => {
                        if let Some(view) = self.focused_view_mut() {
                            view.select_last();
                        }
                    }
                    Screen::PodDetail => self.detail_scroll = self.max_detail_scroll(),
                    Screen::Upload => {}
                }
                AppCommand::None
            }
            Action::NextPane => {
                self.cycle_focus();
                AppCommand::None
            }
            Action::Refresh => self.refresh_screen(),
            Action::TogglePods => self.toggle_pods(),
            Action::ToggleVolumes => {
                self.volumes_visible = !self.volumes_visible;
                if !self.volumes_visible && self.focus == Region::PersistentVolumes {
                    self.focus = Region::Nodes;
                }
                self.status = if self.volumes_visible {
                    "Persistent volumes shown".to_string()
                } else {
                    "Persistent volumes hidden".to_string()
                };
                AppCommand::None
            }
            Action::NextNamespace => self.switch_namespace_by_offset(1),
            Action::PrevNamespace => self.switch_namespace_by_offset(-1),
            Action::ShowEvents => self.show_events(),
            Action::ShowDashboard => {
                self.screen = Screen::Dashboard;
                AppCommand::None
            }
            Action::Back => {
                if matches!(self.screen, Screen::Events | Screen::PodDetail) {
                    self.screen = Screen::Dashboard;
                }
                AppCommand::None
            }
            Action::SortByTimestamp => {
                if self.screen != Screen::Events {
                    return AppCommand::None;
                }
                self.status = match self.events.toggle_timestamp_sort() {
                    Some(direction) => {
                        format!("Events sorted by timestamp {}", direction.glyph())
                    }
                    None => "No events to sort".to_string(),
                };
                AppCommand::None
            }
            Action::OpenDetail => self.open_pod_detail(),
            Action::RestartPod => self.request_pod_action(PodActionKind::Restart),
            Action::ScalePod => self.request_pod_action(PodActionKind::ScaleToZero),
            Action::StartUpload => {
                self.mode = InputMode::Path;
                self.input.clear();
                self.status = "Enter the path of a kubeconfig file".to_string();
                AppCommand::None
            }
            Action::SubmitInput => {
                let path = self.input.trim().to_string();
                if path.is_empty() {
                    self.status = "No file selected".to_string();
                    return AppCommand::None;
                }
                self.upload_file(PathBuf::from(path))
            }
            Action::CancelInput => {
                self.mode = InputMode::Normal;
                self.input.clear();
                self.status = "Upload cancelled".to_string();
                AppCommand::None
            }
            Action::Backspace => {
                self.input.pop();
                AppCommand::None
            }
            Action::InputChar(c) => {
                self.input.push(c);
                AppCommand::None
            }
            Action::ConfirmYes | Action::ConfirmNo => AppCommand::None,
        }
    }

    /// Applies the result of a spawned network call and returns any follow-up work.
    pub fn apply_completion(&mut self, completion: Completion) -> AppCommand {
        match completion {
            Completion::Fetch { ticket, result } => self.apply_fetch(ticket, result),
            Completion::Action { action, result } => self.apply_action_result(action, result),
            Completion::Upload { result } => self.apply_upload(result),
        }
    }

    fn apply_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<FetchPayload, FetchError>,
    ) -> AppCommand {
        let Some(handle) = self.handles.get_mut(&ticket.region) else {
            return AppCommand::None;
        };
        if handle.version != ticket.version {
            debug!(
                "dropping stale {} result v{} (current v{})",
                ticket.region.title(),
                ticket.version,
                handle.version
            );
            return AppCommand::None;
        }

        match result {
            Ok(payload) => {
                handle.refreshed_at = Some(Local::now());
                handle.error = None;
                self.apply_payload(ticket.region, payload)
            }
            Err(error) => {
                if error.is_transport_failure() {
                    warn!("{} fetch failed: {error}", ticket.region.title());
                } else {
                    warn!("{} response ignored: {error}", ticket.region.title());
                }
                handle.error = Some(error.to_string());
                self.status = format!("Failed to load {}: {error}", ticket.region.title());
                AppCommand::None
            }
        }
    }

    fn apply_payload(&mut self, region: Region, payload: FetchPayload) -> AppCommand {
        match (region, payload) {
            (Region::ClusterInfo, FetchPayload::ClusterVersion(version)) => {
                self.cluster_version = Some(version);
                AppCommand::None
            }
            (Region::Namespaces, FetchPayload::Namespaces(namespaces)) => {
                self.set_namespaces(namespaces)
            }
            (Region::Nodes, FetchPayload::Table(table)) => {
                self.nodes.replace(table);
                AppCommand::None
            }
            (Region::Pods, FetchPayload::Table(table)) => {
                self.pods.replace(table);
                AppCommand::None
            }
            (Region::PersistentVolumes, FetchPayload::Table(table)) => {
                self.volumes.replace(table);
                AppCommand::None
            }
            (Region::Events, FetchPayload::Table(table)) => {
                self.events.replace(table);
                self.events_selected = self
                    .events_selected
                    .min(self.events.table().len().saturating_sub(1));
                AppCommand::None
            }
            (Region::PodDetail, FetchPayload::PodDetail(description)) => {
                self.pod_detail = Some(description);
                self.detail_scroll = 0;
                AppCommand::None
            }
            (region, payload) => {
                warn!("unexpected payload for {}: {payload:?}", region.title());
                AppCommand::None
            }
        }
    }

    fn set_namespaces(&mut self, namespaces: Vec<String>) -> AppCommand {
        self.namespaces = namespaces;
        if self.namespaces.is_empty() || self.namespaces.contains(&self.namespace) {
            return AppCommand::None;
        }

        self.namespace = self.namespaces[0].clone();
        info!("namespace {} selected", self.namespace);
        if self.pods_visible {
            self.pods_fetch()
        } else {
            AppCommand::None
        }
    }

    fn apply_action_result(
        &mut self,
        action: PodAction,
        result: Result<(), ActionError>,
    ) -> AppCommand {
        self.in_flight.remove(&action.pod);
        let name = &action.pod.name;

        match result {
            Ok(()) => {
                info!("pod {} {}", action.pod, action.kind.outcome());
                self.status = format!("Pod {name} {} successfully.", action.kind.outcome());
                let request = FetchRequest::Pods {
                    namespace: action.pod.namespace.clone(),
                };
                AppCommand::Fetch(vec![self.plan(request)])
            }
            Err(ActionError::Rejected { reason }) => {
                warn!("{} of pod {} rejected: {reason}", action.kind.verb(), action.pod);
                self.status = format!("Failed to {} pod {name}: {reason}", action.kind.verb());
                AppCommand::None
            }
            Err(error) => {
                warn!("{} of pod {} failed: {error}", action.kind.verb(), action.pod);
                self.status = format!("Error {} pod {name}: {error}", action.kind.progressive());
                AppCommand::None
            }
        }
    }

    fn apply_upload(&mut self, result: Result<bool, FetchError>) -> AppCommand {
        match result {
            Ok(true) => {
                self.gate.unlock();
                self.screen = Screen::Dashboard;
                self.status = "Kubeconfig uploaded successfully".to_string();
                self.startup_batch()
            }
            Ok(false) => {
                warn!("kubeconfig upload rejected by server");
                self.status = "Failed to upload kubeconfig file".to_string();
                AppCommand::None
            }
            Err(error) => {
                warn!("kubeconfig upload failed: {error}");
                self.status = "An error occurred while uploading the kubeconfig file".to_string();
                AppCommand::None
            }
        }
    }

    fn dispatch_confirmed(&mut self, command: AppCommand) -> AppCommand {
        if let AppCommand::RunAction(action) = &command {
            if !self.in_flight.insert(action.pod.clone()) {
                self.status = format!(
                    "A request for pod {} is already in progress",
                    action.pod.name
                );
                return AppCommand::None;
            }
            self.status = format!(
                "{} pod {}",
                capitalize(action.kind.progressive()),
                action.pod.name
            );
        }
        command
    }

    fn request_pod_action(&mut self, kind: PodActionKind) -> AppCommand {
        let target = match self.screen {
            Screen::PodDetail => self.detail_target.clone(),
            Screen::Dashboard if self.pods_visible && self.focus == Region::Pods => {
                self.selected_pod()
            }
            _ => None,
        };
        let Some(pod) = target else {
            self.status = "Select a pod first".to_string();
            return AppCommand::None;
        };

        if self.in_flight.contains(&pod) {
            self.status = format!("A request for pod {} is already in progress", pod.name);
            return AppCommand::None;
        }

        let prompt = match kind {
            PodActionKind::Restart => format!("Restart pod {pod}? (y/n)"),
            PodActionKind::ScaleToZero => format!("Scale pod {pod} to 0? (y/n)"),
        };
        self.status = prompt.clone();
        self.pending_confirmation = Some(PendingConfirmation {
            prompt,
            command: AppCommand::RunAction(PodAction { kind, pod }),
        });
        AppCommand::None
    }

    fn open_pod_detail(&mut self) -> AppCommand {
        if self.screen != Screen::Dashboard || !self.pods_visible || self.focus != Region::Pods {
            return AppCommand::None;
        }
        let Some(pod) = self.selected_pod() else {
            self.status = "Select a pod first".to_string();
            return AppCommand::None;
        };

        self.screen = Screen::PodDetail;
        self.pod_detail = None;
        self.detail_scroll = 0;
        self.detail_target = Some(pod.clone());
        if let Some(handle) = self.handles.get_mut(&Region::PodDetail) {
            handle.error = None;
        }
        self.status = format!("Describing pod {pod}");
        self.fetch_one(FetchRequest::PodDetail(pod))
    }

    fn show_events(&mut self) -> AppCommand {
        self.screen = Screen::Events;
        if self.events_requested {
            return AppCommand::None;
        }
        self.events_requested = true;
        self.fetch_one(FetchRequest::Events)
    }

    fn toggle_pods(&mut self) -> AppCommand {
        self.pods_visible = !self.pods_visible;
        if self.pods_visible {
            self.focus = Region::Pods;
            self.status = format!("Pods in {}", self.namespace);
            self.pods_fetch()
        } else {
            if self.focus == Region::Pods {
                self.focus = Region::Nodes;
            }
            self.status = "Pods hidden".to_string();
            AppCommand::None
        }
    }

    fn switch_namespace_by_offset(&mut self, offset: isize) -> AppCommand {
        if self.screen != Screen::Dashboard || self.namespaces.is_empty() {
            return AppCommand::None;
        }

        let len = self.namespaces.len() as isize;
        let current = self
            .namespaces
            .iter()
            .position(|candidate| candidate == &self.namespace)
            .unwrap_or(0) as isize;
        let next = (current + offset).rem_euclid(len) as usize;
        if self.namespaces[next] == self.namespace {
            return AppCommand::None;
        }

        self.namespace = self.namespaces[next].clone();
        self.status = format!("Namespace: {}", self.namespace);
        if self.pods_visible {
            self.pods_fetch()
        } else {
            AppCommand::None
        }
    }

    fn refresh_screen(&mut self) -> AppCommand {
        match self.screen {
            Screen::Upload => AppCommand::None,
            Screen::Dashboard => {
                let mut requests = STARTUP_BATCH.to_vec();
                if self.pods_visible {
                    requests.push(FetchRequest::Pods {
                        namespace: self.namespace.clone(),
                    });
                }
                self.status = "Refreshing cluster overview".to_string();
                self.fetch_all(requests)
            }
            Screen::Events => {
                self.events_requested = true;
                self.status = "Refreshing events".to_string();
                self.fetch_one(FetchRequest::Events)
            }
            Screen::PodDetail => match self.detail_target.clone() {
                Some(pod) => self.fetch_one(FetchRequest::PodDetail(pod)),
                None => AppCommand::None,
            },
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        match self.screen {
            Screen::Events => {
                self.events_selected =
                    shifted(self.events_selected, delta, self.events.table().len());
            }
            Screen::PodDetail => {
                let next = (self.detail_scroll as isize).saturating_add(delta);
                self.detail_scroll = next.clamp(0, self.max_detail_scroll() as isize) as u16;
            }
            Screen::Dashboard => {
                if let Some(view) = self.focused_view_mut() {
                    view.move_by(delta);
                }
            }
            Screen::Upload => {}
        }
    }

    fn max_detail_scroll(&self) -> u16 {
        self.pod_detail
            .as_ref()
            .map(|description| description.line_count().saturating_sub(1))
            .map_or(0, |last| u16::try_from(last).unwrap_or(u16::MAX))
    }

    fn focused_view_mut(&mut self) -> Option<&mut TableView> {
        match self.focus {
            Region::Nodes => Some(&mut self.nodes),
            Region::Pods => Some(&mut self.pods),
            Region::PersistentVolumes => Some(&mut self.volumes),
            _ => None,
        }
    }

    fn cycle_focus(&mut self) {
        let mut order = vec![Region::Nodes];
        if self.pods_visible {
            order.push(Region::Pods);
        }
        if self.volumes_visible {
            order.push(Region::PersistentVolumes);
        }
        let current = order
            .iter()
            .position(|region| *region == self.focus)
            .unwrap_or(0);
        self.focus = order[(current + 1) % order.len()];
    }

    fn startup_batch(&mut self) -> AppCommand {
        self.fetch_all(STARTUP_BATCH.to_vec())
    }

    fn pods_fetch(&mut self) -> AppCommand {
        let request = FetchRequest::Pods {
            namespace: self.namespace.clone(),
        };
        self.fetch_one(request)
    }

    fn fetch_one(&mut self, request: FetchRequest) -> AppCommand {
        AppCommand::Fetch(vec![self.plan(request)])
    }

    fn fetch_all(&mut self, requests: Vec<FetchRequest>) -> AppCommand {
        let batch = requests
            .into_iter()
            .map(|request| self.plan(request))
            .collect();
        AppCommand::Fetch(batch)
    }

    /// Bumps the region's version so any earlier in-flight result for it is discarded.
    fn plan(&mut self, request: FetchRequest) -> PlannedFetch {
        let region = request.region();
        let handle = self.handles.entry(region).or_default();
        handle.version += 1;
        PlannedFetch {
            ticket: FetchTicket {
                region,
                version: handle.version,
            },
            request,
        }
    }
}

fn allowed_while_locked(action: &Action) -> bool {
    matches!(
        action,
        Action::Quit
            | Action::ToggleHelp
            | Action::StartUpload
            | Action::SubmitInput
            | Action::CancelInput
            | Action::Backspace
            | Action::InputChar(_)
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{App, AppCommand, FetchTicket, InputMode, PlannedFetch, Screen};
    use crate::api::FetchPayload;
    use crate::error::{ActionError, FetchError};
    use crate::input::Action;
    use crate::loader::Completion;
    use crate::model::{
        FetchRequest, PodAction, PodActionKind, PodDescription, PodRef, Region, RenderedTable,
        TableRow,
    };
    use crate::session::{GateState, MemoryStore, SessionGate};
    use std::path::PathBuf;

    fn unlocked_app() -> App {
        App::new(SessionGate::open(Box::new(MemoryStore::flagged())), "ns")
    }

    fn locked_app() -> App {
        App::new(SessionGate::open(Box::new(MemoryStore::default())), "ns")
    }

    fn planned(command: AppCommand) -> Vec<PlannedFetch> {
        match command {
            AppCommand::Fetch(batch) => batch,
            other => panic!("expected fetch, got {other:?}"),
        }
    }

    fn pod_table(names: &[&str]) -> RenderedTable {
        RenderedTable {
            headers: vec!["name".to_string(), "namespace".to_string(), "status".to_string()],
            rows: names
                .iter()
                .map(|name| {
                    TableRow::new(vec![name.to_string(), "ns".to_string(), "Running".to_string()])
                })
                .collect(),
        }
    }

    /// Shows pods and completes the fetch with `names`.
    fn show_pods(app: &mut App, names: &[&str]) {
        let batch = planned(app.apply_action(Action::TogglePods));
        let ticket = batch[0].ticket;
        app.apply_completion(Completion::Fetch {
            ticket,
            result: Ok(FetchPayload::Table(pod_table(names))),
        });
    }

    fn confirm_restart(app: &mut App) -> AppCommand {
        assert_eq!(app.apply_action(Action::RestartPod), AppCommand::None);
        app.apply_action(Action::ConfirmYes)
    }

    #[test]
    fn locked_gate_keeps_views_inert() {
        let mut app = locked_app();
        assert_eq!(app.startup(), AppCommand::None);
        assert_eq!(app.screen(), Screen::Upload);
        assert_eq!(app.gate_state(), GateState::Locked);

        assert_eq!(app.apply_action(Action::TogglePods), AppCommand::None);
        assert_eq!(app.apply_action(Action::Refresh), AppCommand::None);
        assert_eq!(app.apply_action(Action::ShowEvents), AppCommand::None);
        assert!(!app.pods_visible());
        assert_eq!(app.screen(), Screen::Upload);
    }

    #[test]
    fn successful_upload_unlocks_and_issues_four_fetches() {
        let mut app = locked_app();
        app.startup();

        let batch = planned(app.apply_completion(Completion::Upload { result: Ok(true) }));
        let requests = batch
            .iter()
            .map(|planned| planned.request.clone())
            .collect::<Vec<_>>();
        assert_eq!(
            requests,
            vec![
                FetchRequest::ClusterInfo,
                FetchRequest::Namespaces,
                FetchRequest::Nodes,
                FetchRequest::PersistentVolumes
            ]
        );
        assert_eq!(app.gate_state(), GateState::Unlocked);
        assert_eq!(app.screen(), Screen::Dashboard);
    }

    #[test]
    fn rejected_upload_stays_locked() {
        let mut app = locked_app();
        let command = app.apply_completion(Completion::Upload { result: Ok(false) });
        assert_eq!(command, AppCommand::None);
        assert_eq!(app.status(), "Failed to upload kubeconfig file");
        assert_eq!(app.gate_state(), GateState::Locked);

        let command = app.apply_completion(Completion::Upload {
            result: Err(FetchError::Transport {
                path: "/upload_kubeconfig".to_string(),
                reason: "connection refused".to_string(),
            }),
        });
        assert_eq!(command, AppCommand::None);
        assert_eq!(
            app.status(),
            "An error occurred while uploading the kubeconfig file"
        );
    }

    #[test]
    fn typed_path_becomes_upload_command() {
        let mut app = locked_app();
        app.apply_action(Action::StartUpload);
        assert_eq!(app.mode(), InputMode::Path);
        for c in "/tmp/kc".chars() {
            app.apply_action(Action::InputChar(c));
        }

        let command = app.apply_action(Action::SubmitInput);
        assert_eq!(
            command,
            AppCommand::Upload {
                path: PathBuf::from("/tmp/kc")
            }
        );
        assert_eq!(app.mode(), InputMode::Normal);
    }

    #[test]
    fn failed_fetch_keeps_previous_rows() {
        let mut app = unlocked_app();
        show_pods(&mut app, &["a", "b", "c"]);
        assert_eq!(app.pods().table.len(), 3);

        let batch = planned(app.apply_action(Action::Refresh));
        let pods_ticket = batch
            .iter()
            .find(|planned| planned.ticket.region == Region::Pods)
            .map(|planned| planned.ticket)
            .expect("pods ticket");
        app.apply_completion(Completion::Fetch {
            ticket: pods_ticket,
            result: Err(FetchError::HttpStatus {
                path: "/api/v1/namespaces/ns/pods".to_string(),
                status: 500,
            }),
        });

        assert_eq!(app.pods().table.len(), 3);
        assert!(app.region_error(Region::Pods).is_some());
    }

    #[test]
    fn stale_ticket_is_dropped() {
        let mut app = unlocked_app();
        let first = planned(app.apply_action(Action::TogglePods))[0].ticket;
        app.apply_action(Action::TogglePods);
        let second = planned(app.apply_action(Action::TogglePods))[0].ticket;
        assert!(second.version > first.version);

        app.apply_completion(Completion::Fetch {
            ticket: second,
            result: Ok(FetchPayload::Table(pod_table(&["fresh"]))),
        });
        app.apply_completion(Completion::Fetch {
            ticket: first,
            result: Ok(FetchPayload::Table(pod_table(&["old", "older"]))),
        });

        assert_eq!(app.pods().table.cell(0, "name"), Some("fresh"));
        assert_eq!(app.pods().table.len(), 1);
    }

    #[test]
    fn unknown_region_ticket_is_ignored() {
        let mut app = unlocked_app();
        let command = app.apply_completion(Completion::Fetch {
            ticket: FetchTicket {
                region: Region::Nodes,
                version: 42,
            },
            result: Ok(FetchPayload::Table(pod_table(&["x"]))),
        });
        assert_eq!(command, AppCommand::None);
        assert!(app.nodes().table.is_empty());
    }

    #[test]
    fn successful_restart_refetches_pods_once() {
        let mut app = unlocked_app();
        show_pods(&mut app, &["p1"]);

        let command = confirm_restart(&mut app);
        let action = PodAction {
            kind: PodActionKind::Restart,
            pod: PodRef::new("ns", "p1"),
        };
        assert_eq!(command, AppCommand::RunAction(action.clone()));

        let batch = planned(app.apply_completion(Completion::Action {
            action,
            result: Ok(()),
        }));
        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch[0].request,
            FetchRequest::Pods {
                namespace: "ns".to_string()
            }
        );
        assert_eq!(app.status(), "Pod p1 restarted successfully.");
    }

    #[test]
    fn rejected_restart_reports_reason_without_refetch() {
        let mut app = unlocked_app();
        show_pods(&mut app, &["p1"]);
        let AppCommand::RunAction(action) = confirm_restart(&mut app) else {
            panic!("expected pod action");
        };

        let command = app.apply_completion(Completion::Action {
            action,
            result: Err(ActionError::Rejected {
                reason: "busy".to_string(),
            }),
        });
        assert_eq!(command, AppCommand::None);
        assert!(app.status().contains("busy"));
        assert!(app.status().contains("p1"));
    }

    #[test]
    fn pod_with_action_in_flight_rejects_another() {
        let mut app = unlocked_app();
        show_pods(&mut app, &["p1"]);
        let AppCommand::RunAction(action) = confirm_restart(&mut app) else {
            panic!("expected pod action");
        };
        assert!(app.is_in_flight(&action.pod));

        assert_eq!(app.apply_action(Action::ScalePod), AppCommand::None);
        assert!(app.pending_confirmation_prompt().is_none());
        assert!(app.status().contains("already in progress"));

        app.apply_completion(Completion::Action {
            action: action.clone(),
            result: Ok(()),
        });
        assert!(!app.is_in_flight(&action.pod));
    }

    #[test]
    fn declined_confirmation_sends_nothing() {
        let mut app = unlocked_app();
        show_pods(&mut app, &["p1"]);
        app.apply_action(Action::ScalePod);
        assert!(app.pending_confirmation_prompt().is_some());

        assert_eq!(app.apply_action(Action::ConfirmNo), AppCommand::None);
        assert_eq!(app.status(), "Action cancelled");
    }

    #[test]
    fn events_fetch_once_then_sort_in_place() {
        let mut app = unlocked_app();
        let batch = planned(app.apply_action(Action::ShowEvents));
        assert_eq!(batch[0].request, FetchRequest::Events);

        let mut table = RenderedTable {
            headers: vec!["reason".to_string(), "timestamp".to_string()],
            rows: vec![
                TableRow::new(vec!["b".to_string(), "300".to_string()]),
                TableRow::new(vec!["a".to_string(), "100".to_string()]),
            ],
        };
        table.present_column("timestamp", |raw| format!("shown {raw}"));
        app.apply_completion(Completion::Fetch {
            ticket: batch[0].ticket,
            result: Ok(FetchPayload::Table(table)),
        });

        app.apply_action(Action::Back);
        assert_eq!(app.apply_action(Action::ShowEvents), AppCommand::None);

        app.apply_action(Action::SortByTimestamp);
        assert_eq!(app.events().table().cell(0, "reason"), Some("a"));
        app.apply_action(Action::SortByTimestamp);
        assert_eq!(app.events().table().cell(0, "reason"), Some("b"));
    }

    #[test]
    fn namespace_switch_refetches_visible_pods() {
        let mut app = unlocked_app();
        app.startup();
        let batch = planned(app.apply_action(Action::Refresh));
        let namespaces_ticket = batch
            .iter()
            .find(|planned| planned.ticket.region == Region::Namespaces)
            .map(|planned| planned.ticket)
            .expect("namespaces ticket");
        app.apply_completion(Completion::Fetch {
            ticket: namespaces_ticket,
            result: Ok(FetchPayload::Namespaces(vec![
                "ns".to_string(),
                "kube-system".to_string(),
            ])),
        });
        assert_eq!(app.namespace(), "ns");

        assert_eq!(app.apply_action(Action::NextNamespace), AppCommand::None);
        assert_eq!(app.namespace(), "kube-system");

        show_pods(&mut app, &[]);
        let batch = planned(app.apply_action(Action::PrevNamespace));
        assert_eq!(
            batch[0].request,
            FetchRequest::Pods {
                namespace: "ns".to_string()
            }
        );
    }

    #[test]
    fn missing_configured_namespace_falls_back_to_first() {
        let mut app = App::new(SessionGate::open(Box::new(MemoryStore::flagged())), "gone");
        let batch = planned(app.startup());
        let ticket = batch
            .iter()
            .find(|planned| planned.ticket.region == Region::Namespaces)
            .map(|planned| planned.ticket)
            .expect("namespaces ticket");
        app.apply_completion(Completion::Fetch {
            ticket,
            result: Ok(FetchPayload::Namespaces(vec!["default".to_string()])),
        });
        assert_eq!(app.namespace(), "default");
    }

    #[test]
    fn enter_on_pod_opens_description() {
        let mut app = unlocked_app();
        show_pods(&mut app, &["p1", "p2"]);
        app.apply_action(Action::Down);

        let batch = planned(app.apply_action(Action::OpenDetail));
        assert_eq!(
            batch[0].request,
            FetchRequest::PodDetail(PodRef::new("ns", "p2"))
        );
        assert_eq!(app.screen(), Screen::PodDetail);
    }

    #[test]
    fn unreachable_gateway_on_restart_reports_error_and_frees_pod() {
        let mut app = unlocked_app();
        show_pods(&mut app, &["p1"]);
        let AppCommand::RunAction(action) = confirm_restart(&mut app) else {
            panic!("expected pod action");
        };
        let pod = action.pod.clone();
        assert!(app.is_in_flight(&pod));

        let command = app.apply_completion(Completion::Action {
            action,
            result: Err(ActionError::Request(FetchError::Transport {
                path: "/api/v1/namespaces/ns/pods/p1/restart".to_string(),
                reason: "connection refused".to_string(),
            })),
        });
        assert_eq!(command, AppCommand::None);
        assert!(app.status().contains("p1"));
        assert!(app.status().contains("connection refused"));
        assert!(!app.is_in_flight(&pod));

        assert!(matches!(confirm_restart(&mut app), AppCommand::RunAction(_)));
    }

    #[test]
    fn reopening_detail_for_another_pod_clears_old_error() {
        let mut app = unlocked_app();
        show_pods(&mut app, &["p1", "p2"]);

        let batch = planned(app.apply_action(Action::OpenDetail));
        app.apply_completion(Completion::Fetch {
            ticket: batch[0].ticket,
            result: Err(FetchError::HttpStatus {
                path: "/api/v1/namespaces/ns/pods/p1".to_string(),
                status: 500,
            }),
        });
        assert!(app.region_error(Region::PodDetail).is_some());

        app.apply_action(Action::Back);
        app.apply_action(Action::Down);
        let batch = planned(app.apply_action(Action::OpenDetail));
        assert_eq!(
            batch[0].request,
            FetchRequest::PodDetail(PodRef::new("ns", "p2"))
        );
        assert_eq!(app.detail_target(), Some(&PodRef::new("ns", "p2")));
        assert_eq!(app.region_error(Region::PodDetail), None);
    }

    #[test]
    fn bottom_on_detail_stops_at_last_line() {
        let mut app = unlocked_app();
        show_pods(&mut app, &["p1"]);
        let batch = planned(app.apply_action(Action::OpenDetail));
        let containers = RenderedTable {
            headers: vec!["name".to_string(), "image".to_string()],
            rows: vec![
                TableRow::new(vec!["app".to_string(), "nginx".to_string()]),
                TableRow::new(vec!["sidecar".to_string(), "envoy".to_string()]),
            ],
        };
        app.apply_completion(Completion::Fetch {
            ticket: batch[0].ticket,
            result: Ok(FetchPayload::PodDetail(PodDescription {
                name: "p1".to_string(),
                sections: vec![("Containers".to_string(), containers)],
            })),
        });

        // heading + column line + 2 rows + blank
        app.apply_action(Action::Bottom);
        assert_eq!(app.detail_scroll(), 4);
        app.apply_action(Action::Down);
        assert_eq!(app.detail_scroll(), 4);
        app.apply_action(Action::Top);
        assert_eq!(app.detail_scroll(), 0);
    }
}
