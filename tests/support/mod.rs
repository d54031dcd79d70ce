//! In-memory document surface for integration tests.
//!
//! Nodes declare which selectors they match; there is no real selector
//! engine. Tests mutate page state through the handle returned by
//! [`SimulatedPage::add_node`] and by calling [`SimulatedPage::set_text`],
//! which also emits a mutation event to every subscriber.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use askrunner::surface::{
    DocumentSurface, FormCapabilities, InputIntent, KeyCombo, MutationEvent, MutationKind,
    NodeHandle, SurfaceError,
};

#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub selectors: Vec<String>,
    pub visible: bool,
    pub text: String,
    pub editable: bool,
    pub form: Option<NodeHandle>,
    pub container: Option<NodeHandle>,
    pub streaming: bool,
    pub capabilities: FormCapabilities,
    pub cancel_submit_event: bool,
}

impl NodeSpec {
    pub fn new(selectors: &[&str]) -> Self {
        NodeSpec {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            visible: true,
            text: String::new(),
            editable: false,
            form: None,
            container: None,
            streaming: false,
            capabilities: FormCapabilities::default(),
            cancel_submit_event: false,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn in_form(mut self, form: NodeHandle) -> Self {
        self.form = Some(form);
        self
    }

    pub fn in_container(mut self, container: NodeHandle) -> Self {
        self.container = Some(container);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn form_caps(mut self, request_submit: bool, raw_submit: bool) -> Self {
        self.capabilities = FormCapabilities {
            request_submit,
            raw_submit,
        };
        self
    }

    pub fn cancels_submit_event(mut self) -> Self {
        self.cancel_submit_event = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Click(NodeHandle),
    Focus(NodeHandle),
    ScrollIntoView(NodeHandle),
    SetText(NodeHandle, String),
    SetNativeValue(NodeHandle, String),
    Input(NodeHandle, String),
    Generic(NodeHandle, String),
    Key(NodeHandle, String, bool, bool),
    RequestSubmit(NodeHandle),
    RawSubmit(NodeHandle),
    SubmitEvent(NodeHandle),
}

#[derive(Default)]
struct SimState {
    nodes: HashMap<u64, NodeSpec>,
    order: Vec<u64>,
    next_id: u64,
    subscribers: Vec<mpsc::UnboundedSender<MutationEvent>>,
    subscription_count: usize,
    actions: Vec<Action>,
    reset_count: usize,
}

#[derive(Default)]
pub struct SimulatedPage {
    state: Mutex<SimState>,
}

/// Handles for the standard chat-page fixture.
pub struct ChatNodes {
    pub input: NodeHandle,
    pub response: NodeHandle,
}

impl SimulatedPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&self, spec: NodeSpec) -> NodeHandle {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.nodes.insert(id, spec);
        state.order.push(id);
        NodeHandle(id)
    }

    pub fn remove_node(&self, node: NodeHandle) {
        let mut state = self.state.lock().unwrap();
        state.nodes.remove(&node.0);
        state.order.retain(|id| *id != node.0);
    }

    /// Update a node's text and notify subscribers of the change.
    pub fn set_text(&self, node: NodeHandle, text: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(spec) = state.nodes.get_mut(&node.0) {
            spec.text = text.to_string();
        }
        state.subscribers.retain(|tx| {
            tx.send(MutationEvent {
                kind: MutationKind::CharacterData,
            })
            .is_ok()
        });
    }

    pub fn set_visible(&self, node: NodeHandle, visible: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(spec) = state.nodes.get_mut(&node.0) {
            spec.visible = visible;
        }
    }

    /// Current text of a node, for assertions.
    pub fn inner_text_of(&self, node: NodeHandle) -> String {
        self.state
            .lock()
            .unwrap()
            .nodes
            .get(&node.0)
            .map(|spec| spec.text.clone())
            .unwrap_or_default()
    }

    pub fn set_streaming(&self, node: NodeHandle, streaming: bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(spec) = state.nodes.get_mut(&node.0) {
            spec.streaming = streaming;
        }
    }

    /// Emit a structural mutation without changing any node.
    pub fn emit_mutation(&self) {
        let mut state = self.state.lock().unwrap();
        state.subscribers.retain(|tx| {
            tx.send(MutationEvent {
                kind: MutationKind::ChildList,
            })
            .is_ok()
        });
    }

    pub fn actions(&self) -> Vec<Action> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().unwrap().subscription_count
    }

    pub fn reset_count(&self) -> usize {
        self.state.lock().unwrap().reset_count
    }

    pub fn clicks(&self) -> Vec<NodeHandle> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                Action::Click(node) => Some(node),
                _ => None,
            })
            .collect()
    }

    fn with_node<T>(
        &self,
        node: NodeHandle,
        f: impl FnOnce(&NodeSpec) -> T,
    ) -> Result<T, SurfaceError> {
        let state = self.state.lock().unwrap();
        state
            .nodes
            .get(&node.0)
            .map(f)
            .ok_or(SurfaceError::StaleNode(node))
    }

    fn record(&self, action: Action) {
        self.state.lock().unwrap().actions.push(action);
    }

    fn matching(&self, selector: &str, container: Option<NodeHandle>) -> Vec<NodeHandle> {
        let state = self.state.lock().unwrap();
        state
            .order
            .iter()
            .filter_map(|id| state.nodes.get(id).map(|spec| (*id, spec)))
            .filter(|(_, spec)| spec.selectors.iter().any(|s| s == selector))
            .filter(|(_, spec)| container.is_none() || spec.container == container)
            .map(|(id, _)| NodeHandle(id))
            .collect()
    }
}

#[async_trait]
impl DocumentSurface for SimulatedPage {
    async fn query_all_deep(&self, selector: &str) -> Result<Vec<NodeHandle>, SurfaceError> {
        Ok(self.matching(selector, None))
    }

    async fn query_within(
        &self,
        root: Option<NodeHandle>,
        selector: &str,
    ) -> Result<Vec<NodeHandle>, SurfaceError> {
        Ok(self.matching(selector, root))
    }

    async fn is_visible(&self, node: NodeHandle) -> Result<bool, SurfaceError> {
        self.with_node(node, |spec| spec.visible)
    }

    async fn inner_text(&self, node: NodeHandle) -> Result<String, SurfaceError> {
        self.with_node(node, |spec| spec.text.clone())
    }

    async fn is_editable_region(&self, node: NodeHandle) -> Result<bool, SurfaceError> {
        self.with_node(node, |spec| spec.editable)
    }

    async fn scroll_into_view(&self, node: NodeHandle) -> Result<(), SurfaceError> {
        self.with_node(node, |_| ())?;
        self.record(Action::ScrollIntoView(node));
        Ok(())
    }

    async fn focus(&self, node: NodeHandle) -> Result<(), SurfaceError> {
        self.with_node(node, |_| ())?;
        self.record(Action::Focus(node));
        Ok(())
    }

    async fn set_text_content(&self, node: NodeHandle, text: &str) -> Result<(), SurfaceError> {
        {
            let mut state = self.state.lock().unwrap();
            let spec = state
                .nodes
                .get_mut(&node.0)
                .ok_or(SurfaceError::StaleNode(node))?;
            spec.text = text.to_string();
        }
        self.record(Action::SetText(node, text.to_string()));
        Ok(())
    }

    async fn set_native_value(&self, node: NodeHandle, value: &str) -> Result<(), SurfaceError> {
        {
            let mut state = self.state.lock().unwrap();
            let spec = state
                .nodes
                .get_mut(&node.0)
                .ok_or(SurfaceError::StaleNode(node))?;
            spec.text = value.to_string();
        }
        self.record(Action::SetNativeValue(node, value.to_string()));
        Ok(())
    }

    async fn dispatch_input(
        &self,
        node: NodeHandle,
        intent: &InputIntent,
    ) -> Result<(), SurfaceError> {
        self.with_node(node, |_| ())?;
        self.record(Action::Input(node, intent.input_type().to_string()));
        Ok(())
    }

    async fn dispatch_generic(&self, node: NodeHandle, event: &str) -> Result<(), SurfaceError> {
        self.with_node(node, |_| ())?;
        self.record(Action::Generic(node, event.to_string()));
        Ok(())
    }

    async fn dispatch_key_triplet(
        &self,
        node: NodeHandle,
        combo: &KeyCombo,
    ) -> Result<(), SurfaceError> {
        self.with_node(node, |_| ())?;
        self.record(Action::Key(node, combo.key.clone(), combo.ctrl, combo.meta));
        Ok(())
    }

    async fn click(&self, node: NodeHandle) -> Result<(), SurfaceError> {
        self.with_node(node, |_| ())?;
        self.record(Action::Click(node));
        Ok(())
    }

    async fn enclosing_form(
        &self,
        node: NodeHandle,
    ) -> Result<Option<NodeHandle>, SurfaceError> {
        self.with_node(node, |spec| spec.form)
    }

    async fn form_capabilities(&self, form: NodeHandle) -> Result<FormCapabilities, SurfaceError> {
        self.with_node(form, |spec| spec.capabilities)
    }

    async fn request_submit(&self, form: NodeHandle) -> Result<(), SurfaceError> {
        self.with_node(form, |_| ())?;
        self.record(Action::RequestSubmit(form));
        Ok(())
    }

    async fn raw_submit(&self, form: NodeHandle) -> Result<(), SurfaceError> {
        self.with_node(form, |_| ())?;
        self.record(Action::RawSubmit(form));
        Ok(())
    }

    async fn dispatch_submit_event(&self, form: NodeHandle) -> Result<bool, SurfaceError> {
        let not_cancelled = self.with_node(form, |spec| !spec.cancel_submit_event)?;
        self.record(Action::SubmitEvent(form));
        Ok(not_cancelled)
    }

    async fn has_streaming_ancestor(
        &self,
        node: NodeHandle,
        _marker_class: &str,
    ) -> Result<bool, SurfaceError> {
        self.with_node(node, |spec| spec.streaming)
    }

    async fn subscribe_mutations(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<MutationEvent>, SurfaceError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap();
        state.subscribers.push(tx);
        state.subscription_count += 1;
        Ok(rx)
    }

    async fn reset_handles(&self) -> Result<(), SurfaceError> {
        self.state.lock().unwrap().reset_count += 1;
        Ok(())
    }
}
