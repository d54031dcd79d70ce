//! Live-page [`DocumentSurface`] backed by chromiumoxide.
//!
//! Every trait method evaluates a small JS snippet against the page. Element
//! identity crosses the CDP boundary as integer ids held by the in-page node
//! registry (`window.__askrunner`), so handles stay valid across evaluate
//! calls without pinning remote objects.
//!
//! CDP has no DOM-mutation event stream, so `subscribe_mutations` installs a
//! page-side `MutationObserver` that buffers change kinds, and a polling task
//! drains the buffer on an interval and forwards events over a channel.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::page::Page as ChromiumPage;
use serde_json::Value as JsonValue;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{self, MissedTickBehavior};

use crate::dom_scripts::surface_helpers_script;
use crate::surface::{
    DocumentSurface, FormCapabilities, InputIntent, KeyCombo, MutationEvent, MutationKind,
    NodeHandle, SurfaceError,
};

pub struct ChromiumSurface {
    page: ChromiumPage,
    mutation_poll: Duration,
    helpers_ready: Mutex<bool>,
}

impl ChromiumSurface {
    pub fn new(page: ChromiumPage, mutation_poll: Duration) -> Self {
        ChromiumSurface {
            page,
            mutation_poll,
            helpers_ready: Mutex::new(false),
        }
    }

    /// Install the helper bundle once: on every future document via
    /// `evaluate_on_new_document`, and immediately so the helpers are
    /// available right away.
    async fn ensure_helpers(&self) -> Result<(), SurfaceError> {
        let mut ready = self.helpers_ready.lock().await;
        if *ready {
            return Ok(());
        }
        let script = surface_helpers_script();
        self.page
            .evaluate_on_new_document(script)
            .await
            .map_err(map_cdp_error)?;
        self.page.evaluate(script).await.map_err(map_cdp_error)?;
        *ready = true;
        Ok(())
    }

    async fn eval(&self, expression: &str) -> Result<JsonValue, SurfaceError> {
        self.ensure_helpers().await?;
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(map_cdp_error)?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    /// Evaluate a snippet with the element bound to `el`; `null` from the
    /// registry means the handle went stale.
    async fn eval_on_node(&self, node: NodeHandle, body: &str) -> Result<JsonValue, SurfaceError> {
        let script = format!(
            "(() => {{
                const el = window.__askrunner.get({id});
                if (!el) {{ return {{ stale: true }}; }}
                {body}
            }})()",
            id = node.0,
            body = body,
        );
        let value = self.eval(&script).await?;
        if value
            .get("stale")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
        {
            return Err(SurfaceError::StaleNode(node));
        }
        Ok(value)
    }

    fn handles_from(value: &JsonValue) -> Vec<NodeHandle> {
        value
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(JsonValue::as_u64)
                    .map(NodeHandle)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn map_cdp_error<E: std::fmt::Display>(err: E) -> SurfaceError {
    SurfaceError::Evaluation(err.to_string())
}

fn json_str(value: &str) -> Result<String, SurfaceError> {
    serde_json::to_string(value).map_err(map_cdp_error)
}

#[async_trait]
impl DocumentSurface for ChromiumSurface {
    async fn query_all_deep(&self, selector: &str) -> Result<Vec<NodeHandle>, SurfaceError> {
        let selector_json = json_str(selector)?;
        let script = format!(
            "window.__askrunner.queryAllDeep({selector_json}).map((el) => window.__askrunner.register(el))"
        );
        let value = self.eval(&script).await?;
        Ok(Self::handles_from(&value))
    }

    async fn query_within(
        &self,
        root: Option<NodeHandle>,
        selector: &str,
    ) -> Result<Vec<NodeHandle>, SurfaceError> {
        let selector_json = json_str(selector)?;
        let value = match root {
            Some(root) => {
                let body = format!(
                    "return {{ ids: [...el.querySelectorAll({selector_json})].map((m) => window.__askrunner.register(m)) }};"
                );
                let result = self.eval_on_node(root, &body).await?;
                result.get("ids").cloned().unwrap_or(JsonValue::Null)
            }
            None => {
                let script = format!(
                    "[...document.querySelectorAll({selector_json})].map((el) => window.__askrunner.register(el))"
                );
                self.eval(&script).await?
            }
        };
        Ok(Self::handles_from(&value))
    }

    async fn is_visible(&self, node: NodeHandle) -> Result<bool, SurfaceError> {
        let value = self
            .eval_on_node(node, "return { value: window.__askrunner.visible(el) };")
            .await?;
        Ok(value
            .get("value")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false))
    }

    async fn inner_text(&self, node: NodeHandle) -> Result<String, SurfaceError> {
        let value = self
            .eval_on_node(node, "return { value: el.innerText || el.textContent || '' };")
            .await?;
        Ok(value
            .get("value")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn is_editable_region(&self, node: NodeHandle) -> Result<bool, SurfaceError> {
        let value = self
            .eval_on_node(
                node,
                "return { value: el.isContentEditable === true || el.getAttribute('contenteditable') === 'true' };",
            )
            .await?;
        Ok(value
            .get("value")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false))
    }

    async fn scroll_into_view(&self, node: NodeHandle) -> Result<(), SurfaceError> {
        self.eval_on_node(
            node,
            "el.scrollIntoView({ block: 'center', inline: 'center' }); return {};",
        )
        .await?;
        Ok(())
    }

    async fn focus(&self, node: NodeHandle) -> Result<(), SurfaceError> {
        self.eval_on_node(node, "el.focus(); return {};").await?;
        Ok(())
    }

    async fn set_text_content(&self, node: NodeHandle, text: &str) -> Result<(), SurfaceError> {
        let text_json = json_str(text)?;
        let body = format!("el.textContent = {text_json}; return {{}};");
        self.eval_on_node(node, &body).await?;
        Ok(())
    }

    async fn set_native_value(&self, node: NodeHandle, value: &str) -> Result<(), SurfaceError> {
        let value_json = json_str(value)?;
        // Use the prototype's value setter so framework wrappers on the
        // instance cannot swallow the assignment.
        let body = format!(
            "const proto = Object.getPrototypeOf(el);
             const desc = Object.getOwnPropertyDescriptor(proto, 'value');
             if (desc && desc.set) {{
                 desc.set.call(el, {value_json});
             }} else {{
                 el.value = {value_json};
             }}
             return {{}};"
        );
        self.eval_on_node(node, &body).await?;
        Ok(())
    }

    async fn dispatch_input(
        &self,
        node: NodeHandle,
        intent: &InputIntent,
    ) -> Result<(), SurfaceError> {
        let input_type = json_str(intent.input_type())?;
        let data = match intent.data() {
            Some(data) => json_str(data)?,
            None => "null".to_string(),
        };
        let body = format!(
            "const init = {{ bubbles: true, cancelable: true, inputType: {input_type}, data: {data} }};
             el.dispatchEvent(new InputEvent('beforeinput', init));
             el.dispatchEvent(new InputEvent('input', init));
             return {{}};"
        );
        self.eval_on_node(node, &body).await?;
        Ok(())
    }

    async fn dispatch_generic(&self, node: NodeHandle, event: &str) -> Result<(), SurfaceError> {
        let event_json = json_str(event)?;
        let body =
            format!("el.dispatchEvent(new Event({event_json}, {{ bubbles: true }})); return {{}};");
        self.eval_on_node(node, &body).await?;
        Ok(())
    }

    async fn dispatch_key_triplet(
        &self,
        node: NodeHandle,
        combo: &KeyCombo,
    ) -> Result<(), SurfaceError> {
        let key_json = json_str(&combo.key)?;
        let body = format!(
            "const init = {{
                 key: {key}, code: {key}, bubbles: true, cancelable: true,
                 ctrlKey: {ctrl}, metaKey: {meta}, shiftKey: {shift},
             }};
             for (const type of ['keydown', 'keypress', 'keyup']) {{
                 el.dispatchEvent(new KeyboardEvent(type, init));
             }}
             return {{}};",
            key = key_json,
            ctrl = combo.ctrl,
            meta = combo.meta,
            shift = combo.shift,
        );
        self.eval_on_node(node, &body).await?;
        Ok(())
    }

    async fn click(&self, node: NodeHandle) -> Result<(), SurfaceError> {
        self.eval_on_node(node, "el.click(); return {};").await?;
        Ok(())
    }

    async fn enclosing_form(
        &self,
        node: NodeHandle,
    ) -> Result<Option<NodeHandle>, SurfaceError> {
        let value = self
            .eval_on_node(
                node,
                "const form = el.form || el.closest('form');
                 return { id: form ? window.__askrunner.register(form) : null };",
            )
            .await?;
        Ok(value.get("id").and_then(JsonValue::as_u64).map(NodeHandle))
    }

    async fn form_capabilities(&self, form: NodeHandle) -> Result<FormCapabilities, SurfaceError> {
        let value = self
            .eval_on_node(
                form,
                "return {
                     requestSubmit: typeof el.requestSubmit === 'function',
                     rawSubmit: typeof el.submit === 'function',
                 };",
            )
            .await?;
        Ok(FormCapabilities {
            request_submit: value
                .get("requestSubmit")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false),
            raw_submit: value
                .get("rawSubmit")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false),
        })
    }

    async fn request_submit(&self, form: NodeHandle) -> Result<(), SurfaceError> {
        self.eval_on_node(form, "el.requestSubmit(); return {};")
            .await?;
        Ok(())
    }

    async fn raw_submit(&self, form: NodeHandle) -> Result<(), SurfaceError> {
        self.eval_on_node(form, "el.submit(); return {};").await?;
        Ok(())
    }

    async fn dispatch_submit_event(&self, form: NodeHandle) -> Result<bool, SurfaceError> {
        let value = self
            .eval_on_node(
                form,
                "const event = new Event('submit', { bubbles: true, cancelable: true });
                 return { value: el.dispatchEvent(event) };",
            )
            .await?;
        Ok(value
            .get("value")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false))
    }

    async fn has_streaming_ancestor(
        &self,
        node: NodeHandle,
        marker_class: &str,
    ) -> Result<bool, SurfaceError> {
        let marker_json = json_str(marker_class)?;
        let body = format!(
            "let current = el;
             while (current) {{
                 if (current.classList && current.classList.contains({marker_json})) {{
                     return {{ value: true }};
                 }}
                 current = current.parentElement;
             }}
             return {{ value: false }};"
        );
        let value = self.eval_on_node(node, &body).await?;
        Ok(value
            .get("value")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false))
    }

    async fn subscribe_mutations(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<MutationEvent>, SurfaceError> {
        // The returned epoch scopes this subscription's observer. A newer
        // subscription bumps it, turning this poller's drain and teardown
        // calls into no-ops instead of letting them touch the new observer.
        let epoch = self
            .eval("window.__askrunner.startObserver()")
            .await?
            .as_u64()
            .unwrap_or(0);

        let (tx, rx) = mpsc::unbounded_channel();
        let page = self.page.clone();
        let poll = self.mutation_poll;
        let drain_expr = format!("window.__askrunner.drainMutations({epoch})");
        let stop_expr = format!("window.__askrunner.stopObserver({epoch})");

        tokio::spawn(async move {
            let mut tick = time::interval(poll);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                if tx.is_closed() {
                    break;
                }
                let drained = match page.evaluate(drain_expr.as_str()).await {
                    Ok(result) => result.value().cloned().unwrap_or(JsonValue::Null),
                    Err(_) => break,
                };
                // Null means the epoch was superseded; the observer is no
                // longer ours to poll.
                let Some(kinds) = drained.as_array() else {
                    break;
                };
                for kind in kinds {
                    let kind = match kind.as_str() {
                        Some("characterData") => MutationKind::CharacterData,
                        _ => MutationKind::ChildList,
                    };
                    if tx.send(MutationEvent { kind }).is_err() {
                        break;
                    }
                }
            }
            let _ = page.evaluate(stop_expr.as_str()).await;
        });

        Ok(rx)
    }

    async fn reset_handles(&self) -> Result<(), SurfaceError> {
        self.eval("window.__askrunner.reset()").await?;
        Ok(())
    }
}
