use leptos::ev;
use leptos::html;
use leptos::prelude::*;
use leptos::task::spawn_local;
use log::{debug, info, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use crate::api::NotesApi;
use crate::autosave::{PendingSave, SaveScheduler};
use crate::browser::{MoveDialog, NoteBrowser, SortKey};
use crate::cache::{Resolution, ResolutionCache};
use crate::config::ClientConfig;
use crate::editor::{byte_to_utf16, utf16_to_byte, EditorBuffer, Selection};
use crate::error::EditError;
use crate::models::{NoteKind, QuestionSummary, ROOT_NOTE_ID};
use crate::picker::{filter_questions, PracticeSession};
use crate::reference::Reference;
use crate::render::{markdown_to_html, render};
use crate::resolver::{ensure_question, resolve_pass, QuestionLookup};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ViewMode {
    Read,
    Edit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ToastKind {
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
struct Toast {
    id: u64,
    message: String,
    kind: ToastKind,
}

#[derive(Clone, Debug)]
enum EditCommand {
    Wrap {
        prefix: &'static str,
        suffix: &'static str,
    },
    Insert(Reference),
}

const TOOLBAR: [(&str, &str, &str); 5] = [
    ("B", "**", "**"),
    ("I", "*", "*"),
    ("H", "## ", ""),
    ("Code", "`", "`"),
    ("Math", "$", "$"),
];

fn textarea_selection(area: &web_sys::HtmlTextAreaElement, text: &str) -> Selection {
    let start = area.selection_start().ok().flatten().unwrap_or(0);
    let end = area.selection_end().ok().flatten().unwrap_or(start);
    Selection::new(
        utf16_to_byte(text, start as usize),
        utf16_to_byte(text, end as usize),
    )
}

fn after_delay(callback: impl FnOnce() + 'static, delay_ms: i32) {
    let callback = Closure::once_into_js(callback);
    if window()
        .set_timeout_with_callback_and_timeout_and_arguments_0(callback.as_ref().unchecked_ref(), delay_ms)
        .is_err()
    {
        warn!("event=set_timeout module=ui status=error");
    }
}

/// Asks MathJax, when the page loaded it, to typeset everything on screen.
async fn typeset_math() {
    let win: JsValue = window().into();
    let Ok(mathjax) = js_sys::Reflect::get(&win, &JsValue::from_str("MathJax")) else {
        return;
    };
    if mathjax.is_undefined() || mathjax.is_null() {
        return;
    }
    let Ok(typeset) = js_sys::Reflect::get(&mathjax, &JsValue::from_str("typesetPromise")) else {
        return;
    };
    let Some(typeset) = typeset.dyn_ref::<js_sys::Function>() else {
        return;
    };
    match typeset.call0(&mathjax) {
        Ok(promise) => {
            if let Ok(promise) = promise.dyn_into::<js_sys::Promise>() {
                if let Err(err) = JsFuture::from(promise).await {
                    warn!("event=typeset module=ui status=error error={err:?}");
                }
            }
        }
        Err(err) => warn!("event=typeset module=ui status=error error={err:?}"),
    }
}

#[component]
pub fn App(config: ClientConfig) -> impl IntoView {
    let origin = window().location().origin().unwrap_or_default();
    let api = StoredValue::new(NotesApi::new(&config.api_url(&origin)));
    let settings = RwSignal::new(config);

    let cache = RwSignal::new(ResolutionCache::default());
    let browser = RwSignal::new(NoteBrowser::default());
    let buffer = RwSignal::new(EditorBuffer::default());
    let scheduler = RwSignal::new(SaveScheduler::default());
    let mode = RwSignal::new(ViewMode::Read);

    let toast = RwSignal::new(None::<Toast>);
    let toast_seq = StoredValue::new(0u64);

    let questions = RwSignal::new(None::<Vec<QuestionSummary>>);
    let picker_open = RwSignal::new(false);
    let picker_query = RwSignal::new(String::new());
    let practice = RwSignal::new(None::<PracticeSession>);
    let awaiting_question = RwSignal::new(None::<String>);
    let move_dialog = RwSignal::new(None::<MoveDialog>);
    let settings_open = RwSignal::new(false);
    let dragging = RwSignal::new(None::<usize>);

    let editor_ref: NodeRef<html::Textarea> = NodeRef::new();

    let rendered = Memo::new(move |_| buffer.with(|b| cache.with(|c| render(&b.text, c))));

    let show_toast = move |message: String, kind: ToastKind| {
        toast_seq.update_value(|n| *n += 1);
        let id = toast_seq.get_value();
        toast.set(Some(Toast { id, message, kind }));
        let duration = settings.with_untracked(|s| s.toast_duration_ms) as i32;
        after_delay(
            move || {
                toast.update(|t| {
                    if t.as_ref().is_some_and(|t| t.id == id) {
                        *t = None;
                    }
                })
            },
            duration,
        );
    };

    let save_now = move |pending: PendingSave| {
        spawn_local(async move {
            let api = api.get_value();
            match api.save_note(&pending.note_id, &pending.content).await {
                Ok(()) => {
                    info!("event=save_note module=ui status=ok id={}", pending.note_id);
                    show_toast("Saved".to_string(), ToastKind::Info);
                }
                // The next edit re-arms the debounce, so a failed save is retried then.
                Err(err) => warn!(
                    "event=save_note module=ui status=error id={} error={err}",
                    pending.note_id
                ),
            }
        });
    };

    let flush_save = move || {
        if let Some(pending) = scheduler.try_update(|s| s.flush()).flatten() {
            save_now(pending);
        }
    };

    let schedule_save = move || {
        let Some(note_id) = browser.with_untracked(|b| {
            b.current()
                .filter(|view| view.is_file())
                .map(|view| view.info.id.clone())
        }) else {
            return;
        };
        let content = buffer.with_untracked(|b| b.text.clone());
        let Some(ticket) = scheduler.try_update(|s| s.schedule(&note_id, content)) else {
            return;
        };
        let delay = settings.with_untracked(|s| s.autosave_delay_ms) as i32;
        after_delay(
            move || {
                if let Some(pending) = scheduler.try_update(|s| s.take_due(ticket)).flatten() {
                    save_now(pending);
                }
            },
            delay,
        );
    };

    let open_note = move |id: String, remember: bool| {
        flush_save();
        let Some(ticket) = browser.try_update(NoteBrowser::begin_load) else {
            return;
        };
        spawn_local(async move {
            let api = api.get_value();
            match api.load_note(&id).await {
                Ok(view) => {
                    let (kind, items) = (view.info.kind, view.items.len());
                    let content = view.is_file().then(|| view.content.clone().unwrap_or_default());
                    let shown = browser
                        .try_update(|b| b.finish_load(ticket, view, remember))
                        .unwrap_or(false);
                    if !shown {
                        debug!("event=open_note module=ui status=stale id={id}");
                        return;
                    }
                    info!(
                        "event=open_note module=ui status=ok id={id} kind={} items={items}",
                        kind.as_str()
                    );
                    buffer.set(EditorBuffer::new(content.unwrap_or_default()));
                    mode.set(ViewMode::Read);
                    picker_open.set(false);
                }
                Err(err) => {
                    warn!("event=open_note module=ui status=error id={id} error={err}");
                    show_toast(format!("Could not open note: {err}"), ToastKind::Error);
                }
            }
        });
    };

    let go_back = move || {
        if let Some(id) = browser.try_update(|b| b.back()).flatten() {
            open_note(id, false);
        }
    };

    let set_mode = move |next: ViewMode| {
        if next == ViewMode::Read {
            flush_save();
            picker_open.set(false);
        }
        mode.set(next);
    };

    let apply_edit = move |command: EditCommand| {
        let dom_selection = editor_ref
            .get_untracked()
            .map(|area| buffer.with_untracked(|b| textarea_selection(&area, &b.text)));
        let result = buffer.try_update(|b| -> Result<_, EditError> {
            if let Some(selection) = dom_selection {
                b.set_selection(selection)?;
            }
            match &command {
                EditCommand::Wrap { prefix, suffix } => b.insert_text(prefix, suffix),
                EditCommand::Insert(reference) => b.insert_reference(reference),
            }
        });
        match result {
            Some(Ok(outcome)) => {
                debug!(
                    "event=edit module=ui status=ok command={command:?} revision={}",
                    outcome.revision
                );
                if outcome.text_changed {
                    schedule_save();
                }
            }
            Some(Err(err)) => {
                warn!("event=edit module=ui status=error command={command:?} error={err}");
                return;
            }
            None => return,
        }

        let (start, end) = buffer.with_untracked(|b| {
            (
                byte_to_utf16(&b.text, b.selection.start),
                byte_to_utf16(&b.text, b.selection.end),
            )
        });
        after_delay(
            move || {
                if let Some(area) = editor_ref.get_untracked() {
                    let _ = area.focus();
                    let _ = area.set_selection_range(start as u32, end as u32);
                }
            },
            0,
        );
    };

    let on_editor_input = move |ev: ev::Event| {
        let area: web_sys::HtmlTextAreaElement = event_target(&ev);
        let text = area.value();
        let selection = textarea_selection(&area, &text);
        let changed = buffer
            .try_update(|b| b.replace_from_input(text, selection).text_changed)
            .unwrap_or(false);
        if changed {
            schedule_save();
        }
    };

    let open_question = move |id: String| {
        spawn_local(async move {
            let api = api.get_value();
            match ensure_question(&api, &cache, &id).await {
                QuestionLookup::Ready(record) => practice.set(Some(PracticeSession::new(record))),
                // Opened once the pending fetch settles, see the effect below.
                QuestionLookup::InFlight => awaiting_question.set(Some(id)),
                QuestionLookup::Unavailable => {
                    show_toast(format!("Question {id} is unavailable"), ToastKind::Error)
                }
            }
        });
    };

    let submit_answer = move || {
        let Some((q_id, choice)) =
            practice.with_untracked(|p| p.as_ref().and_then(PracticeSession::submission))
        else {
            return;
        };
        spawn_local(async move {
            let api = api.get_value();
            match api.submit_answer(&q_id, &choice).await {
                Ok(feedback) => {
                    info!(
                        "event=submit_answer module=ui status=ok id={q_id} correct={}",
                        feedback.is_correct
                    );
                    practice.update(|p| {
                        if let Some(session) = p.as_mut().filter(|s| s.question.id == q_id) {
                            session.feedback = Some(feedback);
                        }
                    });
                }
                Err(err) => {
                    warn!("event=submit_answer module=ui status=error id={q_id} error={err}");
                    show_toast(format!("Submit failed: {err}"), ToastKind::Error);
                }
            }
        });
    };

    let on_preview_click = move |ev: ev::MouseEvent| {
        let Some(target) = ev
            .target()
            .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
        else {
            return;
        };
        if let Ok(Some(link)) = target.closest("[data-note-link]") {
            if let Some(id) = link.get_attribute("data-note-link") {
                open_note(id, true);
            }
            return;
        }
        if let Ok(Some(card)) = target.closest("[data-question-card]") {
            if let Some(id) = card.get_attribute("data-question-card") {
                open_question(id);
            }
        }
    };

    let persist_order = move || {
        let (parent, order) = browser.with_untracked(|b| (b.parent_folder(), b.order()));
        spawn_local(async move {
            let api = api.get_value();
            if let Err(err) = api.reorder(&parent, &order).await {
                warn!("event=reorder module=ui status=error parent={parent} error={err}");
                show_toast(format!("Reorder failed: {err}"), ToastKind::Error);
            }
        });
    };

    let refresh_listing = move |parent: String| {
        spawn_local(async move {
            let api = api.get_value();
            match api.load_note(&parent).await {
                Ok(view) => {
                    browser.update(|b| {
                        b.refresh_listing(&parent, view.items);
                    });
                }
                Err(err) => warn!("event=refresh_listing module=ui status=error id={parent} error={err}"),
            }
        });
    };

    let create_item = move |kind: NoteKind| {
        let label = match kind {
            NoteKind::File => "New note name",
            NoteKind::Folder => "New folder name",
        };
        let Ok(Some(raw)) = window().prompt_with_message(label) else {
            return;
        };
        let name = raw.trim().to_string();
        if name.is_empty() {
            return;
        }
        let parent = browser.with_untracked(NoteBrowser::parent_folder);
        spawn_local(async move {
            let api = api.get_value();
            if let Err(err) = api.create_item(&name, kind, &parent).await {
                warn!("event=create_item module=ui status=error parent={parent} error={err}");
                show_toast(format!("Create failed: {err}"), ToastKind::Error);
                return;
            }
            info!(
                "event=create_item module=ui status=ok parent={parent} kind={}",
                kind.as_str()
            );
            refresh_listing(parent);
        });
    };

    let rename_item = move |id: String, current_name: String| {
        let Ok(Some(raw)) = window().prompt_with_message_and_default("Rename to", &current_name)
        else {
            return;
        };
        let name = raw.trim().to_string();
        if name.is_empty() || name == current_name {
            return;
        }
        browser.update(|b| {
            b.rename_local(&id, &name);
        });
        cache.update(|c| {
            if c.note(&id).and_then(Resolution::ready).is_some() {
                c.store_note(id.clone(), name.clone());
            }
        });
        spawn_local(async move {
            let api = api.get_value();
            match api.rename_item(&id, &name).await {
                Ok(()) => info!("event=rename_item module=ui status=ok id={id}"),
                Err(err) => {
                    warn!("event=rename_item module=ui status=error id={id} error={err}");
                    show_toast(format!("Rename failed: {err}"), ToastKind::Error);
                }
            }
        });
    };

    let delete_item = move |id: String, name: String| {
        let confirmed = window()
            .confirm_with_message(&format!("Delete \"{name}\"?"))
            .unwrap_or(false);
        if !confirmed {
            return;
        }
        let navigate_to = browser.try_update(|b| b.remove_local(&id)).flatten();
        if navigate_to.is_some() {
            // Pending edits belong to the note being deleted.
            scheduler.update(|s| {
                s.flush();
            });
        }
        spawn_local(async move {
            let api = api.get_value();
            match api.delete_item(&id).await {
                Ok(()) => info!("event=delete_item module=ui status=ok id={id}"),
                Err(err) => {
                    warn!("event=delete_item module=ui status=error id={id} error={err}");
                    show_toast(format!("Delete failed: {err}"), ToastKind::Error);
                }
            }
        });
        if let Some(parent) = navigate_to {
            open_note(parent, false);
        }
    };

    let browse_move_folder = move |folder_id: String| {
        spawn_local(async move {
            let api = api.get_value();
            match api.load_note(&folder_id).await {
                Ok(view) => move_dialog.update(|dialog| {
                    if let Some(dialog) = dialog.as_mut() {
                        dialog.show_folder(&view);
                    }
                }),
                Err(err) => {
                    warn!("event=move_browse module=ui status=error id={folder_id} error={err}");
                    show_toast(format!("Could not load folders: {err}"), ToastKind::Error);
                }
            }
        });
    };

    let prompt_move = move |id: String, name: String| {
        move_dialog.set(Some(MoveDialog::new(&id, &name)));
        browse_move_folder(ROOT_NOTE_ID.to_string());
    };

    let submit_move = move || {
        let Some((id, target)) = move_dialog.with_untracked(|dialog| {
            dialog
                .as_ref()
                .and_then(|d| d.target().map(|t| (d.item_id.clone(), t.to_string())))
        }) else {
            return;
        };
        move_dialog.set(None);
        let parent = browser.with_untracked(NoteBrowser::parent_folder);
        if target == parent {
            return;
        }
        browser.update(|b| {
            b.move_out(&id);
        });
        spawn_local(async move {
            let api = api.get_value();
            match api.move_item(&id, &target).await {
                Ok(()) => {
                    info!("event=move_item module=ui status=ok id={id} target={target}");
                    show_toast("Moved".to_string(), ToastKind::Info);
                }
                Err(err) => {
                    warn!("event=move_item module=ui status=error id={id} target={target} error={err}");
                    show_toast(format!("Move failed: {err}"), ToastKind::Error);
                    refresh_listing(parent);
                }
            }
        });
    };

    let sort_items = move |key: SortKey| {
        browser.update(|b| b.sort(key));
        persist_order();
    };

    let drop_on = move |to: usize| {
        let Some(from) = dragging.get_untracked() else {
            return;
        };
        dragging.set(None);
        let moved = browser.try_update(|b| b.move_item(from, to)).unwrap_or(false);
        if moved {
            persist_order();
        }
    };

    let open_picker = move || {
        picker_query.set(String::new());
        picker_open.set(true);
        if questions.with_untracked(Option::is_some) {
            return;
        }
        spawn_local(async move {
            let api = api.get_value();
            match api.list_questions().await {
                Ok(list) => {
                    info!("event=list_questions module=ui status=ok count={}", list.len());
                    questions.set(Some(list));
                }
                Err(err) => {
                    warn!("event=list_questions module=ui status=error error={err}");
                    show_toast(format!("Could not load questions: {err}"), ToastKind::Error);
                }
            }
        });
    };

    let persist_settings = move || {
        if let Err(err) = settings.with_untracked(ClientConfig::store) {
            warn!("event=save_settings module=ui status=error error={err}");
        }
    };

    Effect::new(move |_| open_note(ROOT_NOTE_ID.to_string(), false));

    Effect::new(move |_| {
        let Some(id) = awaiting_question.get() else {
            return;
        };
        match cache.with(|c| c.question(&id).cloned()) {
            Some(Resolution::Ready(record)) => {
                awaiting_question.set(None);
                practice.set(Some(PracticeSession::new(record)));
            }
            Some(Resolution::Failed) => {
                awaiting_question.set(None);
                show_toast(format!("Question {id} is unavailable"), ToastKind::Error);
            }
            Some(Resolution::Pending) | None => {}
        }
    });

    // Placeholders left by the last render are resolved, then math is typeset
    // on whatever is on screen. Each settled fetch re-renders through `cache`.
    Effect::new(move |_| {
        let unresolved = rendered.with(|r| r.unresolved.clone());
        let _ = mode.get();
        let _ = practice.with(Option::is_some);
        spawn_local(async move {
            if !unresolved.is_empty() {
                let api = api.get_value();
                let report = resolve_pass(&api, &cache, &unresolved).await;
                if report.failed > 0 {
                    debug!(
                        "event=resolve module=ui status=partial resolved={} failed={}",
                        report.resolved, report.failed
                    );
                }
            }
            typeset_math().await;
        });
    });

    let breadcrumbs_view = move || {
        browser
            .with(|b| b.current().map(|v| v.breadcrumbs.clone()).unwrap_or_default())
            .into_iter()
            .map(|crumb| {
                let id = crumb.id.clone();
                view! {
                    <span
                        class="breadcrumb"
                        style="cursor: pointer; color: var(--text-muted);"
                        on:click=move |_| open_note(id.clone(), true)
                    >
                        {crumb.name}
                        " / "
                    </span>
                }
            })
            .collect::<Vec<_>>()
    };

    let items_view = move || {
        let editing = mode.get() == ViewMode::Edit;
        let active = browser.with(|b| b.current_id().map(str::to_string));
        browser
            .with(|b| b.items().to_vec())
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let is_active = active.as_deref() == Some(item.id.as_str());
                let is_file = item.kind == NoteKind::File;
                let open_id = item.id.clone();
                let drag_id = item.id.clone();
                let link_id = item.id.clone();
                let (rename_id, rename_name) = (item.id.clone(), item.name.clone());
                let (move_id, move_name) = (item.id.clone(), item.name.clone());
                let (delete_id, delete_name) = (item.id.clone(), item.name.clone());
                view! {
                    <div
                        class=format!("note-item note-item-{}", item.kind.as_str())
                        draggable="true"
                        style=format!(
                            "display: flex; align-items: center; gap: 0.25rem; padding: 0.4rem 0.6rem; border-radius: var(--radius-md); cursor: pointer; {}",
                            if is_active { "background: var(--accent-color); color: white;" } else { "color: var(--text-secondary);" }
                        )
                        on:dragstart=move |ev: ev::DragEvent| {
                            if let Some(transfer) = ev.data_transfer() {
                                let _ = transfer.set_data("text/plain", &drag_id);
                            }
                            dragging.set(Some(index));
                        }
                        on:dragover=move |ev: ev::DragEvent| ev.prevent_default()
                        on:drop=move |ev: ev::DragEvent| {
                            ev.prevent_default();
                            drop_on(index);
                        }
                    >
                        <span style="flex: 1;" on:click=move |_| open_note(open_id.clone(), true)>
                            {if is_file { "📄 " } else { "📁 " }}
                            {item.name.clone()}
                        </span>
                        {(editing && is_file).then(|| view! {
                            <button
                                class="icon-button"
                                title="Insert link"
                                on:click=move |ev: ev::MouseEvent| {
                                    ev.stop_propagation();
                                    apply_edit(EditCommand::Insert(Reference::note(link_id.clone())));
                                }
                            >
                                "🔗"
                            </button>
                        })}
                        <button
                            class="icon-button"
                            title="Rename"
                            on:click=move |ev: ev::MouseEvent| {
                                ev.stop_propagation();
                                rename_item(rename_id.clone(), rename_name.clone());
                            }
                        >
                            "✎"
                        </button>
                        <button
                            class="icon-button"
                            title="Move to folder"
                            on:click=move |ev: ev::MouseEvent| {
                                ev.stop_propagation();
                                prompt_move(move_id.clone(), move_name.clone());
                            }
                        >
                            "⇄"
                        </button>
                        <button
                            class="icon-button"
                            title="Delete"
                            on:click=move |ev: ev::MouseEvent| {
                                ev.stop_propagation();
                                delete_item(delete_id.clone(), delete_name.clone());
                            }
                        >
                            "✕"
                        </button>
                    </div>
                }
            })
            .collect::<Vec<_>>()
    };

    let picker_view = move || {
        let query = picker_query.get();
        questions.with(|all| match all {
            None => view! { <div class="picker-empty">"Loading questions..."</div> }.into_any(),
            Some(all) => {
                let shown = filter_questions(all, &query)
                    .into_iter()
                    .cloned()
                    .collect::<Vec<_>>();
                if shown.is_empty() {
                    return view! { <div class="picker-empty">"No matching questions"</div> }.into_any();
                }
                shown
                    .into_iter()
                    .map(|question| {
                        let id = question.id.clone();
                        view! {
                            <div
                                class="picker-item"
                                style="padding: 0.4rem 0.6rem; cursor: pointer; border-bottom: 1px solid var(--border-color);"
                                on:click=move |_| {
                                    apply_edit(EditCommand::Insert(Reference::question(id.clone())));
                                    picker_open.set(false);
                                }
                            >
                                <strong>{question.id.clone()}</strong>
                                " "
                                <span style="color: var(--text-muted);">
                                    {question.summary.clone().unwrap_or_default()}
                                </span>
                            </div>
                        }
                    })
                    .collect::<Vec<_>>()
                    .into_any()
            }
        })
    };

    let practice_view = move || {
        practice.get().map(|session| {
            let options = session
                .question
                .options
                .iter()
                .map(|option| {
                    let class = session.option_state(&option.id).class();
                    let option_id = option.id.clone();
                    view! {
                        <button
                            class=class
                            style="display: block; width: 100%; text-align: left; margin-bottom: 0.5rem;"
                            on:click=move |_| practice.update(|p| {
                                if let Some(session) = p.as_mut() {
                                    session.select(&option_id);
                                }
                            })
                        >
                            <strong>{option.id.clone()} ". "</strong>
                            <span class="math-content">{option.text.clone()}</span>
                        </button>
                    }
                })
                .collect::<Vec<_>>();
            let can_submit = session.submission().is_some();
            let verdict = session.feedback.as_ref().map(|feedback| {
                let explanation = feedback
                    .explanation
                    .clone()
                    .or_else(|| session.question.analysis.clone())
                    .unwrap_or_default();
                view! {
                    <div class={if feedback.is_correct { "feedback feedback-correct" } else { "feedback feedback-wrong" }}>
                        <strong>{if feedback.is_correct { "Correct" } else { "Incorrect" }}</strong>
                        <div class="math-content" inner_html=markdown_to_html(&explanation)></div>
                    </div>
                }
            });
            view! {
                <div class="modal-backdrop" on:click=move |_| practice.set(None)>
                    <div class="modal" on:click=move |ev: ev::MouseEvent| ev.stop_propagation()>
                        <header style="display: flex; justify-content: space-between; align-items: center;">
                            <h3 style="margin: 0;">{session.question.id.clone()}</h3>
                            <button class="icon-button" on:click=move |_| practice.set(None)>"✕"</button>
                        </header>
                        <div class="math-content" inner_html=markdown_to_html(&session.question.content)></div>
                        <div class="options">{options}</div>
                        {verdict}
                        <button
                            class="primary-button"
                            disabled=!can_submit
                            on:click=move |_| submit_answer()
                        >
                            "Submit"
                        </button>
                    </div>
                </div>
            }
        })
    };

    let move_view = move || {
        move_dialog.get().map(|dialog| {
            let crumbs = dialog
                .breadcrumbs
                .iter()
                .map(|crumb| {
                    let id = crumb.id.clone();
                    view! {
                        <span style="cursor: pointer;" on:click=move |_| browse_move_folder(id.clone())>
                            " / "
                            {crumb.name.clone()}
                        </span>
                    }
                })
                .collect::<Vec<_>>();
            let folders = dialog
                .folders
                .iter()
                .map(|folder| {
                    let selected = dialog.selected.as_deref() == Some(folder.id.as_str());
                    let select_id = folder.id.clone();
                    let open_id = folder.id.clone();
                    view! {
                        <div
                            class="move-folder"
                            style=format!(
                                "display: flex; align-items: center; padding: 0.4rem 0.6rem; border-radius: var(--radius-md); cursor: pointer; {}",
                                if selected { "background: var(--accent-color); color: white;" } else { "" }
                            )
                            on:click=move |_| move_dialog.update(|d| {
                                if let Some(d) = d.as_mut() {
                                    d.select(&select_id);
                                }
                            })
                        >
                            <span style="flex: 1;">"📁 " {folder.name.clone()}</span>
                            <button
                                class="icon-button"
                                title="Open folder"
                                on:click=move |ev: ev::MouseEvent| {
                                    ev.stop_propagation();
                                    browse_move_folder(open_id.clone());
                                }
                            >
                                "›"
                            </button>
                        </div>
                    }
                })
                .collect::<Vec<_>>();
            let can_move = dialog.target().is_some();
            view! {
                <div class="modal-backdrop" on:click=move |_| move_dialog.set(None)>
                    <div class="modal" on:click=move |ev: ev::MouseEvent| ev.stop_propagation()>
                        <h3 style="margin-top: 0;">{format!("Move \"{}\"", dialog.item_name)}</h3>
                        <div style="font-size: 0.85em; color: var(--text-muted); margin-bottom: 0.5rem;">
                            <span
                                style="cursor: pointer;"
                                on:click=move |_| browse_move_folder(ROOT_NOTE_ID.to_string())
                            >
                                "Home"
                            </span>
                            {crumbs}
                        </div>
                        <div class="move-folders" style="max-height: 300px; overflow-y: auto; margin-bottom: 1rem;">
                            {folders}
                        </div>
                        <div style="display: flex; justify-content: flex-end; gap: 0.5rem;">
                            <button class="small-button" on:click=move |_| move_dialog.set(None)>"Cancel"</button>
                            <button
                                class="primary-button"
                                disabled=!can_move
                                on:click=move |_| submit_move()
                            >
                                "Move here"
                            </button>
                        </div>
                    </div>
                </div>
            }
        })
    };

    let settings_view = move || {
        settings_open.get().then(|| {
            view! {
                <div class="settings-panel" style="padding: 1rem; border-top: 1px solid var(--border-color); display: flex; flex-direction: column; gap: 0.5rem;">
                    <label style="font-size: 0.85em;">"Editor font size (px)"</label>
                    <input
                        type="number"
                        prop:value=move || settings.with(|s| s.font_size.to_string())
                        on:change=move |ev| {
                            if let Ok(size) = event_target_value(&ev).parse() {
                                settings.update(|s| s.font_size = size);
                                persist_settings();
                            }
                        }
                    />
                    <label style="font-size: 0.85em;">"Accent color"</label>
                    <input
                        type="color"
                        prop:value=move || settings.with(|s| s.accent_color.clone())
                        on:input=move |ev| {
                            settings.update(|s| s.accent_color = event_target_value(&ev));
                            persist_settings();
                        }
                    />
                    <label style="font-size: 0.85em;">"Auto-save delay (ms)"</label>
                    <input
                        type="number"
                        prop:value=move || settings.with(|s| s.autosave_delay_ms.to_string())
                        on:change=move |ev| {
                            if let Ok(delay) = event_target_value(&ev).parse() {
                                settings.update(|s| s.autosave_delay_ms = delay);
                                persist_settings();
                            }
                        }
                    />
                </div>
            }
        })
    };

    let note_pane = move || {
        let Some((title, is_file)) =
            browser.with(|b| b.current().map(|v| (v.info.name.clone(), v.is_file())))
        else {
            return view! {
                <div style="flex: 1; display: flex; align-items: center; justify-content: center; color: var(--text-muted);">
                    "Loading notes..."
                </div>
            }
            .into_any();
        };
        if !is_file {
            return view! {
                <div style="flex: 1; display: flex; align-items: center; justify-content: center; color: var(--text-muted);">
                    {format!("{title}: select a note from the sidebar to start reading.")}
                </div>
            }
            .into_any();
        }
        let editing = mode.get() == ViewMode::Edit;
        view! {
            <header class="topbar" style="height: var(--topbar-height); border-bottom: 1px solid var(--border-color); display: flex; align-items: center; gap: 0.5rem; padding: 0 1.5rem;">
                <strong style="flex: 1;">{title}</strong>
                {move || scheduler.with(SaveScheduler::is_dirty).then(|| view! {
                    <span style="color: var(--text-muted); font-size: 0.85em;">"Unsaved"</span>
                })}
                <button
                    class="mode-button"
                    on:click=move |_| set_mode(if editing { ViewMode::Read } else { ViewMode::Edit })
                >
                    {if editing { "Done" } else { "Edit" }}
                </button>
            </header>
            {if editing {
                view! {
                    <div class="toolbar" style="display: flex; gap: 0.25rem; padding: 0.5rem 1.5rem; border-bottom: 1px solid var(--border-color); position: relative;">
                        {TOOLBAR
                            .iter()
                            .map(|&(label, prefix, suffix)| view! {
                                <button
                                    class="toolbar-button"
                                    on:click=move |_| apply_edit(EditCommand::Wrap { prefix, suffix })
                                >
                                    {label}
                                </button>
                            })
                            .collect::<Vec<_>>()}
                        <button class="toolbar-button" on:click=move |_| open_picker()>"+ Question"</button>
                        <Show when=move || picker_open.get()>
                            <div class="picker" style="position: absolute; top: 100%; left: 1.5rem; width: 360px; max-height: 320px; overflow-y: auto; background: var(--bg-primary); border: 1px solid var(--border-color); border-radius: var(--radius-md); z-index: 10;">
                                <input
                                    placeholder="Search questions..."
                                    style="width: 100%; box-sizing: border-box; padding: 0.5rem;"
                                    prop:value=move || picker_query.get()
                                    on:input=move |ev| picker_query.set(event_target_value(&ev))
                                />
                                {picker_view}
                            </div>
                        </Show>
                    </div>
                    <div class="editor-container" style="flex: 1; display: flex; overflow: hidden;">
                        <textarea
                            class="raw-editor"
                            node_ref=editor_ref
                            style="flex: 1; padding: 2rem 3rem; font-family: var(--font-editor); font-size: var(--editor-font-size); line-height: 1.6; border: none; outline: none; resize: none; box-sizing: border-box;"
                            prop:value=move || buffer.with(|b| b.text.clone())
                            on:input=on_editor_input
                            placeholder="Start writing markdown..."
                            spellcheck="false"
                        ></textarea>
                        <div
                            class="note-preview math-content"
                            style="flex: 1; padding: 2rem 3rem; overflow-y: auto; border-left: 1px solid var(--border-color);"
                            on:click=on_preview_click
                            inner_html=move || rendered.with(|r| r.html.clone())
                        ></div>
                    </div>
                }
                .into_any()
            } else {
                view! {
                    <div
                        class="note-preview math-content"
                        style="flex: 1; padding: 2rem 3rem; overflow-y: auto; font-size: var(--editor-font-size);"
                        on:click=on_preview_click
                        inner_html=move || rendered.with(|r| r.html.clone())
                    ></div>
                }
                .into_any()
            }}
        }
        .into_any()
    };

    view! {
        <main
            class="app-layout"
            style=move || format!(
                "display: flex; height: 100vh; width: 100vw; background: var(--bg-primary); color: var(--text-primary); {}",
                settings.with(ClientConfig::style_vars)
            )
        >
            <nav class="sidebar" style="width: 280px; display: flex; flex-direction: column; border-right: 1px solid var(--border-color); background: var(--bg-secondary);">
                <div style="display: flex; align-items: center; gap: 0.25rem; padding: 0.75rem;">
                    <button
                        class="icon-button"
                        title="Back"
                        disabled=move || !browser.with(NoteBrowser::can_go_back)
                        on:click=move |_| go_back()
                    >
                        "←"
                    </button>
                    <div style="flex: 1; overflow: hidden; white-space: nowrap; text-overflow: ellipsis; font-size: 0.85em;">
                        {breadcrumbs_view}
                    </div>
                    <button class="icon-button" title="Settings" on:click=move |_| settings_open.update(|open| *open = !*open)>
                        "⚙"
                    </button>
                </div>
                <div style="display: flex; gap: 0.25rem; padding: 0 0.75rem 0.5rem;">
                    <button class="small-button" on:click=move |_| create_item(NoteKind::File)>"+ Note"</button>
                    <button class="small-button" on:click=move |_| create_item(NoteKind::Folder)>"+ Folder"</button>
                    <span style="flex: 1;"></span>
                    <button class="small-button" title="Sort by name" on:click=move |_| sort_items(SortKey::Name)>"A-Z"</button>
                    <button class="small-button" title="Newest first" on:click=move |_| sort_items(SortKey::Created)>"New"</button>
                </div>
                <div class="note-list" style="flex: 1; overflow-y: auto; padding: 0 0.5rem;">
                    {items_view}
                </div>
                {settings_view}
            </nav>
            <section class="note-pane" style="flex: 1; display: flex; flex-direction: column; background: var(--bg-primary);">
                {note_pane}
            </section>
            {practice_view}
            {move_view}
            {move || toast.get().map(|t| view! {
                <div class={match t.kind {
                    ToastKind::Info => "toast toast-info",
                    ToastKind::Error => "toast toast-error",
                }}>
                    {t.message}
                </div>
            })}
        </main>
    }
}
