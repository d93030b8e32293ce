use dioxus::prelude::*;
use futures::StreamExt;

use labmatch_common::notice::{Notice, Severity};

#[derive(Clone, Debug, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub notice: Notice,
}

/// Notices currently on screen, oldest first.
#[derive(Clone, Debug, Default)]
pub struct Toasts {
    pub items: Vec<Toast>,
    next_id: u64,
}

impl Toasts {
    pub fn push(&mut self, notice: Notice) -> u64 {
        self.next_id += 1;
        self.items.push(Toast {
            id: self.next_id,
            notice,
        });
        self.next_id
    }

    pub fn dismiss(&mut self, id: u64) {
        self.items.retain(|t| t.id != id);
    }
}

/// Start the coroutine that turns posted notices into toasts. Its sender is
/// the session's notifier.
pub fn use_toast_coroutine() -> Coroutine<Notice> {
    let mut toasts = use_context::<Signal<Toasts>>();

    use_coroutine(move |mut rx: UnboundedReceiver<Notice>| async move {
        while let Some(notice) = rx.next().await {
            let auto_dismiss = notice.auto_dismiss;
            let id = toasts.write().push(notice);
            if let Some(delay) = auto_dismiss {
                spawn(async move {
                    tokio::time::sleep(delay).await;
                    toasts.write().dismiss(id);
                });
            }
        }
    })
}

#[component]
pub fn ToastStack() -> Element {
    let mut toasts = use_context::<Signal<Toasts>>();
    let items = toasts.read().items.clone();

    if items.is_empty() {
        return rsx! {};
    }

    rsx! {
        div { class: "toast-stack",
            for toast in items {
                div {
                    key: "{toast.id}",
                    class: match toast.notice.severity {
                        Severity::Success => "toast toast-success",
                        Severity::Error => "toast toast-error",
                        Severity::Info => "toast toast-info",
                    },
                    span { "{toast.notice.message}" }
                    button {
                        class: "toast-close",
                        onclick: move |_| toasts.write().dismiss(toast.id),
                        "×"
                    }
                }
            }
        }
    }
}
