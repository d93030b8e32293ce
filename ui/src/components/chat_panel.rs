use dioxus::prelude::*;

use labmatch_common::chat::Attachment;
use labmatch_common::message::Message;
use labmatch_common::page::ChatStatus;
use labmatch_common::session::PageCommand;

use super::page_state::{use_page_action, use_page_view};

#[component]
pub fn ChatPanel() -> Element {
    let view = use_page_view();
    let action = use_page_action();

    let snapshot = view.read();
    let Some(page) = snapshot.state.loaded() else {
        return rsx! {};
    };
    let degraded = match &page.chat {
        ChatStatus::Degraded(reason) => Some(reason.clone()),
        _ => None,
    };
    let messages = page.messages.messages().to_vec();
    let text = snapshot.compose.text.clone();
    let attached = snapshot
        .compose
        .attachment
        .as_ref()
        .map(|a| format!("{} ({} bytes)", a.file_name, a.size()));
    let can_send = !snapshot.busy && snapshot.compose.validate().is_ok();
    let busy = snapshot.busy;
    drop(snapshot);

    rsx! {
        section { class: "chat-panel",
            h3 { "Project chat" }
            if let Some(reason) = degraded {
                p { class: "chat-degraded", "Chat is degraded: {reason}" }
            }
            div { class: "chat-messages",
                if messages.is_empty() {
                    p { class: "empty", "No messages yet. Say hello!" }
                }
                for message in messages {
                    MessageRow { key: "{message.id}", message }
                }
            }
            div { class: "chat-compose",
                input {
                    placeholder: "Write a message...",
                    value: "{text}",
                    disabled: busy,
                    oninput: move |evt| action.send(PageCommand::EditMessage(evt.value())),
                    onkeydown: move |evt| {
                        if evt.key() == Key::Enter && can_send {
                            action.send(PageCommand::SendMessage);
                        }
                    },
                }
                input {
                    r#type: "file",
                    disabled: busy,
                    onchange: move |evt| async move {
                        for file in evt.files() {
                            let file_name = file.name();
                            let content_type = file
                                .content_type()
                                .unwrap_or_else(|| "application/octet-stream".to_string());
                            match file.read_bytes().await {
                                Ok(bytes) => {
                                    let attachment = Attachment::new(file_name, content_type, bytes.to_vec());
                                    action.send(PageCommand::Attach(attachment));
                                }
                                Err(e) => tracing::warn!("Failed to read {file_name}: {e}"),
                            }
                        }
                    },
                }
                if let Some(attached) = attached {
                    span { class: "chat-attachment",
                        "{attached}"
                        button {
                            onclick: move |_| action.send(PageCommand::Detach),
                            "Remove"
                        }
                    }
                }
                button {
                    disabled: !can_send,
                    onclick: move |_| action.send(PageCommand::SendMessage),
                    if busy { "Sending..." } else { "Send" }
                }
            }
        }
    }
}

#[component]
fn MessageRow(message: Message) -> Element {
    let time = message.created_at.format("%b %-d, %H:%M").to_string();
    let sender = message.sender_name().to_string();
    let attachment = message
        .attachment_url
        .clone()
        .zip(message.attachment_name().map(str::to_string));

    rsx! {
        div { class: "chat-message",
            div { class: "chat-meta",
                strong { "{sender}" }
                span { class: "chat-time", "{time}" }
            }
            if !message.content.is_empty() {
                p { "{message.content}" }
            }
            if let Some((url, name)) = attachment {
                a { class: "chat-file", href: "{url}", target: "_blank", "{name}" }
            }
        }
    }
}
