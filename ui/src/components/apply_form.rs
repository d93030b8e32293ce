use dioxus::prelude::*;

use labmatch_common::application::{is_valid_rate, ApplicationDraft};
use labmatch_common::session::PageCommand;

use super::page_state::{use_page_action, use_page_view};

#[component]
pub fn ApplyForm() -> Element {
    let view = use_page_view();
    let action = use_page_action();
    let mut proposal = use_signal(String::new);
    let mut rate = use_signal(String::new);
    let mut availability = use_signal(String::new);
    let mut links = use_signal(String::new);

    let busy = view.read().busy;
    let rate_error = {
        let rate = rate.read();
        !rate.trim().is_empty() && !rate.trim().parse::<f64>().is_ok_and(is_valid_rate)
    };
    let ready = !proposal.read().trim().is_empty() && !rate_error && !busy;

    rsx! {
        section { class: "apply-form",
            h3 { "Apply to this project" }
            div { class: "form-group",
                label { "Proposal:" }
                textarea {
                    rows: "5",
                    value: "{proposal}",
                    oninput: move |evt| proposal.set(evt.value()),
                }
            }
            div { class: "form-group",
                label { "Rate (optional):" }
                input {
                    r#type: "number",
                    min: "0",
                    value: "{rate}",
                    oninput: move |evt| rate.set(evt.value()),
                }
                if rate_error {
                    span { class: "field-error", "Enter a non-negative number" }
                }
            }
            div { class: "form-group",
                label { "Availability (optional):" }
                input {
                    value: "{availability}",
                    oninput: move |evt| availability.set(evt.value()),
                }
            }
            div { class: "form-group",
                label { "Links, one per line (optional):" }
                textarea {
                    rows: "3",
                    value: "{links}",
                    oninput: move |evt| links.set(evt.value()),
                }
            }
            button {
                disabled: !ready,
                onclick: move |_| {
                    let mut draft = ApplicationDraft::new(proposal.read().clone());
                    draft.rate = rate.read().trim().parse().ok();
                    draft.availability = Some(availability.read().clone());
                    draft.links = links.read().lines().map(str::to_string).collect();
                    action.send(PageCommand::Apply(draft));
                },
                if busy { "Submitting..." } else { "Submit application" }
            }
        }
    }
}
