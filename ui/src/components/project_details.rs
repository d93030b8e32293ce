use dioxus::prelude::*;

use labmatch_common::page::PageState;
use labmatch_common::session::PageCommand;

use super::applications::ApplicationList;
use super::apply_form::ApplyForm;
use super::chat_panel::ChatPanel;
use super::milestones::MilestoneList;
use super::page_state::{use_page_action, use_page_view};

#[component]
pub fn ProjectDetails() -> Element {
    let view = use_page_view();
    let action = use_page_action();
    let snapshot = view.read().clone();

    let page = match &snapshot.state {
        PageState::Loading => {
            return rsx! {
                div { class: "page-loading", "Loading project..." }
            };
        }
        PageState::Failed(reason) => {
            let reason = reason.clone();
            return rsx! {
                div { class: "page-error",
                    h2 { "Something went wrong" }
                    p { "{reason}" }
                    button {
                        onclick: move |_| action.send(PageCommand::Reload),
                        "Try again"
                    }
                }
            };
        }
        PageState::Loaded(page) => page,
    };

    let project = &page.project;
    let caps = snapshot.capabilities;
    let title = project.title.clone();
    let status_label = project.status.label().to_string();
    let status_class = format!("status-badge status-{}", project.status.as_str().to_ascii_lowercase());
    let owner = project.owner_name().to_string();
    let compensation = project.compensation.as_ref().map(|c| c.label().to_string());
    let deadline = project.deadline.map(|d| d.format("%b %-d, %Y").to_string());
    let description = project.description.clone();
    let skills = project.skills.clone();
    let deliverables = project.deliverables.clone();
    let applied = snapshot.applied_status();

    rsx! {
        article { class: "project-details",
            header { class: "project-header",
                h2 { "{title}" }
                span { class: "{status_class}", "{status_label}" }
                p { class: "project-owner", "Posted by {owner}" }
            }
            section { class: "project-facts",
                if let Some(compensation) = compensation {
                    p { "Compensation: {compensation}" }
                }
                if let Some(deadline) = deadline {
                    p { "Deadline: {deadline}" }
                }
            }
            if !description.is_empty() {
                section { class: "project-description",
                    p { "{description}" }
                }
            }
            if !skills.is_empty() {
                section { class: "project-skills",
                    h3 { "Skills" }
                    ul {
                        for skill in skills {
                            li { class: "skill-tag", "{skill}" }
                        }
                    }
                }
            }
            if !deliverables.is_empty() {
                section { class: "project-deliverables",
                    h3 { "Deliverables" }
                    ul {
                        for item in deliverables {
                            li { "{item}" }
                        }
                    }
                }
            }

            MilestoneList {}

            if caps.can_manage {
                ApplicationList {}
            }

            if let Some(status) = applied {
                div { class: "applied-banner",
                    "You have applied to this project. Status: {status.label()}"
                }
            } else if caps.can_apply {
                ApplyForm {}
            }

            if caps.can_chat {
                ChatPanel {}
            }
        }
    }
}
