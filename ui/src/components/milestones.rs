use dioxus::prelude::*;

use labmatch_common::session::PageCommand;

use super::page_state::{use_page_action, use_page_view};

#[component]
pub fn MilestoneList() -> Element {
    let view = use_page_view();
    let action = use_page_action();

    let snapshot = view.read();
    let Some(page) = snapshot.state.loaded() else {
        return rsx! {};
    };
    let Some((done, total)) = page.project.milestone_progress() else {
        return rsx! {};
    };
    let budget = page.project.total_budget();
    let milestones = page.project.milestones.clone();
    let can_manage = snapshot.capabilities.can_manage;
    let busy = snapshot.busy;
    drop(snapshot);

    let percent = done * 100 / total;

    rsx! {
        section { class: "milestones",
            h3 { "Milestones" }
            div { class: "milestone-progress",
                div { class: "progress-bar", style: "width: {percent}%" }
                span { "{done} of {total} complete, budget {budget:.2}" }
            }
            ul {
                for milestone in milestones {
                    {
                        let completed = milestone.status.is_completed();
                        let id = milestone.id.clone();
                        let due = milestone.due_date.map(|d| d.format("%b %-d, %Y").to_string());
                        rsx! {
                            li {
                                key: "{milestone.id}",
                                class: if completed { "milestone completed" } else { "milestone" },
                                span { class: "milestone-description", "{milestone.description}" }
                                span { class: "milestone-amount", "{milestone.amount:.2}" }
                                if let Some(due) = due {
                                    span { class: "milestone-due", "Due {due}" }
                                }
                                span { class: "milestone-status", "{milestone.status}" }
                                if can_manage && !completed {
                                    button {
                                        disabled: busy,
                                        onclick: move |_| action.send(PageCommand::CompleteMilestone(id.clone())),
                                        "Mark complete"
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
