use dioxus::prelude::*;

use labmatch_common::application::{Application, ApplicationStatus};
use labmatch_common::session::PageCommand;

use super::page_state::{use_page_action, use_page_view};

/// Owner-only list of applications with status controls.
#[component]
pub fn ApplicationList() -> Element {
    let view = use_page_view();
    let snapshot = view.read();
    let Some(page) = snapshot.state.loaded() else {
        return rsx! {};
    };
    let applications = page.applications.clone();
    let busy = snapshot.busy;
    drop(snapshot);

    rsx! {
        section { class: "applications",
            h3 { "Applications ({applications.len()})" }
            if applications.is_empty() {
                p { class: "empty", "No applications yet." }
            }
            for application in applications {
                ApplicationCard { key: "{application.id}", application, busy }
            }
        }
    }
}

#[component]
fn ApplicationCard(application: Application, busy: bool) -> Element {
    let action = use_page_action();
    let name = application
        .contributor
        .as_ref()
        .map(|p| p.display_name().to_string())
        .unwrap_or_else(|| application.contributor_id.to_string());
    let current = application.status.clone();
    let targets: Vec<ApplicationStatus> = ApplicationStatus::all()
        .into_iter()
        .filter(|s| current.can_transition_to(s))
        .collect();

    rsx! {
        div { class: "application-card",
            div { class: "application-header",
                strong { "{name}" }
                span { class: "status-badge", "{current.label()}" }
            }
            p { class: "application-proposal", "{application.proposal}" }
            if let Some(rate) = application.rate {
                p { "Rate: {rate}" }
            }
            if let Some(availability) = &application.availability {
                p { "Availability: {availability}" }
            }
            if !application.links.is_empty() {
                ul { class: "application-links",
                    for link in application.links.iter() {
                        li { a { href: "{link}", "{link}" } }
                    }
                }
            }
            div { class: "application-actions",
                for status in targets {
                    {
                        let id = application.id.clone();
                        let label = action_label(&status);
                        rsx! {
                            button {
                                disabled: busy,
                                onclick: move |_| {
                                    action.send(PageCommand::SetApplicationStatus {
                                        application_id: id.clone(),
                                        status: status.clone(),
                                    })
                                },
                                "{label}"
                            }
                        }
                    }
                }
            }
        }
    }
}

fn action_label(status: &ApplicationStatus) -> String {
    let label = match status {
        ApplicationStatus::Pending => "Move back to pending",
        ApplicationStatus::Shortlisted => "Shortlist",
        ApplicationStatus::Accepted => "Accept",
        ApplicationStatus::Rejected => "Reject",
        ApplicationStatus::Other(other) => other,
    };
    label.to_string()
}
