//! Plain-text rendering of the page view.

use std::fmt::Write;

use labmatch_common::message::Message;
use labmatch_common::page::{ChatStatus, LoadedPage, PageState, PageView};

pub fn page(view: &PageView) -> String {
    match &view.state {
        PageState::Loading => "Loading...\n".to_string(),
        PageState::Failed(reason) => format!("Error: {reason}\n"),
        PageState::Loaded(page) => loaded(view, page),
    }
}

fn loaded(view: &PageView, page: &LoadedPage) -> String {
    let project = &page.project;
    let caps = view.capabilities;
    let mut out = String::new();

    let _ = writeln!(out, "{} [{}]", project.title, project.status.label());
    let _ = writeln!(out, "Posted by {}", project.owner_name());
    if let Some(compensation) = &project.compensation {
        let _ = writeln!(out, "Compensation: {}", compensation.label());
    }
    if let Some(deadline) = project.deadline {
        let _ = writeln!(out, "Deadline: {}", deadline.format("%b %-d, %Y"));
    }
    if !project.skills.is_empty() {
        let _ = writeln!(out, "Skills: {}", project.skills.join(", "));
    }
    if !project.description.is_empty() {
        let _ = writeln!(out, "\n{}", project.description);
    }

    if let Some((done, total)) = project.milestone_progress() {
        let _ = writeln!(
            out,
            "\nMilestones ({done}/{total}, budget {:.2})",
            project.total_budget()
        );
        for m in &project.milestones {
            let mark = if m.status.is_completed() { "x" } else { " " };
            let _ = write!(out, "  [{mark}] {} ({:.2})", m.description, m.amount);
            if let Some(due) = m.due_date {
                let _ = write!(out, " due {due}");
            }
            let _ = writeln!(out, "  #{}", m.id);
        }
    }

    if caps.can_manage {
        let _ = writeln!(out, "\nApplications ({})", page.applications.len());
        for app in &page.applications {
            let who = app
                .contributor
                .as_ref()
                .map(|p| p.display_name())
                .unwrap_or(app.contributor_id.0.as_str());
            let _ = write!(out, "  {who} [{}]", app.status.label());
            if let Some(rate) = app.rate {
                let _ = write!(out, " rate {rate}");
            }
            let _ = writeln!(out, "  #{}", app.id);
        }
    }

    if let Some(status) = view.applied_status() {
        let _ = writeln!(out, "\nYou have applied: {}", status.label());
    } else if view.show_apply() {
        let _ = writeln!(out, "\nOpen for applications. Use `apply` to submit a proposal.");
    }

    match &page.chat {
        ChatStatus::Hidden => {}
        ChatStatus::Live | ChatStatus::Degraded(_) => {
            let _ = writeln!(out, "\nChat");
            if let ChatStatus::Degraded(reason) = &page.chat {
                let _ = writeln!(out, "  ({reason})");
            }
            if page.messages.is_empty() {
                let _ = writeln!(out, "  No messages yet.");
            }
            for message in page.messages.messages() {
                let _ = writeln!(out, "  {}", message_line(message));
            }
        }
    }
    out
}

pub fn message_line(message: &Message) -> String {
    let mut line = format!(
        "[{}] {}:",
        message.created_at.format("%Y-%m-%d %H:%M"),
        message.sender_name()
    );
    if !message.content.is_empty() {
        line.push(' ');
        line.push_str(&message.content);
    }
    if let Some(name) = message.attachment_name() {
        let _ = write!(line, " [attachment: {name}]");
    }
    line
}
