pub mod app;
pub mod applications;
pub mod apply_form;
pub mod chat_panel;
pub mod milestones;
pub mod page_state;
pub mod project_details;
pub mod session_api;
pub mod toast;
