use dioxus::prelude::*;

use labmatch_common::page::PageView;
use labmatch_common::session::PageCommand;

/// Latest snapshot published by the session coroutine.
pub fn use_page_view() -> Signal<PageView> {
    use_context::<Signal<PageView>>()
}

/// Handle for sending actions to the session coroutine.
pub fn use_page_action() -> Coroutine<PageCommand> {
    use_coroutine_handle::<PageCommand>()
}
