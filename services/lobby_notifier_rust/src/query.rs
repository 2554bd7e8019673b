use std::sync::Arc;

use crate::state::LobbyState;

/// Read side of the lobby state, for on-demand `games` replies.
///
/// Never polls: it returns the text cached with the last announced list.
#[derive(Clone)]
pub struct GamesQuery {
    state: Arc<LobbyState>,
}

impl GamesQuery {
    pub fn new(state: Arc<LobbyState>) -> Self {
        Self { state }
    }

    pub fn current_games_text(&self) -> Arc<str> {
        self.state.message()
    }
}
