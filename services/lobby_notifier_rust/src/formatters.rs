use wzlobby_rust_core::models::Game;

pub const NO_GAMES: &str = "No games in the lobby";

/// Summary of a whole game list, as posted to channels and returned by `games`
pub fn format_games(games: &[Game]) -> String {
    match games {
        [] => NO_GAMES.to_string(),
        [game] => format!("1 game: {}", format_game(game)),
        _ => {
            let parts: Vec<String> = games.iter().map(format_game).collect();
            format!("{} games: {}", games.len(), parts.join(", "))
        }
    }
}

/// `<description><detail> [<current>/<max>] (<privacy>version: <multiVer>)`
pub fn format_game(game: &Game) -> String {
    let privacy = if game.is_private { "private, " } else { "" };

    let detail = if game.map_name.is_empty() {
        String::new()
    } else {
        format!(" ({} by {})", short_map_name(&game.map_name), game.host_player)
    };

    format!(
        "{}{} [{}/{}] ({}version: {})",
        game.description,
        detail,
        game.current_players,
        game.max_players,
        privacy,
        game.multi_version
    )
}

/// Map name without its 3-character player-count prefix and without a
/// trailing `sk-` (any case).
fn short_map_name(map_name: &str) -> &str {
    let rest = map_name
        .char_indices()
        .nth(3)
        .map(|(idx, _)| &map_name[idx..])
        .unwrap_or("");

    let cut = rest.len().saturating_sub(3);
    match rest.get(cut..) {
        Some(tail) if tail.eq_ignore_ascii_case("sk-") => &rest[..cut],
        _ => rest,
    }
}
