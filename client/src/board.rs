//! Text layout of the in-game top-10 board

use shared::{LeaderboardEntry, DISPLAY_LIMIT};

/// Width of the name column.
const NAME_WIDTH: usize = 10;
const HEADER_GAP: usize = 4;

/// Entries that have actually scored, best first, at most `DISPLAY_LIMIT`.
pub fn top_entries(entries: &[LeaderboardEntry]) -> Vec<LeaderboardEntry> {
    let mut finished: Vec<LeaderboardEntry> = entries
        .iter()
        .filter(|entry| entry.best_score > 0)
        .cloned()
        .collect();
    finished.sort_by(|a, b| b.best_score.cmp(&a.best_score));
    finished.truncate(DISPLAY_LIMIT);
    finished
}

pub fn format_header() -> String {
    format!(
        "   {:<width$}{}Points",
        "Player",
        " ".repeat(HEADER_GAP),
        width = NAME_WIDTH
    )
}

/// Renders one line per top entry, or "No entries yet".
pub fn format_board(entries: &[LeaderboardEntry]) -> String {
    let top = top_entries(entries);
    if top.is_empty() {
        return "No entries yet".to_string();
    }

    top.iter()
        .enumerate()
        .map(|(index, entry)| {
            let rank = format!("{}.", index + 1);
            format!(
                "{:<3} {:<width$}  {}",
                rank,
                short_name(&entry.display_name),
                entry.best_score,
                width = NAME_WIDTH
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn short_name(name: &str) -> String {
    if name.chars().count() > NAME_WIDTH {
        let cut: String = name.chars().take(NAME_WIDTH).collect();
        format!("{}..", cut)
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        assert_eq!(format_header(), "   Player        Points");
    }

    #[test]
    fn test_empty_board() {
        assert_eq!(format_board(&[]), "No entries yet");

        let unscored = vec![LeaderboardEntry::new("0xaaa", "Zero", 0)];
        assert_eq!(format_board(&unscored), "No entries yet");
    }

    #[test]
    fn test_board_lines() {
        let entries = vec![
            LeaderboardEntry::new("0xaaa", "Pingu", 500),
            LeaderboardEntry::new("0xbbb", "Robby", 900),
        ];

        assert_eq!(
            format_board(&entries),
            "1.  Robby       900\n2.  Pingu       500"
        );
    }

    #[test]
    fn test_long_names_are_cut() {
        let entries = vec![LeaderboardEntry::new("0xaaa", "Emperor Penguin", 42)];
        assert_eq!(format_board(&entries), "1.  Emperor Pe..  42");
    }

    #[test]
    fn test_top_entries_limit_and_order() {
        let entries: Vec<LeaderboardEntry> = (0..15)
            .map(|i| LeaderboardEntry::new(&format!("0x{:02}", i), "P", i as u64))
            .collect();

        let top = top_entries(&entries);
        assert_eq!(top.len(), DISPLAY_LIMIT);
        assert_eq!(top[0].best_score, 14);
        assert_eq!(top[DISPLAY_LIMIT - 1].best_score, 5);

        let board = format_board(&entries);
        assert_eq!(board.lines().count(), DISPLAY_LIMIT);
        assert!(board.lines().last().unwrap().starts_with("10. "));
    }
}
