/// Category names the catalog is known to serve. The listing occasionally
/// carries entries with blank or unknown categories; the CLI validates
/// requested filters against this list.
pub const VALID_CATEGORIES: &[&str] = &[
    "Among Us",
    "Blob Cats",
    "Cat Emojis",
    "Cowboy Emojis",
    "Dancing Bananas",
    "Facebook Reaction",
    "Game of Thrones",
    "Hangouts Blob",
    "HD Emojis",
    "Jelles Marble Run Teams",
    "Logo",
    "Maybe Finance",
    "Meme",
    "Microsoft Teams",
    "MLB",
    "MLS",
    "NBA",
    "NFL",
    "NHL",
    "NYC Subway",
    "Party Parrot",
    "Piggies",
    "Pokemon",
    "Random",
    "Regional Indicator",
    "Retro Game",
    "Scrabble Letters",
    "Skype",
    "Star Wars",
    "Turntable.fm",
    "Twitch Global",
    "Yahoo Games",
    "Yoyo",
];

pub fn valid_categories() -> Vec<&'static str> {
    VALID_CATEGORIES.to_vec()
}

pub fn is_valid_category(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && VALID_CATEGORIES.contains(&trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_pass_and_unknown_names_fail() {
        assert!(is_valid_category("Party Parrot"));
        assert!(is_valid_category("  Meme  "));
        assert!(!is_valid_category("party parrot"));
        assert!(!is_valid_category(""));
        assert!(!is_valid_category("   "));
    }
}
