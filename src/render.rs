use reqwest::Url;

use crate::recipe::Recipe;

/// Telegram refuses text messages longer than this (counted after entity parsing).
pub const MESSAGE_LIMIT: usize = 4096;
const INSTRUCTIONS_BUDGET: usize = 3000;

pub struct RecipeCard {
    pub title: String,
    pub image: Option<Url>,
    /// Telegram HTML
    pub body: String,
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Cuts `s` to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max.saturating_sub(1)) {
        Some((cut, _)) if s.chars().count() > max => format!("{}…", &s[..cut]),
        _ => s.to_string(),
    }
}

pub fn ingredient_lines(recipe: &Recipe) -> String {
    recipe
        .ingredients()
        .iter()
        .map(|ing| match ing.measure {
            Some(measure) => format!("• {} {}", escape_html(measure), escape_html(ing.name)),
            None => format!("• {}", escape_html(ing.name)),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn instructions_text(recipe: &Recipe) -> String {
    let text = recipe.instructions().replace("\r\n", "\n");
    escape_html(&truncate(text.trim(), INSTRUCTIONS_BUDGET))
}

pub fn recipe_card(recipe: &Recipe) -> RecipeCard {
    let title = recipe.name().unwrap_or("Untitled recipe").to_string();
    let image = recipe.thumbnail().and_then(|url| Url::parse(url).ok());
    let body = format!(
        "<b>{}</b>\n\n<b>Ingredients:</b>\n{}\n\n<b>Instructions:</b>\n{}",
        escape_html(&title),
        ingredient_lines(recipe),
        instructions_text(recipe),
    );
    RecipeCard { title, image, body }
}

pub fn saved_list_text(names: &[String]) -> String {
    if names.is_empty() {
        return "You have no saved recipes yet. Tap Save on a recipe to keep it here.".to_string();
    }
    let lines = names
        .iter()
        .enumerate()
        .map(|(idx, name)| format!("{}. {}", idx + 1, escape_html(name)))
        .collect::<Vec<_>>()
        .join("\n");
    format!("<b>Saved recipes</b>\n{lines}\n\nTap a name to open it.")
}

/// The saved list with a one-line note above it.
pub fn saved_list_under(note: &str, names: &[String]) -> String {
    format!("{}\n\n{}", escape_html(note), saved_list_text(names))
}
