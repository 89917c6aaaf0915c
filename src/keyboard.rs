use teloxide::types::{InlineKeyboardButton, InlineKeyboardButtonKind, InlineKeyboardMarkup};

use crate::remix::REMIX_THEMES;

/// Inline buttons and their callback payloads. Indexes are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Random,
    Save,
    Saved,
    Remix(usize),
    Open(usize),
    Delete(usize),
}

impl Button {
    pub fn data(&self) -> String {
        match self {
            Button::Random => "random".to_string(),
            Button::Save => "save".to_string(),
            Button::Saved => "saved".to_string(),
            Button::Remix(idx) => format!("remix:{idx}"),
            Button::Open(idx) => format!("open:{idx}"),
            Button::Delete(idx) => format!("delete:{idx}"),
        }
    }

    pub fn parse(data: &str) -> Option<Button> {
        match data.split_once(':') {
            None => match data {
                "random" => Some(Button::Random),
                "save" => Some(Button::Save),
                "saved" => Some(Button::Saved),
                _ => None,
            },
            Some((kind, idx)) => {
                let idx = idx.parse().ok()?;
                match kind {
                    "remix" => Some(Button::Remix(idx)),
                    "open" => Some(Button::Open(idx)),
                    "delete" => Some(Button::Delete(idx)),
                    _ => None,
                }
            }
        }
    }

    fn into_button(self, label: impl Into<String>) -> InlineKeyboardButton {
        InlineKeyboardButton::callback(label, self.data())
    }
}

pub fn recipe_keyboard() -> InlineKeyboardMarkup {
    let themes: Vec<_> = REMIX_THEMES
        .iter()
        .enumerate()
        .map(|(idx, theme)| Button::Remix(idx).into_button(format!("✨ {theme}")))
        .collect();

    let mut rows = vec![vec![
        Button::Random.into_button("🎲 Surprise me again"),
        Button::Save.into_button("💾 Save"),
    ]];
    rows.extend(themes.chunks(3).map(<[_]>::to_vec));
    rows.push(vec![Button::Saved.into_button("📒 Saved recipes")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn saved_keyboard(names: &[String]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(names.iter().enumerate().map(|(idx, name)| {
        vec![
            Button::Open(idx).into_button(name.as_str()),
            Button::Delete(idx).into_button("🗑 Delete"),
        ]
    }))
}

/// The recipe name shown on the row of saved entry `idx` in a drawn list.
pub fn saved_label(markup: &InlineKeyboardMarkup, idx: usize) -> Option<&str> {
    let data = Button::Open(idx).data();
    markup
        .inline_keyboard
        .iter()
        .flatten()
        .find(|button| {
            matches!(&button.kind, InlineKeyboardButtonKind::CallbackData(d) if *d == data)
        })
        .map(|button| button.text.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_callback_payloads() {
        assert_eq!(Button::parse("random"), Some(Button::Random));
        assert_eq!(Button::parse("delete:3"), Some(Button::Delete(3)));
        assert_eq!(Button::parse(&Button::Open(12).data()), Some(Button::Open(12)));
        assert_eq!(Button::parse("open:-1"), None);
        assert_eq!(Button::parse("fry:1"), None);
        assert_eq!(Button::parse(""), None);
    }

    #[test]
    fn saved_rows_pair_name_with_delete() {
        let names = vec!["Pad Thai".to_string(), "Shakshuka".to_string()];
        let markup = saved_keyboard(&names);
        assert_eq!(markup.inline_keyboard.len(), 2);

        let row = &markup.inline_keyboard[1];
        assert_eq!(row[0].text, "Shakshuka");
        assert_eq!(
            row[0].kind,
            InlineKeyboardButtonKind::CallbackData("open:1".to_string())
        );
        assert_eq!(
            row[1].kind,
            InlineKeyboardButtonKind::CallbackData("delete:1".to_string())
        );
    }

    #[test]
    fn label_comes_from_the_drawn_row() {
        let drawn = saved_keyboard(&["A".to_string(), "B".to_string(), "C".to_string()]);
        assert_eq!(saved_label(&drawn, 1), Some("B"));
        assert_eq!(saved_label(&drawn, 3), None);
        assert_eq!(saved_label(&recipe_keyboard(), 0), None);
    }

    #[test]
    fn recipe_keyboard_offers_every_theme() {
        let markup = recipe_keyboard();
        let remix_buttons = markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(d) => Some(d),
                _ => None,
            })
            .filter(|d| d.starts_with("remix:"))
            .count();
        assert_eq!(remix_buttons, REMIX_THEMES.len());
    }
}
