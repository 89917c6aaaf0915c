use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::db::SavedRecipes;
use crate::error::StoreError;
use crate::mealdb::RecipeSource;
use crate::recipe::Recipe;
use crate::remix::Remixer;
use crate::render::escape_html;

pub const RANDOM_FAILED: &str = "Sorry, couldn't load a recipe.";
pub const LOOKUP_FAILED: &str = "Sorry, couldn't load that recipe right now.";
pub const NO_RECIPE_TO_REMIX: &str =
    "No recipe loaded yet. Tap \"Surprise me again\" or send /random to fetch one.";
pub const NO_RECIPE_TO_SAVE: &str =
    "No recipe to save yet. Tap \"Surprise me again\" or send /random first.";
pub const ALREADY_SAVED: &str = "That recipe is already saved.";
pub const SAVED: &str = "Saved! You can find this recipe in the list below.";
pub const LIST_CHANGED: &str =
    "Your saved list changed since that message. Here is the current one.";
pub const REMIX_FAILED: &str =
    "Oops, we couldn't make a remix right now. Please try again in a moment.";
pub const REMIX_BUSY: &str = "Hang on, the chef is still working on your last remix.";
pub const STORE_FAILED: &str = "Sorry, your saved recipes are unavailable right now.";

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Recipe),
    /// Nothing to show; the text explains why.
    Missing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveReply {
    NoRecipe,
    AlreadySaved,
    Saved,
}

impl SaveReply {
    pub fn text(&self) -> &'static str {
        match self {
            SaveReply::NoRecipe => NO_RECIPE_TO_SAVE,
            SaveReply::AlreadySaved => ALREADY_SAVED,
            SaveReply::Saved => SAVED,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemixReply {
    NoRecipe,
    Remixed(String),
    Failed,
}

impl RemixReply {
    pub fn text(&self) -> &str {
        match self {
            RemixReply::NoRecipe => NO_RECIPE_TO_REMIX,
            RemixReply::Remixed(text) => text,
            RemixReply::Failed => REMIX_FAILED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deletion {
    Removed(Vec<String>),
    /// The entry was not where the caller expected it; nothing was removed.
    Stale(Vec<String>),
}

impl Deletion {
    pub fn names(&self) -> &[String] {
        match self {
            Deletion::Removed(names) | Deletion::Stale(names) => names,
        }
    }
}

/// Every user action, independent of how it reaches the chat.
pub struct Kitchen<S, R> {
    source: S,
    remixer: R,
    saved: SavedRecipes,
}

impl<S: RecipeSource, R: Remixer> Kitchen<S, R> {
    pub fn new(source: S, remixer: R, saved: SavedRecipes) -> Self {
        Self {
            source,
            remixer,
            saved,
        }
    }

    pub async fn random_recipe(&self) -> Lookup {
        match self.source.random().await {
            Ok(Some(recipe)) => Lookup::Found(recipe),
            Ok(None) => {
                log::warn!("Random recipe endpoint returned no meals");
                Lookup::Missing(RANDOM_FAILED.to_string())
            }
            Err(e) => {
                log::warn!("Failed to fetch a random recipe: {e}");
                Lookup::Missing(RANDOM_FAILED.to_string())
            }
        }
    }

    pub async fn recipe_named(&self, name: &str) -> Lookup {
        match self.source.search(name).await {
            Ok(Some(recipe)) => Lookup::Found(recipe),
            Ok(None) => Lookup::Missing(format!(
                "Couldn't find details for \"{}\".",
                escape_html(name)
            )),
            Err(e) => {
                log::error!("Failed to look up {name:?}: {e}");
                Lookup::Missing(LOOKUP_FAILED.to_string())
            }
        }
    }

    pub fn save(&self, chat_id: i64, current: Option<&Recipe>) -> Result<SaveReply, StoreError> {
        let Some(name) = current.and_then(Recipe::name) else {
            return Ok(SaveReply::NoRecipe);
        };
        Ok(if self.saved.add(chat_id, name)? {
            SaveReply::Saved
        } else {
            SaveReply::AlreadySaved
        })
    }

    pub fn saved(&self, chat_id: i64) -> Result<Vec<String>, StoreError> {
        self.saved.load(chat_id)
    }

    /// Removes entry `idx` if it still holds `expected` (when given) and returns the list.
    pub fn delete_saved(
        &self,
        chat_id: i64,
        idx: usize,
        expected: Option<&str>,
    ) -> Result<Deletion, StoreError> {
        let removed = self.saved.remove(chat_id, idx, expected)?;
        let names = self.saved.load(chat_id)?;
        Ok(match removed {
            Some(_) => Deletion::Removed(names),
            None => Deletion::Stale(names),
        })
    }

    /// Looks a saved name up again. `None` when entry `idx` is gone or no longer `expected`.
    pub async fn open_saved(
        &self,
        chat_id: i64,
        idx: usize,
        expected: Option<&str>,
    ) -> Result<Option<Lookup>, StoreError> {
        let Some(name) = self.saved.get(chat_id, idx, expected)? else {
            return Ok(None);
        };
        Ok(Some(self.recipe_named(&name).await))
    }

    pub async fn remix(&self, current: Option<&Recipe>, theme: &str) -> RemixReply {
        let Some(recipe) = current else {
            return RemixReply::NoRecipe;
        };
        match self.remixer.remix(recipe, theme).await {
            Ok(text) => RemixReply::Remixed(text),
            Err(e) => {
                log::error!("Remix of {:?} failed: {e}", recipe.name());
                RemixReply::Failed
            }
        }
    }
}

/// Chats with a remix in progress.
#[derive(Default)]
pub struct InFlight {
    chats: Mutex<HashSet<i64>>,
}

/// Marks a chat busy until dropped.
pub struct InFlightTicket {
    owner: Arc<InFlight>,
    chat_id: i64,
}

impl InFlight {
    pub fn begin(self: &Arc<Self>, chat_id: i64) -> Option<InFlightTicket> {
        let mut chats = self.chats.lock().unwrap_or_else(PoisonError::into_inner);
        if !chats.insert(chat_id) {
            return None;
        }
        Some(InFlightTicket {
            owner: Arc::clone(self),
            chat_id,
        })
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.owner
            .chats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.chat_id);
    }
}
