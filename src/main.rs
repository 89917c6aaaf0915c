use dotenv::dotenv;
use rand::seq::SliceRandom;
use std::error::Error;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::types::{ChatAction, InputFile, MessageId, ParseMode};
use teloxide::RequestError;
use teloxide::{prelude::*, utils::command::BotCommands};

mod config;
mod db;
mod error;
mod keyboard;
mod kitchen;
mod mealdb;
mod recipe;
mod remix;
mod render;
mod thinking;

use config::Config;
use db::SavedRecipes;
use keyboard::Button;
use kitchen::{Deletion, InFlight, Kitchen, Lookup, RemixReply, SaveReply};
use mealdb::MealDbClient;
use recipe::Recipe;
use remix::{OpenAiClient, REMIX_THEMES};
use thinking::{thinking_frame, Delivery, EditAttempt, Thinking};

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;
type MyDialogue = Dialogue<State, InMemStorage<State>>;
type Chef = Arc<Kitchen<MealDbClient, OpenAiClient>>;

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
enum Command {
    #[command(description = "Display this text.")]
    Help,
    #[command(description = "Show a random recipe.")]
    Start,
    #[command(description = "Surprise me with another random recipe.")]
    Random,
    #[command(description = "Remix the current recipe, e.g. /remix tex-mex.")]
    Remix(String),
    #[command(description = "Save the current recipe.")]
    Save,
    #[command(description = "List your saved recipes.")]
    Saved,
    #[command(description = "Open saved recipe number n.")]
    Open(usize),
    #[command(description = "Delete saved recipe number n.")]
    Delete(usize),
}

/// The recipe currently on screen for a chat.
#[derive(Clone, Default)]
enum State {
    #[default]
    Start,
    Showing(Recipe),
}

impl State {
    fn recipe(&self) -> Option<&Recipe> {
        match self {
            State::Start => None,
            State::Showing(recipe) => Some(recipe),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load all env variables from .env file.
    dotenv().ok();
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "debug");
    }
    pretty_env_logger::init();
    log::info!("Starting bot...");

    let config = Config::load();
    let bot = Bot::from_env();

    log::info!("Opening saved recipes at {}", config.db_path);
    let saved = match SavedRecipes::open(&config.db_path) {
        Ok(saved) => saved,
        Err(e) => panic!("Failed to open the saved recipes store with error {}", e),
    };

    let http = reqwest::Client::new();
    let kitchen: Chef = Arc::new(Kitchen::new(
        MealDbClient::new(http.clone(), config.mealdb_url),
        OpenAiClient::new(http, config.openai_url, config.openai_api_key, config.remix),
        saved,
    ));

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![
            kitchen,
            Arc::new(InFlight::default()),
            InMemStorage::<State>::new()
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<Box<dyn Error + Send + Sync + 'static>> {
    use dptree::case;

    let commands = Update::filter_message()
        .filter_command::<Command>()
        .enter_dialogue::<Message, InMemStorage<State>, State>()
        .branch(case![Command::Help].endpoint(help))
        .branch(case![Command::Start].endpoint(start))
        .branch(case![Command::Random].endpoint(show_random))
        .branch(case![Command::Remix(theme)].endpoint(remix_command))
        .branch(case![Command::Save].endpoint(save))
        .branch(case![Command::Saved].endpoint(list_saved))
        .branch(case![Command::Open(n)].endpoint(open_command))
        .branch(case![Command::Delete(n)].endpoint(delete_command));

    let number_hint = Update::filter_message()
        .filter(|msg: Message| msg.text().is_some_and(missing_number))
        .endpoint(numbering_hint);

    let buttons = Update::filter_callback_query()
        .enter_dialogue::<CallbackQuery, InMemStorage<State>, State>()
        .endpoint(on_button);

    dptree::entry()
        .branch(commands)
        .branch(number_hint)
        .branch(buttons)
}

async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn typing(bot: &Bot, chat: ChatId) {
    if let Err(e) = bot.send_chat_action(chat, ChatAction::Typing).await {
        log::debug!("Could not show typing in chat {}: {}", chat.0, e);
    }
}

async fn send_recipe(bot: &Bot, chat: ChatId, recipe: &Recipe) -> HandlerResult {
    let card = render::recipe_card(recipe);
    if let Some(image) = card.image {
        if let Err(e) = bot
            .send_photo(chat, InputFile::url(image))
            .caption(card.title.clone())
            .await
        {
            log::warn!("Failed to send the picture of {:?}: {}", card.title, e);
        }
    }
    bot.send_message(chat, card.body)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard::recipe_keyboard())
        .await?;
    Ok(())
}

async fn present(bot: &Bot, dialogue: &MyDialogue, lookup: Lookup) -> HandlerResult {
    let chat = dialogue.chat_id();
    match lookup {
        Lookup::Found(recipe) => {
            send_recipe(bot, chat, &recipe).await?;
            log::debug!(
                "Chat {} now shows {:?} (id {:?})",
                chat.0,
                recipe.name(),
                recipe.id()
            );
            dialogue.update(State::Showing(recipe)).await?;
        }
        Lookup::Missing(text) => {
            bot.send_message(chat, text)
                .parse_mode(ParseMode::Html)
                .await?;
        }
    }
    Ok(())
}

async fn show_random(bot: Bot, dialogue: MyDialogue, kitchen: Chef) -> HandlerResult {
    typing(&bot, dialogue.chat_id()).await;
    let lookup = kitchen.random_recipe().await;
    present(&bot, &dialogue, lookup).await
}

/// First visit: a random recipe, then the saved list when there is one.
async fn start(bot: Bot, dialogue: MyDialogue, kitchen: Chef) -> HandlerResult {
    let chat = dialogue.chat_id();
    show_random(bot.clone(), dialogue, kitchen.clone()).await?;
    match kitchen.saved(chat.0) {
        Ok(names) if !names.is_empty() => send_saved_list(&bot, chat, &names).await,
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("Failed to load saved recipes for chat {}: {}", chat.0, e);
            Ok(())
        }
    }
}

fn random_theme() -> String {
    REMIX_THEMES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Surprise")
        .to_string()
}

async fn remix_command(
    bot: Bot,
    dialogue: MyDialogue,
    kitchen: Chef,
    flights: Arc<InFlight>,
    state: State,
    theme: String,
) -> HandlerResult {
    let theme = match theme.trim() {
        "" => random_theme(),
        theme => theme.to_string(),
    };
    start_remix(bot, dialogue.chat_id(), kitchen, flights, state, theme).await
}

fn animate(bot: Bot, chat: ChatId, placeholder: MessageId) -> Thinking {
    Thinking::start(move |frame| {
        let bot = bot.clone();
        async move {
            match bot.edit_message_text(chat, placeholder, frame).await {
                Ok(_) => (),
                Err(RequestError::RetryAfter(wait)) => {
                    log::debug!("Thinking frames throttled in chat {}", chat.0);
                    tokio::time::sleep(wait.duration()).await;
                }
                Err(e) => log::debug!("Skipped a thinking frame in chat {}: {}", chat.0, e),
            }
        }
    })
}

async fn start_remix(
    bot: Bot,
    chat: ChatId,
    kitchen: Chef,
    flights: Arc<InFlight>,
    state: State,
    theme: String,
) -> HandlerResult {
    let Some(recipe) = state.recipe().cloned() else {
        bot.send_message(chat, RemixReply::NoRecipe.text()).await?;
        return Ok(());
    };
    let Some(ticket) = flights.begin(chat.0) else {
        bot.send_message(chat, kitchen::REMIX_BUSY).await?;
        return Ok(());
    };

    log::info!(
        "Remixing {:?} as {:?} for chat {}",
        recipe.name(),
        theme,
        chat.0
    );
    let placeholder = bot.send_message(chat, thinking_frame(0)).await?;

    // The dispatcher would otherwise queue this chat's updates behind the request.
    tokio::spawn(async move {
        let _ticket = ticket;
        let thinking = animate(bot.clone(), chat, placeholder.id);
        let reply = kitchen.remix(Some(&recipe), &theme).await;
        thinking.stop().await;

        let text = render::truncate(reply.text(), render::MESSAGE_LIMIT);
        let delivery = thinking::deliver(
            || edit_placeholder(&bot, chat, placeholder.id, text.clone()),
            || async {
                match bot.send_message(chat, text.clone()).await {
                    Ok(_) => true,
                    Err(e) => {
                        log::error!("Failed to deliver the remix to chat {}: {}", chat.0, e);
                        false
                    }
                }
            },
        )
        .await;
        if delivery != Delivery::Edited {
            log::warn!("Remix for chat {} ended as {:?}", chat.0, delivery);
        }
    });
    Ok(())
}

async fn edit_placeholder(
    bot: &Bot,
    chat: ChatId,
    placeholder: MessageId,
    text: String,
) -> EditAttempt {
    match bot.edit_message_text(chat, placeholder, text).await {
        Ok(_) => EditAttempt::Done,
        Err(RequestError::RetryAfter(wait)) => EditAttempt::RetryAfter(wait.duration()),
        Err(e) => {
            log::warn!("Could not edit the placeholder in chat {}: {}", chat.0, e);
            EditAttempt::Failed
        }
    }
}

async fn save(bot: Bot, dialogue: MyDialogue, kitchen: Chef, state: State) -> HandlerResult {
    let chat = dialogue.chat_id();
    let reply = match kitchen.save(chat.0, state.recipe()) {
        Ok(reply) => reply,
        Err(e) => {
            log::error!("Failed to save for chat {}: {}", chat.0, e);
            bot.send_message(chat, kitchen::STORE_FAILED).await?;
            return Ok(());
        }
    };
    if reply != SaveReply::Saved {
        bot.send_message(chat, reply.text()).await?;
        return Ok(());
    }

    match kitchen.saved(chat.0) {
        Ok(names) => {
            let text = render::saved_list_under(reply.text(), &names);
            send_saved_list_as(&bot, chat, text, &names).await?;
        }
        Err(e) => {
            log::error!("Failed to load saved recipes for chat {}: {}", chat.0, e);
            bot.send_message(chat, reply.text()).await?;
        }
    }
    Ok(())
}

async fn send_saved_list(bot: &Bot, chat: ChatId, names: &[String]) -> HandlerResult {
    send_saved_list_as(bot, chat, render::saved_list_text(names), names).await
}

async fn send_saved_list_as(
    bot: &Bot,
    chat: ChatId,
    text: String,
    names: &[String],
) -> HandlerResult {
    bot.send_message(chat, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard::saved_keyboard(names))
        .await?;
    Ok(())
}

async fn list_saved(bot: Bot, dialogue: MyDialogue, kitchen: Chef) -> HandlerResult {
    let chat = dialogue.chat_id();
    match kitchen.saved(chat.0) {
        Ok(names) => send_saved_list(&bot, chat, &names).await,
        Err(e) => {
            log::error!("Failed to load saved recipes for chat {}: {}", chat.0, e);
            bot.send_message(chat, kitchen::STORE_FAILED).await?;
            Ok(())
        }
    }
}

async fn open_saved(
    bot: &Bot,
    dialogue: &MyDialogue,
    kitchen: &Chef,
    idx: usize,
    expected: Option<&str>,
) -> HandlerResult {
    let chat = dialogue.chat_id();
    typing(bot, chat).await;
    match kitchen.open_saved(chat.0, idx, expected).await {
        Ok(Some(lookup)) => present(bot, dialogue, lookup).await,
        Ok(None) => match kitchen.saved(chat.0) {
            Ok(names) => {
                let text = render::saved_list_under(kitchen::LIST_CHANGED, &names);
                send_saved_list_as(bot, chat, text, &names).await
            }
            Err(e) => {
                log::error!("Failed to load saved recipes for chat {}: {}", chat.0, e);
                bot.send_message(chat, kitchen::STORE_FAILED).await?;
                Ok(())
            }
        },
        Err(e) => {
            log::error!("Failed to open saved recipe {} for chat {}: {}", idx, chat.0, e);
            bot.send_message(chat, kitchen::STORE_FAILED).await?;
            Ok(())
        }
    }
}

/// Deletes entry `idx`, then redraws the list in `list_message` or in a new message.
///
/// `expected` is the name the tapped list showed for that entry; a mismatch deletes nothing.
async fn delete_saved(
    bot: &Bot,
    chat: ChatId,
    kitchen: &Chef,
    idx: usize,
    expected: Option<&str>,
    list_message: Option<MessageId>,
) -> HandlerResult {
    let deletion = match kitchen.delete_saved(chat.0, idx, expected) {
        Ok(deletion) => deletion,
        Err(e) => {
            log::error!("Failed to delete saved recipe {} for chat {}: {}", idx, chat.0, e);
            bot.send_message(chat, kitchen::STORE_FAILED).await?;
            return Ok(());
        }
    };

    let names = deletion.names();
    let text = match &deletion {
        Deletion::Removed(_) => render::saved_list_text(names),
        Deletion::Stale(_) => render::saved_list_under(kitchen::LIST_CHANGED, names),
    };
    match list_message {
        Some(id) => {
            if let Err(e) = bot
                .edit_message_text(chat, id, text)
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboard::saved_keyboard(names))
                .await
            {
                log::warn!("Could not redraw saved list in chat {}: {}", chat.0, e);
            }
            Ok(())
        }
        None => send_saved_list_as(bot, chat, text, names).await,
    }
}

const NUMBERED_FROM_ONE: &str =
    "Tell me which one, e.g. /open 2. Saved recipes are numbered from 1; send /saved to see them.";

/// `/open` or `/delete` without a usable number, which `Command::parse` rejects.
fn missing_number(text: &str) -> bool {
    let mut words = text.split_whitespace();
    let command = words.next().unwrap_or_default();
    let command = command.split('@').next().unwrap_or_default();
    let is_numbered = matches!(command.to_lowercase().as_str(), "/open" | "/delete");
    is_numbered && words.next().and_then(|n| n.parse::<usize>().ok()).is_none()
}

async fn numbering_hint(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, NUMBERED_FROM_ONE).await?;
    Ok(())
}

async fn open_command(bot: Bot, dialogue: MyDialogue, kitchen: Chef, n: usize) -> HandlerResult {
    match n.checked_sub(1) {
        Some(idx) => open_saved(&bot, &dialogue, &kitchen, idx, None).await,
        None => {
            bot.send_message(dialogue.chat_id(), NUMBERED_FROM_ONE).await?;
            Ok(())
        }
    }
}

async fn delete_command(bot: Bot, dialogue: MyDialogue, kitchen: Chef, n: usize) -> HandlerResult {
    let chat = dialogue.chat_id();
    match n.checked_sub(1) {
        Some(idx) => delete_saved(&bot, chat, &kitchen, idx, None, None).await,
        None => {
            bot.send_message(chat, NUMBERED_FROM_ONE).await?;
            Ok(())
        }
    }
}

async fn on_button(
    bot: Bot,
    dialogue: MyDialogue,
    kitchen: Chef,
    flights: Arc<InFlight>,
    state: State,
    q: CallbackQuery,
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;
    let Some(button) = q.data.as_deref().and_then(Button::parse) else {
        log::warn!("Ignoring unknown button payload {:?}", q.data);
        return Ok(());
    };

    let chat = dialogue.chat_id();
    let drawn = q
        .message
        .as_ref()
        .and_then(|m| m.regular_message())
        .and_then(|m| m.reply_markup());
    match button {
        Button::Random => show_random(bot, dialogue, kitchen).await,
        Button::Save => save(bot, dialogue, kitchen, state).await,
        Button::Saved => list_saved(bot, dialogue, kitchen).await,
        Button::Remix(idx) => {
            let theme = REMIX_THEMES
                .get(idx)
                .map(|theme| theme.to_string())
                .unwrap_or_else(random_theme);
            start_remix(bot, chat, kitchen, flights, state, theme).await
        }
        Button::Open(idx) => {
            let expected = drawn.and_then(|markup| keyboard::saved_label(markup, idx));
            open_saved(&bot, &dialogue, &kitchen, idx, expected).await
        }
        Button::Delete(idx) => {
            let expected = drawn.and_then(|markup| keyboard::saved_label(markup, idx));
            let list_message = q.message.as_ref().map(|m| m.id());
            delete_saved(&bot, chat, &kitchen, idx, expected, list_message).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_open_and_delete_get_a_hint() {
        assert!(Command::parse("/open", "cookbot").is_err());
        assert!(missing_number("/open"));
        assert!(missing_number("/delete first"));
        assert!(missing_number("/Open@cookbot"));
        assert!(!missing_number("/open 2"));
        assert!(!missing_number("/delete@cookbot 1"));
        assert!(!missing_number("/remix"));
        assert!(!missing_number("/opened"));
    }
}
