pub mod structs;
pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod geo;
pub mod locator;
pub mod presenter;

use api::*;
use cache::InMemoryCache;
use config::*;
use error::LocateError;
use locator::*;
use presenter::{
    list::{ClickEffect, CompletionEffect, ListState},
    map::{LinkMap, MapPresenter, MarkerIcon},
};
use structs::*;

use dptree::{case, deps};
use std::{error::Error, sync::Arc};
use teloxide::{
    dispatching::{dialogue, dialogue::InMemStorage},
    dptree::endpoint,
    filter_command,
    payloads::{AnswerCallbackQuerySetters, EditMessageTextSetters, SendMessageSetters},
    prelude::*,
    types::{
        ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
        KeyboardRemove, MessageId, ParseMode::Html,
    },
    utils::command::BotCommands,
    ApiError, RequestError,
};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type MyDialogue = Dialogue<State, InMemStorage<State>>;

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
enum Command {
    #[command(description = "Display help menu showing the commands list")]
    Help,
    #[command(description = "Find bus stops around your location.")]
    Start,
    #[command(description = "Set the search radius in meters, e.g. /radius 300")]
    Radius(String),
    #[command(description = "Forget your location and stop.")]
    Cancel,
}

/// Everything one chat is looking at after a successful locate.
#[derive(Clone, Debug)]
struct Session {
    position: UserPosition,
    radius: u32,
    list: ListState,
    map: MapPresenter<LinkMap>,
    /// The message carrying the stop list keyboard.
    message_id: Option<MessageId>,
}

#[derive(Clone, Default)]
enum State {
    #[default]
    Start,
    AwaitLocation {
        radius: u32,
    },
    Browsing {
        session: Session,
    },
}

impl State {
    fn radius(&self, default: u32) -> u32 {
        match self {
            State::Start => default,
            State::AwaitLocation { radius } => *radius,
            State::Browsing { session } => session.radius,
        }
    }

    fn position(&self) -> Option<UserPosition> {
        match self {
            State::Browsing { session } => Some(session.position),
            _ => None,
        }
    }
}

/// Callback payloads of the inline keyboards.
#[derive(Debug, PartialEq)]
enum Action {
    Stop(usize),
    Radius(String),
    CloseMap,
}

fn parse_action(data: &str) -> Option<Action> {
    match data.split_once(':')? {
        ("stop", i) => i.parse().ok().map(Action::Stop),
        ("radius", r) => Some(Action::Radius(r.to_string())),
        ("map", "close") => Some(Action::CloseMap),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();
    log::info!("Starting 'Nearby bus stops' BOT ...");

    let config = Arc::new(Config::from_env());
    log::info!(
        "Using API {} with default radius {}m",
        config.api_base,
        config.default_radius
    );
    let api = KmbClient::new(config.api_base.clone());
    let cache = InMemoryCache::new();

    let bot = Bot::from_env();

    let command_handler = filter_command::<Command, _>()
        .branch(case![Command::Help].endpoint(help))
        .branch(case![Command::Start].endpoint(start))
        .branch(case![Command::Radius(input)].endpoint(change_radius))
        .branch(case![Command::Cancel].endpoint(cancel));

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(
            dptree::filter_map(|msg: Message| {
                msg.location().map(|l| UserPosition {
                    lat: l.latitude,
                    lon: l.longitude,
                })
            })
            .endpoint(receive_location),
        )
        .branch(endpoint(invalid_state));

    let callback_query_handler = Update::filter_callback_query()
        .branch(case![State::Browsing { session }].endpoint(receive_click))
        .branch(endpoint(expired_click));

    let dial = dialogue::enter::<Update, InMemStorage<State>, State, _>()
        .branch(message_handler)
        .branch(callback_query_handler);

    Dispatcher::builder(bot, dial)
        .dependencies(deps![InMemStorage::<State>::new(), api, cache, config])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    Ok(())
}

async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn invalid_state(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "Unable to handle the message. Share your location or type /help to see the usage.",
    )
    .await?;
    Ok(())
}

//////////////////////////////////////////////////////////
// State handlers
//////////////////////////////////////////////////////////
async fn cancel(bot: Bot, dialogue: MyDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "🚫 Forgot your location. Use /start to search again.")
        .reply_markup(KeyboardRemove::new())
        .await?;
    dialogue.exit().await?;
    Ok(())
}

async fn start(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
    config: Arc<Config>,
) -> HandlerResult {
    let state = dialogue.get().await?.unwrap_or_default();
    let radius = state.radius(config.default_radius);

    bot.send_message(
        msg.chat.id,
        format!(
            "🚏 Let's find bus stops near you!\n\nSend me your location and I will list the stops within <b>{}m</b>.",
            radius
        ),
    )
    .parse_mode(Html)
    .reply_markup(location_keyboard())
    .await?;
    dialogue.update(State::AwaitLocation { radius }).await?;
    Ok(())
}

async fn change_radius(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
    input: String,
    api: KmbClient,
    cache: InMemoryCache,
    config: Arc<Config>,
) -> HandlerResult {
    let state = dialogue.get().await?.unwrap_or_default();
    let current = state.radius(config.default_radius);

    match state.position() {
        Some(position) => {
            relocate(&bot, &dialogue, msg.chat.id, &api, &cache, Some(position), &input, current)
                .await
        }
        None => {
            match parse_radius(&input) {
                Ok(radius) => {
                    bot.send_message(
                        msg.chat.id,
                        format!("Radius set to <b>{}m</b>. Now send me your location.", radius),
                    )
                    .parse_mode(Html)
                    .reply_markup(location_keyboard())
                    .await?;
                    dialogue.update(State::AwaitLocation { radius }).await?;
                }
                Err(e) => {
                    log::info!("Invalid radius entered: {:?}", input);
                    bot.send_message(msg.chat.id, e.to_string()).await?;
                }
            }
            Ok(())
        }
    }
}

async fn receive_location(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
    position: UserPosition,
    api: KmbClient,
    cache: InMemoryCache,
    config: Arc<Config>,
) -> HandlerResult {
    let state = dialogue.get().await?.unwrap_or_default();
    let radius = state.radius(config.default_radius);

    bot.send_message(msg.chat.id, "🔎 Finding nearby bus stops...")
        .reply_markup(KeyboardRemove::new())
        .await?;

    relocate(
        &bot,
        &dialogue,
        msg.chat.id,
        &api,
        &cache,
        Some(position),
        &radius.to_string(),
        radius,
    )
    .await
}

/// Runs the locate flow and replaces the chat's session with its result.
#[allow(clippy::too_many_arguments)]
async fn relocate(
    bot: &Bot,
    dialogue: &MyDialogue,
    chat_id: ChatId,
    api: &KmbClient,
    cache: &InMemoryCache,
    position: Option<UserPosition>,
    radius_input: &str,
    current_radius: u32,
) -> HandlerResult {
    let geolocator = SharedLocation(position);

    let (position, nearby) = match locate(&geolocator, api, cache, radius_input).await {
        Ok((position, LocateOutcome::Found(nearby))) => (position, nearby),
        Ok((position, LocateOutcome::Empty)) => (position, vec![]),
        Err(e @ LocateError::InvalidRadius(_)) => {
            log::info!("Invalid radius entered: {:?}", radius_input);
            bot.send_message(chat_id, e.to_string()).await?;
            return Ok(());
        }
        Err(e @ (LocateError::GeolocationUnavailable | LocateError::GeolocationFailed(_))) => {
            log::info!("Geolocation error: {}", e);
            bot.send_message(chat_id, e.to_string())
                .reply_markup(location_keyboard())
                .await?;
            return Ok(());
        }
        Err(e @ LocateError::Fetch(_)) => {
            log::error!("{}", e);
            bot.send_message(chat_id, format!("❌ {}", e)).await?;
            return Ok(());
        }
    };

    let radius = parse_radius(radius_input).unwrap_or(current_radius);
    let mut session = Session {
        position,
        radius,
        list: ListState::new(nearby),
        map: MapPresenter::new(LinkMap::default()),
        message_id: None,
    };

    let (text, kb) = render_session(&session);
    let sent = bot
        .send_message(chat_id, text)
        .parse_mode(Html)
        .disable_web_page_preview(true)
        .reply_markup(kb)
        .await?;
    session.message_id = Some(sent.id);

    dialogue.update(State::Browsing { session }).await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn receive_click(
    bot: Bot,
    dialogue: MyDialogue,
    mut session: Session,
    q: CallbackQuery,
    api: KmbClient,
    cache: InMemoryCache,
    config: Arc<Config>,
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;

    let (Some(data), Some(message)) = (&q.data, &q.message) else {
        return Ok(());
    };
    if session.message_id != Some(message.id) {
        bot.send_message(message.chat.id, "This list is outdated, use the latest one.")
            .await?;
        return Ok(());
    }
    let chat_id = message.chat.id;

    match parse_action(data) {
        Some(Action::Stop(index)) => match session.list.click(index) {
            ClickEffect::FetchEta { index, stop_id } => {
                refresh(&bot, chat_id, &session).await?;
                dialogue
                    .update(State::Browsing {
                        session: session.clone(),
                    })
                    .await?;

                let result = api.stop_eta(&stop_id).await;

                // Apply the answer to whatever the session looks like now.
                let mut session = match dialogue.get().await? {
                    Some(State::Browsing { session }) => session,
                    _ => return Ok(()),
                };
                let same_stop = session
                    .list
                    .entries()
                    .get(index)
                    .map_or(false, |e| e.nearby.stop.id == stop_id);
                if !same_stop {
                    log::debug!("Dropping ETA for {}: list was replaced", stop_id);
                    return Ok(());
                }

                if let CompletionEffect::FocusMap(stop) =
                    session.list.complete_fetch(index, result, config.display_offset)
                {
                    session.map.focus(&stop, session.position);
                }
                refresh(&bot, chat_id, &session).await?;
                dialogue.update(State::Browsing { session }).await?;
            }
            ClickEffect::CloseMap => {
                session.map.close();
                refresh(&bot, chat_id, &session).await?;
                dialogue.update(State::Browsing { session }).await?;
            }
            ClickEffect::Ignored => {}
        },
        Some(Action::Radius(input)) => {
            let position = Some(session.position);
            relocate(&bot, &dialogue, chat_id, &api, &cache, position, &input, session.radius)
                .await?;
        }
        Some(Action::CloseMap) => {
            session.map.close();
            refresh(&bot, chat_id, &session).await?;
            dialogue.update(State::Browsing { session }).await?;
        }
        None => log::warn!("Unknown callback data {:?}", data),
    }
    Ok(())
}

async fn expired_click(bot: Bot, q: CallbackQuery) -> HandlerResult {
    bot.answer_callback_query(q.id)
        .text("This list has expired. Use /start to search again.")
        .await?;
    Ok(())
}

/// Re-renders the session's list message in place.
async fn refresh(bot: &Bot, chat_id: ChatId, session: &Session) -> HandlerResult {
    let Some(message_id) = session.message_id else {
        return Ok(());
    };
    let (text, kb) = render_session(session);
    match bot
        .edit_message_text(chat_id, message_id, text)
        .parse_mode(Html)
        .disable_web_page_preview(true)
        .reply_markup(kb)
        .await
    {
        Ok(_) => Ok(()),
        Err(e) if is_unchanged_edit(&e) => {
            log::debug!("Stop list already up to date");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Telegram refuses edits that change nothing; that is not a failure.
fn is_unchanged_edit(err: &RequestError) -> bool {
    matches!(err, RequestError::Api(ApiError::MessageNotModified))
}

//////////////////////////////////////////////////////////
// Rendering
//////////////////////////////////////////////////////////
fn render_session(session: &Session) -> (String, InlineKeyboardMarkup) {
    let list = &session.list;

    let mut text = if list.is_empty() {
        format!("Cannot locate nearby bus stops within <b>{}m</b>", session.radius)
    } else {
        format!(
            "🚏 <b>{}</b> bus stops within <b>{}m</b>",
            list.len(),
            session.radius
        )
    };
    if list.len() > MAX_LISTED_STOPS {
        text.push_str(&format!("\n(showing the nearest {})", MAX_LISTED_STOPS));
    }

    if let Some(block) = list.render_expanded() {
        text.push_str("\n\n");
        text.push_str(&block);
    }

    if let Some(url) = session.map.widget().url() {
        text.push_str(&format!("\n\n🗺 <a href=\"{}\">Open map</a>", url));
        if let Some(user) = session
            .map
            .widget()
            .markers()
            .iter()
            .find(|m| m.icon == MarkerIcon::User)
        {
            text.push_str(&format!(" · 📍 you: {:.5}, {:.5}", user.lat, user.lon));
        }
    }

    (text, make_session_keyboard(session))
}

//////////////////////////////////////////////////////////
// Keyboards
//////////////////////////////////////////////////////////
/// One button per listed stop, then the radius choices and the map close button.
fn make_session_keyboard(session: &Session) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = (0..session.list.len().min(MAX_LISTED_STOPS))
        .filter_map(|i| {
            let label = session.list.entry_label(i)?;
            Some(vec![InlineKeyboardButton::callback(label, format!("stop:{}", i))])
        })
        .collect();

    let radius_row = RADIUS_CHOICES
        .iter()
        .map(|&r| {
            let label = if r == session.radius {
                format!("• {}m", r)
            } else {
                format!("{}m", r)
            };
            InlineKeyboardButton::callback(label, format!("radius:{}", r))
        })
        .collect();
    keyboard.push(radius_row);

    if session.map.is_visible() {
        keyboard.push(vec![InlineKeyboardButton::callback("✖ Close map", "map:close")]);
    }

    InlineKeyboardMarkup::new(keyboard)
}

fn location_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new("📍 Share my location").request(ButtonRequest::Location)
    ]])
    .resize_keyboard(true)
    .one_time_keyboard(true)
}
