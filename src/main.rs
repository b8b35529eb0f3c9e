//! storyteller main entry point
//!
//! The main loop reads one channel carrying two kinds of events:
//! 1. command lines typed by the user (from a stdin reader thread)
//! 2. speech events reported by the synthesizer (completion, errors)
//!
//! Everything that touches the session happens on this thread, in the
//! order the events arrive.

use anyhow::Context;
use log::{debug, error, info, warn};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::sync::mpsc::{self, Sender};
use std::thread;
use storyteller::session::config::Config;
use storyteller::session::history::History;
use storyteller::session::store::{FileStore, MemoryStore};
use storyteller::session::Session;
use storyteller::speech::{
    create_synth, EventSink, PlaybackState, PlaybackUpdate, Player, SynthEvent,
};
use storyteller::story::{CommandGenerator, StoryLength};
use storyteller::{Result, StoryError};

/// Everything the main loop reacts to
enum AppEvent {
    Command(String),
    Speech(SynthEvent),
    InputClosed,
}

impl From<SynthEvent> for AppEvent {
    fn from(event: SynthEvent) -> Self {
        AppEvent::Speech(event)
    }
}

/// Whether the main loop keeps going after a command
enum Flow {
    Continue,
    Quit,
}

const HELP: &str = "\
Playback:
  play              play from the start, or resume when paused
  resume            continue the paused paragraph
  pause             pause at the current paragraph
  stop              stop and rewind
  toggle            stop when playing, otherwise play (also: empty line)
Voice:
  voices            list available voices
  voice <name>      use a voice
  voice default     let the platform choose
  rate <value>      speech rate, 0.5 to 2.0
Story:
  gen [prompt]      generate a new story
  genre|tone|theme|length|keywords <value>
                    set a story parameter
  show              print the story
  history           list recent stories
  open <n>          reopen story n from the history
Other:
  status            show playback state and settings
  help              this text
  quit              exit";

fn main() {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let debug_mode = args.iter().any(|arg| arg == "--debug" || arg == "-d");

    // Initialize logger
    if debug_mode {
        // Debug mode: write to storyteller.log file
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("storyteller.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open storyteller.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "storyteller version {} starting (debug mode, logging to storyteller.log)",
            storyteller::VERSION
        );
    } else {
        // Normal mode: minimal logging to stderr, only errors
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Error)
            .init();
    }

    let file = args
        .iter()
        .skip(1)
        .find(|arg| *arg != "--debug" && *arg != "-d")
        .map(PathBuf::from);

    if let Err(e) = run(file) {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(file: Option<PathBuf>) -> anyhow::Result<()> {
    debug!("Initializing storyteller");

    let mut config = Config::load().context("Failed to load configuration")?;
    info!("Config loaded from {:?}", config.path());

    let (tx, rx) = mpsc::channel::<AppEvent>();

    let synth = create_synth(config.backend(), EventSink::from_sender(tx.clone()))
        .context("Failed to initialize speech")?;
    let mut player = Player::new(synth);
    if let Err(e) = player.refresh_voices() {
        warn!("Could not list voices: {}", e);
    }
    apply_saved_voice(&mut player, &config);

    let history_dir = config.history_dir();
    let history = match History::load(Box::new(FileStore::new(&history_dir))) {
        Ok(history) => history,
        Err(e) => {
            warn!("{}; history in {:?} will not be updated", e, history_dir);
            eprintln!("Warning: {}", e);
            History::load(Box::new(MemoryStore::new()))?
        }
    };

    let mut session = Session::new(config.story_defaults(), player, history)
        .with_credential(config.credential(), config.credential_env());
    match config
        .generator_command()
        .and_then(|cmd| CommandGenerator::from_command_line(&cmd))
    {
        Some(generator) => session = session.with_generator(Box::new(generator)),
        None => info!("No generator command configured"),
    }

    if let Some(path) = file {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        session.show_story(&text)?;
        println!(
            "Loaded {} ({} paragraphs)",
            path.display(),
            session.paragraphs().len()
        );
    }

    spawn_input_reader(tx);

    println!(
        "storyteller {} using {} speech. Type 'help' for commands.",
        storyteller::VERSION,
        session.player.backend_name()
    );
    prompt();

    info!("Entering event loop");
    while let Ok(event) = rx.recv() {
        match event {
            AppEvent::Command(line) => {
                match execute(&mut session, &mut config, line.trim()) {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => println!("Error: {}", e),
                }
                prompt();
            }
            AppEvent::Speech(event) => handle_speech(&mut session, event),
            AppEvent::InputClosed => {
                debug!("stdin closed");
                break;
            }
        }
    }

    session.player.stop()?;
    info!("storyteller exiting");
    Ok(())
}

/// Forward stdin lines into the event channel
fn spawn_input_reader(tx: Sender<AppEvent>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(AppEvent::Command(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(AppEvent::InputClosed);
    });
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

/// Restore the voice and rate saved in the config
fn apply_saved_voice(player: &mut Player, config: &Config) {
    let catalog = player.catalog_mut();
    if let Some(name) = config.voice() {
        if let Err(e) = catalog.select(&name) {
            warn!("Saved voice unavailable: {}", e);
        }
    }
    if let Err(e) = catalog.set_rate(config.rate()) {
        warn!("Saved rate ignored: {}", e);
    }
}

fn handle_speech(session: &mut Session, event: SynthEvent) {
    match session.player.handle_event(event) {
        Ok(PlaybackUpdate::Advanced(_)) => announce(session),
        Ok(PlaybackUpdate::Finished) => {
            println!("\n[end of story]");
            prompt();
        }
        Ok(PlaybackUpdate::Failed(reason)) => {
            println!("\nSpeech error: {}", reason);
            prompt();
        }
        Ok(PlaybackUpdate::VoicesRefreshed) => {
            debug!("{} voices available", session.player.catalog().voices().len())
        }
        Ok(PlaybackUpdate::Ignored) => {}
        Err(e) => {
            error!("Speech event failed: {}", e);
            println!("\nSpeech error: {}", e);
            prompt();
        }
    }
}

/// Print the paragraph now being read
fn announce(session: &Session) {
    if session.playback_state() != PlaybackState::Playing {
        return;
    }
    if let Some((index, text)) = session.player.current_paragraph() {
        println!("\n[{}/{}] {}", index + 1, session.paragraphs().len(), text);
        prompt();
    }
}

fn execute(session: &mut Session, config: &mut Config, line: &str) -> Result<Flow> {
    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };
    debug!("Command: {:?} {:?}", command, arg);

    match command {
        "" | "toggle" => {
            session.player.toggle()?;
            announce(session);
        }
        "play" => {
            if session.paragraphs().is_empty() {
                println!("No story loaded. Use 'gen' to create one.");
            }
            session.player.play()?;
            announce(session);
        }
        "resume" => {
            session.player.resume()?;
            announce(session);
        }
        "pause" => session.player.pause()?,
        "stop" => session.player.stop()?,
        "voices" => list_voices(session),
        "voice" => set_voice(session, config, arg)?,
        "rate" => {
            if arg.is_empty() {
                println!("Rate: {}", session.player.catalog().rate());
            } else {
                let value: f32 = arg
                    .parse()
                    .map_err(|_| StoryError::Other(format!("Not a number: {}", arg)))?;
                session.player.catalog_mut().set_rate(value)?;
                config.set("speech", "rate", &value.to_string());
                save_config(config);
            }
        }
        "gen" => {
            if !arg.is_empty() {
                session.request.prompt = arg.to_string();
            }
            println!("Generating...");
            match session.generate() {
                Ok(()) => {
                    print_story(session);
                    if let Some(warning) = session.warning() {
                        println!("Warning: {}", warning);
                    }
                }
                Err(e) => {
                    debug!("generate: {}", e);
                    println!("{}", session.last_error().unwrap_or("Failed to generate story."));
                }
            }
        }
        "genre" => session.request.genre = arg.to_string(),
        "tone" => session.request.tone = arg.to_string(),
        "theme" => session.request.theme = arg.to_string(),
        "keywords" => session.request.keywords = arg.to_string(),
        "length" => session.request.length = arg.parse::<StoryLength>()?,
        "show" => print_story(session),
        "history" => list_history(session),
        "open" => {
            let n: usize = arg
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| StoryError::Other(format!("Not a history number: {}", arg)))?;
            session.open_history(n - 1)?;
            print_story(session);
        }
        "status" => print_status(session),
        "help" => println!("{}", HELP),
        "quit" | "exit" => return Ok(Flow::Quit),
        other => println!("Unknown command '{}'. Type 'help' for commands.", other),
    }

    Ok(Flow::Continue)
}

fn set_voice(session: &mut Session, config: &mut Config, arg: &str) -> Result<()> {
    let catalog = session.player.catalog_mut();
    match arg {
        "" => match catalog.selected() {
            Some(voice) => println!("Voice: {}", voice),
            None => println!("Voice: platform default"),
        },
        "default" => {
            catalog.select_platform_default();
            config.set("speech", "voice", "");
            save_config(config);
        }
        name => {
            catalog.select(name)?;
            config.set("speech", "voice", name);
            save_config(config);
        }
    }
    Ok(())
}

fn save_config(config: &Config) {
    if let Err(e) = config.save() {
        warn!("{}", e);
        println!("Warning: {}", e);
    }
}

fn list_voices(session: &Session) {
    let catalog = session.player.catalog();
    if catalog.voices().is_empty() {
        println!("No voices reported; the platform default is used.");
        return;
    }
    let selected = catalog.selected().map(|v| v.id.as_str());
    for voice in catalog.voices() {
        let marker = if Some(voice.id.as_str()) == selected { "*" } else { " " };
        println!("{} {}", marker, voice);
    }
}

fn print_story(session: &Session) {
    if session.paragraphs().is_empty() {
        println!("No story loaded.");
        return;
    }
    if let Some(character) = session.character() {
        println!("Character profile:\n{}\n", character);
    }
    let current = session.player.current_paragraph().map(|(i, _)| i);
    for (index, paragraph) in session.paragraphs().iter().enumerate() {
        let marker = if Some(index) == current { ">" } else { " " };
        println!("{}{:>3}  {}", marker, index + 1, paragraph);
    }
}

fn list_history(session: &Session) {
    let history = session.history();
    if history.is_empty() {
        println!("No stories yet.");
        return;
    }
    for (index, entry) in history.entries().iter().enumerate() {
        println!(
            "{:>2}. {}  [{}, {}]  {}",
            index + 1,
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.genre,
            entry.tone,
            entry.preview(60)
        );
    }
}

fn print_status(session: &Session) {
    let catalog = session.player.catalog();
    let request = &session.request;
    let position = if session.paragraphs().is_empty() {
        "no story".to_string()
    } else {
        format!(
            "paragraph {} of {}",
            session.playback_cursor() + 1,
            session.paragraphs().len()
        )
    };

    println!("State:   {} ({})", session.playback_state(), position);
    println!(
        "Voice:   {}",
        catalog
            .selected()
            .map_or("platform default".to_string(), |v| v.to_string())
    );
    println!("Rate:    {}", catalog.rate());
    println!("Backend: {}", session.player.backend_name());
    println!(
        "Story:   genre={} tone={} theme={} length={} keywords={:?}",
        request.genre, request.tone, request.theme, request.length, request.keywords
    );
    if !request.prompt.is_empty() {
        println!("Prompt:  {}", request.prompt);
    }
}
