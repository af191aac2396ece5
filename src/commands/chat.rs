use std::io::{self, BufRead, Write};
use std::path::Path;

use clap::Args;
use futures::StreamExt;
use owo_colors::OwoColorize;

use crate::chat::api::ApiTarget;
use crate::chat::client::complete;
use crate::chat::composer::{ImageAttachment, compose_user_content};
use crate::chat::request::ChatRequest;
use crate::chat::session::{ChatSession, STREAM_ERROR_MARKER, Turn};
use crate::chat::stream::{StreamEvent, stream_chat_completions};
use crate::commands::settings::{self, Overrides, ResolvedSettings};

const GREETING: &str =
    "Hi! Ask me anything. :image <path> attaches a picture, :clear resets, :quit exits.";

#[derive(Debug, Args, Clone)]
pub struct ChatArgs {
    /// Profile name from the config file
    #[arg(long)]
    pub profile: Option<String>,
    /// Model identifier
    #[arg(long)]
    pub model: Option<String>,
    /// System prompt
    #[arg(long)]
    pub system: Option<String>,
    #[arg(long)]
    pub temperature: Option<f64>,
    #[arg(long)]
    pub top_p: Option<f64>,
    #[arg(long)]
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds (non-streaming only)
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Wait for complete answers instead of streaming them
    #[arg(long)]
    pub no_stream: bool,
}

pub async fn run(args: ChatArgs) -> Result<(), String> {
    let settings = settings::resolve(
        args.profile.as_deref(),
        Overrides {
            model: args.model,
            system: args.system,
            temperature: args.temperature,
            top_p: args.top_p,
            max_tokens: args.max_tokens,
            timeout: args.timeout,
        },
    )?;
    let streaming = if args.no_stream {
        false
    } else {
        settings.stream.unwrap_or(true)
    };

    let target = ApiTarget::from_env().map_err(|err| err.to_string())?;
    let client = reqwest::Client::new();
    let mut session = ChatSession::new();
    let mut pending_image: Option<ImageAttachment> = None;

    println!("{}", GREETING.dimmed());

    let stdin = io::stdin();
    loop {
        print!("{} ", "you>".cyan().bold());
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => return Err(format!("Failed to read input: {err}")),
        }
        let line = line.trim();

        match line {
            ":quit" | ":exit" => break,
            ":clear" => {
                session.clear();
                pending_image = None;
                println!("{}", "(conversation cleared)".dimmed());
                continue;
            }
            _ => {}
        }
        if let Some(path) = line.strip_prefix(":image") {
            match attach_image(path.trim()) {
                Ok(image) => {
                    println!("{}", format!("(attached {})", path.trim()).dimmed());
                    pending_image = Some(image);
                }
                Err(err) => eprintln!("{err}"),
            }
            continue;
        }
        if line.is_empty() && pending_image.is_none() {
            continue;
        }

        let text = (!line.is_empty()).then_some(line);
        let image = pending_image.take();
        let content = compose_user_content(text, image.as_ref());

        let turn = session.begin_turn(content);
        let request = ChatRequest::from_transcript(
            &settings.system,
            session.transcript(),
            &settings.generation_params(),
            streaming,
        );

        if streaming {
            run_streaming_turn(&client, &target, &request, &mut session, turn).await;
        } else {
            run_blocking_turn(&client, &target, &request, &settings, &mut session, turn).await;
        }
    }

    Ok(())
}

/// One streaming exchange: deltas echo as they arrive, then the buffer is
/// committed. A failed call start appends the error marker instead.
async fn run_streaming_turn(
    client: &reqwest::Client,
    target: &ApiTarget,
    request: &ChatRequest,
    session: &mut ChatSession,
    turn: Turn,
) {
    let mut events = match stream_chat_completions(client, target, request).await {
        Ok(events) => events,
        Err(_) => {
            session.fail_turn(turn, STREAM_ERROR_MARKER);
            println!("{} {}", "assistant>".green().bold(), STREAM_ERROR_MARKER);
            return;
        }
    };

    print!("{} ", "assistant>".green().bold());
    let _ = io::stdout().flush();

    let mut failure = None;
    while let Some(event) = events.next().await {
        match event {
            Ok(StreamEvent::Delta(delta)) => {
                session.apply_delta(turn, &delta);
                print!("{delta}");
                let _ = io::stdout().flush();
            }
            Ok(StreamEvent::Completed) => break,
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }
    println!();

    match failure {
        Some(err) => {
            session.cancel_turn(turn);
            eprintln!("{err}");
        }
        None => {
            session.finish_turn(turn);
        }
    }
}

/// One non-streaming exchange: exactly one assistant message is appended,
/// the completion text or the error text.
async fn run_blocking_turn(
    client: &reqwest::Client,
    target: &ApiTarget,
    request: &ChatRequest,
    settings: &ResolvedSettings,
    session: &mut ChatSession,
    turn: Turn,
) {
    let reply = match complete(client, target, request, settings.timeout_secs).await {
        Ok(completion) => completion.content,
        Err(err) => err.to_string(),
    };
    session.push_assistant(turn, reply.clone());
    println!("{} {reply}", "assistant>".green().bold());
}

fn attach_image(path: &str) -> Result<ImageAttachment, String> {
    if path.is_empty() {
        return Err("Usage: :image <path>".to_string());
    }
    ImageAttachment::from_path(Path::new(path)).map_err(|err| err.to_string())
}
