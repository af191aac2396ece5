use std::io::{self, Read, Write};
use std::path::PathBuf;

use clap::Args;
use futures::StreamExt;
use serde_json::json;

use crate::chat::api::ApiTarget;
use crate::chat::client::{Completion, Usage, complete};
use crate::chat::composer::{ImageAttachment, compose_user_content};
use crate::chat::message::{Message, Role};
use crate::chat::request::ChatRequest;
use crate::chat::stream::{StreamEvent, stream_chat_completions};
use crate::commands::settings::{self, Overrides};

#[derive(Debug, Args, Clone)]
pub struct AskArgs {
    /// Prompt text; read from stdin when omitted
    pub prompt: Option<String>,
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
    /// PNG or JPEG file to attach to the question
    #[arg(long)]
    pub image: Option<PathBuf>,
    /// Stream the answer as it is generated
    #[arg(long)]
    pub stream: bool,
    /// Print the request envelope as JSON instead of calling the API
    #[arg(long)]
    pub dry_run: bool,
    /// Emit the answer as a JSON object
    #[arg(long)]
    pub json: bool,
    /// Report token usage on stderr
    #[arg(long)]
    pub show_usage: bool,
}

pub async fn run(args: AskArgs) -> Result<(), String> {
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
    let stream = args.stream || settings.stream.unwrap_or(false);

    let prompt = match args.prompt {
        Some(prompt) => prompt,
        None => read_stdin_prompt()?,
    };
    let text = {
        let trimmed = prompt.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };

    let image = args
        .image
        .as_deref()
        .map(ImageAttachment::from_path)
        .transpose()
        .map_err(|err| err.to_string())?;

    if text.is_none() && image.is_none() {
        return Err("No prompt provided. Pass it as an argument, pipe it on stdin, or attach --image.".to_string());
    }

    let content = compose_user_content(text.as_deref(), image.as_ref());
    let user = Message::new(Role::User, content);
    let params = settings.generation_params();
    let request = ChatRequest::single_turn(&settings.system, user, &params, stream);

    if args.dry_run {
        let envelope = serde_json::to_value(&request)
            .map_err(|err| format!("Failed to encode request: {err}"))?;
        let summary = json!({
            "dry_run": true,
            "model": settings.model,
            "output": if args.json { "json" } else { "text" },
            "request": {
                "temperature": settings.temperature,
                "top_p": settings.top_p,
                "max_tokens": settings.max_tokens,
                "timeout_secs": settings.timeout_secs,
                "stream": stream,
            },
            "messages": envelope.get("messages").cloned().unwrap_or_default(),
        });
        println!("{summary}");
        if args.show_usage {
            eprintln!("usage: unavailable (dry-run)");
        }
        return Ok(());
    }

    let target = ApiTarget::from_env().map_err(|err| err.to_string())?;
    let client = reqwest::Client::new();

    if stream {
        let answer = run_streaming(&client, &target, &request, !args.json).await?;
        if args.json {
            println!(
                "{}",
                json!({"model": settings.model, "content": answer, "usage": null})
            );
        }
        if args.show_usage {
            eprintln!("usage: unavailable (stream)");
        }
        return Ok(());
    }

    let completion = complete(&client, &target, &request, settings.timeout_secs)
        .await
        .map_err(|err| err.to_string())?;
    print_completion(&settings.model, &completion, args.json);
    if args.show_usage {
        report_usage(completion.usage);
    }
    Ok(())
}

async fn run_streaming(
    client: &reqwest::Client,
    target: &ApiTarget,
    request: &ChatRequest,
    echo: bool,
) -> Result<String, String> {
    let mut events = stream_chat_completions(client, target, request)
        .await
        .map_err(|err| err.to_string())?;

    let mut answer = String::new();
    while let Some(event) = events.next().await {
        match event.map_err(|err| err.to_string())? {
            StreamEvent::Delta(delta) => {
                if echo {
                    print!("{delta}");
                    let _ = io::stdout().flush();
                }
                answer.push_str(&delta);
            }
            StreamEvent::Completed => break,
        }
    }
    if echo {
        println!();
    }
    Ok(answer)
}

fn print_completion(model: &str, completion: &Completion, as_json: bool) {
    if as_json {
        let usage = completion.usage.map(|usage| {
            json!({
                "prompt_tokens": usage.prompt_tokens,
                "completion_tokens": usage.completion_tokens,
            })
        });
        println!(
            "{}",
            json!({
                "model": completion.model.as_deref().unwrap_or(model),
                "content": completion.content,
                "usage": usage,
            })
        );
    } else {
        println!("{}", completion.content);
    }
}

fn report_usage(usage: Option<Usage>) {
    match usage {
        Some(Usage {
            prompt_tokens: Some(prompt),
            completion_tokens: Some(completion),
        }) => eprintln!("usage: prompt={prompt} completion={completion}"),
        _ => eprintln!("usage: unavailable"),
    }
}

fn read_stdin_prompt() -> Result<String, String> {
    let mut prompt = String::new();
    io::stdin()
        .read_to_string(&mut prompt)
        .map_err(|err| format!("Failed to read prompt from stdin: {err}"))?;
    Ok(prompt)
}
