use std::env;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forge_contracts::chat::{parse_session_input, SessionInput, CHAT_HELP_COMMANDS};
use forge_contracts::models::ModelRegistry;
use forge_engine::{
    default_provider_registry, Artifact, ExportFormat, Session, SessionError,
    DEFAULT_EXPORT_PREFIX,
};

const PROMPT_PREVIEW_CHARS: usize = 60;

#[derive(Debug, Parser)]
#[command(
    name = "forge",
    version,
    about = "Expand short commands into image prompts and render them"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session.
    Chat(ChatArgs),
    /// One command, one generation.
    Run(RunArgs),
    /// List known models.
    Models,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    text_model: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long, default_value = "png")]
    format: ExportFormat,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Parser)]
struct RunArgs {
    #[arg(long)]
    command: String,
    #[arg(long = "ref")]
    references: Vec<PathBuf>,
    #[command(flatten)]
    session: SessionArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("forge error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Run(args) => run_once(args),
        Command::Models => {
            print_models();
            Ok(0)
        }
    }
}

fn open_session(args: &SessionArgs) -> Result<Session> {
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let text_model = resolve_text_model(args.text_model.clone(), non_empty_env("FORGE_TEXT_MODEL"));
    Session::new(
        &args.out,
        events_path,
        text_model,
        args.image_model.clone(),
        default_provider_registry()?,
    )
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let mut session = open_session(&args.session)?;
    let format = args.session.format;
    let stdin = io::stdin();
    let mut line = String::new();

    println!(
        "Forge chat started ({}). Type /help for commands.",
        session.image_model().label
    );

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        match parse_session_input(input) {
            SessionInput::Noop => continue,
            SessionInput::Help => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
            }
            SessionInput::ListModels => {
                let current = session.image_model().name.clone();
                for model in session.image_models() {
                    let marker = if model.name == current { "*" } else { " " };
                    println!("{marker} {} ({})", model.label, model.name);
                }
            }
            SessionInput::SetModel(model) => match session.set_image_model(&model) {
                Ok(spec) => println!("Image model set to {} ({})", spec.label, spec.name),
                Err(err) => report(err)?,
            },
            SessionInput::AddReferences(paths) => {
                if paths.is_empty() {
                    println!("/ref requires at least one path");
                    continue;
                }
                for path in paths {
                    let path = PathBuf::from(path);
                    match session.add_reference_file(&path) {
                        Ok(true) => println!(
                            "Reference added: {} (use /use to activate)",
                            display_name(&path)
                        ),
                        Ok(false) => println!("Reference {} already loaded", display_name(&path)),
                        Err(err) => report(err)?,
                    }
                }
            }
            SessionInput::UseReference(identity) => {
                match session.toggle_reference(&identity, true) {
                    Ok(()) => println!("Reference active: {identity}"),
                    Err(err) => report(err)?,
                }
            }
            SessionInput::UnuseReference(identity) => {
                match session.toggle_reference(&identity, false) {
                    Ok(()) => println!("Reference inactive: {identity}"),
                    Err(err) => report(err)?,
                }
            }
            SessionInput::ListReferences => {
                let mut any = false;
                for reference in session.references() {
                    any = true;
                    let marker = if reference.active { "x" } else { " " };
                    println!(
                        "[{marker}] {} ({}, {} bytes)",
                        reference.identity,
                        reference.data.mime_type,
                        reference.data.bytes.len()
                    );
                }
                if !any {
                    println!("No references loaded. Use /ref <path>.");
                }
            }
            SessionInput::ClearReferences => match session.clear_references() {
                Ok(()) => println!("References cleared"),
                Err(err) => report(err)?,
            },
            SessionInput::SetDraft(text) => match session.set_draft(&text) {
                Ok(()) => println!("Prompt updated"),
                Err(err) => report(err)?,
            },
            SessionInput::ShowDraft => {
                if session.draft().trim().is_empty() {
                    println!("(prompt is empty)");
                } else {
                    println!("{}", session.draft());
                }
            }
            SessionInput::PickVariant(None) => {
                println!("/pick requires 1, 2 or 3");
            }
            SessionInput::PickVariant(Some(number)) => match session.pick_variant(number) {
                Ok(prompt) => println!("Prompt set to variation {number}:\n{prompt}"),
                Err(err) => report(err)?,
            },
            SessionInput::Generate => match session.generate() {
                Ok(artifact) => {
                    let path = save_artifact(session.out_dir(), &artifact)?;
                    println!(
                        "Generated {} ({}x{}, {}) -> {}",
                        artifact.id,
                        artifact.width,
                        artifact.height,
                        artifact.model,
                        path.display()
                    );
                }
                Err(err) => report(err)?,
            },
            SessionInput::History => {
                if session.history().len() == 0 {
                    println!("No images yet.");
                }
                for (index, artifact) in session.history().enumerate() {
                    println!(
                        "{index}: {} {}x{} {}",
                        artifact.id,
                        artifact.width,
                        artifact.height,
                        preview(&artifact.prompt, PROMPT_PREVIEW_CHARS)
                    );
                }
            }
            SessionInput::Export(dir) => {
                let dir = dir
                    .map(PathBuf::from)
                    .unwrap_or_else(|| session.out_dir().join("export"));
                match session.export_history(&dir, DEFAULT_EXPORT_PREFIX, format) {
                    Ok(written) => {
                        println!("Exported {} image(s) to {}", written.len(), dir.display())
                    }
                    Err(err) => println!("Export failed: {err:#}"),
                }
            }
            SessionInput::Prompt(text) => match session.process_command(&text) {
                Ok(_) => println!("Prompt:\n{}", session.draft()),
                Err(err) => report(err)?,
            },
            SessionInput::Unknown { command, .. } => {
                println!("Unknown command: /{command}. Type /help for commands.");
            }
        }
    }

    session.finish()?;
    Ok(())
}

fn run_once(args: RunArgs) -> Result<i32> {
    let mut session = open_session(&args.session)?;
    let outcome = match run_once_steps(&mut session, &args) {
        Ok(artifact) => {
            let written = session.export_history(
                session.out_dir(),
                DEFAULT_EXPORT_PREFIX,
                args.session.format,
            )?;
            if let Some(path) = written.first() {
                println!(
                    "Generated {} ({}x{}) -> {}",
                    artifact.id,
                    artifact.width,
                    artifact.height,
                    path.display()
                );
            }
            0
        }
        Err(err) => {
            let err = fatal_or_message(err)?;
            eprintln!("{err}");
            1
        }
    };
    session.finish()?;
    Ok(outcome)
}

/// References are activated as they load; `--ref` means "use this image".
fn run_once_steps(session: &mut Session, args: &RunArgs) -> Result<Artifact, SessionError> {
    for path in &args.references {
        session.add_reference_file(path)?;
        session.toggle_reference(&display_name(path), true)?;
    }
    session.process_command(&args.command)?;
    println!("{}", session.draft());
    session.generate()
}

fn print_models() {
    let registry = ModelRegistry::new(None);
    for model in registry.list() {
        println!(
            "{:<28} {:<40} {:<8} {}",
            model.name,
            model.label,
            model.provider,
            model.capabilities.join(",")
        );
    }
}

/// Prints a recoverable failure; event log failures end the session.
fn report(err: SessionError) -> Result<()> {
    let err = fatal_or_message(err)?;
    println!("{err}");
    Ok(())
}

fn fatal_or_message(err: SessionError) -> Result<SessionError> {
    match err {
        SessionError::EventLog(inner) => Err(inner),
        other => Ok(other),
    }
}

fn save_artifact(out_dir: &Path, artifact: &Artifact) -> Result<PathBuf> {
    let path = out_dir.join(format!(
        "{}.{}",
        artifact.id,
        extension_for_mime(&artifact.mime_type)
    ));
    fs::write(&path, &artifact.bytes[..])
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// `None` lets the session pick the registry's default text model.
fn resolve_text_model(flag: Option<String>, env_value: Option<String>) -> Option<String> {
    flag.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or(env_value)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

fn preview(text: &str, max_chars: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<&str>>().join(" ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let cut: String = single_line.chars().take(max_chars).collect();
    format!("{cut}...")
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
