use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    thread,
};

use anyhow::{Context as _, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use tokio::runtime::Runtime;

use crate::{
    cmd::{Command, SubCommand},
    config::Config,
    controller::ControllerClient,
    features::upload::{parse, Feedback, FeedbackType, UploadMessage, Uploader},
    logger,
    message::Message,
};

pub struct App;

impl App {
    /// すべてのファイルとリソースが成功したとき true を返す
    pub fn run(cmd: Command, config: Config) -> Result<bool> {
        logger!(info, "app start");

        let result = match cmd.subcommand {
            SubCommand::Apply { files } => apply(files, config),
            SubCommand::Validate { files } => validate(&files),
        };

        logger!(info, "app end");

        result
    }
}

fn apply(files: Vec<PathBuf>, config: Config) -> Result<bool> {
    let client = ControllerClient::new(&config.controller)?;

    logger!(info, "controller: {}", config.controller.url);

    let (tx, rx): (Sender<Message>, Receiver<Message>) = bounded(128);

    let printer = thread::spawn(move || print_messages(rx));

    let rt = Runtime::new().context("Failed to start tokio runtime")?;

    let success = rt.block_on(async move {
        let uploader = Uploader::new(client, tx);

        let mut success = true;

        for file in &files {
            let outcome = uploader.process_yaml_file(file).await;

            success &= outcome.is_success();
        }

        success
    });

    printer
        .join()
        .map_err(|_| anyhow::anyhow!("Feedback printer panicked"))?;

    Ok(success)
}

fn validate(files: &[PathBuf]) -> Result<bool> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut success = true;

    for file in files {
        success &= validate_file(&mut out, file)?;
    }

    Ok(success)
}

fn validate_file(out: &mut impl Write, file: &Path) -> Result<bool> {
    let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(err) => {
            writeln!(out, "{}: {}", file.display(), err)?;
            return Ok(false);
        }
    };

    let result = parse(&content);

    writeln!(
        out,
        "{}: {} resource(s), {} error(s)",
        file.display(),
        result.resources.len(),
        result.errors.len()
    )?;

    for resource in &result.resources {
        writeln!(out, "  ok    {} \"{}\"", resource.kind, resource.identifier)?;
    }

    for err in &result.errors {
        writeln!(out, "  error {}", err)?;
    }

    Ok(result.errors.is_empty() && !result.resources.is_empty())
}

fn format_feedback(feedback: &Feedback) -> String {
    format!("[{}] {}", feedback.kind, feedback.message)
}

/// Uploader から送られてくるメッセージを表示する
///
/// 送信側がすべて drop されると終了する
fn print_messages(rx: Receiver<Message>) {
    for message in rx {
        match message {
            Message::Upload(UploadMessage::Feedback(feedback)) => match feedback.kind {
                FeedbackType::Error | FeedbackType::Warning => {
                    eprintln!("{}", format_feedback(&feedback))
                }
                FeedbackType::Success | FeedbackType::Info => {
                    println!("{}", format_feedback(&feedback))
                }
            },
            Message::Upload(UploadMessage::Progress(progress)) => {
                if let Some(current) = progress.current {
                    logger!(
                        debug,
                        "progress {}/{} {} \"{}\"",
                        progress.processed,
                        progress.total,
                        current.kind,
                        current.identifier
                    );
                }
            }
            Message::Upload(UploadMessage::Completed { succeeded, failed }) => {
                logger!(info, "batch completed: {} succeeded, {} failed", succeeded, failed);
            }
        }
    }
}
