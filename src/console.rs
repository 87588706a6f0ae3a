//! Terminal front end for a single test session.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};

use crate::services::countdown::{CountdownEnd, CountdownHandle};
use crate::services::link_store::{LinkStore, SubmissionReceipt};
use crate::services::test_session::{SessionPhase, SessionState, TestSession};
use crate::services::uploads::{content_type_for_path, sanitized_filename, FileUpload};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionArgs {
    /// Test link, `/test/<id>` path or bare id.
    pub link: String,
    pub submitter: Option<String>,
    /// Where to write an embedded document so it can be opened locally.
    pub save_document: Option<PathBuf>,
}

impl SessionArgs {
    pub fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut parsed = SessionArgs::default();
        let mut link = None;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--as" => {
                    parsed.submitter = Some(args.next().ok_or_else(|| anyhow!("--as missing value"))?);
                }
                "--save-document" => {
                    let path = args.next().ok_or_else(|| anyhow!("--save-document missing value"))?;
                    parsed.save_document = Some(PathBuf::from(path));
                }
                other if other.starts_with("--") => return Err(anyhow!("Unknown argument: {other}")),
                _ if link.is_none() => link = Some(arg),
                _ => return Err(anyhow!("Unexpected argument: {arg}")),
            }
        }

        parsed.link = link.ok_or_else(|| {
            anyhow!("usage: take_test <link|id> [--as <name>] [--save-document <path>]")
        })?;
        Ok(parsed)
    }
}

pub(crate) async fn take_test(store: &LinkStore, args: SessionArgs) -> anyhow::Result<()> {
    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    run_session(store, args, input, &mut output).await.map(|_| ())
}

async fn run_session<R, W>(
    store: &LinkStore,
    args: SessionArgs,
    input: R,
    output: &mut W,
) -> anyhow::Result<Option<SubmissionReceipt>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut session = TestSession::from_link(&args.link);

    if session.load(store).await? == SessionPhase::Error {
        if let SessionState::Error { reason } = session.state() {
            say(output, &reason.to_string()).await?;
        }
        return Ok(None);
    }

    let (Some(test), Some(countdown)) = (session.test().cloned(), session.countdown()) else {
        return Err(anyhow!("session is not ready after loading"));
    };

    say(output, &format!("Test: {} ({} minutes)", test.file_name, test.duration_minutes)).await?;
    let document = store.resolve_document(&test).await?;
    match args.save_document.as_deref() {
        Some(path) => {
            save_document(&document, path).await?;
            say(output, &format!("Document saved to {}", path.display())).await?;
        }
        None if document.starts_with("data:") => {
            say(output, "Document is embedded; rerun with --save-document <path> to open it").await?;
        }
        None => say(output, &format!("Document: {document}")).await?,
    }
    say(output, &format!("Time remaining: {}", countdown.display())).await?;
    say(output, "Type `end` to finish early.").await?;

    let clock = CountdownHandle::spawn(countdown);
    let end = run_clock(&clock, &mut lines, output).await?;
    session.end(end);

    match end {
        CountdownEnd::TimeUp => say(output, "Time is up. Please submit your answers now.").await?,
        CountdownEnd::EndedEarly => say(output, "Test ended. Please submit your answers now.").await?,
    }

    collect_and_submit(store, &mut session, args.submitter, &mut lines, output).await
}

async fn run_clock<R, W>(
    clock: &CountdownHandle,
    lines: &mut Lines<R>,
    output: &mut W,
) -> anyhow::Result<CountdownEnd>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut remaining = clock.remaining();
    let mut warned = false;
    let mut input_open = true;
    let mut ticking = true;

    loop {
        tokio::select! {
            biased;

            end = clock.finished() => return Ok(end),
            changed = remaining.changed(), if ticking => {
                if changed.is_err() {
                    ticking = false;
                    continue;
                }
                let snapshot = clock.snapshot().await;
                if snapshot.is_finished() {
                    continue;
                }
                if snapshot.is_warning() && !warned {
                    warned = true;
                    let message = format!(
                        "Hurry up: {} left ({:.0}% of the time)",
                        snapshot.display(),
                        snapshot.percent_remaining()
                    );
                    say(output, &message).await?;
                } else if snapshot.remaining_seconds() % 60 == 0 {
                    say(output, &format!("Time remaining: {}", snapshot.display())).await?;
                }
            }
            line = lines.next_line(), if input_open => {
                match line? {
                    Some(command) if command.trim().eq_ignore_ascii_case("end") => {
                        say(output, "Are you sure you want to end the test? [y/N]").await?;
                        let confirmed = lines
                            .next_line()
                            .await?
                            .is_some_and(|answer| answer.trim().eq_ignore_ascii_case("y"));
                        if confirmed {
                            clock.end_now().await;
                        }
                    }
                    Some(_) => {}
                    None => input_open = false,
                }
            }
        }
    }
}

async fn collect_and_submit<R, W>(
    store: &LinkStore,
    session: &mut TestSession,
    submitter: Option<String>,
    lines: &mut Lines<R>,
    output: &mut W,
) -> anyhow::Result<Option<SubmissionReceipt>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        say(output, "Enter answer file paths, one per line. Submit with an empty line.").await?;

        let mut files = Vec::new();
        loop {
            let Some(line) = lines.next_line().await? else {
                say(output, "Input closed before submitting; answers were not sent.").await?;
                return Ok(None);
            };
            let path = line.trim();
            if path.is_empty() {
                break;
            }
            match read_answer(Path::new(path)).await {
                Ok(file) => files.push(file),
                Err(err) => say(output, &format!("Skipping {path}: {err:#}")).await?,
            }
        }

        match session.submit(store, files, submitter.clone()).await {
            Ok(receipt) => {
                say(
                    output,
                    &format!(
                        "Submitted {} file(s). Submission id: {}",
                        receipt.answers.len(),
                        receipt.submission.id
                    ),
                )
                .await?;
                return Ok(Some(receipt));
            }
            Err(err) => {
                tracing::warn!(error = %err, "Submission failed");
                say(output, &format!("Submission failed: {err}. Please try again.")).await?;
            }
        }
    }
}

async fn read_answer(path: &Path) -> anyhow::Result<FileUpload> {
    let bytes =
        tokio::fs::read(path).await.with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(sanitized_filename)
        .unwrap_or_else(|| "answer".to_string());

    Ok(FileUpload::new(file_name, content_type_for_path(path), bytes))
}

async fn save_document(reference: &str, path: &Path) -> anyhow::Result<()> {
    let Some((_, encoded)) = reference.strip_prefix("data:").and_then(|rest| rest.split_once(";base64,"))
    else {
        return Err(anyhow!("document is stored remotely; open {reference}"));
    };

    let bytes = STANDARD.decode(encoded).context("embedded document is not valid base64")?;
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

async fn say<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> anyhow::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
