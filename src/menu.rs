//! Interactive menu and the text output shared with the one-shot commands
//!
//! Errors from an action are printed and the menu comes back; fatal errors
//! (credential problems, closed input, Ctrl-C) end the loop.

use crate::download::Selection;
use crate::error::Result;
use crate::extraction::ToolReport;
use crate::prompt::Prompter;
use crate::session::{BundleOutcome, ExtractionSummary, SelectionOutcome, Session};
use crate::types::{BatchReport, FileListing, FileOutcome};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    List,
    DownloadAll,
    DownloadSelected,
    ChangeDirectory,
    ToggleExtraction,
    ForgetToken,
    Quit,
}

impl Action {
    const ALL: [Action; 7] = [
        Action::List,
        Action::DownloadAll,
        Action::DownloadSelected,
        Action::ChangeDirectory,
        Action::ToggleExtraction,
        Action::ForgetToken,
        Action::Quit,
    ];

    fn label(self, session: &Session) -> String {
        match self {
            Action::List => "List files".to_string(),
            Action::DownloadAll => "Download all files (bundle archive)".to_string(),
            Action::DownloadSelected => "Download selected files".to_string(),
            Action::ChangeDirectory => format!(
                "Change output directory (now {})",
                session.output_dir().display()
            ),
            Action::ToggleExtraction => format!(
                "Toggle extraction (now {})",
                if session.extract_enabled() { "on" } else { "off" }
            ),
            Action::ForgetToken => "Forget saved token".to_string(),
            Action::Quit => "Quit".to_string(),
        }
    }
}

/// Run the menu until the user quits or a fatal error occurs
pub async fn run(
    session: &mut Session,
    prompter: &mut dyn Prompter,
    out: &mut dyn Write,
) -> Result<()> {
    loop {
        let labels: Vec<String> = Action::ALL.iter().map(|a| a.label(session)).collect();
        let options: Vec<&str> = labels.iter().map(String::as_str).collect();
        let index = prompter.choose(&format!("Record {}", session.record_id()), &options, 0)?;
        let action = Action::ALL[index.min(Action::ALL.len() - 1)];
        debug!(?action, "menu action");

        if action == Action::Quit {
            return Ok(());
        }

        if let Err(e) = perform(action, session, prompter, out).await {
            if e.is_fatal() {
                return Err(e);
            }
            writeln!(out, "Error: {e}")?;
        }
    }
}

async fn perform(
    action: Action,
    session: &mut Session,
    prompter: &mut dyn Prompter,
    out: &mut dyn Write,
) -> Result<()> {
    match action {
        Action::List => {
            let listing = session.list().await?;
            print_listing(out, &listing)?;
        }
        Action::DownloadAll => {
            let outcome = session.download_all().await?;
            print_bundle(out, &outcome)?;
        }
        Action::DownloadSelected => {
            let listing = session.list().await?;
            print_listing(out, &listing)?;
            if listing.is_empty() {
                return Ok(());
            }

            let input =
                prompter.line("Files to download (numbers, ranges like 2-4, or a name pattern)")?;
            if input.is_empty() {
                return Ok(());
            }

            let selection = Selection::parse(&input);
            let outcome = session.download_selected(&listing, &selection).await?;
            print_selection(out, &outcome)?;
            outcome.report.ensure_complete()?;
        }
        Action::ChangeDirectory => {
            let input = prompter.line("Output directory")?;
            if !input.is_empty() {
                session.set_output_dir(PathBuf::from(input));
            }
            writeln!(out, "Saving to {}", session.output_dir().display())?;
        }
        Action::ToggleExtraction => {
            let enabled = !session.extract_enabled();
            session.set_extract(enabled);
            if enabled {
                writeln!(out, "Extraction on")?;
                print_tools(out, &session.check_tools())?;
            } else {
                writeln!(out, "Extraction off")?;
            }
        }
        Action::ForgetToken => {
            let removed = session.forget_token()?;
            print_forgotten(out, removed)?;
        }
        Action::Quit => {}
    }
    Ok(())
}

/// Numbered listing, as used by index selections
pub fn print_listing(out: &mut dyn Write, listing: &FileListing) -> Result<()> {
    if listing.is_empty() {
        writeln!(out, "Record {} has no files", listing.record_id)?;
        return Ok(());
    }

    writeln!(
        out,
        "Record {} ({} surface), {} files:",
        listing.record_id,
        listing.surface,
        listing.len()
    )?;
    let width = listing.len().to_string().len();
    for (i, entry) in listing.entries().iter().enumerate() {
        writeln!(
            out,
            "  {:>width$}) {} ({:.2} MB)",
            i + 1,
            entry.name,
            entry.size_mb()
        )?;
    }
    Ok(())
}

/// Bundle path and any extraction results
pub fn print_bundle(out: &mut dyn Write, outcome: &BundleOutcome) -> Result<()> {
    writeln!(
        out,
        "Saved {} ({} bytes, {} files in record)",
        outcome.bundle.path.display(),
        outcome.bundle.bytes,
        outcome.listing.len()
    )?;
    if let Some(summary) = &outcome.extraction {
        print_extraction(out, summary)?;
    }
    Ok(())
}

/// Per-file batch outcomes and any extraction results
pub fn print_selection(out: &mut dyn Write, outcome: &SelectionOutcome) -> Result<()> {
    print_report(out, &outcome.report)?;
    if let Some(summary) = &outcome.extraction {
        print_extraction(out, summary)?;
    }
    Ok(())
}

/// One line per file
pub fn print_report(out: &mut dyn Write, report: &BatchReport) -> Result<()> {
    for outcome in &report.outcomes {
        match outcome {
            FileOutcome::Downloaded {
                name,
                surface,
                path,
            } => writeln!(out, "  ok      {name} -> {} ({surface})", path.display())?,
            FileOutcome::Skipped { name, path } => {
                writeln!(out, "  skipped {name} ({} exists)", path.display())?
            }
            FileOutcome::Failed { name, reason } => writeln!(out, "  failed  {name}: {reason}")?,
        }
    }
    Ok(())
}

fn print_extraction(out: &mut dyn Write, summary: &ExtractionSummary) -> Result<()> {
    for extracted in &summary.extracted {
        writeln!(
            out,
            "Extracted {} files into {}",
            extracted.files.len(),
            extracted.dir.display()
        )?;
    }
    for (archive, reason) in &summary.failed {
        writeln!(out, "Could not extract {}: {reason}", archive.display())?;
    }
    Ok(())
}

/// Which archive formats can be extracted
pub fn print_tools(out: &mut dyn Write, report: &ToolReport) -> Result<()> {
    match &report.tar {
        Some(tar) => writeln!(out, "tar: {}", tar.display())?,
        None => writeln!(out, "tar: not found, tar archives will not be extracted")?,
    }
    let formats: Vec<String> = report
        .supported()
        .iter()
        .map(|f| format!("{f:?}").to_lowercase())
        .collect();
    writeln!(out, "Extractable formats: {}", formats.join(", "))?;
    Ok(())
}

/// Result of removing stored tokens
pub fn print_forgotten(out: &mut dyn Write, removed: usize) -> Result<()> {
    match removed {
        0 => writeln!(out, "No saved token found")?,
        1 => writeln!(out, "Removed 1 saved token file")?,
        n => writeln!(out, "Removed {n} saved token files")?,
    }
    Ok(())
}
