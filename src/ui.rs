use console::style;
use serde::Serialize;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use tracing::error;

use crate::error::{FileSearchError, Result};
use crate::models::{CollectionStats, IndexReport, SearchResult};
use crate::search::SearchEngine;

const RULE_WIDTH: usize = 80;

pub fn print_welcome() {
    println!("{}", style("=".repeat(60)).cyan());
    println!("{}", style("           Semantic File Search").cyan().bold());
    println!("{}", style("    Find files by what their names mean").cyan());
    println!("{}", style("=".repeat(60)).cyan());
    println!("  • Index a directory of files");
    println!("  • Search with natural language");
    println!("  • Reveal a result in the file manager");
    println!();
}

pub fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("{}", style("No matching files found.").yellow());
        return;
    }

    println!();
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("Search results:");
    println!("{}", "=".repeat(RULE_WIDTH));

    for result in results {
        let m = &result.metadata;
        println!();
        println!("[{}] {}", style(result.rank).cyan(), style(&m.file_name).bold());
        println!("    Path: {}", m.file_path);
        println!("    Directory: {}", m.file_parent_dir);
        println!("    Similarity: {:.1}%", result.similarity_score * 100.0);
        println!("    Searchable text: {}", style(&result.document_text).dim());
    }

    println!();
    println!("{}", "=".repeat(RULE_WIDTH));
}

pub fn print_report(report: &IndexReport) {
    if report.discovered == 0 {
        println!("{}", style("No indexable files found in that directory.").yellow());
        return;
    }
    if report.indexed_count == 0 {
        println!("{}", style("✗ No embeddings could be generated; the index was not changed.").red());
        return;
    }

    println!(
        "{}",
        style(format!("✓ Indexing complete! {} files indexed.", report.indexed_count)).green()
    );
    if !report.skipped_ids.is_empty() {
        println!(
            "{}",
            style(format!(
                "  {} files skipped in {} failed batches",
                report.skipped_ids.len(),
                report.failed_batches
            ))
            .yellow()
        );
    }
}

pub fn print_stats(stats: &CollectionStats) {
    println!();
    println!("{}", style("Statistics:").cyan());
    println!("Indexed files: {}", stats.count);
    println!("Collection: {}", stats.collection_name);
    println!("Vector store path: {}", stats.storage_path);
    println!("Embedding model: {}", stats.embedding_model);
}

/// Machine-readable output for `--json`.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Expands a leading `~` to the home directory.
pub fn expand_user_path(input: &str) -> PathBuf {
    if input == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(input)
}

/// Shows `file_path` in the platform file manager and returns its directory.
/// Explorer selects the file itself; elsewhere the directory is opened.
pub fn reveal_in_file_manager(file_path: &str) -> Result<PathBuf> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(FileSearchError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("file no longer exists: {}", file_path),
        )));
    }

    let parent = containing_dir(path);

    #[cfg(target_os = "windows")]
    std::process::Command::new("explorer").args(explorer_select_args(path)).spawn()?;
    #[cfg(not(target_os = "windows"))]
    open::that(&parent)?;

    Ok(parent)
}

fn containing_dir(path: &Path) -> PathBuf {
    path.parent().unwrap_or(path).to_path_buf()
}

#[cfg(target_os = "windows")]
fn explorer_select_args(path: &Path) -> [std::ffi::OsString; 2] {
    ["/select,".into(), path.as_os_str().to_os_string()]
}

/// Reads one trimmed line from stdin; `None` once input is exhausted.
fn prompt(message: &str) -> io::Result<Option<String>> {
    println!();
    println!("{}", style(message).yellow());

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Menu loop: index, search, statistics, quit.
pub async fn run_interactive(engine: &SearchEngine) -> anyhow::Result<()> {
    print_welcome();

    let count = engine.stats().await?.count;
    if count > 0 {
        println!("{}", style(format!("Found {} indexed files.", count)).green());
        println!("You can search right away or index a new directory.");
    }

    loop {
        println!();
        println!("{}", style("Main menu:").cyan());
        println!("1. Index a directory");
        println!("2. Search files");
        println!("3. Show statistics");
        println!("4. Quit");

        let Some(choice) = prompt("Choose (1-4):")? else {
            return Ok(());
        };
        match choice.as_str() {
            "1" => {
                let Some(directory) = ask_directory()? else {
                    continue;
                };
                println!("{}", style(format!("Indexing {}", directory.display())).cyan());
                match engine.index_directory(&directory).await {
                    Ok(report) => print_report(&report),
                    Err(e) => {
                        error!("Indexing failed: {}", e);
                        println!("{}", style(format!("✗ Indexing failed: {}", e)).red());
                    }
                }
            }
            "2" => search_loop(engine).await?,
            "3" => print_stats(&engine.stats().await?),
            "4" | "quit" | "q" => {
                println!("{}", style("Goodbye!").green());
                return Ok(());
            }
            _ => println!("{}", style("Invalid choice, enter 1-4").red()),
        }
    }
}

fn ask_directory() -> io::Result<Option<PathBuf>> {
    loop {
        let Some(input) = prompt("Directory to index (or 'back'):")? else {
            return Ok(None);
        };
        if input.eq_ignore_ascii_case("back") || input.eq_ignore_ascii_case("quit") {
            return Ok(None);
        }
        if input.is_empty() {
            println!("{}", style("Please enter a directory path").red());
            continue;
        }

        let directory = expand_user_path(&input);
        if !directory.exists() {
            println!("{}", style(format!("Directory does not exist: {}", directory.display())).red());
        } else if !directory.is_dir() {
            println!("{}", style(format!("Not a directory: {}", directory.display())).red());
        } else {
            return Ok(Some(directory));
        }
    }
}

async fn search_loop(engine: &SearchEngine) -> anyhow::Result<()> {
    let count = engine.stats().await?.count;
    if count == 0 {
        println!("{}", style("Nothing indexed yet, index a directory first").yellow());
        return Ok(());
    }

    println!();
    println!(
        "{}",
        style(format!(
            "Searching {} indexed files, top {} matches per query",
            count,
            engine.config().top_k
        ))
        .cyan()
    );
    println!("Describe what you are looking for, e.g. 'stone wall', 'dragon texture', 'music'");
    println!("Type 'back' to return to the main menu");

    loop {
        let Some(query) = prompt("Search:")? else {
            return Ok(());
        };
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("back") {
            return Ok(());
        }

        let results = match engine.search(&query, None).await {
            Ok(results) => results,
            Err(e) => {
                error!("Search failed: {}", e);
                println!("{}", style(format!("✗ Search failed: {}", e)).red());
                continue;
            }
        };
        if results.is_empty() {
            println!("{}", style("No matching files found, try other keywords").yellow());
            continue;
        }

        print_results(&results);
        select_result(&results)?;
    }
}

fn select_result(results: &[SearchResult]) -> io::Result<()> {
    loop {
        let Some(selection) = prompt(&format!(
            "Pick a result (1-{}) to reveal it, or 'new' for a new search:",
            results.len()
        ))?
        else {
            return Ok(());
        };
        if selection.eq_ignore_ascii_case("new") || selection.is_empty() {
            return Ok(());
        }

        let Ok(choice) = selection.parse::<usize>() else {
            println!("{}", style("Please enter a number").red());
            continue;
        };
        let Some(result) = results.get(choice.wrapping_sub(1)) else {
            println!("{}", style(format!("Out of range, enter 1-{}", results.len())).red());
            continue;
        };

        match reveal_in_file_manager(&result.metadata.file_path) {
            Ok(dir) => println!("Opened {}", dir.display()),
            Err(e) => println!("{}", style(format!("Could not open file location: {}", e)).red()),
        }
        return Ok(());
    }
}
