// AICoder CLI
// One-shot generation, validation of an existing project directory, or an
// interactive prompt loop when no subcommand is given.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use aicoder::{validate, AiCoderWorkflow, AppConfig, WorkflowReport};

#[derive(Parser)]
#[command(name = "aicoder", about = "Multi-agent LLM code generation pipeline")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline once for the given prompt
    Generate {
        /// The request to generate code for
        prompt: Vec<String>,
    },
    /// Validate the files of an existing project directory
    Validate {
        /// Directory containing previously generated files
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config);

    match cli.command {
        Some(Command::Generate { prompt }) => {
            let prompt = prompt.join(" ");
            if prompt.trim().is_empty() {
                anyhow::bail!("Empty prompt");
            }
            let workflow = AiCoderWorkflow::new(config);
            let report = workflow.run_complete_workflow(&prompt).await;
            print_report(&report);
            if !report.success {
                std::process::exit(1);
            }
        }
        Some(Command::Validate { dir }) => {
            let files = read_project_files(&dir)?;
            if files.is_empty() {
                anyhow::bail!("No source files found in {}", dir.display());
            }
            let report = validate(&files, config.output_format);
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.overall_valid {
                std::process::exit(1);
            }
        }
        None => interactive_loop(config).await?,
    }

    Ok(())
}

/// Read prompts from stdin until EOF or an exit command.
async fn interactive_loop(config: AppConfig) -> anyhow::Result<()> {
    let workflow = AiCoderWorkflow::new(config);
    let stdin = std::io::stdin();

    println!("AICoder interactive mode. Type a request, or 'exit' to quit.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if prompt.eq_ignore_ascii_case("exit") || prompt.eq_ignore_ascii_case("quit") {
            break;
        }

        let report = workflow.run_complete_workflow(prompt).await;
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &WorkflowReport) {
    if report.success {
        println!("Workflow completed successfully.");
        if let Some(dir) = &report.project_dir {
            println!("Project saved to {}", dir.display());
        }
        for file in &report.generated_files {
            println!("  {}", file);
        }
        if let Some(validation) = &report.validation {
            println!(
                "Validation: {} error(s), {} warning(s)",
                validation.total_errors, validation.total_warnings
            );
        }
        if let Some(build) = &report.build {
            if build.success {
                println!("Build succeeded.");
            } else {
                println!("Build failed with {} error(s):", build.errors.len());
                for error in &build.errors {
                    println!("  {}", error);
                }
            }
        }
        if let Some(retry) = &report.build_after_fix {
            if retry.success {
                println!("Build succeeded after automatic fixes.");
            } else {
                println!("Build still failing after automatic fixes.");
            }
        }
    } else {
        let reason = report.error.as_deref().unwrap_or("unknown error");
        println!("Workflow failed: {}", reason);
    }
}

/// Collect source files from a project directory for standalone validation.
fn read_project_files(dir: &PathBuf) -> anyhow::Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    collect_files(dir, dir, &mut files)?;
    Ok(files)
}

fn collect_files(
    root: &PathBuf,
    dir: &PathBuf,
    files: &mut BTreeMap<String, String>,
) -> anyhow::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if entry.file_name() == "node_modules" {
                continue;
            }
            collect_files(root, &path, files)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("tsx" | "ts" | "css" | "js" | "py")
        ) {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            files.insert(relative, std::fs::read_to_string(&path)?);
        }
    }
    Ok(())
}
