use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use hallyu_translate::glossary::{self, CandidateStatus};
use hallyu_translate::history::{FeedbackRequest, ReviewStatus};
use hallyu_translate::{
    init_tracing, llm_from_config, AppConfig, AppContext, BatchTranslateRequest, LogFormat,
    SourceLang, TargetLang, TranslateRequest,
};

#[derive(Parser)]
#[command(name = "hallyu-translate", version, about = "Glossary-aware Korean translation pipeline")]
struct Cli {
    /// TOML config file; defaults apply when it does not exist.
    #[arg(long, short, default_value = "hallyu.toml")]
    config: PathBuf,
    /// Log line format: text or json.
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate one text into one language.
    Translate {
        text: String,
        #[arg(long, short = 't', default_value = "en")]
        to: TargetLang,
        #[arg(long)]
        from: Option<SourceLang>,
        #[arg(long)]
        page_url: Option<String>,
    },
    /// Translate one text into several languages with one LLM call.
    Batch {
        text: String,
        #[arg(long, short = 't', value_delimiter = ',', required = true)]
        to: Vec<TargetLang>,
        #[arg(long)]
        from: Option<SourceLang>,
        #[arg(long)]
        page_url: Option<String>,
    },
    /// Review a translation history row.
    Feedback {
        history_id: i64,
        #[arg(long)]
        status: ReviewStatus,
        #[arg(long)]
        rating: Option<u8>,
        #[arg(long)]
        corrected: Option<String>,
    },
    /// Recent translation history.
    History {
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List glossary candidates.
    Candidates {
        #[arg(long)]
        status: Option<CandidateStatus>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Approve or reject candidates.
    Review {
        #[arg(required = true)]
        ids: Vec<i64>,
        #[arg(long)]
        action: String,
    },
    /// Import glossary entries from a JSON file.
    ImportGlossary { path: PathBuf },
    /// Rebuild the glossary token index.
    RebuildIndex,
    /// History counters and latency percentiles.
    Stats,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    let llm = llm_from_config(&config.llm);
    let mut ctx = AppContext::build(config, llm).context("opening store")?;
    ctx.index_ready().await;

    match cli.command {
        Command::Translate {
            text,
            to,
            from,
            page_url,
        } => {
            let request = TranslateRequest {
                text,
                target_lang: to,
                page_url,
                source_lang: from,
            };
            print_json(&ctx.translator.translate(&request).await)?;
        }
        Command::Batch {
            text,
            to,
            from,
            page_url,
        } => {
            let request = BatchTranslateRequest {
                text,
                target_langs: to,
                page_url,
                source_lang: from,
            };
            print_json(&ctx.translator.translate_batch(&request).await)?;
        }
        Command::Feedback {
            history_id,
            status,
            rating,
            corrected,
        } => {
            let request = FeedbackRequest {
                history_id,
                status,
                rating,
                corrected_text: corrected,
            };
            let approved = ctx.feedback.submit(&request)?;
            print_json(&approved)?;
        }
        Command::History { offset, limit } => {
            print_json(&ctx.feedback.recent(offset, limit))?;
        }
        Command::Candidates {
            status,
            offset,
            limit,
        } => {
            print_json(&ctx.candidates.list(status, offset, limit)?)?;
        }
        Command::Review { ids, action } => {
            let outcomes = ctx.candidates.review_batch(&ids, &action)?;
            let mut failed = 0;
            for (id, outcome) in outcomes {
                match outcome {
                    Ok(outcome) => print_json(&outcome)?,
                    Err(e) => {
                        failed += 1;
                        eprintln!("candidate {id}: {e}");
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} candidate review(s) failed");
            }
        }
        Command::ImportGlossary { path } => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let entries = glossary::parse_seed(&json)?;
            let imported = ctx.store.import_glossary(&entries)?;
            println!("imported {imported} glossary entries");
        }
        Command::RebuildIndex => {
            let indexed = ctx.store.rebuild_token_index()?;
            println!("indexed {indexed} glossary entries");
        }
        Command::Stats => {
            #[derive(Serialize)]
            struct Stats {
                history: hallyu_translate::history::HistoryStats,
                glossary_entries: usize,
                approved_translations: usize,
                metrics: hallyu_translate::metrics::MetricsSnapshot,
            }
            print_json(&Stats {
                history: ctx.feedback.stats()?,
                glossary_entries: ctx.store.count_glossary()?,
                approved_translations: ctx.store.count_approved()?,
                metrics: ctx.metrics.snapshot(),
            })?;
        }
    }

    ctx.shutdown().await;
    Ok(())
}
