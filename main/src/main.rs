use std::{path::PathBuf, str::FromStr, sync::Arc};

use clap::{Args, Parser, Subcommand};
use common::{
    storage::{
        db::SurrealDbClient,
        types::{
            exam_question::ExamQuestion,
            question::{AnswerKey, Difficulty, QuestionOptions},
            system_settings::SystemSettings,
        },
    },
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use question_pipeline::{
    run_cells, AdmissionPipeline, AdmissionPolicy, CellTarget, DefaultCellServices,
    GeneratorTuning, LegalExpert, QuestionGenerator,
};
use retrieval_pipeline::{LegalRetriever, ReferenceRetriever};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "exam-core",
    about = "Generates, validates and admits exam questions per (topic, difficulty) cell"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fill one or more (topic, difficulty) cells with validated questions
    Generate(GenerateArgs),
    /// Independently verify a single externally-sourced question
    Verify(VerifyArgs),
    /// Ask the legal expert a free-form question over the corpus
    Ask(AskArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Topic for a single cell run
    #[arg(long)]
    topic: Option<String>,

    /// Difficulty for a single cell run
    #[arg(long, value_parser = parse_difficulty)]
    difficulty: Option<Difficulty>,

    /// Target admitted count for the cell
    #[arg(long, default_value_t = 5)]
    count: usize,

    /// JSON file with a list of {topic, difficulty, target} cells
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Override the configured number of concurrent cells
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print the full reports as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct VerifyArgs {
    /// The question stem
    #[arg(long)]
    question: String,

    #[arg(long)]
    option_a: String,
    #[arg(long)]
    option_b: String,
    #[arg(long)]
    option_c: String,
    #[arg(long)]
    option_d: String,
    #[arg(long)]
    option_e: String,

    /// The answer the question claims to be correct
    #[arg(long, value_parser = parse_answer_key)]
    claimed: AnswerKey,
}

#[derive(Args)]
struct AskArgs {
    /// The legal question to answer
    #[arg(long)]
    question: String,

    /// How many passages to retrieve as context
    #[arg(long, default_value_t = 8)]
    context: usize,
}

#[derive(Debug, Deserialize)]
struct PlanEntry {
    topic: String,
    difficulty: Difficulty,
    target: usize,
}

fn parse_difficulty(value: &str) -> Result<Difficulty, String> {
    Difficulty::from_str(value).map_err(|e| e.to_string())
}

fn parse_answer_key(value: &str) -> Result<AnswerKey, String> {
    AnswerKey::from_str(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = get_config()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );
    db.ensure_initialized().await?;

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    let settings = SystemSettings::get_current(&db).await?;
    let embedding_provider = Arc::new(EmbeddingProvider::new_openai(
        Arc::clone(&openai_client),
        settings.embedding_model.clone(),
        settings.embedding_dimensions,
    ));

    let policy = AdmissionPolicy::default();
    let generator = QuestionGenerator::new(
        Arc::clone(&db),
        Arc::clone(&openai_client),
        LegalRetriever::new(Arc::clone(&db), Arc::clone(&embedding_provider)),
        ReferenceRetriever::new(Arc::clone(&db), Arc::clone(&embedding_provider)),
        GeneratorTuning::default(),
    );
    let expert = LegalExpert::new(
        Arc::clone(&db),
        Arc::clone(&openai_client),
        LegalRetriever::new(Arc::clone(&db), Arc::clone(&embedding_provider)),
    );
    let services = Arc::new(DefaultCellServices::new(
        generator,
        expert,
        policy.solve_context_chunks,
    ));
    let pipeline = Arc::new(AdmissionPipeline::new(Arc::clone(&db), services, policy));

    match cli.command {
        Command::Generate(args) => {
            run_generate(&db, pipeline, args, config.cell_concurrency).await?;
        }
        Command::Verify(args) => run_verify(pipeline, args).await?,
        Command::Ask(args) => {
            let expert = LegalExpert::new(
                Arc::clone(&db),
                Arc::clone(&openai_client),
                LegalRetriever::new(Arc::clone(&db), Arc::clone(&embedding_provider)),
            );
            run_ask(&expert, args).await?;
        }
    }

    Ok(())
}

async fn run_ask(expert: &LegalExpert, args: AskArgs) -> Result<(), Box<dyn std::error::Error>> {
    let answer = expert.answer(&args.question, args.context).await?;

    println!("{}", answer.answer);
    println!("confidence: {}", answer.confidence);
    for citation in &answer.citations {
        println!("source: {citation}");
    }

    Ok(())
}

async fn run_generate(
    db: &SurrealDbClient,
    pipeline: Arc<AdmissionPipeline>,
    args: GenerateArgs,
    default_concurrency: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let requested = load_plan(&args)?;

    // Only generate what the bank is still missing per cell.
    let mut cells = Vec::new();
    for entry in requested {
        let existing = ExamQuestion::count_for_cell(db, &entry.topic, entry.difficulty).await?;
        let remaining = entry.target.saturating_sub(existing);
        if remaining == 0 {
            info!(
                topic = %entry.topic,
                difficulty = %entry.difficulty,
                existing,
                "cell already at target; skipping"
            );
            continue;
        }
        cells.push(CellTarget {
            topic: entry.topic,
            difficulty: entry.difficulty,
            target: remaining,
        });
    }

    if cells.is_empty() {
        println!("All requested cells are already at target.");
        return Ok(());
    }

    let concurrency = args.concurrency.unwrap_or(default_concurrency);
    let reports = run_cells(pipeline, cells, concurrency).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let mut shortfalls = 0usize;
    for report in &reports {
        let status = match (&report.failure, report.shortfall) {
            (Some(failure), _) => format!("FAILED ({failure})"),
            (None, true) => "SHORTFALL".to_string(),
            (None, false) => "ok".to_string(),
        };
        println!(
            "[{} / {}] target={} generated={} admitted={} rejected={} rounds={} {}",
            report.topic,
            report.difficulty,
            report.target,
            report.generated,
            report.admitted.len(),
            report.rejected,
            report.rounds,
            status
        );
        if report.shortfall {
            shortfalls += 1;
        }
    }

    if shortfalls > 0 {
        println!("{shortfalls} cell(s) fell short; re-run those cells individually.");
    }

    Ok(())
}

async fn run_verify(
    pipeline: Arc<AdmissionPipeline>,
    args: VerifyArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = QuestionOptions::new(
        args.option_a,
        args.option_b,
        args.option_c,
        args.option_d,
        args.option_e,
    );

    let verification = pipeline
        .verify_single(&args.question, &options, args.claimed)
        .await?;

    println!(
        "expert answer: {} (confidence: {})",
        verification.expert_answer, verification.confidence
    );
    println!(
        "claimed answer {}: {}",
        args.claimed,
        if verification.agrees {
            "CONFIRMED"
        } else {
            "REJECTED"
        }
    );
    println!("reasoning: {}", verification.reasoning);

    Ok(())
}

fn load_plan(args: &GenerateArgs) -> Result<Vec<PlanEntry>, Box<dyn std::error::Error>> {
    if let Some(path) = &args.plan {
        let contents = std::fs::read_to_string(path)?;
        let entries: Vec<PlanEntry> = serde_json::from_str(&contents)?;
        return Ok(entries);
    }

    match (&args.topic, args.difficulty) {
        (Some(topic), Some(difficulty)) => Ok(vec![PlanEntry {
            topic: topic.clone(),
            difficulty,
            target: args.count,
        }]),
        _ => Err("either --plan or both --topic and --difficulty are required".into()),
    }
}
