//! batchrun - OpenAI / Mistral 批处理命令行
//!
//! submit:   输入 JSONL → 任务文件 → 分批提交并轮询 → 保存输出
//! status:   轮询单个作业至终止状态
//! download: 保存单个输出文件
//! cancel:   取消作业
//! collect:  遍历作业列表并保存所有已完成作业的输出

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use batchrun::application::{
    BatchOutcomeKind, BatchProcessor, CollectOutputs, CollectOutputsHandler, RunBatchesCommand,
    RunBatchesHandler,
};
use batchrun::config::{load_config_from_path, print_config, AppConfig};
use batchrun::domain::ChatMessage;
use batchrun::infrastructure::{
    build_provider, FileBatchStorage, StorageLayout, VendorClientConfig,
};

#[derive(Parser, Debug)]
#[command(name = "batchrun")]
#[command(about = "Run chat-completion batches through the OpenAI or Mistral batch API")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path (default: ./batchrun.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build tasks from a JSONL file and run them as batches
    Submit {
        /// Input lines: {"id": ..., "messages": [{"role", "content"}]}
        input: PathBuf,

        /// First task index to submit
        #[arg(long, default_value_t = 0)]
        start_index: usize,

        /// End task index (exclusive, default: all tasks)
        #[arg(long)]
        end_index: Option<usize>,

        /// Tasks per batch (default: run.batch_size)
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Poll a job until it reaches a terminal state
    Status { job_id: String },

    /// Save the content of an output file
    Download { output_file_id: String },

    /// Cancel a job
    Cancel { job_id: String },

    /// Save the outputs of all completed jobs
    Collect {
        /// Stop when this job id is reached (exclusive)
        #[arg(long)]
        stop_at: Option<String>,

        /// Inspect at most this many jobs
        #[arg(long)]
        max_jobs: Option<usize>,
    },
}

/// 输入文件中的一行
#[derive(Debug, Deserialize)]
struct InputLine {
    id: serde_json::Value,
    messages: Vec<ChatMessage>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config_from_path(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);
    print_config(&config);

    let processor = Arc::new(build_processor(&config)?);

    // Ctrl-C 取消正在进行的轮询
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received interrupt, cancelling");
            signal_token.cancel();
        }
    });
    let poll = config.poll.options().with_cancel(cancel);

    match cli.command {
        Commands::Submit {
            input,
            start_index,
            end_index,
            batch_size,
        } => {
            let (ids, message_sets) = read_input(&input).await?;
            let tasks = processor.create_tasks(ids, message_sets)?;
            let task_file = processor.write_task_file(&tasks).await?;
            tracing::info!(path = %task_file.display(), tasks = tasks.len(), "Task file ready");

            let cmd = RunBatchesCommand::new(batch_size.unwrap_or(config.run.batch_size), poll)
                .with_range(start_index, end_index);
            let report = RunBatchesHandler::new(processor).handle(&tasks, cmd).await?;

            for outcome in &report.outcomes {
                let summary = match &outcome.kind {
                    BatchOutcomeKind::Skipped { reason } => format!("skipped ({})", reason),
                    BatchOutcomeKind::SubmitFailed { stage, error } => {
                        format!("submit failed at {:?}: {}", stage, error)
                    }
                    BatchOutcomeKind::PollFailed { job_id, error } => {
                        format!("job {} not finished: {}", job_id, error)
                    }
                    BatchOutcomeKind::Finished { job, output_path } => match output_path {
                        Some(path) => {
                            format!("job {} {} -> {}", job.id, job.status, path.display())
                        }
                        None => format!("job {} {}", job.id, job.status),
                    },
                    BatchOutcomeKind::OutputFailed { job, error } => {
                        format!("job {} {} but output failed: {}", job.id, job.status, error)
                    }
                };
                println!(
                    "batch {} [{}..{}]: {}",
                    outcome.batch_id, outcome.range.start, outcome.range.end, summary
                );
            }
            println!(
                "{} batches, {} completed, {} unsuccessful{}",
                report.outcomes.len(),
                report.completed(),
                report.unsuccessful(),
                if report.cancelled { " (cancelled)" } else { "" }
            );
        }
        Commands::Status { job_id } => {
            let job = processor.check_batch_job_status(&job_id, &poll).await?;
            println!("{} {}", job.id, job.status);
            if let Some(output) = job.downloadable_output() {
                println!("output file: {}", output);
            }
        }
        Commands::Download { output_file_id } => {
            let path = processor.save_batch_output(&output_file_id).await?;
            println!("{}", path.display());
        }
        Commands::Cancel { job_id } => {
            let job = processor.cancel_batch_job(&job_id).await?;
            println!("{} {}", job.id, job.status);
        }
        Commands::Collect { stop_at, max_jobs } => {
            let query = CollectOutputs {
                stop_at_job_id: stop_at,
                max_jobs,
                ..Default::default()
            };
            let response = CollectOutputsHandler::new(processor).handle(query).await?;
            for job in &response.jobs {
                match (&job.output_path, &job.error) {
                    (Some(path), _) => {
                        println!("{} {} -> {}", job.job_id, job.status, path.display())
                    }
                    (None, Some(error)) => println!("{} {}: {}", job.job_id, job.status, error),
                    (None, None) => println!("{} {}", job.job_id, job.status),
                }
            }
            println!(
                "{} jobs checked, {} outputs saved",
                response.jobs.len(),
                response.saved()
            );
        }
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let log_filter = format!("{},batchrun={}", config.log.level, config.log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_processor(config: &AppConfig) -> anyhow::Result<BatchProcessor> {
    let client_config = VendorClientConfig::new(
        config.provider.resolved_base_url(),
        config.provider.api_key.clone().unwrap_or_default(),
    )
    .with_timeout(config.provider.timeout_secs);
    let provider = build_provider(config.provider.kind, client_config)
        .context("Failed to create batch provider")?;

    let storage = FileBatchStorage::new(StorageLayout {
        filename_prefix: config.storage.filename_prefix.clone(),
        task_dir: config.storage.task_dir.clone(),
        batch_dir: config.storage.batch_dir.clone(),
        output_dir: config.storage.output_dir.clone(),
    });

    Ok(BatchProcessor::new(
        config.processor.settings(),
        provider,
        Arc::new(storage),
    ))
}

/// 读取输入 JSONL，返回并列的 id 与消息组
async fn read_input(path: &Path) -> anyhow::Result<(Vec<String>, Vec<Vec<ChatMessage>>)> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read input file {}", path.display()))?;

    let mut ids = Vec::new();
    let mut message_sets = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let input: InputLine = serde_json::from_str(line)
            .with_context(|| format!("Invalid input at line {}", index + 1))?;
        let id = match input.id {
            serde_json::Value::String(id) => id,
            other => other.to_string(),
        };
        ids.push(id);
        message_sets.push(input.messages);
    }

    Ok((ids, message_sets))
}
