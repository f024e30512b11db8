// ==========================================
// 批量导入系统 - 命令行入口
// ==========================================
// 子命令: template / validate / import / config
// 说明: 报告输出到 stdout（按配置语言），日志输出到 stderr
// ==========================================

use anyhow::{Context, Result};
use bulk_import::config::{config_keys, ConfigError, ConfigManager, ImportConfig, ImportConfigReader};
use bulk_import::domain::ImportResult;
use bulk_import::i18n;
use bulk_import::importer::{
    ChannelEventPublisher, ImportError, ImportPipeline, PipelineEvent, ReviewSnapshot, SourceFile,
    TemplateGenerator,
};
use bulk_import::logging;
use bulk_import::repository::UserRepository;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "bulk-import",
    version,
    about = "Importación masiva de usuarios desde CSV, JSON o Excel"
)]
struct Cli {
    /// Ruta explícita de la base de datos SQLite
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Genera la plantilla CSV para el esquema configurado
    Template {
        /// Directorio de salida
        #[arg(long, value_name = "DIR", default_value = ".")]
        out: PathBuf,
    },
    /// Analiza y valida un archivo sin importar nada
    Validate {
        file: PathBuf,
        /// Imprime el informe como JSON
        #[arg(long)]
        json: bool,
    },
    /// Valida e importa los registros válidos en la tabla de usuarios
    Import {
        file: PathBuf,
        /// Confirma la importación tras la revisión
        #[arg(long)]
        yes: bool,
    },
    /// Lee o modifica la configuración de importación
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    Get { key: String },
    Set { key: String, value: String },
    Unset { key: String },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let db_path = match cli.db {
        Some(path) => path,
        None => default_db_path()?,
    };
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("no se pudo crear {}", parent.display()))?;
    }
    tracing::debug!(version = bulk_import::VERSION, db = %db_path.display(), "使用数据库");

    let config_manager = ConfigManager::new(&db_path)
        .with_context(|| format!("no se pudo abrir {}", db_path.display()))?;
    let config = config_manager.load_import_config().await?;
    i18n::set_locale(&config.locale);

    match cli.cmd {
        Cmd::Template { out } => template(&config, &out),
        Cmd::Validate { file, json } => validate(&config, file, json).await,
        Cmd::Import { file, yes } => import(&config, &db_path, file, yes).await,
        Cmd::Config { action } => config_cmd(&config_manager, action),
    }
}

fn default_db_path() -> Result<PathBuf> {
    let base = match dirs::data_dir() {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    Ok(base.join(bulk_import::APP_NAME).join("bulk_import.db"))
}

fn template(config: &ImportConfig, out: &Path) -> Result<()> {
    let path = TemplateGenerator::write_to(
        out,
        &config.entity,
        &config.schema,
        &TemplateGenerator::user_example(),
    )?;
    let path = path.display().to_string();
    println!(
        "{}",
        i18n::t_with_args("report.template_written", &[("path", path.as_str())])
    );
    Ok(())
}

async fn validate(config: &ImportConfig, file: PathBuf, json: bool) -> Result<()> {
    // 只读：不打开用户表
    let mut pipeline = ImportPipeline::review_only(config);

    pipeline.select_file(SourceFile::Path(file)).await?;
    if let Some(review) = pipeline.review() {
        print_review(review, json)?;
    }
    Ok(())
}

async fn import(config: &ImportConfig, db_path: &Path, file: PathBuf, yes: bool) -> Result<()> {
    let repo = UserRepository::new(db_path)?;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut pipeline = ImportPipeline::from_config(config, Arc::new(repo))
        .with_publisher(Arc::new(ChannelEventPublisher::new(tx)));

    // 进度显示到 stderr
    let progress_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let PipelineEvent::Progress { percent } = event {
                eprint!("\r{:>3}%", percent);
                let _ = std::io::stderr().flush();
                if percent == 100 {
                    eprintln!();
                }
            }
        }
    });

    pipeline.select_file(SourceFile::Path(file)).await?;
    if let Some(review) = pipeline.review() {
        print_review(review, false)?;
    }

    if !yes {
        println!("{}", i18n::t("report.confirm_hint"));
        return Ok(());
    }

    let outcome = pipeline.confirm_import().await;
    drop(pipeline);
    let _ = progress_task.await;

    match outcome {
        Ok(result) => print_result(&result),
        Err(ImportError::NothingToImport) => println!("{}", i18n::t("report.nothing_to_import")),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn print_review(review: &ReviewSnapshot, json: bool) -> Result<()> {
    if json {
        let payload = serde_json::json!({
            "file": review.file_name,
            "format": review.format.as_str(),
            "summary": review.summary(),
            "report": review.report,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let summary = review.summary();
    println!(
        "{}",
        i18n::t_with_args("report.header", &[("file", review.file_name.as_str())])
    );
    println!(
        "{}",
        i18n::t_with_args(
            "report.counts",
            &[
                ("total", summary.total.to_string().as_str()),
                ("valid", summary.valid.to_string().as_str()),
                ("warnings", summary.with_warnings.to_string().as_str()),
                ("invalid", summary.invalid.to_string().as_str()),
            ],
        )
    );

    for row in &review.report.invalid {
        let row_number = row.row_number.to_string();
        println!(
            "{}",
            i18n::t_with_args("report.row_errors", &[("row", row_number.as_str())])
        );
        for message in row.errors().iter().chain(row.suppressed_warnings.iter()) {
            println!("  - {}", message);
        }
    }
    for row in &review.report.with_warnings {
        let row_number = row.row_number.to_string();
        println!(
            "{}",
            i18n::t_with_args("report.row_warnings", &[("row", row_number.as_str())])
        );
        for message in row.warnings() {
            println!("  - {}", message);
        }
    }
    Ok(())
}

fn print_result(result: &ImportResult) {
    println!(
        "{}",
        i18n::t_with_args(
            "report.completed",
            &[
                ("total", result.total.to_string().as_str()),
                ("succeeded", result.succeeded.to_string().as_str()),
                ("failed", result.failed.to_string().as_str()),
            ],
        )
    );
    for outcome in result.failures() {
        if let bulk_import::domain::RecordStatus::Failed { reason } = &outcome.status {
            let row_number = outcome.row_number.to_string();
            println!(
                "  {}",
                i18n::t_with_args(
                    "report.row_failed",
                    &[("row", row_number.as_str()), ("reason", reason.as_str())],
                )
            );
        }
    }
}

fn config_cmd(manager: &ConfigManager, action: ConfigCmd) -> Result<()> {
    match action {
        ConfigCmd::Get { key } => {
            let value = match manager.get(&key)? {
                Some(value) => value,
                None => default_value(&key)?,
            };
            println!("{}", value);
        }
        ConfigCmd::Set { key, value } => manager.set(&key, &value)?,
        ConfigCmd::Unset { key } => {
            manager.unset(&key)?;
        }
        ConfigCmd::List => {
            let stored = manager.entries()?;
            for key in config_keys::ALL {
                let value = match stored.iter().find(|(k, _)| k == key) {
                    Some((_, v)) => v.clone(),
                    None => default_value(key)?,
                };
                println!("{} = {}", key, value);
            }
        }
    }
    Ok(())
}

/// 配置键的内置默认值（与 ImportConfig::default 保持一致）
fn default_value(key: &str) -> Result<String> {
    let defaults = ImportConfig::default();
    let value = match key {
        config_keys::IMPORT_ENTITY => defaults.entity,
        config_keys::IMPORT_LOCALE => defaults.locale,
        config_keys::IMPORT_REQUIRED_FIELDS => {
            serde_json::to_string(&defaults.schema.required_fields)?
        }
        config_keys::IMPORT_OPTIONAL_FIELDS => {
            serde_json::to_string(&defaults.schema.optional_fields)?
        }
        other => return Err(ConfigError::UnknownKey(other.to_string()).into()),
    };
    Ok(value)
}
