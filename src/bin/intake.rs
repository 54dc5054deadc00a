use std::{env, sync::Arc};

use anyhow::{bail, Context, Result};
use tracing_subscriber::EnvFilter;

use intake_client::{
    models::{format_field_key, BasicInfoAttribute, SelectedFile},
    HttpIntakeApi, IntakeConfig, UploadWorkflow,
};

const USAGE: &str = "Usage: intake categories\n       intake upload <file.pdf> [--category-name <name>] [--finalize]";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("categories") => list_categories().await?,
        Some("upload") => upload(args.collect()).await?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn build_workflow() -> Result<UploadWorkflow> {
    let config = IntakeConfig::from_env()?;
    tracing::info!(
        component = "intake",
        api_url = %config.redacted_api_url(),
        max_upload_bytes = config.max_upload_bytes,
        "loaded intake configuration"
    );
    let api = Arc::new(HttpIntakeApi::new(&config.api_url)?);
    Ok(UploadWorkflow::new(api, &config))
}

async fn list_categories() -> Result<()> {
    let mut workflow = build_workflow()?;
    workflow
        .refresh_categories()
        .await
        .context("failed to load categories")?;

    let roster = workflow.roster();
    if roster.is_empty() {
        println!("No categories yet.");
        return Ok(());
    }
    for category in roster.categories() {
        println!(
            "{:>6}  {}  ({})",
            category.id,
            category.name,
            category.format_label()
        );
    }
    println!("Total Categories: {}", roster.total());
    Ok(())
}

struct UploadArgs {
    path: String,
    category_name: Option<String>,
    finalize: bool,
}

fn parse_upload_args(args: Vec<String>) -> Result<UploadArgs> {
    let mut path = None;
    let mut category_name = None;
    let mut finalize = false;
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--finalize" => finalize = true,
            "--category-name" => {
                category_name = Some(iter.next().context("--category-name needs a value")?);
            }
            other if path.is_none() => path = Some(other.to_string()),
            other => bail!("unexpected argument: {other}\n{USAGE}"),
        }
    }
    let path = path.with_context(|| format!("missing file path\n{USAGE}"))?;
    Ok(UploadArgs {
        path,
        category_name,
        finalize,
    })
}

async fn upload(args: Vec<String>) -> Result<()> {
    let args = parse_upload_args(args)?;
    let mut workflow = build_workflow()?;

    let file = SelectedFile::from_path(&args.path).await?;
    println!("{}  {}", file.name, file.size_mb_label());
    workflow.select_file(file)?;

    let mut progress = workflow.subscribe_progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let value = *progress.borrow_and_update();
            if value > 0 && value < 100 {
                println!("Uploading... {value}%");
            }
        }
    });
    let outcome = workflow.submit().await;
    reporter.abort();
    outcome?;
    println!("{}", workflow.progress().status_label());

    let review = workflow
        .review()
        .context("upload finished without document details")?;
    let details = review.details();
    println!("{}", details.summary);
    println!("File Name:   {}", details.file_name);
    println!("File Size:   {} KB", review.editor().basic_info().file_size_kb());
    println!("File Pages:  {}", details.page_count);
    println!("Category:    {}", details.category_name);
    println!("Uploaded At: {}", details.uploaded_at);
    println!("Extracted Fields ({})", details.extracted_fields.len());
    for field in &details.extracted_fields {
        println!("  {}: {}", format_field_key(&field.key), field.value);
    }

    if !args.finalize {
        return Ok(());
    }

    workflow.open_editor()?;
    if let Some(name) = args.category_name {
        workflow
            .editor_mut()?
            .change_basic_info(BasicInfoAttribute::CategoryName, name)?;
    }
    workflow.commit().await?;
    println!("Schema finalized successfully!");
    if let Some(category_id) = workflow.details().and_then(|details| details.category_id) {
        println!("Category ID: {category_id}");
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
