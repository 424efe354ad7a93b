use clap::Parser;
use geo_yearly_export::config::toml_config::OutputConfig;
use geo_yearly_export::core::ExportRequest;
use geo_yearly_export::domain::ports::Storage;
use geo_yearly_export::utils::error::{ErrorSeverity, GeoExportError};
use geo_yearly_export::utils::{logger, validation::Validate};
use geo_yearly_export::{
    CliConfig, EarthEngineClient, ExportConfig, ExportSummary, JobWatcher, LocalStorage,
    RecordingSink, YearlyExporter,
};

#[tokio::main]
async fn main() {
    let args = CliConfig::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting yearly-export");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    if let Err(e) = run(&args).await {
        tracing::error!(
            "❌ Export run failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(args: &CliConfig) -> Result<(), GeoExportError> {
    let mut config = ExportConfig::from_file(&args.config)?;

    // 應用命令列覆蓋設定；命令列路徑以目前目錄為準
    if let Some(manifest) = &args.manifest {
        let manifest = std::env::current_dir()?.join(manifest);
        let export = config.export.get_or_insert(OutputConfig {
            drive_folder: None,
            manifest_path: None,
        });
        export.manifest_path = Some(manifest.to_string_lossy().into_owned());
    }

    config.validate()?;
    tracing::info!("✅ Configuration loaded and validated successfully");

    // 設定檔中的相對路徑（ROI、manifest）都以設定檔目錄為準
    let storage = LocalStorage::new(ExportConfig::base_dir(&args.config));

    let roi = config.load_roi(&storage).await?;
    if let Some(bounds) = roi.bounds() {
        tracing::info!(
            "🗺️ ROI {} bounds: [{:.4}, {:.4}, {:.4}, {:.4}]",
            roi.type_name(),
            bounds.min_lon,
            bounds.min_lat,
            bounds.max_lon,
            bounds.max_lat
        );
    }

    let products = config.select_products(&args.products)?;
    let years = config.year_range()?;

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be submitted");
        let exporter = YearlyExporter::new(RecordingSink::new())
            .with_drive_folder(config.drive_folder());
        let requests = exporter.plan(&products, years, &roi)?;
        display_plan(&requests);

        let summary = ExportSummary::from_plan(&requests);
        write_manifest(&config, &storage, &summary).await?;
        println!("📋 Planned {} exports (dry run, nothing queued)", summary.planned);
        return Ok(());
    }

    let token = config
        .access_token()
        .ok_or_else(|| GeoExportError::MissingConfigError {
            field: "earth_engine.access_token".to_string(),
        })?;

    let client = EarthEngineClient::new(
        config.endpoint(),
        &config.earth_engine.project,
        Some(token.to_string()),
        config.request_timeout(),
    )?;
    let exporter = YearlyExporter::new(client).with_drive_folder(config.drive_folder());

    let mut summary = exporter.run(&products, years, &roi).await?;

    if args.watch || config.watch_enabled() {
        tracing::info!("👀 Watching {} queued jobs", summary.submitted);
        let watcher = JobWatcher::new(
            exporter.sink(),
            config.watch_interval(),
            config.watch_timeout(),
        );
        watcher.watch_summary(&mut summary).await?;
    }

    summary.log_summary();
    write_manifest(&config, &storage, &summary).await?;

    println!(
        "✅ Queued {}/{} exports ({} not queued)",
        summary.submitted, summary.planned, summary.failed_submissions
    );

    if !summary.is_successful() {
        std::process::exit(1);
    }
    Ok(())
}

fn display_plan(requests: &[ExportRequest]) {
    println!("📋 Export plan ({} jobs):", requests.len());
    for request in requests {
        println!(
            "  {:<18} {:<26} {:>5}  scale={}m  {:?}{}",
            request.description,
            request.recipe.dataset.collection,
            request.year,
            request.scale,
            request.recipe.reducer,
            request
                .recipe
                .transform
                .map(|t| format!(" then {:?}", t))
                .unwrap_or_default()
        );
    }
    println!();
}

async fn write_manifest(
    config: &ExportConfig,
    storage: &LocalStorage,
    summary: &ExportSummary,
) -> Result<(), GeoExportError> {
    let Some(path) = config.manifest_path() else {
        return Ok(());
    };

    let csv = summary.manifest_csv()?;
    storage.write_file(path, csv.as_bytes()).await?;
    tracing::info!("📁 Manifest saved to: {}", storage.resolve(path).display());
    Ok(())
}
