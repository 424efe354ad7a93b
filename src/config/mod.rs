pub mod toml_config;

pub use toml_config::ExportConfig;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "yearly-export")]
#[command(about = "Queue yearly burned-area, temperature and precipitation exports on Earth Engine")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "export-config.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Build and print the plan without submitting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Poll queued jobs until they finish (also enabled by `[watch] enabled = true`)
    #[arg(long)]
    pub watch: bool,

    /// Write the job manifest CSV here (overrides the config)
    #[arg(long)]
    pub manifest: Option<String>,

    /// Only export these products (by name); repeatable
    #[arg(long = "product")]
    pub products: Vec<String>,
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_watch_is_a_plain_flag() {
        let args = CliConfig::try_parse_from(["yearly-export", "--watch"]).unwrap();
        assert!(args.watch);

        let args = CliConfig::try_parse_from(["yearly-export"]).unwrap();
        assert!(!args.watch);
        assert_eq!(args.config, "export-config.toml");
    }

    #[test]
    fn test_repeatable_product_filter() {
        let args = CliConfig::try_parse_from([
            "yearly-export",
            "--dry-run",
            "--product",
            "temperature",
            "--product",
            "precipitation",
        ])
        .unwrap();
        assert!(args.dry_run);
        assert_eq!(args.products, vec!["temperature", "precipitation"]);
    }
}
