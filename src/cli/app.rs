// ABOUTME: Main application orchestration for the tagc CLI
// ABOUTME: Coordinates between CLI arguments, configuration, logging and command execution

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands;
use super::{Args, Commands, Config};

pub struct App {
    config: Config,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        // Rendered output goes to stdout, so logs go to stderr
        match self.config.logging.format.as_str() {
            "compact" => {
                tracing_subscriber::fmt()
                    .compact()
                    .with_env_filter(env_filter)
                    .with_ansi(!no_color)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .init();
            }
            _ => {
                tracing_subscriber::fmt()
                    .pretty()
                    .with_env_filter(env_filter)
                    .with_ansi(!no_color)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments
    pub fn run(&mut self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("Starting tagc v{}", crate::VERSION);
        debug!("Configuration loaded from: {:?}", args.config);

        match args.command {
            Commands::Render {
                template,
                vars,
                vars_file,
                cache,
                force,
            } => commands::render_template(template, vars, vars_file, cache, force, &self.config),

            Commands::Compile { template, emit } => {
                commands::compile_template(template, emit, &self.config)
            }

            Commands::Check { pattern } => commands::check_templates(pattern, &self.config),

            Commands::ClearCache { template } => commands::clear_cache(template, &self.config),
        }
    }

    /// Create application and parse command line arguments
    pub fn from_args() -> Result<(Self, Args)> {
        let args = Args::parse_args();
        let config = Config::load(args.config.clone())?;
        Ok((Self::new(config), args))
    }
}
