// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for tagc

use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tagc")]
#[command(about = "Compile and render templates written in the tagc template language")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a template and print its output
    Render {
        #[arg(help = "Template identifier relative to the template root")]
        template: String,

        #[arg(
            short = 'V',
            long = "var",
            help = "Template variable (key=value)"
        )]
        vars: Vec<String>,

        #[arg(long = "vars", help = "YAML or JSON file with template variables")]
        vars_file: Option<PathBuf>,

        #[arg(long, help = "Cache mode: off, forever or seconds")]
        cache: Option<String>,

        #[arg(long, help = "Recompile even when the compiled artifact is fresh")]
        force: bool,
    },

    /// Compile a template and store its artifact
    Compile {
        #[arg(help = "Template identifier relative to the template root")]
        template: String,

        #[arg(long, help = "Print the compiled artifact as JSON")]
        emit: bool,
    },

    /// Compile every template below the template root
    Check {
        #[arg(long, help = "Only check templates matching this glob", default_value = "**/*.tpl")]
        pattern: String,
    },

    /// Remove cached output of one template or of all templates
    ClearCache {
        #[arg(help = "Template identifier; clears everything when omitted")]
        template: Option<String>,
    },
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse variables from key=value format, keeping their order
    pub fn parse_variables(vars: &[String]) -> anyhow::Result<IndexMap<String, String>> {
        let mut variables = IndexMap::new();

        for var in vars {
            if let Some((key, value)) = var.split_once('=') {
                variables.insert(key.trim().to_string(), value.to_string());
            } else {
                return Err(anyhow::anyhow!(
                    "Invalid variable format '{}'. Expected 'key=value'",
                    var
                ));
            }
        }

        Ok(variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variables() {
        let vars = vec![
            "title=Home".to_string(),
            "count=3".to_string(),
            "query=a=b".to_string(),
        ];

        let parsed = Args::parse_variables(&vars).unwrap();

        assert_eq!(parsed.get("title"), Some(&"Home".to_string()));
        assert_eq!(parsed.get("count"), Some(&"3".to_string()));
        assert_eq!(parsed.get("query"), Some(&"a=b".to_string()));
    }

    #[test]
    fn test_parse_variables_invalid() {
        let vars = vec!["invalid_format".to_string()];
        let result = Args::parse_variables(&vars);
        assert!(result.is_err());
    }

    #[test]
    fn test_render_command_parses() {
        let args = Args::try_parse_from([
            "tagc", "render", "index.tpl", "-V", "name=Ada", "--cache", "forever", "--force",
        ])
        .unwrap();
        match args.command {
            Commands::Render {
                template,
                vars,
                cache,
                force,
                ..
            } => {
                assert_eq!(template, "index.tpl");
                assert_eq!(vars, vec!["name=Ada".to_string()]);
                assert_eq!(cache.as_deref(), Some("forever"));
                assert!(force);
            }
            _ => panic!("expected render"),
        }
    }
}
