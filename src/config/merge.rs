//! CLI argument merging with config

use crate::domain::{ArchiveFormat, CompilerKind, Config};
use std::path::PathBuf;

/// Values given on the command line; `None` leaves the config value alone.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub out_dir: Option<PathBuf>,
    pub rename: Option<String>,
    pub encodings: Option<Vec<String>>,
    pub compile: Option<bool>,
    pub compiler: Option<CompilerKind>,
    pub archive_format: Option<ArchiveFormat>,
    pub store_git_hash: Option<bool>,
    pub force: Option<bool>,
    pub always_include: Option<Vec<String>>,
}

pub fn merge_cli_with_config(mut base_config: Config, cli: CliOverrides) -> Config {
    if let Some(out_dir) = cli.out_dir {
        base_config.out_dir = Some(out_dir);
    }
    if let Some(rename) = cli.rename {
        base_config.rename = Some(rename);
    }
    if let Some(encodings) = cli.encodings {
        base_config.encodings = encodings;
    }

    if let Some(compile) = cli.compile {
        base_config.compile = compile;
    }
    if let Some(compiler) = cli.compiler {
        base_config.compiler = compiler;
    }
    if let Some(archive_format) = cli.archive_format {
        base_config.archive_format = archive_format;
    }

    if let Some(store_git_hash) = cli.store_git_hash {
        base_config.store_git_hash = store_git_hash;
    }
    if let Some(force) = cli.force {
        base_config.force = force;
    }
    // Patterns from the command line add to the configured ones.
    if let Some(always_include) = cli.always_include {
        for pattern in always_include {
            if !base_config.always_include.contains(&pattern) {
                base_config.always_include.push(pattern);
            }
        }
    }

    base_config
}

#[cfg(test)]
mod tests {
    use super::{merge_cli_with_config, CliOverrides};
    use crate::domain::{ArchiveFormat, CompilerKind, Config};
    use std::path::PathBuf;

    #[test]
    fn cli_overrides_replace_base_values() {
        let base = Config {
            out_dir: Some(PathBuf::from("/tmp/from-config")),
            compiler: CompilerKind::Pdflatex,
            always_include: vec!["00README.json".to_string()],
            ..Config::default()
        };

        let cli = CliOverrides {
            out_dir: Some(PathBuf::from("/tmp/from-cli")),
            compile: Some(false),
            archive_format: Some(ArchiveFormat::Tar),
            encodings: Some(vec!["latin1".to_string()]),
            always_include: Some(vec!["*.cls".to_string(), "00README.json".to_string()]),
            ..CliOverrides::default()
        };

        let merged = merge_cli_with_config(base, cli);
        assert_eq!(merged.out_dir, Some(PathBuf::from("/tmp/from-cli")));
        assert!(!merged.compile);
        assert_eq!(merged.compiler, CompilerKind::Pdflatex);
        assert_eq!(merged.archive_format, ArchiveFormat::Tar);
        assert_eq!(merged.encodings, vec!["latin1"]);
        assert_eq!(merged.always_include, vec!["00README.json", "*.cls"]);
    }

    #[test]
    fn empty_overrides_keep_config() {
        let merged = merge_cli_with_config(Config::default(), CliOverrides::default());
        assert!(merged.compile);
        assert!(merged.rename.is_none());
    }
}
