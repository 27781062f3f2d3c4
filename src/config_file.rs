//! `.chatsplitrc` / `config.ini` support
//!
//! Two keys are understood: a root-level `defaults = <args>` that is
//! prepended to every command line, and an `[aliases]` section whose entries
//! are expanded by `-a NAME`. Values are split with shell quoting rules.

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const PROJECT_CONFIG_NAME: &str = ".chatsplitrc";
const MAX_ALIAS_DEPTH: usize = 10;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub defaults: Option<String>,
    pub aliases: IndexMap<String, String>,
}

#[derive(PartialEq)]
enum Section {
    Root,
    Aliases,
    Other(String),
}

impl ConfigFile {
    /// Nearest `.chatsplitrc` in the current directory or its parents
    pub fn find_project_config() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        cwd.ancestors()
            .map(|dir| dir.join(PROJECT_CONFIG_NAME))
            .find(|path| path.is_file())
    }

    /// `<config dir>/chatsplit/config.ini`, e.g. `$XDG_CONFIG_HOME` on Linux
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatsplit").join("config.ini"))
    }

    /// Load user config, then overlay the project config
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::user_config_path().filter(|p| p.is_file()) {
            config = config.overlay(Self::load_from_path(&path)?);
        }
        if let Some(path) = Self::find_project_config() {
            config = config.overlay(Self::load_from_path(&path)?);
        }

        Ok(config)
    }

    /// Load an explicit `--config-file`, or fall back to the search above
    pub fn load_with_custom_path(custom_path: Option<&str>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from_path(Path::new(path)),
            None => Self::load(),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut section = Section::Root;

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                section = match name.trim() {
                    "aliases" => Section::Aliases,
                    other => Section::Other(other.to_string()),
                };
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                bail!("line {}: expected 'key = value', found '{}'", idx + 1, line);
            };
            let (key, value) = (key.trim(), value.trim());

            match &section {
                Section::Root if key == "defaults" => config.defaults = Some(value.to_string()),
                Section::Aliases => {
                    config.aliases.insert(key.to_string(), value.to_string());
                }
                // Unknown keys and sections are left for newer versions
                _ => {}
            }
        }

        Ok(config)
    }

    /// `other` wins for defaults and for aliases with the same name
    fn overlay(mut self, other: Self) -> Self {
        if other.defaults.is_some() {
            self.defaults = other.defaults;
        }
        self.aliases.extend(other.aliases);
        self
    }

    /// Expand one alias, following `-a` references inside it
    pub fn resolve_alias(&self, name: &str) -> Result<Vec<String>> {
        self.resolve_alias_inner(name, &mut HashSet::new(), 0)
    }

    fn resolve_alias_inner(
        &self,
        name: &str,
        seen: &mut HashSet<String>,
        depth: usize,
    ) -> Result<Vec<String>> {
        if depth > MAX_ALIAS_DEPTH {
            bail!("Alias chain too deep: {} levels", depth);
        }
        if !seen.insert(name.to_string()) {
            bail!("Circular dependency detected in alias: {}", name);
        }

        let value = self
            .aliases
            .get(name)
            .ok_or_else(|| anyhow!("Unknown alias: {}", name))?;
        let args = shell_words::split(value)
            .with_context(|| format!("Invalid alias '{}': failed to parse arguments", name))?;

        let expanded = self.expand_aliases(args, seen, depth + 1)?;
        seen.remove(name);
        Ok(expanded)
    }

    fn expand_aliases(
        &self,
        args: Vec<String>,
        seen: &mut HashSet<String>,
        depth: usize,
    ) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(args.len());
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            let alias_name = if arg == "-a" || arg == "--alias" {
                iter.next()
            } else {
                arg.strip_prefix("--alias=").map(str::to_string)
            };
            match alias_name {
                Some(name) => out.extend(self.resolve_alias_inner(&name, seen, depth)?),
                None => out.push(arg),
            }
        }
        Ok(out)
    }

    /// Prepend `defaults` (after the program name) and expand aliases
    pub fn process_args(&self, args: Vec<String>) -> Result<Vec<String>> {
        let mut iter = args.into_iter();
        let mut combined: Vec<String> = iter.next().into_iter().collect();

        if let Some(defaults) = &self.defaults {
            let default_args = shell_words::split(defaults)
                .context("Invalid defaults: failed to parse arguments")?;
            combined.extend(default_args);
        }
        combined.extend(iter);

        self.expand_aliases(combined, &mut HashSet::new(), 0)
    }

    /// Print where configuration comes from and what is active
    pub fn show_config() {
        println!("Configuration precedence: CLI > project {} > user config > defaults\n", PROJECT_CONFIG_NAME);

        let project = Self::find_project_config();
        let user = Self::user_config_path();

        match Self::load() {
            Ok(config) => {
                let mut sources = Vec::new();
                if let Some(path) = &project {
                    sources.push(format!("Project: {}", path.display()));
                }
                if let Some(path) = user.as_ref().filter(|p| p.is_file()) {
                    sources.push(format!("User: {}", path.display()));
                }

                if sources.is_empty() {
                    println!("No configuration files found. Using defaults.");
                } else {
                    println!("Configuration loaded from:");
                    for source in sources {
                        println!("  {}", source);
                    }
                }

                if let Some(defaults) = &config.defaults {
                    println!("\nActive defaults:\n  defaults = {}", defaults);
                }
                if !config.aliases.is_empty() {
                    println!("\nActive aliases:");
                    for (name, value) in &config.aliases {
                        println!("  {} = {}", name, value);
                    }
                }
            }
            Err(e) => eprintln!("Error loading configuration: {:#}", e),
        }

        println!("\nConfiguration search locations (in precedence order):");
        match &project {
            Some(path) => println!("  1. Project: {} (found)", path.display()),
            None => println!(
                "  1. Project: {} (searched up directory tree, not found)",
                PROJECT_CONFIG_NAME
            ),
        }
        match &user {
            Some(path) => println!(
                "  2. User: {} {}",
                path.display(),
                if path.is_file() { "(found)" } else { "(not found)" }
            ),
            None => println!("  2. User: no config directory on this platform"),
        }

        if project.is_none() && !user.as_ref().is_some_and(|p| p.is_file()) {
            println!("\nExample configuration file ({}):\n", PROJECT_CONFIG_NAME);
            println!("# Arguments applied to every chatsplit command");
            println!("defaults = --output by-year --workers 8");
            println!();
            println!("[aliases]");
            println!("complete = --unclassified --stats");
            println!("big = --chunk-size 64 --max-pending 1024 --writers 16");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_load_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "defaults = --workers 8 --output 'by year'").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "[aliases]").unwrap();
        writeln!(file, "complete = --unclassified --stats=json").unwrap();
        writeln!(file, "[future]").unwrap();
        writeln!(file, "ignored = yes").unwrap();
        file.flush().unwrap();

        let config = ConfigFile::load_from_path(file.path()).unwrap();
        assert_eq!(
            config.defaults.as_deref(),
            Some("--workers 8 --output 'by year'")
        );
        assert_eq!(config.aliases.len(), 1);
        assert_eq!(
            config.aliases.get("complete").map(String::as_str),
            Some("--unclassified --stats=json")
        );
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let err = ConfigFile::parse("defaults = -w 2\njust words\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_process_args_prepends_defaults() {
        let config = ConfigFile::parse("defaults = -w 2 -o 'by year'").unwrap();
        let out = config
            .process_args(args(&["chatsplit", "-i", "chat.html", "-w", "6"]))
            .unwrap();
        assert_eq!(
            out,
            args(&["chatsplit", "-w", "2", "-o", "by year", "-i", "chat.html", "-w", "6"])
        );
    }

    #[test]
    fn test_nested_alias_expansion() {
        let config = ConfigFile::parse(
            "[aliases]\nfast = -w 16 --writers 16\nall = -a fast --unclassified\n",
        )
        .unwrap();
        let out = config
            .process_args(args(&["chatsplit", "--alias=all", "-i", "x.html"]))
            .unwrap();
        assert_eq!(
            out,
            args(&["chatsplit", "-w", "16", "--writers", "16", "--unclassified", "-i", "x.html"])
        );
    }

    #[test]
    fn test_circular_alias_is_rejected() {
        let config = ConfigFile::parse("[aliases]\na = -a b\nb = -a a\n").unwrap();
        let err = config.resolve_alias("a").unwrap_err();
        assert!(err.to_string().contains("Circular"));
    }

    #[test]
    fn test_unknown_alias() {
        let config = ConfigFile::default();
        let err = config
            .process_args(args(&["chatsplit", "-a", "missing"]))
            .unwrap_err();
        assert!(err.to_string().contains("Unknown alias: missing"));
    }

    #[test]
    fn test_overlay_prefers_later_config() {
        let user = ConfigFile::parse("defaults = -w 2\n[aliases]\nx = -s\ny = -q").unwrap();
        let project = ConfigFile::parse("[aliases]\nx = --stats=json").unwrap();
        let merged = user.overlay(project);
        assert_eq!(merged.defaults.as_deref(), Some("-w 2"));
        assert_eq!(merged.aliases["x"], "--stats=json");
        assert_eq!(merged.aliases["y"], "-q");
    }
}
