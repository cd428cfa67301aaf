//! Config commands

use anyhow::{Context, Result, bail};
use indextrack::config::Config;

pub fn cmd_config_show(config: &Config) -> Result<()> {
  match Config::user_config_path() {
    Some(path) if path.exists() => println!("# User config: {}", path.display()),
    _ => println!("# No user config file, showing defaults"),
  }
  println!("{}", config.to_toml().context("Failed to render config")?);
  Ok(())
}

pub fn cmd_config_init(force: bool) -> Result<()> {
  let Some(config_path) = Config::user_config_path() else {
    bail!("Could not determine the user config directory");
  };

  if config_path.exists() && !force {
    bail!(
      "Config file already exists: {}. Use --force to overwrite",
      config_path.display()
    );
  }

  if let Some(parent) = config_path.parent() {
    std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
  }
  std::fs::write(&config_path, Config::generate_template())
    .with_context(|| format!("Failed to write {}", config_path.display()))?;

  println!("Created config: {}", config_path.display());
  println!("Edit the file to point [backend].base_url at your indexing service.");
  Ok(())
}
