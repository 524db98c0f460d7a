use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use url::Url;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    pub dicomweb_url: Option<Url>,
    pub output_dir: Option<PathBuf>,
}

const ENV_PREFIX: &str = "DICOMWEB_";

/// `DICOMWEB_URL` and `DICOMWEB_OUTPUT_DIR`.
#[derive(Debug, Deserialize, Default)]
struct ConfigEnv {
    url: Option<Url>,
    output_dir: Option<PathBuf>,
}

fn env_config<I>(vars: I) -> ConfigEnv
where
    I: IntoIterator<Item = (String, String)>,
{
    envy::prefixed(ENV_PREFIX)
        .from_iter(vars)
        .unwrap_or_default()
}

#[derive(Debug)]
pub struct Config {
    /// DICOMweb root that relative request URIs are resolved against.
    pub dicomweb_url: Option<Url>,
    pub output_dir: PathBuf,
}

impl Config {
    pub fn resolve_url(&self, uri: &str) -> Result<Url> {
        match Url::parse(uri) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let root = self.dicomweb_url.as_ref().ok_or_else(|| {
                    anyhow!(
                        "'{}' is not an absolute URL and no DICOMweb root URL is configured",
                        uri
                    )
                })?;
                with_trailing_slash(root)
                    .join(uri)
                    .with_context(|| format!("Cannot resolve '{}' against {}", uri, root))
            }
            Err(e) => Err(e).with_context(|| format!("Invalid URL '{}'", uri)),
        }
    }
}

fn with_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn merge_config(base: ConfigFile, override_config: ConfigEnv) -> Config {
    Config {
        dicomweb_url: override_config.url.or(base.dicomweb_url),
        output_dir: override_config
            .output_dir
            .or(base.output_dir)
            .unwrap_or_else(|| PathBuf::from(".")),
    }
}

pub fn config_path() -> Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("org", "dicomweb", "dicomweb-samples")
        .ok_or(anyhow!("Unable to determine home directory"))?;
    Ok(project_dirs.config_dir().join("config.toml"))
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    match fs::read_to_string(path) {
        Ok(config) => toml::from_str(&config)
            .with_context(|| format!("Failed to parse {}", path.display())),
        Err(_) => Ok(ConfigFile::default()),
    }
}

pub fn read_config() -> Result<Config> {
    let _ = dotenv();
    let env_config = env_config(std::env::vars());
    let file_config = read_config_file(&config_path()?)?;

    Ok(merge_config(file_config, env_config))
}

pub fn write_config(config: ConfigFile) -> Result<PathBuf> {
    let path = config_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    fs::write(&path, toml::to_string_pretty(&config)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
