use crate::tally::*;

pub const DEFAULT_DATA_FILE: &str = "geotally.json";
pub const DEFAULT_EMAIL_DOMAIN: &str = "example.com";
pub const DEFAULT_TOP_N: usize = 10;
pub const DATA_ENV_VAR: &str = "GEOTALLY_DATA";

/// The configuration file. All the keys are optional.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "dataFile")]
    pub data_file: Option<String>,
    #[serde(rename = "authEmailDomain")]
    pub auth_email_domain: Option<String>,
    #[serde(rename = "defaultTopN")]
    pub default_top_n: Option<usize>,
    #[serde(rename = "defaultYear")]
    pub default_year: Option<u32>,
    #[serde(rename = "defaultCity")]
    pub default_city: Option<String>,
}

/// The resolved settings of one invocation.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Settings {
    pub data_file: String,
    pub email_domain: String,
    pub default_top_n: usize,
    pub default_year: Option<u32>,
    pub default_city: Option<String>,
}

pub fn read_config(path: &str) -> TallyResult<AppConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read_config: {:?}", contents);
    let config: AppConfig = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(config)
}

/// The data file comes from the command line, then the environment, then the
/// configuration file.
pub fn resolve_settings(
    data_arg: Option<&str>,
    config: &AppConfig,
    data_env: Option<String>,
) -> Settings {
    let data_file = data_arg
        .map(|s| s.to_string())
        .or(data_env)
        .or_else(|| config.data_file.clone())
        .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string());
    let email_domain = config
        .auth_email_domain
        .as_deref()
        .map(|d| d.trim().trim_start_matches('@').to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_EMAIL_DOMAIN.to_string());
    Settings {
        data_file,
        email_domain,
        default_top_n: config.default_top_n.unwrap_or(DEFAULT_TOP_N),
        default_year: config.default_year,
        default_city: config.default_city.clone(),
    }
}

/// Reads the configuration (if any) and resolves the settings.
pub fn load_settings(args: &Args) -> TallyResult<Settings> {
    let config = match &args.config {
        Some(path) => read_config(path)?,
        None => AppConfig::default(),
    };
    let data_env = std::env::var(DATA_ENV_VAR).ok().filter(|s| !s.is_empty());
    let settings = resolve_settings(args.data.as_deref(), &config, data_env);
    info!("load_settings: {:?}", settings);
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = resolve_settings(None, &AppConfig::default(), None);
        assert_eq!(s.data_file, DEFAULT_DATA_FILE);
        assert_eq!(s.email_domain, "example.com");
        assert_eq!(s.default_top_n, 10);
        assert_eq!(s.default_year, None);
    }

    #[test]
    fn precedence_of_data_file() {
        let config: AppConfig = serde_json::from_str(
            r#"{"dataFile": "from_config.json", "authEmailDomain": "@partido.org", "defaultTopN": 5}"#,
        )
        .unwrap();
        let s = resolve_settings(None, &config, None);
        assert_eq!(s.data_file, "from_config.json");
        assert_eq!(s.email_domain, "partido.org");
        assert_eq!(s.default_top_n, 5);
        let s = resolve_settings(None, &config, Some("from_env.json".to_string()));
        assert_eq!(s.data_file, "from_env.json");
        let s = resolve_settings(Some("from_args.json"), &config, Some("from_env.json".to_string()));
        assert_eq!(s.data_file, "from_args.json");
    }

    #[test]
    fn config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"defaultYear": 2022, "defaultCity": "Fortaleza"}"#).unwrap();
        let config = read_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.default_year, Some(2022));
        assert_eq!(config.default_city.as_deref(), Some("Fortaleza"));
        assert!(read_config("/nonexistent/config.json").is_err());
    }
}
