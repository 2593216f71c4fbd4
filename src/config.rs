use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Reports whose body matches any of these rules are dropped silently.
    #[serde(default)]
    pub noise_filter: Vec<NoiseRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NoiseRule {
    /// Body field is a string starting with one of the prefixes
    FieldPrefix {
        field: String,
        prefixes: Vec<String>,
    },
    /// Body field is a string equal to `value`
    FieldEquals { field: String, value: String },
    /// Body field is a string matching a regular expression
    FieldPattern { field: String, pattern: String },
}

impl NoiseRule {
    pub fn field(&self) -> &str {
        match self {
            NoiseRule::FieldPrefix { field, .. }
            | NoiseRule::FieldEquals { field, .. }
            | NoiseRule::FieldPattern { field, .. } => field,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            noise_filter: vec![
                // Scripts injected by browser extensions or loaded from disk
                NoiseRule::FieldPrefix {
                    field: "sourceFile".to_string(),
                    prefixes: vec![
                        "chrome-extension://".to_string(),
                        "moz-extension://".to_string(),
                        "safari-web-extension://".to_string(),
                        "file://".to_string(),
                    ],
                },
                NoiseRule::FieldEquals {
                    field: "blockedURL".to_string(),
                    value: "eval".to_string(),
                },
            ],
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
