use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, bail};

use branchchat_llm::CompletionConfig;
use branchchat_rag::RagConfig;

/// Placeholder JWT secrets that MUST NOT be used.
pub const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-secret-key",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub rag: RagConfig,
    pub completion: CompletionConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("BRANCHCHAT_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("BRANCHCHAT_JWT_SECRET is unset or still a placeholder");
        }

        let host: IpAddr = parse_or(&lookup, "BRANCHCHAT_HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port: u16 = parse_or(&lookup, "BRANCHCHAT_PORT", 8000)?;
        let addr = SocketAddr::new(host, port);

        let rag_defaults = RagConfig::default();
        let rag = RagConfig {
            chunk_size: parse_or(&lookup, "BRANCHCHAT_RAG_CHUNK_SIZE", rag_defaults.chunk_size)?,
            chunk_overlap: parse_or(
                &lookup,
                "BRANCHCHAT_RAG_CHUNK_OVERLAP",
                rag_defaults.chunk_overlap,
            )?,
            top_k: parse_or(&lookup, "BRANCHCHAT_RAG_TOP_K", rag_defaults.top_k)?,
        };
        if rag.chunk_overlap >= rag.chunk_size {
            bail!(
                "BRANCHCHAT_RAG_CHUNK_OVERLAP ({}) must be smaller than BRANCHCHAT_RAG_CHUNK_SIZE ({})",
                rag.chunk_overlap,
                rag.chunk_size
            );
        }

        let completion_defaults = CompletionConfig::default();
        let completion = CompletionConfig {
            api_url: lookup("BRANCHCHAT_COMPLETION_URL").unwrap_or(completion_defaults.api_url),
            api_key: lookup("HUGGINGFACE_TOKEN").filter(|k| !k.trim().is_empty()),
            model: lookup("BRANCHCHAT_COMPLETION_MODEL").unwrap_or(completion_defaults.model),
            timeout_secs: parse_or(
                &lookup,
                "BRANCHCHAT_COMPLETION_TIMEOUT_SECS",
                completion_defaults.timeout_secs,
            )?,
        };

        Ok(Self {
            jwt_secret,
            token_ttl_hours: parse_or(&lookup, "BRANCHCHAT_TOKEN_TTL_HOURS", 168)?, // 7 days
            db_path: lookup("BRANCHCHAT_DB_PATH")
                .unwrap_or_else(|| "branchchat.db".into())
                .into(),
            addr,
            rag,
            completion,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<ServerConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = load(&[("BRANCHCHAT_JWT_SECRET", "s3cr3t-for-tests")]).unwrap();

        assert_eq!(config.addr, "0.0.0.0:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.db_path, PathBuf::from("branchchat.db"));
        assert_eq!(config.token_ttl_hours, 168);
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.rag.chunk_overlap, 100);
        assert_eq!(config.rag.top_k, 4);
        assert!(config.completion.api_key.is_none());
    }

    #[test]
    fn missing_or_placeholder_secret_is_rejected() {
        assert!(load(&[]).is_err());
        assert!(load(&[("BRANCHCHAT_JWT_SECRET", "   ")]).is_err());
        assert!(load(&[("BRANCHCHAT_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("BRANCHCHAT_JWT_SECRET", "s3cr3t-for-tests"),
            ("BRANCHCHAT_HOST", "127.0.0.1"),
            ("BRANCHCHAT_PORT", "9100"),
            ("BRANCHCHAT_RAG_TOP_K", "2"),
            ("HUGGINGFACE_TOKEN", "hf_abc"),
        ])
        .unwrap();

        assert_eq!(config.addr, "127.0.0.1:9100".parse::<SocketAddr>().unwrap());
        assert_eq!(config.rag.top_k, 2);
        assert_eq!(config.completion.api_key.as_deref(), Some("hf_abc"));
    }

    #[test]
    fn ipv6_hosts_are_accepted() {
        let config = load(&[
            ("BRANCHCHAT_JWT_SECRET", "s3cr3t-for-tests"),
            ("BRANCHCHAT_HOST", "::1"),
            ("BRANCHCHAT_PORT", "8080"),
        ])
        .unwrap();

        assert_eq!(config.addr, "[::1]:8080".parse::<SocketAddr>().unwrap());
        assert!(load(&[("BRANCHCHAT_JWT_SECRET", "x-secret"), ("BRANCHCHAT_HOST", "localhost")]).is_err());
    }

    #[test]
    fn malformed_numbers_are_errors() {
        assert!(load(&[("BRANCHCHAT_JWT_SECRET", "x-secret"), ("BRANCHCHAT_PORT", "http")]).is_err());
        assert!(
            load(&[
                ("BRANCHCHAT_JWT_SECRET", "x-secret"),
                ("BRANCHCHAT_RAG_CHUNK_SIZE", "50"),
                ("BRANCHCHAT_RAG_CHUNK_OVERLAP", "50"),
            ])
            .is_err()
        );
    }
}
