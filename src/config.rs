use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: char,

    // Paths
    pub downloads_dir: PathBuf,
    pub logs_dir: PathBuf,

    // Limites (em segundos)
    pub min_track_duration: u64,
    pub inactivity_timeout: u64,
    pub inactivity_check_period: u64,
    pub resolve_timeout: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN não definido no ambiente"))?,
            command_prefix: parse_prefix(
                &std::env::var("COMMAND_PREFIX").unwrap_or_else(|_| "!".to_string()),
            )?,

            downloads_dir: std::env::var("DOWNLOADS_DIR")
                .unwrap_or_else(|_| "downloads".to_string())
                .into(),
            logs_dir: std::env::var("LOGS_DIR")
                .unwrap_or_else(|_| "logs".to_string())
                .into(),

            min_track_duration: std::env::var("MIN_TRACK_DURATION")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            inactivity_timeout: std::env::var("INACTIVITY_TIMEOUT")
                .unwrap_or_else(|_| "600".to_string()) // 10 minutos
                .parse()?,
            inactivity_check_period: std::env::var("INACTIVITY_CHECK_PERIOD")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            resolve_timeout: std::env::var("RESOLVE_TIMEOUT")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
        };

        // Criar diretórios de trabalho se não existirem
        std::fs::create_dir_all(&config.downloads_dir)?;
        std::fs::create_dir_all(&config.logs_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Checagens de sanidade sobre os valores carregados.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN vazio");
        }

        if self.command_prefix.is_alphanumeric() || self.command_prefix.is_whitespace() {
            anyhow::bail!(
                "COMMAND_PREFIX deve ser um símbolo, recebido: {:?}",
                self.command_prefix
            );
        }

        if self.inactivity_timeout == 0 {
            anyhow::bail!("INACTIVITY_TIMEOUT deve ser maior que zero");
        }

        if self.inactivity_check_period == 0 {
            anyhow::bail!("INACTIVITY_CHECK_PERIOD deve ser maior que zero");
        }

        if self.resolve_timeout == 0 {
            anyhow::bail!("RESOLVE_TIMEOUT deve ser maior que zero");
        }

        Ok(())
    }

    /// Resumo seguro para o log de inicialização (sem o token).
    pub fn summary(&self) -> String {
        format!(
            "Config: prefixo '{}' | downloads em {} | logs em {} | \
            duração mínima {}s | inatividade {}s (verificada a cada {}s) | \
            timeout de resolução {}s",
            self.command_prefix,
            self.downloads_dir.display(),
            self.logs_dir.display(),
            self.min_track_duration,
            self.inactivity_timeout,
            self.inactivity_check_period,
            self.resolve_timeout,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            command_prefix: '!',
            downloads_dir: "downloads".into(),
            logs_dir: "logs".into(),
            min_track_duration: 60,
            inactivity_timeout: 600,  // 10 minutos
            inactivity_check_period: 60,
            resolve_timeout: 120,
        }
    }
}

fn parse_prefix(raw: &str) -> Result<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(symbol), None) => Ok(symbol),
        _ => anyhow::bail!("COMMAND_PREFIX deve ser um único símbolo, recebido: {:?}", raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_values_match_deployment() {
        let config = Config::default();
        assert_eq!(config.command_prefix, '!');
        assert_eq!(config.min_track_duration, 60);
        assert_eq!(config.inactivity_timeout, 600);
        assert_eq!(config.inactivity_check_period, 60);
        assert_eq!(config.downloads_dir, PathBuf::from("downloads"));
        assert_eq!(config.logs_dir, PathBuf::from("logs"));
    }

    #[test]
    fn parse_prefix_requires_single_symbol() {
        assert_eq!(parse_prefix("!").unwrap(), '!');
        assert_eq!(parse_prefix("$").unwrap(), '$');
        assert!(parse_prefix("").is_err());
        assert!(parse_prefix("!!").is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let base = Config {
            discord_token: "token".to_string(),
            ..Config::default()
        };
        assert!(base.validate().is_ok());

        let empty_token = Config::default();
        assert!(empty_token.validate().is_err());

        let letter_prefix = Config {
            command_prefix: 'p',
            ..base.clone()
        };
        assert!(letter_prefix.validate().is_err());

        let zero_period = Config {
            inactivity_check_period: 0,
            ..base.clone()
        };
        assert!(zero_period.validate().is_err());

        let zero_timeout = Config {
            inactivity_timeout: 0,
            ..base
        };
        assert!(zero_timeout.validate().is_err());
    }
}
