use chrono::{DateTime, Local};
use serenity::model::id::ChannelId;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Contexto de um comando recebido, carregado junto com cada pedido para
/// que respostas assíncronas (o avanço da fila) cheguem ao canal certo e
/// gerem o registro de log correspondente.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub guild_name: Option<String>,
    pub channel_id: ChannelId,
    pub channel_name: Option<String>,
    pub user: String,
    pub command: String,
}

/// Histórico de comandos em arquivo: uma linha por comando, um arquivo
/// por dia. Falhas de escrita nunca abortam o comando.
pub struct CommandLogger {
    logs_dir: PathBuf,
}

impl CommandLogger {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
        }
    }

    pub async fn record(&self, ctx: &CommandContext, response: &str) {
        let now = Local::now();
        let line = format_line(&now, ctx, response);
        let path = self.logs_dir.join(daily_file_name(&now));

        if let Err(e) = append_line(&path, &line).await {
            warn!("⚠️ Falha ao gravar log de comando em {}: {}", path.display(), e);
        }
    }
}

fn daily_file_name(now: &DateTime<Local>) -> String {
    format!("bot_{}.log", now.format("%Y%m%d"))
}

fn format_line(now: &DateTime<Local>, ctx: &CommandContext, response: &str) -> String {
    format!(
        "[{}] Guild: {} | Channel: {} | User: {} | Command: {} | Response: {}",
        now.format("%Y-%m-%d %H:%M:%S"),
        ctx.guild_name.as_deref().unwrap_or("DM"),
        ctx.channel_name.as_deref().unwrap_or("Direct Message"),
        ctx.user,
        ctx.command,
        response,
    )
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn sample_ctx() -> CommandContext {
        CommandContext {
            guild_name: Some("Rustlandia".to_string()),
            channel_id: ChannelId::new(7),
            channel_name: Some("geral".to_string()),
            user: "ana#1234".to_string(),
            command: "!play lofi".to_string(),
        }
    }

    #[test]
    fn line_format_matches_history() {
        let when = Local.with_ymd_and_hms(2024, 5, 17, 21, 4, 5).unwrap();
        let line = format_line(&when, &sample_ctx(), "📝 Adicionado à fila: lofi");
        assert_eq!(
            line,
            "[2024-05-17 21:04:05] Guild: Rustlandia | Channel: geral | \
             User: ana#1234 | Command: !play lofi | Response: 📝 Adicionado à fila: lofi"
        );
    }

    #[test]
    fn direct_messages_use_placeholders() {
        let ctx = CommandContext {
            guild_name: None,
            channel_name: None,
            ..sample_ctx()
        };
        let when = Local.with_ymd_and_hms(2024, 5, 17, 21, 4, 5).unwrap();
        let line = format_line(&when, &ctx, "ok");
        assert!(line.contains("Guild: DM"));
        assert!(line.contains("Channel: Direct Message"));
    }

    #[test]
    fn daily_file_name_is_date_derived() {
        let when = Local.with_ymd_and_hms(2024, 5, 17, 0, 0, 1).unwrap();
        assert_eq!(daily_file_name(&when), "bot_20240517.log");
    }

    #[tokio::test]
    async fn record_appends_one_line_per_command() {
        let dir = tempfile::tempdir().unwrap();
        let logger = CommandLogger::new(dir.path());
        let ctx = sample_ctx();

        logger.record(&ctx, "primeira").await;
        logger.record(&ctx, "segunda").await;

        let path = dir.path().join(daily_file_name(&Local::now()));
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Response: primeira"));
        assert!(lines[1].ends_with("Response: segunda"));
    }
}
