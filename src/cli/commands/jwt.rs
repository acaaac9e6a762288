use clap::Subcommand;
use serde_json::json;

use crate::auth::{self, fetch_peer_fingerprint, TokenCodec};
use crate::cli::utils::{output_error, output_success, to_value};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum JwtCommands {
    #[command(about = "Show which source supplies the JWT secret and its fingerprint")]
    Show,

    #[command(about = "Compare the local JWT secret with a peer service's /health/jwt fingerprint")]
    VerifySync {
        #[arg(long, help = "Peer base URL (defaults to AUTH_SERVICE_URL)")]
        peer: Option<String>,
    },

    #[command(about = "Issue a token signed with the resolved secret")]
    Issue {
        #[arg(help = "Token subject")]
        subject: String,
        #[arg(long, default_value = "access", help = "Token type claim")]
        token_type: String,
    },

    #[command(about = "Verify a token against the resolved secret")]
    Verify {
        #[arg(help = "Encoded JWT")]
        token: String,
    },
}

pub async fn handle(cmd: JwtCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = auth::shared();

    match cmd {
        JwtCommands::Show => {
            let resolved = manager.get_resolved()?;
            let data = json!({
                "environment": manager.environment(),
                "source": resolved.source.to_string(),
                "fingerprint": resolved.fingerprint(),
            });
            let message = format!(
                "JWT secret for {} from {} (fingerprint {})",
                manager.environment(),
                resolved.source,
                resolved.fingerprint()
            );
            output_success(output_format, &message, Some(data))
        }
        JwtCommands::VerifySync { peer } => {
            let config = AppConfig::from_env();
            let peer = peer
                .or(config.services.auth_service_url)
                .ok_or_else(|| anyhow::anyhow!("no peer given and AUTH_SERVICE_URL is not set"))?;

            let client = reqwest::Client::builder()
                .timeout(config.startup.check_timeout())
                .build()?;
            let peer_fingerprint = fetch_peer_fingerprint(&client, &peer).await?;
            let status = auth::validate_synchronization(&peer_fingerprint)?;

            if status.in_sync {
                output_success(
                    output_format,
                    &format!("JWT secret in sync with {} ({})", peer, status.local_fingerprint),
                    Some(to_value(&status)?),
                )
            } else {
                output_error(
                    output_format,
                    &format!(
                        "JWT secret mismatch with {}: local {} vs peer {}",
                        peer, status.local_fingerprint, status.peer_fingerprint
                    ),
                    Some(to_value(&status)?),
                )?;
                anyhow::bail!("JWT secrets are not synchronized")
            }
        }
        JwtCommands::Issue { subject, token_type } => {
            let config = AppConfig::from_env();
            let codec = TokenCodec::from_manager(&manager, &config.security)?;
            let token = codec.issue(&subject, &token_type)?;
            match output_format {
                OutputFormat::Json => output_success(output_format, "Token issued", Some(json!({ "token": token }))),
                OutputFormat::Text => {
                    println!("{}", token);
                    Ok(())
                }
            }
        }
        JwtCommands::Verify { token } => {
            let config = AppConfig::from_env();
            let codec = TokenCodec::from_manager(&manager, &config.security)?;
            match codec.verify(&token) {
                Ok(claims) => output_success(
                    output_format,
                    &format!("Token valid for subject {}", claims.sub),
                    Some(to_value(&claims)?),
                ),
                Err(e) => {
                    output_error(output_format, &e.to_string(), None)?;
                    anyhow::bail!("token rejected")
                }
            }
        }
    }
}
