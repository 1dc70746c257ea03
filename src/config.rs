use std::{env, net::SocketAddr, str::FromStr};

use lettre::Address;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Sender address, checked to be a valid mailbox at startup.
    pub mail_from: String,
    /// Also send the participant confirmation email when someone is invited.
    pub notify_invitees: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://journey.db".to_string());
        let listen_addr: SocketAddr = lookup("APP_LISTEN_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let smtp_host = lookup("SMTP_HOST").unwrap_or_else(|| "mailpit".to_string());
        let smtp_port: u16 = lookup("SMTP_PORT")
            .unwrap_or_else(|| "1025".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid SMTP_PORT: {err}")))?;

        let mail_from = parse_mail_from(
            &lookup("MAIL_FROM").unwrap_or_else(|| "mailpit@journey.com".to_string()),
        )?;

        let notify_invitees = match lookup("NOTIFY_INVITEES") {
            Some(raw) => parse_flag(&raw)
                .ok_or_else(|| AppError::Config(format!("invalid NOTIFY_INVITEES: {raw}")))?,
            None => false,
        };

        Ok(Self {
            database_url,
            listen_addr,
            smtp_host,
            smtp_port,
            mail_from,
            notify_invitees,
        })
    }
}

fn parse_mail_from(raw: &str) -> Result<String, AppError> {
    let address = Address::from_str(raw.trim())
        .map_err(|err| AppError::Config(format!("invalid MAIL_FROM {raw:?}: {err}")))?;
    Ok(address.to_string())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
