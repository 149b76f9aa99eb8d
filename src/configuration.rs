use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::mailer::{EmailClient, Mailer, SmtpMailer};

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub mailer: MailerSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MailerBackend {
    Smtp,
    Api,
}

#[derive(serde::Deserialize, Clone)]
pub struct MailerSettings {
    pub backend: MailerBackend,
    pub sender_email: String,
    pub recipient_email: String,
    pub subject_prefix: String,
    pub smtp: SmtpSettings,
    pub api: ApiSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_connections: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub sends_per_second: u32,
    pub accept_invalid_certs: bool,
}

impl SmtpSettings {
    pub fn has_credentials(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.expose_secret().is_empty()
    }

    /// Minimum spacing between two sends on the pool.
    pub fn send_interval(&self) -> Duration {
        match self.sends_per_second {
            0 => Duration::ZERO,
            n => Duration::from_millis(1000 / u64::from(n)),
        }
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub authorization_token: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

impl MailerSettings {
    /// Builds the single mailer the process will use, picked by `backend`.
    pub fn build_mailer(&self) -> Result<Arc<dyn Mailer>, anyhow::Error> {
        let mailer: Arc<dyn Mailer> = match self.backend {
            MailerBackend::Smtp => Arc::new(SmtpMailer::new(self)?),
            MailerBackend::Api => Arc::new(EmailClient::new(self)?),
        };
        tracing::info!(backend = ?self.backend, "Mailer initialised");
        Ok(mailer)
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT.");
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // APP_MAILER__SMTP__PASSWORD=... sets `Settings.mailer.smtp.password`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}
