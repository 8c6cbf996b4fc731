use crate::protocol::{ClientFrame, SetupFrame};
use secrecy::{ExposeSecret, SecretString};

pub const DEFAULT_BASE_URL: &str = "wss://api.play.ai";

/// Optional audio format negotiation sent with the handshake.
///
/// Unset fields are left out of the `setup` frame entirely, leaving the
/// choice to the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupOptions {
    pub output_format: Option<String>,
    pub output_sample_rate: Option<u32>,
    pub input_encoding: Option<String>,
    pub input_sample_rate: Option<u32>,
}

/// Everything a session needs to reach an agent.
///
/// The agent id and key are opaque: they are never validated here.
#[derive(Debug)]
pub struct SessionConfig {
    pub base_url: String,
    pub agent_id: String,
    pub api_key: SecretString,
    pub setup: SetupOptions,
}

impl SessionConfig {
    pub fn new(agent_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            agent_id: agent_id.into(),
            api_key: SecretString::from(api_key.into()),
            setup: SetupOptions::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_setup(mut self, setup: SetupOptions) -> Self {
        self.setup = setup;
        self
    }

    /// The talk endpoint for the configured agent.
    pub fn talk_url(&self) -> String {
        format!(
            "{}/v1/talk/{}",
            self.base_url.trim_end_matches('/'),
            self.agent_id
        )
    }

    /// The handshake frame carrying the credential.
    pub fn setup_frame(&self) -> ClientFrame {
        ClientFrame::Setup(SetupFrame {
            api_key: self.api_key.expose_secret().to_string(),
            output_format: self.setup.output_format.clone(),
            output_sample_rate: self.setup.output_sample_rate,
            input_encoding: self.setup.input_encoding.clone(),
            input_sample_rate: self.setup.input_sample_rate,
        })
    }
}
