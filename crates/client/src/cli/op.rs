use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use client::{
    ClientConfig, ConfigError, HttpTransport, SyncController, SyncHandle, TransportError,
};

/// Resolve the remote URL for the gateway.
///
/// Priority: explicit `--remote` flag > config file `remote` > built-in default.
pub fn resolve_remote(explicit: Option<Url>, config: &ClientConfig) -> Url {
    explicit.unwrap_or_else(|| config.remote.clone())
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Clone)]
pub struct OpContext {
    pub config: ClientConfig,
    pub transport: Arc<HttpTransport>,
}

impl OpContext {
    /// Create context with an optional remote override and config path
    /// (defaults to ~/.latch)
    pub fn new(remote: Option<Url>, config_path: Option<PathBuf>) -> Result<Self, ContextError> {
        let mut config = ClientConfig::load(config_path)?;
        config.remote = resolve_remote(remote, &config);
        let transport = HttpTransport::new(&config.remote, config.request_timeout())?;
        Ok(Self {
            config,
            transport: Arc::new(transport),
        })
    }

    /// Start a controller for this invocation.
    pub fn controller(&self) -> SyncHandle {
        SyncController::spawn(self.config.sync_config(), self.transport.clone())
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
