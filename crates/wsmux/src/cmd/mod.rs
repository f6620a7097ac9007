use std::future::Future;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use wsmux_client::{
    AlarmSubscriptionRequest, NamedObjectId, ParameterSubscriptionRequest,
    ProcessorSubscriptionRequest, Topic,
};
use wsmux_transport::Endpoint;

use crate::exit::{transport_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod subscribe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Subscribe to a topic and print every push.
    Subscribe(SubscribeArgs),
    /// Connect and print the server's connection info.
    Info(InfoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Subscribe(args) => block_on(subscribe::run(args, format)),
        Command::Info(args) => block_on(info::run(args, format)),
        Command::Version(args) => version::run(args),
    }
}

fn block_on(task: impl Future<Output = CliResult<i32>>) -> CliResult<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))?;
    runtime.block_on(task)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TopicArg {
    Events,
    Time,
    Links,
    StreamEvents,
    Alarms,
    Clients,
    Statistics,
    Stream,
    Instances,
    Processors,
    CommandQueues,
    CommandQueueEvents,
    Parameters,
}

#[derive(Args, Debug)]
pub struct SubscribeArgs {
    /// Server base URL (http/https) or socket URL (ws/wss).
    #[arg(env = "WSMUX_URL")]
    pub url: String,
    /// Topic to subscribe to.
    #[arg(long, value_enum)]
    pub topic: TopicArg,
    /// Instance to connect to; also narrows instance-scoped topics.
    #[arg(long, env = "WSMUX_INSTANCE")]
    pub instance: Option<String>,
    /// Narrow command-queue topics to one processor.
    #[arg(long)]
    pub processor: Option<String>,
    /// Stream name (required for `--topic stream`).
    #[arg(long)]
    pub stream: Option<String>,
    /// Qualified parameter name (repeatable; required for `--topic parameters`).
    #[arg(long = "parameter", value_name = "ID")]
    pub parameters: Vec<String>,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
    /// Delay before reconnecting after the connection drops (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub reconnect_interval: String,
    /// Exit with an error instead of reconnecting.
    #[arg(long)]
    pub no_reconnect: bool,
}

impl SubscribeArgs {
    pub fn build_topic(&self) -> CliResult<Topic> {
        let instance = self.instance.clone();
        let processor = self.processor.clone();
        let topic = match self.topic {
            TopicArg::Events => Topic::Events,
            TopicArg::Time => Topic::Time,
            TopicArg::Links => Topic::Links { instance },
            TopicArg::StreamEvents => Topic::StreamEvents {
                instance: instance.ok_or_else(|| {
                    CliError::new(USAGE, "--topic stream-events requires --instance")
                })?,
            },
            TopicArg::Alarms => Topic::Alarms(AlarmSubscriptionRequest::default()),
            TopicArg::Clients => Topic::Clients { instance },
            TopicArg::Statistics => Topic::ProcessorStatistics { instance },
            TopicArg::Stream => Topic::Stream {
                stream: self
                    .stream
                    .clone()
                    .ok_or_else(|| CliError::new(USAGE, "--topic stream requires --stream"))?,
            },
            TopicArg::Instances => Topic::Instances,
            TopicArg::Processors => Topic::Processors(ProcessorSubscriptionRequest::default()),
            TopicArg::CommandQueues => Topic::CommandQueues {
                instance,
                processor,
            },
            TopicArg::CommandQueueEvents => Topic::CommandQueueEvents {
                instance,
                processor,
            },
            TopicArg::Parameters => {
                if self.parameters.is_empty() {
                    return Err(CliError::new(
                        USAGE,
                        "--topic parameters requires at least one --parameter",
                    ));
                }
                Topic::Parameters(ParameterSubscriptionRequest::numeric(
                    self.parameters.iter().map(|name| NamedObjectId::from(name.as_str())),
                ))
            }
        };
        Ok(topic)
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Server base URL (http/https) or socket URL (ws/wss).
    #[arg(env = "WSMUX_URL")]
    pub url: String,
    /// Instance to connect to.
    #[arg(long, env = "WSMUX_INSTANCE")]
    pub instance: Option<String>,
    /// Time allowed to connect and receive connection info (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Resolve a command-line URL to a socket endpoint.
///
/// `ws://`/`wss://` URLs are used verbatim; anything else is a console base
/// URL the socket path is derived from.
pub fn resolve_endpoint(url: &str, instance: Option<&str>) -> CliResult<Endpoint> {
    let endpoint = if url.starts_with("ws://") || url.starts_with("wss://") {
        Endpoint::parse(url)
    } else {
        Endpoint::from_base_url(url, instance)
    };
    endpoint.map_err(|err| transport_error("invalid url", err))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
