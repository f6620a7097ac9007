use std::time::Duration;

use wsmux_client::{ClientConfig, SubscriptionClient};
use wsmux_transport::{Endpoint, WebSocketConnector};

use crate::cmd::{parse_duration, resolve_endpoint, InfoArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_connection_info, OutputFormat};

pub async fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let endpoint = resolve_endpoint(&args.url, args.instance.as_deref())?;

    let client = SubscriptionClient::new(ClientConfig::default());
    let info = tokio::time::timeout(timeout, probe(&client, &endpoint))
        .await
        .map_err(|_| timed_out(timeout))??;
    client.close();

    print_connection_info(endpoint.as_str(), &info, format);
    Ok(SUCCESS)
}

async fn probe(
    client: &SubscriptionClient,
    endpoint: &Endpoint,
) -> CliResult<wsmux_client::ConnectionInfo> {
    let _connection = client
        .connect(&WebSocketConnector::default(), endpoint)
        .await
        .map_err(|err| client_error("connect failed", err))?;
    client
        .wait_connected()
        .await
        .map_err(|err| client_error("connect failed", err))?;
    client
        .connection_info()
        .ok_or_else(|| CliError::new(crate::exit::FAILURE, "server sent no connection info"))
}

fn timed_out(timeout: Duration) -> CliError {
    CliError::new(
        TIMEOUT,
        format!("no connection info within {timeout:?}"),
    )
}
