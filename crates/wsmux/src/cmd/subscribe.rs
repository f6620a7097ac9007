use tracing::{info, warn};
use wsmux_client::{ClientConfig, SubscriptionClient};
use wsmux_transport::WebSocketConnector;

use crate::cmd::{parse_duration, resolve_endpoint, SubscribeArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_event, print_reply, OutputFormat};

/// Subscribe and print pushes until the count is reached or Ctrl-C.
///
/// This command owns the reconnect policy: after a drop it waits
/// `--reconnect-interval` and connects again, and the client replays the
/// subscription on the new link.
pub async fn run(args: SubscribeArgs, format: OutputFormat) -> CliResult<i32> {
    let topic = args.build_topic()?;
    let endpoint = resolve_endpoint(&args.url, args.instance.as_deref())?;
    let interval = parse_duration(&args.reconnect_interval)?;

    let connector = WebSocketConnector::default();
    let client = SubscriptionClient::new(ClientConfig::default());
    let connection = client
        .connect(&connector, &endpoint)
        .await
        .map_err(|err| client_error("connect failed", err))?;
    info!(endpoint = %endpoint, topic = %topic, "connected");

    let (reply, mut subscription) = client
        .subscribe(topic)
        .await
        .map_err(|err| client_error("subscribe failed", err))?;
    print_reply(&reply, format);

    let closed = connection.closed();
    tokio::pin!(closed);
    let mut printed = 0usize;

    loop {
        tokio::select! {
            item = subscription.recv() => match item {
                Some(Ok(event)) => {
                    print_event(subscription.id(), &event, format);
                    printed = printed.saturating_add(1);
                    if args.count.is_some_and(|count| printed >= count) {
                        client.close();
                        return Ok(SUCCESS);
                    }
                }
                Some(Err(err)) => return Err(client_error("subscription ended", err)),
                None => return Ok(SUCCESS),
            },
            reason = &mut closed => {
                if args.no_reconnect {
                    return Err(CliError::new(
                        TRANSPORT_ERROR,
                        format!("connection closed: {reason}"),
                    ));
                }
                warn!(%reason, "connection closed, reconnecting");
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {}
                        _ = tokio::signal::ctrl_c() => {
                            client.close();
                            return Ok(SUCCESS);
                        }
                    }
                    match client.connect(&connector, &endpoint).await {
                        Ok(connection) => {
                            info!(generation = connection.generation(), "reconnected");
                            closed.set(connection.closed());
                            break;
                        }
                        Err(err) => warn!(%err, "reconnect failed"),
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                client.close();
                return Ok(SUCCESS);
            }
        }
    }
}
