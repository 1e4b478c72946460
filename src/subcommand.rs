use {super::*, std::net::ToSocketAddrs};

pub(crate) mod pool;
pub(crate) mod solo;

#[derive(Debug, Parser)]
pub(crate) enum Subcommand {
    #[command(about = "Relay miners to an upstream Stratum pool")]
    Pool(pool::Pool),
    #[command(about = "Mine solo against a local CKB node")]
    Solo(solo::Solo),
}

impl Subcommand {
    pub(crate) async fn run(self, settings: Settings, cancel: CancellationToken) -> Result {
        match self {
            Self::Pool(pool) => pool.run(settings, cancel).await,
            Self::Solo(solo) => solo.run(settings, cancel).await,
        }
    }
}

/// Accept loop shared by both modes. Binding the miner port is the one
/// fatal startup step; everything downstream retries or degrades instead.
pub(crate) async fn serve_miners(
    settings: Arc<Settings>,
    ledger: Arc<Ledger>,
    link: Link,
    source: StatusSource,
    cancel: CancellationToken,
) -> Result {
    let listener = TcpListener::bind((settings.local_host(), settings.local_port()))
        .await
        .with_context(|| {
            format!(
                "failed to bind {}:{}",
                settings.local_host(),
                settings.local_port()
            )
        })?;

    info!("Listening for miners on {}", listener.local_addr()?);

    let stats_address = (settings.local_host(), settings.stats_port())
        .to_socket_addrs()
        .context("failed to resolve the stats address")?
        .next()
        .context("the stats address resolved to nothing")?;

    api::spawn(
        stats_address,
        ApiState {
            settings: settings.clone(),
            ledger: ledger.clone(),
            source,
        },
        cancel.clone(),
    );

    let mut status_ticker = interval(Duration::from_secs(60));
    status_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    status_ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            _ = status_ticker.tick() => {
                info!("{}", ledger.status_line());
            }

            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept a connection: {e}");
                        continue;
                    }
                };

                // One suffix byte partitions the nonce space 256 ways;
                // past that a new miner would silently share another's
                // range, so it is turned away instead.
                if ledger.live_miners() >= MAX_MINERS {
                    warn!("Refusing {peer}: {MAX_MINERS} miners already connected");
                    continue;
                }

                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Failed to set nodelay for {peer}: {e}");
                }

                let (reader, writer) = stream.into_split();
                let mut connection = Connection::new(
                    settings.clone(),
                    ledger.clone(),
                    link.clone(),
                    peer,
                    reader,
                    writer,
                    cancel.clone(),
                );

                tokio::spawn(async move {
                    if let Err(err) = connection.serve().await {
                        error!("Miner connection error: {err:#}");
                    }
                });
            }
        }
    }

    info!("Shutting down miner listener");
    Ok(())
}
