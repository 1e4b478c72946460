use super::*;

#[derive(Debug, Default, Parser)]
pub(crate) struct Pool {}

impl Pool {
    pub(crate) async fn run(self, settings: Settings, cancel: CancellationToken) -> Result {
        // Fail fast on missing pool credentials rather than inside the
        // reconnect loop.
        settings.pool_host()?;
        settings.pool_port()?;
        settings.pool_user()?;

        let settings = Arc::new(settings);
        let ledger = Arc::new(Ledger::new());

        let upstream = Upstream::new(settings.clone())?;
        upstream.spawn(cancel.clone());

        serve_miners(
            settings,
            ledger,
            Link::Pool(upstream.clone()),
            StatusSource::Pool(upstream),
            cancel,
        )
        .await
    }
}
